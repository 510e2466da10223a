use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::warn;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &prospect_config::Retry) -> Self {
		Self {
			max_attempts: cfg.max_attempts.max(1),
			base_delay: Duration::from_millis(cfg.base_delay_ms),
			max_delay: Duration::from_millis(cfg.max_delay_ms),
		}
	}

	// Exponential backoff capped at max_delay, with full jitter over the
	// upper half of the window so concurrent retries spread out.
	fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16);
		let scaled = self
			.base_delay
			.saturating_mul(1_u32 << exponent)
			.min(self.max_delay)
			.max(Duration::from_millis(1));
		let half = scaled / 2;
		let jitter_ms = rand::thread_rng().gen_range(0..=half.as_millis().max(1) as u64);

		half + Duration::from_millis(jitter_ms)
	}
}

/// Retry `call` while `should_retry` approves the error, up to the policy's
/// attempt cap, sleeping an exponentially growing, jittered delay between
/// attempts.
pub async fn with_backoff<T, F, Fut>(
	policy: RetryPolicy,
	should_retry: fn(&Error) -> bool,
	mut call: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt = 0_u32;

	loop {
		attempt += 1;

		match call().await {
			Ok(value) => return Ok(value),
			Err(err) if should_retry(&err) && attempt < policy.max_attempts => {
				let delay = policy.delay_for(attempt);

				warn!(
					error = %err,
					attempt,
					delay_ms = delay.as_millis() as u64,
					"Transient upstream error; retrying."
				);

				tokio::time::sleep(delay).await;
			},
			Err(err) => return Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn test_policy() -> RetryPolicy {
		RetryPolicy {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(4),
		}
	}

	#[tokio::test]
	async fn retries_transient_errors_until_success() {
		let calls = AtomicU32::new(0);
		let result = with_backoff(test_policy(), Error::is_retryable, || {
			let attempt = calls.fetch_add(1, Ordering::SeqCst);

			async move {
				if attempt < 2 {
					Err(Error::Transient { message: "503".to_string() })
				} else {
					Ok(attempt)
				}
			}
		})
		.await;

		assert_eq!(result.expect("retry should eventually succeed"), 2);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn permanent_errors_are_not_retried() {
		let calls = AtomicU32::new(0);
		let result: Result<()> = with_backoff(test_policy(), Error::is_retryable, || {
			calls.fetch_add(1, Ordering::SeqCst);

			async { Err(Error::Permanent { message: "401".to_string() }) }
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn attempt_cap_is_enforced() {
		let calls = AtomicU32::new(0);
		let result: Result<()> = with_backoff(test_policy(), Error::is_retryable, || {
			calls.fetch_add(1, Ordering::SeqCst);

			async { Err(Error::Transient { message: "503".to_string() }) }
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn delay_grows_and_stays_bounded() {
		let policy = RetryPolicy {
			max_attempts: 5,
			base_delay: Duration::from_millis(100),
			max_delay: Duration::from_millis(400),
		};

		for attempt in 1..=6 {
			let delay = policy.delay_for(attempt);

			assert!(delay >= Duration::from_millis(50));
			assert!(delay <= Duration::from_millis(400));
		}
	}
}

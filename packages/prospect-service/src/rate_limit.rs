use std::{
	collections::VecDeque,
	time::{Duration, Instant},
};

use tokio::sync::Mutex;

/// Sliding-window rate limiter for outbound web-search calls.
///
/// `acquire` blocks the caller until a permit frees up instead of dropping
/// the request. Permit acquisition is serialised across all concurrent
/// requests; the lock is never held while sleeping.
pub struct RateLimiter {
	max_calls: usize,
	window: Duration,
	timestamps: Mutex<VecDeque<Instant>>,
}
impl RateLimiter {
	pub fn new(cfg: &prospect_config::RateLimit) -> Self {
		Self {
			max_calls: cfg.max_calls.max(1) as usize,
			window: Duration::from_secs(cfg.window_secs.max(1)),
			timestamps: Mutex::new(VecDeque::new()),
		}
	}

	pub async fn acquire(&self) {
		loop {
			let wait = {
				let mut stamps = self.timestamps.lock().await;
				let now = Instant::now();

				while stamps
					.front()
					.map(|stamp| now.duration_since(*stamp) >= self.window)
					.unwrap_or(false)
				{
					stamps.pop_front();
				}

				if stamps.len() < self.max_calls {
					stamps.push_back(now);

					return;
				}

				let Some(oldest) = stamps.front().copied() else {
					continue;
				};

				self.window
					.saturating_sub(now.duration_since(oldest))
					.max(Duration::from_millis(1))
			};

			tokio::time::sleep(wait).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn limiter(max_calls: u32, window_ms: u64) -> RateLimiter {
		RateLimiter {
			max_calls: max_calls as usize,
			window: Duration::from_millis(window_ms),
			timestamps: Mutex::new(VecDeque::new()),
		}
	}

	#[tokio::test]
	async fn permits_under_the_limit_are_immediate() {
		let limiter = limiter(2, 1_000);
		let start = Instant::now();

		limiter.acquire().await;
		limiter.acquire().await;

		assert!(start.elapsed() < Duration::from_millis(200));
	}

	#[tokio::test]
	async fn excess_permits_block_until_the_window_slides() {
		let limiter = limiter(1, 100);

		limiter.acquire().await;

		let start = Instant::now();

		limiter.acquire().await;

		assert!(start.elapsed() >= Duration::from_millis(80));
	}

	#[tokio::test]
	async fn isolated_limiters_do_not_interfere() {
		let first = limiter(1, 60_000);
		let second = limiter(1, 60_000);
		let start = Instant::now();

		first.acquire().await;
		second.acquire().await;

		assert!(start.elapsed() < Duration::from_millis(200));
	}
}

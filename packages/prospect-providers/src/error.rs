pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Upstream-call failure taxonomy.
///
/// `Transient` covers HTTP 429/5xx and transport flakes and is the only
/// retryable class; schema-violating responses and other 4xx are `Permanent`
/// and surface immediately. `NotConfigured` marks a stage whose credentials
/// are missing for the process lifetime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Transient upstream error: {message}")]
	Transient { message: String },
	#[error("Permanent upstream error: {message}")]
	Permanent { message: String },
	#[error("Upstream call timed out.")]
	Timeout,
	#[error("Provider {provider} is not configured.")]
	NotConfigured { provider: String },
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
impl Error {
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient { .. })
	}

	pub(crate) fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
		let message = format!("{status}: {}", truncate(body, 256));

		if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
			Self::Transient { message }
		} else {
			Self::Permanent { message }
		}
	}

	pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			Self::Timeout
		} else {
			Self::Transient { message: err.to_string() }
		}
	}
}

fn truncate(text: &str, max_bytes: usize) -> &str {
	let mut end = text.len().min(max_bytes);

	while end > 0 && !text.is_char_boundary(end) {
		end -= 1;
	}

	&text[..end]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rate_limits_and_server_errors_are_transient() {
		assert!(Error::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down")
			.is_retryable());
		assert!(Error::from_status(reqwest::StatusCode::BAD_GATEWAY, "").is_retryable());
	}

	#[test]
	fn client_errors_are_permanent() {
		let err = Error::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key");

		assert!(!err.is_retryable());
		assert!(matches!(err, Error::Permanent { .. }));
	}

	#[test]
	fn timeouts_are_not_retried() {
		assert!(!Error::Timeout.is_retryable());
	}
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Provider {provider} is not configured.")]
	NotConfigured { provider: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<prospect_storage::Error> for ServiceError {
	fn from(err: prospect_storage::Error) -> Self {
		match err {
			prospect_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			prospect_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			prospect_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<prospect_providers::Error> for ServiceError {
	fn from(err: prospect_providers::Error) -> Self {
		match err {
			prospect_providers::Error::NotConfigured { provider } => {
				Self::NotConfigured { provider }
			},
			prospect_providers::Error::InvalidInput { message } => Self::InvalidRequest { message },
			prospect_providers::Error::Timeout => {
				Self::Timeout { message: "Upstream call timed out.".to_string() }
			},
			other => Self::Provider { message: other.to_string() },
		}
	}
}

//! Backend-level error types shared across flows, providers, and stores.

// self
use crate::{_prelude::*, provider::ProviderError, store::StoreError};

/// Backend-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical backend error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider call failed.
	#[error(transparent)]
	Provider(#[from] ProviderError),

	/// Stored entry does not belong to the key it was read from.
	#[error("Entry stored at {key} names {name:?}, which does not correspond to that key.")]
	KeyMismatch {
		/// Storage key that was read.
		key: String,
		/// Name recorded inside the entry.
		name: String,
	},
	/// Caller supplied a malformed request.
	#[error("Invalid {field}: {reason}.")]
	InvalidInput {
		/// Offending request field.
		field: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// No server definition exists under the requested name.
	#[error("Server {name:?} does not exist.")]
	UnknownServer {
		/// Requested server name.
		name: String,
	},
	/// The authorization server cannot be used right now.
	#[error("Server {server:?} has configuration problems: {reason}.")]
	ServerConfiguration {
		/// Server name as requested.
		server: String,
		/// Short reason safe to show to callers.
		reason: String,
	},
	/// No provider is registered under the requested name.
	#[error("No provider named {name:?} is registered.")]
	UnknownProvider {
		/// Requested provider name.
		name: String,
	},
	/// The credential has not been issued a token yet.
	#[error("Token pending issuance.")]
	TokenPending,
	/// The credential's token is no longer valid.
	#[error("Token expired.")]
	TokenExpired,
	/// The authorization server rejected the credential; user action is needed.
	#[error("{reason}")]
	Rejected {
		/// Recorded user-facing failure.
		reason: String,
	},
}
impl Error {
	/// Classifies the error for entry bookkeeping and reporting.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Storage(_) | Self::Config(_) => ErrorKind::Fatal,
			Self::Provider(e) =>
				if e.is_user() {
					ErrorKind::User
				} else {
					ErrorKind::Transient
				},
			Self::ServerConfiguration { .. } | Self::UnknownProvider { .. } =>
				ErrorKind::AuthServer,
			Self::TokenPending => ErrorKind::Transient,
			Self::KeyMismatch { .. }
			| Self::InvalidInput { .. }
			| Self::UnknownServer { .. }
			| Self::TokenExpired
			| Self::Rejected { .. } => ErrorKind::User,
		}
	}

	pub(crate) fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidInput { field, reason: reason.into() }
	}
}

/// Classification of a failure, persisted on entries alongside the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// The credential itself is unusable until a user re-authorizes it.
	User,
	/// The configured authorization server is missing or misconfigured.
	AuthServer,
	/// Temporary failure; retrying later may succeed.
	Transient,
	/// Local failure (storage, serialization) that must be surfaced to the caller.
	Fatal,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::AuthServer => "auth_server",
			Self::Transient => "transient",
			Self::Fatal => "fatal",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the backend.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: Box<dyn StdError + Send + Sync>,
	},
	/// A tuning value is out of range.
	#[error("Tuning value {field} is invalid: {reason}.")]
	InvalidTuning {
		/// Tuning field name.
		field: &'static str,
		/// Human-readable reason.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::ProviderErrorKind;

	#[test]
	fn store_error_converts_into_backend_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));
		assert_eq!(error.kind(), ErrorKind::Fatal);

		let source = StdError::source(&error)
			.expect("Backend error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn provider_errors_follow_their_classification() {
		let user: Error = ProviderError::new(ProviderErrorKind::InvalidGrant, "bad grant").into();
		let transient: Error = ProviderError::transient("upstream flapped").into();

		assert_eq!(user.kind(), ErrorKind::User);
		assert_eq!(transient.kind(), ErrorKind::Transient);
	}

	#[test]
	fn server_configuration_message_names_the_server() {
		let error = Error::ServerConfiguration { server: "corp".into(), reason: "not found".into() };

		assert_eq!(error.to_string(), "Server \"corp\" has configuration problems: not found.");
		assert_eq!(error.kind(), ErrorKind::AuthServer);
	}
}

//! Client-level error types shared across the dispatcher, coordinator, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential material failed validation.
	#[error(transparent)]
	Credential(#[from] crate::auth::CredentialError),

	/// Backend answered with a non-success status that is not a credential expiry.
	#[error("Backend rejected the request with status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body, lossily decoded.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// A request that was already replayed after a refresh was rejected as expired again.
	#[error("Backend rejected the refreshed credential with status {status}.")]
	CredentialRejected {
		/// HTTP status code of the second rejection.
		status: u16,
	},
	/// The refresh operation failed; credentials were wiped and the session terminated.
	#[error("Credential refresh failed: {reason}.")]
	RefreshFailed {
		/// Why the refresh could not complete.
		reason: RefreshFailure,
	},
	/// A sign-in or sign-out happened while this caller waited for a refresh.
	#[error("Session changed while the request was waiting for a credential refresh.")]
	SessionSuperseded,
	/// The caller gave up before a result was delivered.
	#[error("Request was cancelled before completion.")]
	Cancelled,
	/// No credential pair is stored for an authenticated request.
	#[error("No signed-in session is available.")]
	NotSignedIn,
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Response body holds more than one JSON document.
	#[error("Response body has trailing data after the JSON document.")]
	TrailingData {
		/// Parser failure at the first trailing byte.
		#[source]
		source: serde_json::Error,
	},
}
impl Error {
	/// Returns `true` when the error means the session is gone and the user must sign in again.
	pub fn is_terminal_session(&self) -> bool {
		matches!(self, Self::RefreshFailed { .. } | Self::NotSignedIn | Self::SessionSuperseded)
	}

	/// HTTP status attached to the error, when the backend produced one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::CredentialRejected { status } => Some(*status),
			Self::RefreshFailed { reason: RefreshFailure::Rejected { status } } => Some(*status),
			_ => None,
		}
	}
}

/// Reasons a refresh operation can fail.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// No refresh credential is stored, so refresh is impossible.
	#[error("no refresh credential is stored")]
	MissingRefreshCredential,
	/// The refresh endpoint rejected the refresh credential.
	#[error("refresh endpoint answered with status {status}")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
	/// The refresh call did not complete within its bound.
	#[error("refresh call timed out")]
	TimedOut,
	/// Network failure while calling the refresh endpoint.
	#[error("transport failure: {0}")]
	Transport(String),
	/// The refresh endpoint answered with an unusable payload.
	#[error("malformed refresh response: {0}")]
	Malformed(String),
	/// The refreshed credential could not be persisted.
	#[error("refreshed credential could not be stored: {0}")]
	Storage(String),
}
impl From<Error> for RefreshFailure {
	fn from(e: Error) -> Self {
		match e {
			Error::RefreshFailed { reason } => reason,
			Error::Rejected { status, .. } | Error::CredentialRejected { status } =>
				Self::Rejected { status },
			Error::Transport(TransportError::TimedOut) => Self::TimedOut,
			Error::Transport(inner) => Self::Transport(inner.to_string()),
			Error::Storage(inner) => Self::Storage(inner.to_string()),
			other => Self::Malformed(other.to_string()),
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot carry relative paths.
	#[error("Base URL `{url}` cannot be used as a base.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// A request path could not be joined onto the base URL.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A timeout must be strictly positive.
	#[error("The {field} timeout must be positive.")]
	NonPositiveTimeout {
		/// Which timeout failed validation.
		field: &'static str,
	},
	/// At least one status must be treated as credential expiry.
	#[error("At least one expiry status must be configured.")]
	NoExpiryStatuses,
	/// Expiry statuses must be 4xx codes.
	#[error("Expiry status {status} is not a client error status.")]
	InvalidExpiryStatus {
		/// Offending status.
		status: u16,
	},
	/// Grant pointer must be empty or start with `/`.
	#[error("Grant pointer `{pointer}` is not a JSON pointer.")]
	InvalidGrantPointer {
		/// Offending pointer.
		pointer: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The transport gave up waiting for the backend.
	#[error("Backend call timed out.")]
	TimedOut,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::TimedOut } else { Self::network(e) }
	}
}

//! Broker-level error taxonomy shared by the store, the token flows, and signature checks.
//!
//! Every variant maps onto an HTTP status through [`Error::status_code`] so a routing layer
//! can turn failures into the `{ "error", "statusCode" }` body produced by
//! [`Error::to_response`].

// self
use crate::{_prelude::*, auth::TenantId, obs};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error source shared between clones of the error that wraps it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Message shown to callers for errors that must not leak internals.
pub const GENERIC_ERROR_MESSAGE: &str =
	"Something went wrong. Try again or contact the app developer.";

/// Canonical broker error exposed by public APIs.
///
/// Errors are cheap to clone so one failed refresh can be handed to every caller that waited
/// on it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Request is missing or carries malformed required fields.
	#[error("Invalid request: {reason}.")]
	Validation {
		/// Human-readable reason.
		reason: String,
	},
	/// Inbound request failed signature or freshness checks.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// No credential is stored for the tenant.
	#[error("No credential is stored for tenant {tenant}.")]
	NotFound {
		/// Tenant that was looked up.
		tenant: TenantId,
	},
	/// The platform's token or identity endpoint failed.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
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
	/// Anything not covered by the other variants.
	#[error("Internal error: {message}.")]
	Internal {
		/// Human-readable error payload.
		message: String,
	},
}
impl Error {
	/// HTTP status a boundary layer should answer with.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Validation { .. } => 400,
			Self::Authentication(_) => 401,
			Self::NotFound { .. } => 404,
			Self::Upstream(err) => err.status_code(),
			Self::Storage(_) | Self::Config(_) | Self::Internal { .. } => 500,
		}
	}

	/// Logs the error and converts it into the body returned to callers.
	///
	/// Server-side failures are reported with a generic message; the original error is only
	/// written to the log.
	pub fn to_response(&self) -> ErrorResponse {
		let status_code = self.status_code();

		obs::record_boundary_error(self, status_code);

		let error =
			if status_code >= 500 { GENERIC_ERROR_MESSAGE.to_owned() } else { self.to_string() };

		ErrorResponse { error, status_code }
	}
}

/// JSON body returned by the boundary layer for failed requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
	/// Caller-facing message.
	pub error: String,
	/// HTTP status code mirrored into the body.
	pub status_code: u16,
}

/// Reasons an inbound signed request is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthenticationError {
	/// A required signature header was absent.
	#[error("Missing required header {header}.")]
	MissingHeader {
		/// Header name.
		header: &'static str,
	},
	/// The timestamp header is not an integer millisecond value.
	#[error("Request timestamp is malformed.")]
	MalformedTimestamp,
	/// The timestamp falls outside the replay window.
	#[error("Request timestamp is stale.")]
	Stale,
	/// The supplied signature does not match the request.
	#[error("Request signature is invalid.")]
	InvalidSignature,
}

/// Outbound call that produced an [`UpstreamError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpstreamCall {
	/// `POST /oauth/v1/token`.
	Token,
	/// `GET /account-info/v3/details`.
	Identity,
}
impl UpstreamCall {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			UpstreamCall::Token => "token",
			UpstreamCall::Identity => "identity",
		}
	}
}
impl Display for UpstreamCall {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error body returned by the platform, kept verbatim for callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorPayload {
	/// Message extracted from `message`, `error_description`, or `error`, when present.
	pub message: Option<String>,
	/// Parsed JSON body, or a string holding a preview of a non-JSON body.
	pub body: serde_json::Value,
}
impl ProviderErrorPayload {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Parses a raw response body.
	pub fn from_body(bytes: &[u8]) -> Self {
		match serde_json::from_slice::<serde_json::Value>(bytes) {
			Ok(body) => {
				let message = ["message", "error_description", "error"]
					.iter()
					.find_map(|key| body.get(*key).and_then(|value| value.as_str()))
					.map(str::to_owned);

				Self { message, body }
			},
			Err(_) => {
				let text = String::from_utf8_lossy(bytes);
				let preview = text.chars().take(Self::BODY_PREVIEW_LIMIT).collect::<String>();
				let message = if preview.is_empty() { None } else { Some(preview.clone()) };

				Self { message, body: serde_json::Value::String(preview) }
			},
		}
	}

	fn summary(&self) -> &str {
		self.message.as_deref().unwrap_or("no message")
	}
}

/// Failures of the platform's token or identity endpoints.
#[derive(Clone, Debug, ThisError)]
pub enum UpstreamError {
	/// Endpoint answered with a non-success status.
	#[error("Platform {call} endpoint returned HTTP {status}: {}.", .payload.summary())]
	Rejected {
		/// Endpoint that failed.
		call: UpstreamCall,
		/// HTTP status code.
		status: u16,
		/// Provider error body.
		payload: ProviderErrorPayload,
		/// Retry-After hint, when supplied.
		retry_after: Option<Duration>,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to the platform {call} endpoint timed out.")]
	Timeout {
		/// Endpoint that timed out.
		call: UpstreamCall,
	},
	/// Network failure (DNS, TCP, TLS).
	#[error("Network error occurred while calling the platform {call} endpoint.")]
	Network {
		/// Endpoint being called.
		call: UpstreamCall,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the platform endpoint.")]
	Io(#[source] Arc<std::io::Error>),
	/// Response body could not be parsed.
	#[error("Platform {call} endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Endpoint being called.
		call: UpstreamCall,
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Response parsed but violates the token contract.
	#[error("Platform token response is unusable: {reason}.")]
	InvalidTokenResponse {
		/// What was wrong with the response.
		reason: &'static str,
	},
}
impl UpstreamError {
	/// Wraps a transport-specific network error.
	pub fn network(
		call: UpstreamCall,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { call, source: Arc::new(src) }
	}

	/// Network failure described only by a message.
	pub fn network_message(call: UpstreamCall, message: impl Into<String>) -> Self {
		let message: String = message.into();
		let source: Box<dyn std::error::Error + Send + Sync> = message.into();

		Self::Network { call, source: source.into() }
	}

	/// Status a boundary layer should answer with; provider statuses pass through.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Rejected { status, .. } if *status >= 400 => *status,
			Self::Timeout { .. } => 504,
			_ => 502,
		}
	}

	/// Provider payload, when the platform answered with an error body.
	pub fn payload(&self) -> Option<&ProviderErrorPayload> {
		match self {
			Self::Rejected { payload, .. } => Some(payload),
			_ => None,
		}
	}
}

impl From<std::io::Error> for UpstreamError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(Arc<oauth2::http::Error>),
	/// A required setting was not supplied.
	#[error("Missing required setting {name}.")]
	MissingSetting {
		/// Setting (environment variable) name.
		name: &'static str,
	},
	/// A setting could not be parsed.
	#[error("Setting {name} is invalid: {reason}.")]
	InvalidSetting {
		/// Setting (environment variable) name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// A URL could not be parsed or joined.
	#[error("URL for {name} is invalid.")]
	InvalidUrl {
		/// Which URL failed.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Configured scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

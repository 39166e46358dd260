//! Validation of platform-signed inbound requests (v3 signature scheme).
//!
//! The platform signs `method ‖ url ‖ body ‖ timestamp` with HMAC-SHA256 keyed by the app's
//! client secret and sends the standard-base64 digest in `X-HubSpot-Signature-v3`, next to the
//! epoch-millisecond `X-HubSpot-Request-Timestamp`. Requests older than the replay window are
//! rejected before the signature is checked.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use oauth2::http::HeaderMap;
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, token::credential},
	error::AuthenticationError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 signature.
pub const SIGNATURE_HEADER: &str = "X-HubSpot-Signature-v3";
/// Header carrying the request timestamp in epoch milliseconds.
pub const TIMESTAMP_HEADER: &str = "X-HubSpot-Request-Timestamp";
/// Default replay window.
pub const DEFAULT_MAX_AGE: Duration = Duration::minutes(5);

/// Borrowed view of the parts of an inbound request that are covered by the signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedRequest<'a> {
	/// HTTP method as received.
	pub method: &'a str,
	/// Full request URL as the platform called it (scheme, host, path, query).
	pub url: &'a str,
	/// Raw body bytes, unmodified.
	pub body: &'a [u8],
	/// Value of [`TIMESTAMP_HEADER`].
	pub timestamp: &'a str,
	/// Value of [`SIGNATURE_HEADER`].
	pub signature: &'a str,
}
impl<'a> SignedRequest<'a> {
	/// Reads the signature and timestamp from `headers`.
	pub fn from_headers(
		method: &'a str,
		url: &'a str,
		body: &'a [u8],
		headers: &'a HeaderMap,
	) -> Result<Self, AuthenticationError> {
		let timestamp = header_value(headers, TIMESTAMP_HEADER)?;
		let signature = header_value(headers, SIGNATURE_HEADER)?;

		Ok(Self { method, url, body, timestamp, signature })
	}

	/// Bytes fed to the HMAC.
	///
	/// The body is left out for `GET` requests and empty bodies.
	pub fn canonical_bytes(&self) -> Vec<u8> {
		canonical_bytes(self.method, self.url, self.body, self.timestamp)
	}
}

/// Verifies inbound request signatures with the app's client secret.
#[derive(Clone)]
pub struct SignatureValidator {
	secret: TokenSecret,
	max_age: Duration,
}
impl SignatureValidator {
	/// Creates a validator keyed with `client_secret` and a five-minute replay window.
	pub fn new(client_secret: TokenSecret) -> Self {
		Self { secret: client_secret, max_age: DEFAULT_MAX_AGE }
	}

	/// Overrides the replay window.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age;

		self
	}

	/// Replay window in use.
	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	/// Validates `request` against the current clock.
	pub fn validate(&self, request: &SignedRequest<'_>) -> Result<()> {
		self.validate_at(request, OffsetDateTime::now_utc())
	}

	/// Validates `request` as of `now`.
	///
	/// Freshness is checked first, so a stale request is rejected even when its signature is
	/// valid. Timestamps ahead of `now` are accepted.
	pub fn validate_at(&self, request: &SignedRequest<'_>, now: OffsetDateTime) -> Result<()> {
		const KIND: FlowKind = FlowKind::Signature;

		let _span = FlowSpan::new(KIND, "validate").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = self.check(request, now);

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Produces the base64 signature the platform would send for the given request parts.
	pub fn sign(&self, method: &str, url: &str, body: &[u8], timestamp_ms: i64) -> Result<String> {
		let mut mac = self.mac()?;

		mac.update(&canonical_bytes(method, url, body, &timestamp_ms.to_string()));

		Ok(STANDARD.encode(mac.finalize().into_bytes()))
	}

	fn check(&self, request: &SignedRequest<'_>, now: OffsetDateTime) -> Result<()> {
		let timestamp_ms = request
			.timestamp
			.trim()
			.parse::<i64>()
			.map_err(|_| AuthenticationError::MalformedTimestamp)?;
		let age_ms = credential::to_millis(now).saturating_sub(timestamp_ms);

		if i128::from(age_ms) > self.max_age.whole_milliseconds() {
			return Err(AuthenticationError::Stale.into());
		}

		let supplied = STANDARD
			.decode(request.signature.trim())
			.map_err(|_| AuthenticationError::InvalidSignature)?;
		let mut mac = self.mac()?;

		mac.update(&request.canonical_bytes());
		mac.verify_slice(&supplied).map_err(|_| AuthenticationError::InvalidSignature)?;

		Ok(())
	}

	fn mac(&self) -> Result<HmacSha256> {
		HmacSha256::new_from_slice(self.secret.expose().as_bytes())
			.map_err(|e| Error::Internal { message: format!("HMAC key rejected: {e}") })
	}
}
impl Debug for SignatureValidator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignatureValidator")
			.field("secret", &self.secret)
			.field("max_age", &self.max_age)
			.finish()
	}
}

fn canonical_bytes(method: &str, url: &str, body: &[u8], timestamp: &str) -> Vec<u8> {
	let include_body = !body.is_empty() && !method.eq_ignore_ascii_case("GET");
	let mut bytes = Vec::with_capacity(
		method.len() + url.len() + timestamp.len() + if include_body { body.len() } else { 0 },
	);

	bytes.extend_from_slice(method.as_bytes());
	bytes.extend_from_slice(url.as_bytes());

	if include_body {
		bytes.extend_from_slice(body);
	}

	bytes.extend_from_slice(timestamp.as_bytes());

	bytes
}

fn header_value<'a>(
	headers: &'a HeaderMap,
	name: &'static str,
) -> Result<&'a str, AuthenticationError> {
	let value = headers.get(name).ok_or(AuthenticationError::MissingHeader { header: name })?;

	value.to_str().map_err(|_| match name {
		TIMESTAMP_HEADER => AuthenticationError::MalformedTimestamp,
		_ => AuthenticationError::InvalidSignature,
	})
}

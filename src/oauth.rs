//! Platform OAuth client facade: token-endpoint grants and account identity lookup.
//!
//! Requests are built by hand rather than through `oauth2`'s typed client because the
//! platform's error bodies do not follow RFC 6749 and must be surfaced verbatim. The
//! `oauth2` crate still supplies the HTTP request/response types shared with
//! [`TokenHttpClient`].

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenSecret},
	config::BrokerConfig,
	error::{ConfigError, ProviderErrorPayload, UpstreamCall, UpstreamError},
	http::{TokenHttpClient, parse_retry_after},
};

type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(&self, call: UpstreamCall, error: HttpClientError<E>) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, call: UpstreamCall, err: HttpClientError<ReqwestError>) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(call, *inner),
			other => map_generic_transport_error(call, other),
		}
	}
}

/// Proof presented to the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantProof {
	/// One-time code delivered to the redirect URI after consent.
	AuthorizationCode {
		/// Code received on the callback.
		code: String,
	},
	/// Stored refresh token of an existing tenant.
	RefreshToken {
		/// Current refresh token.
		refresh_token: TokenSecret,
	},
}
impl GrantProof {
	/// Wraps an authorization code.
	pub fn authorization_code(code: impl Into<String>) -> Self {
		Self::AuthorizationCode { code: code.into() }
	}

	/// Wraps a refresh token.
	pub fn refresh_token(refresh_token: TokenSecret) -> Self {
		Self::RefreshToken { refresh_token }
	}

	/// Value of the `grant_type` form field.
	pub const fn grant_type(&self) -> &'static str {
		match self {
			Self::AuthorizationCode { .. } => "authorization_code",
			Self::RefreshToken { .. } => "refresh_token",
		}
	}

	/// Encodes the form body sent to the token endpoint.
	///
	/// Client credentials and the redirect URI are included for both grant types.
	pub fn form_body(&self, config: &BrokerConfig) -> Result<String> {
		let mut form = FormSerializer::new(String::new());

		form.append_pair("grant_type", self.grant_type())
			.append_pair("client_id", &config.client_id)
			.append_pair("client_secret", config.client_secret.expose())
			.append_pair("redirect_uri", config.redirect_uri.as_str());

		match self {
			Self::AuthorizationCode { code } => {
				if code.trim().is_empty() {
					return Err(Error::Validation {
						reason: "authorization code is missing".into(),
					});
				}

				form.append_pair("code", code);
			},
			Self::RefreshToken { refresh_token } => {
				if refresh_token.is_empty() {
					return Err(Error::Validation { reason: "refresh token is missing".into() });
				}

				form.append_pair("refresh_token", refresh_token.expose());
			},
		}

		Ok(form.finish())
	}
}

/// Token set returned by a successful grant, after contract checks.
#[derive(Clone, Debug)]
pub struct IssuedTokens {
	/// New bearer token.
	pub access_token: TokenSecret,
	/// Replacement refresh token, when the platform rotated it.
	pub refresh_token: Option<TokenSecret>,
	/// Declared lifetime in seconds; always positive.
	pub expires_in: i64,
}

#[derive(Deserialize)]
struct TokenResponseBody {
	access_token: TokenSecret,
	#[serde(default)]
	refresh_token: Option<TokenSecret>,
	#[serde(default)]
	expires_in: Option<i64>,
}
impl TokenResponseBody {
	fn into_issued(self) -> Result<IssuedTokens, UpstreamError> {
		if self.access_token.is_empty() {
			return Err(UpstreamError::InvalidTokenResponse { reason: "access_token is empty" });
		}

		let expires_in = match self.expires_in {
			Some(secs) if secs > 0 => secs,
			Some(_) =>
				return Err(UpstreamError::InvalidTokenResponse {
					reason: "expires_in is not positive",
				}),
			None =>
				return Err(UpstreamError::InvalidTokenResponse {
					reason: "expires_in is missing",
				}),
		};
		let refresh_token = self.refresh_token.filter(|token| !token.is_empty());

		Ok(IssuedTokens { access_token: self.access_token, refresh_token, expires_in })
	}
}

#[derive(Deserialize)]
struct AccountDetailsBody {
	#[serde(rename = "portalId")]
	portal_id: PortalId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortalId {
	Number(u64),
	Text(String),
}
impl PortalId {
	fn into_tenant(self) -> Result<TenantId, UpstreamError> {
		match self {
			Self::Number(id) => Ok(TenantId::from(id)),
			Self::Text(raw) => TenantId::new(raw).map_err(|_| UpstreamError::InvalidTokenResponse {
				reason: "portalId is not a valid tenant identifier",
			}),
		}
	}
}

/// Executes platform calls over a [`TokenHttpClient`].
pub(crate) struct PlatformFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> PlatformFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(http_client: Arc<C>, error_mapper: Arc<M>) -> Self {
		Self { http_client, error_mapper }
	}

	/// `POST`s `proof` to the token endpoint and validates the response.
	pub(crate) fn request_tokens<'a>(
		&'a self,
		config: &'a BrokerConfig,
		proof: &'a GrantProof,
	) -> FacadeFuture<'a, IssuedTokens> {
		Box::pin(async move {
			let body = proof.form_body(config)?;
			let request = Request::builder()
				.method(Method::POST)
				.uri(config.endpoints.token.as_str())
				.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
				.header(ACCEPT, JSON_CONTENT_TYPE)
				.body(body.into_bytes())
				.map_err(ConfigError::from)?;
			let response = self.send(UpstreamCall::Token, request).await?;
			let parsed: TokenResponseBody = parse_json(UpstreamCall::Token, &response)?;

			Ok(parsed.into_issued()?)
		})
	}

	/// Resolves the account (tenant) an access token belongs to.
	pub(crate) fn fetch_account_id<'a>(
		&'a self,
		config: &'a BrokerConfig,
		access_token: &'a TokenSecret,
	) -> FacadeFuture<'a, TenantId> {
		Box::pin(async move {
			let request = Request::builder()
				.method(Method::GET)
				.uri(config.endpoints.identity.as_str())
				.header(AUTHORIZATION, format!("Bearer {}", access_token.expose()))
				.header(ACCEPT, JSON_CONTENT_TYPE)
				.body(Vec::new())
				.map_err(ConfigError::from)?;
			let response = self.send(UpstreamCall::Identity, request).await?;
			let parsed: AccountDetailsBody = parse_json(UpstreamCall::Identity, &response)?;

			Ok(parsed.portal_id.into_tenant()?)
		})
	}

	async fn send(&self, call: UpstreamCall, request: HttpRequest) -> Result<HttpResponse> {
		let handle = self.http_client.handle();
		let response = handle
			.call(request)
			.await
			.map_err(|err| self.error_mapper.map_transport_error(call, err))?;
		let status = response.status();

		if !status.is_success() {
			return Err(UpstreamError::Rejected {
				call,
				status: status.as_u16(),
				payload: ProviderErrorPayload::from_body(response.body()),
				retry_after: parse_retry_after(response.headers()),
			}
			.into());
		}

		Ok(response)
	}
}

fn parse_json<T>(call: UpstreamCall, response: &HttpResponse) -> Result<T, UpstreamError>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| UpstreamError::MalformedResponse { call, source: Arc::new(source) })
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(call: UpstreamCall, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return UpstreamError::Timeout { call }.into();
	}

	UpstreamError::network(call, err).into()
}

/// Classifies the transport-agnostic [`HttpClientError`] variants.
pub fn map_generic_transport_error<E>(call: UpstreamCall, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => UpstreamError::network(call, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => UpstreamError::from(inner).into(),
		HttpClientError::Other(message) => UpstreamError::network_message(call, message).into(),
		_ => UpstreamError::network_message(call, "unknown HTTP client failure").into(),
	}
}

//! Broker configuration: client credentials, scopes, redirect URI, and platform selection.
//!
//! Values are supplied externally, either through [`BrokerConfigBuilder`] or read from the
//! process environment with [`BrokerConfig::from_env`]. The configuration is passed
//! explicitly to the components that need it; nothing is kept in global state.

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
	provider::{PlatformEndpoints, PlatformEnvironment},
};

/// Port assumed by the default redirect URI.
pub const DEFAULT_PORT: u16 = 3000;
/// Outbound request timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Immutable settings shared by the broker and the signature validator.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; also keys inbound request signatures.
	pub client_secret: TokenSecret,
	/// Scopes requested on the consent page.
	pub scope: ScopeSet,
	/// Redirect URI registered with the platform.
	pub redirect_uri: Url,
	/// Platform deployment in use.
	pub environment: PlatformEnvironment,
	/// Endpoint URLs derived from `environment` unless overridden.
	pub endpoints: PlatformEndpoints,
	/// Upper bound applied to every outbound platform call.
	pub request_timeout: StdDuration,
}
impl BrokerConfig {
	/// Creates an empty builder.
	pub fn builder() -> BrokerConfigBuilder {
		BrokerConfigBuilder::default()
	}

	/// Reads `CLIENT_ID`, `CLIENT_SECRET`, `SCOPE`, `REDIRECT_URI`, `PORT`, `QA`, and
	/// `REQUEST_TIMEOUT_SECS` from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Same as [`from_env`](Self::from_env) with a caller-provided variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut builder = Self::builder()
			.environment(PlatformEnvironment::from_qa_flag(lookup("QA").as_deref()));

		if let Some(client_id) = lookup("CLIENT_ID") {
			builder = builder.client_id(client_id);
		}
		if let Some(client_secret) = lookup("CLIENT_SECRET") {
			builder = builder.client_secret(client_secret);
		}
		if let Some(raw) = lookup("SCOPE") {
			builder = builder.scope_list(raw);
		}

		let redirect_uri = match lookup("REDIRECT_URI").filter(|value| !value.is_empty()) {
			Some(raw) => Url::parse(&raw)
				.map_err(|source| ConfigError::InvalidUrl { name: "REDIRECT_URI", source })?,
			None => {
				let port = match lookup("PORT").filter(|value| !value.is_empty()) {
					Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidSetting {
						name: "PORT",
						reason: e.to_string(),
					})?,
					None => DEFAULT_PORT,
				};

				default_redirect_uri(port)?
			},
		};

		builder = builder.redirect_uri(redirect_uri);

		if let Some(raw) = lookup("REQUEST_TIMEOUT_SECS").filter(|value| !value.is_empty()) {
			let secs = raw.parse::<u64>().map_err(|e| ConfigError::InvalidSetting {
				name: "REQUEST_TIMEOUT_SECS",
				reason: e.to_string(),
			})?;

			builder = builder.request_timeout(StdDuration::from_secs(secs));
		}

		builder.build()
	}
}

/// Builder for [`BrokerConfig`].
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	scopes: Vec<String>,
	scope_list: Option<String>,
	redirect_uri: Option<Url>,
	environment: PlatformEnvironment,
	endpoints: Option<PlatformEndpoints>,
	request_timeout: Option<StdDuration>,
}
impl BrokerConfigBuilder {
	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Adds individual scopes.
	pub fn scope<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Adds scopes from a delimited list (see [`ScopeSet::parse_list`]).
	pub fn scope_list(mut self, raw: impl Into<String>) -> Self {
		self.scope_list = Some(raw.into());

		self
	}

	/// Sets the registered redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Selects the platform deployment.
	pub fn environment(mut self, environment: PlatformEnvironment) -> Self {
		self.environment = environment;

		self
	}

	/// Overrides the endpoints implied by the environment.
	pub fn endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
		self.endpoints = Some(endpoints);

		self
	}

	/// Sets the outbound request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		let client_id = self
			.client_id
			.filter(|value| !value.is_empty())
			.ok_or(ConfigError::MissingSetting { name: "CLIENT_ID" })?;
		let client_secret = self
			.client_secret
			.filter(|value| !value.is_empty())
			.ok_or(ConfigError::MissingSetting { name: "CLIENT_SECRET" })?;
		let mut scopes = self.scopes;

		if let Some(raw) = self.scope_list {
			scopes.extend(ScopeSet::parse_list(&raw)?.iter().map(str::to_owned));
		}

		let scope = ScopeSet::new(scopes)?;
		let redirect_uri = match self.redirect_uri {
			Some(url) => url,
			None => default_redirect_uri(DEFAULT_PORT)?,
		};
		let endpoints = match self.endpoints {
			Some(endpoints) => endpoints,
			None => PlatformEndpoints::for_environment(self.environment)?,
		};
		let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

		if request_timeout.is_zero() {
			return Err(ConfigError::InvalidSetting {
				name: "REQUEST_TIMEOUT_SECS",
				reason: "timeout must be positive".into(),
			});
		}

		Ok(BrokerConfig {
			client_id,
			client_secret,
			scope,
			redirect_uri,
			environment: self.environment,
			endpoints,
			request_timeout,
		})
	}
}

fn default_redirect_uri(port: u16) -> Result<Url, ConfigError> {
	Url::parse(&format!("http://localhost:{port}/oauth-callback"))
		.map_err(|source| ConfigError::InvalidUrl { name: "REDIRECT_URI", source })
}

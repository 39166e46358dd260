//! Validated platform URLs: token, identity, and authorize endpoints.

// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError, provider::PlatformEnvironment};

const TOKEN_PATH: &str = "oauth/v1/token";
const IDENTITY_PATH: &str = "account-info/v3/details";
const AUTHORIZE_PATH: &str = "oauth/authorize";

/// Validated URLs the broker calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEndpoints {
	/// `POST` target for authorization-code and refresh-token grants.
	pub token: Url,
	/// `GET` target resolving the account id behind an access token.
	pub identity: Url,
	/// Consent page users are sent to when installing the integration.
	pub authorization: Url,
}
impl PlatformEndpoints {
	/// Creates a new builder seeded with production base URLs.
	pub fn builder() -> PlatformEndpointsBuilder {
		PlatformEndpointsBuilder::default()
	}

	/// Endpoints of the given platform deployment.
	pub fn for_environment(environment: PlatformEnvironment) -> Result<Self, ConfigError> {
		Self::builder().environment(environment).build()
	}
}

/// Builder for [`PlatformEndpoints`].
///
/// Explicit base URLs win over the ones implied by the environment.
#[derive(Clone, Debug, Default)]
pub struct PlatformEndpointsBuilder {
	environment: PlatformEnvironment,
	api_base: Option<Url>,
	app_base: Option<Url>,
}
impl PlatformEndpointsBuilder {
	/// Selects the platform deployment.
	pub fn environment(mut self, environment: PlatformEnvironment) -> Self {
		self.environment = environment;

		self
	}

	/// Overrides the REST API base URL (token and identity endpoints).
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the web app base URL (consent page).
	pub fn app_base(mut self, url: Url) -> Self {
		self.app_base = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting endpoints.
	pub fn build(self) -> Result<PlatformEndpoints, ConfigError> {
		let api_base = match self.api_base {
			Some(url) => url,
			None => parse_base("api_base", self.environment.api_base())?,
		};
		let app_base = match self.app_base {
			Some(url) => url,
			None => parse_base("app_base", self.environment.app_base())?,
		};
		let endpoints = PlatformEndpoints {
			token: join("token", &api_base, TOKEN_PATH)?,
			identity: join("identity", &api_base, IDENTITY_PATH)?,
			authorization: join("authorization", &app_base, AUTHORIZE_PATH)?,
		};

		validate_endpoint("token", &endpoints.token)?;
		validate_endpoint("identity", &endpoints.identity)?;
		validate_endpoint("authorization", &endpoints.authorization)?;

		Ok(endpoints)
	}
}

fn parse_base(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn join(name: &'static str, base: &Url, path: &str) -> Result<Url, ConfigError> {
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let with_slash = format!("{}/", base.path());

		base.set_path(&with_slash);
	}

	base.join(path).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(url)) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

//! Token broker: authorization-code exchange, single-flight refresh, and install URLs.

pub mod authorize;
pub mod common;
pub mod exchange;
pub mod refresh;

pub use authorize::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::TenantId,
	config::BrokerConfig,
	http::TokenHttpClient,
	flows::common::RefreshGuard,
	oauth::{PlatformFacade, TransportErrorMapper},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Owns the credential lifecycle of every installed tenant.
///
/// The broker is the only writer of its [`CredentialStore`]. Cloning it shares the store,
/// the transport, and the per-tenant refresh guards, so clones can be handed to concurrent
/// request handlers.
#[derive(Clone)]
pub struct TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound platform request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Credential store the broker reads and upserts.
	pub store: Arc<dyn CredentialStore>,
	/// Client credentials, scopes, and endpoints.
	pub config: Arc<BrokerConfig>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_guards: Arc<Mutex<HashMap<TenantId, Arc<RefreshGuard>>>>,
}
impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	///
	/// The transport is expected to enforce its own request timeout.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		config: BrokerConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			config: Arc::new(config),
			refresh_metrics: Default::default(),
			refresh_guards: Default::default(),
		}
	}

	/// Number of tenants whose refresh guard is currently held or awaited.
	///
	/// Guards are dropped once their last caller leaves, so this stays bounded by the number
	/// of tenants being refreshed concurrently.
	pub fn tracked_refresh_guards(&self) -> usize {
		self.refresh_guards.lock().len()
	}

	pub(crate) fn facade(&self) -> PlatformFacade<C, M> {
		PlatformFacade::new(self.http_client.clone(), self.transport_mapper.clone())
	}
}
#[cfg(feature = "reqwest")]
impl TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport, bounded by
	/// [`BrokerConfig::request_timeout`] and configured not to follow redirects.
	pub fn new(store: Arc<dyn CredentialStore>, config: BrokerConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Ok(Self::with_http_client(store, config, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Debug for TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("config", &self.config)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

//! Cached access-token reads with single-flight refresh.
//!
//! [`TokenBroker::access_token`] serves the stored token while it is fresh. Once it is stale,
//! callers for the same tenant queue on one guard; the first performs the
//! `grant_type=refresh_token` exchange and the rest receive its outcome: the token it
//! persisted, or the error it failed with.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TenantCredential, TenantId, TokenSecret},
	flows::{
		TokenBroker,
		common::{self, RefreshGuard},
	},
	http::TokenHttpClient,
	oauth::{GrantProof, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a usable access token for `tenant`, refreshing it first when stale.
	pub async fn access_token(&self, tenant: &TenantId) -> Result<TokenSecret> {
		let current = common::load_credential(self, tenant).await?;

		if !current.is_stale_at(OffsetDateTime::now_utc()) {
			return Ok(self.serve_cached(current));
		}

		let guard = common::refresh_guard(self, tenant);
		let result = self.refresh_stale(tenant, &guard).await;

		common::release_guard(self, tenant, guard);

		result
	}

	/// Runs a refresh-token grant for a known tenant and stores the result.
	///
	/// The call is serialized with [`access_token`](Self::access_token) through the tenant's
	/// guard but always contacts the platform.
	pub async fn refresh(
		&self,
		tenant: &TenantId,
		refresh_token: TokenSecret,
	) -> Result<TokenSecret> {
		let guard = common::refresh_guard(self, tenant);
		let result = {
			let mut last_failure = guard.lock().await;
			let result = self.refresh_locked(tenant, refresh_token, "refresh").await;

			guard.finish(&mut last_failure, &result);

			result
		};

		common::release_guard(self, tenant, guard);

		result
	}

	/// Returns the stored credential for `tenant` without refreshing it.
	pub async fn credential(&self, tenant: &TenantId) -> Result<TenantCredential> {
		common::load_credential(self, tenant).await
	}

	async fn refresh_stale(&self, tenant: &TenantId, guard: &RefreshGuard) -> Result<TokenSecret> {
		let seen = guard.completed();
		let mut last_failure = guard.lock().await;

		// A refresh finished while this caller waited: share its failure instead of retrying.
		if let Some(err) = last_failure.as_ref().filter(|_| guard.completed() != seen) {
			return Err(err.clone());
		}

		let current = common::load_credential(self, tenant).await?;

		if !current.is_stale_at(OffsetDateTime::now_utc()) {
			return Ok(self.serve_cached(current));
		}

		let result = self.refresh_locked(tenant, current.refresh_token, "access_token").await;

		guard.finish(&mut last_failure, &result);

		result
	}

	fn serve_cached(&self, credential: TenantCredential) -> TokenSecret {
		self.refresh_metrics.record_cache_hit();
		obs::record_cache_hit();

		credential.access_token
	}

	async fn refresh_locked(
		&self,
		tenant: &TenantId,
		refresh_token: TokenSecret,
		stage: &'static str,
	) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::for_tenant(KIND, stage, tenant);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let proof = GrantProof::refresh_token(refresh_token);
		let result = span
			.instrument(async {
				let credential = self.exchange_and_store(Some(tenant.clone()), &proof).await?;

				Ok(credential.access_token)
			})
			.await;

		match &result {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		obs::record_flow_result(KIND, &result);

		result
	}
}

//! Token-endpoint exchange shared by first installs and refreshes.
//!
//! An exchange POSTs the grant proof, resolves the tenant (from the caller's hint or the
//! platform's identity endpoint), stores the credential with its safety-margined expiry, and
//! hands back the new access token. Nothing here retries.

// self
use crate::{
	_prelude::*,
	auth::{TenantCredential, TenantId, TokenSecret},
	error::UpstreamError,
	flows::TokenBroker,
	http::TokenHttpClient,
	oauth::{GrantProof, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges `proof` for tokens and upserts the tenant's credential.
	///
	/// Without a `tenant_hint` the tenant is resolved through the identity endpoint using the
	/// new access token. Refresh proofs passed here bypass the per-tenant guard; request
	/// handlers should prefer [`access_token`](Self::access_token) or
	/// [`refresh`](Self::refresh).
	pub async fn exchange(
		&self,
		tenant_hint: Option<TenantId>,
		proof: GrantProof,
	) -> Result<TokenSecret> {
		let kind = match proof {
			GrantProof::AuthorizationCode { .. } => FlowKind::Exchange,
			GrantProof::RefreshToken { .. } => FlowKind::Refresh,
		};
		let span = match &tenant_hint {
			Some(tenant) => FlowSpan::for_tenant(kind, "exchange", tenant),
			None => FlowSpan::new(kind, "exchange"),
		};

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let credential = self.exchange_and_store(tenant_hint, &proof).await?;

				Ok(credential.access_token)
			})
			.await;

		obs::record_flow_result(kind, &result);

		result
	}

	/// Completes a first install from the `code` delivered to the redirect URI.
	pub async fn exchange_code(&self, code: impl Into<String>) -> Result<TokenSecret> {
		self.exchange(None, GrantProof::authorization_code(code)).await
	}

	pub(crate) async fn exchange_and_store(
		&self,
		tenant_hint: Option<TenantId>,
		proof: &GrantProof,
	) -> Result<TenantCredential> {
		let facade = self.facade();
		let issued = facade.request_tokens(&self.config, proof).await?;
		let issued_at = OffsetDateTime::now_utc();
		let refresh_token = match (issued.refresh_token, proof) {
			(Some(rotated), _) => rotated,
			(None, GrantProof::RefreshToken { refresh_token }) => refresh_token.clone(),
			(None, GrantProof::AuthorizationCode { .. }) =>
				return Err(UpstreamError::InvalidTokenResponse {
					reason: "refresh_token is missing",
				}
				.into()),
		};
		let tenant = match tenant_hint {
			Some(tenant) => tenant,
			None => {
				let tenant = facade.fetch_account_id(&self.config, &issued.access_token).await?;

				obs::record_tenant(&tenant);

				tenant
			},
		};
		let credential = TenantCredential::from_grant(
			tenant,
			issued.access_token,
			refresh_token,
			issued_at,
			issued.expires_in,
		);

		self.store.upsert(credential.clone()).await?;

		#[cfg(feature = "tracing")]
		tracing::info!(
			tenant = %credential.tenant,
			grant_type = proof.grant_type(),
			expires_at = credential.expires_at_millis(),
			"Stored tenant credential."
		);

		Ok(credential)
	}
}

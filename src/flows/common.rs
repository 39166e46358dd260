//! Shared helpers for flow implementations (store reads, single-flight guards).

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use async_lock::MutexGuard as AsyncMutexGuard;
// self
use crate::{
	_prelude::*,
	auth::{TenantCredential, TenantId},
	flows::TokenBroker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

/// Per-tenant single-flight state.
///
/// Holding `last_failure` serializes refreshes for the tenant. `completed` counts finished
/// refreshes, so a caller that sampled it before queueing can tell whether a refresh ran while
/// it waited and, if that refresh failed, take its error instead of issuing another one.
#[derive(Debug, Default)]
pub(crate) struct RefreshGuard {
	completed: AtomicU64,
	last_failure: AsyncMutex<Option<Error>>,
}
impl RefreshGuard {
	/// Number of refreshes finished under this guard.
	pub(crate) fn completed(&self) -> u64 {
		self.completed.load(Ordering::Acquire)
	}

	/// Waits for the guard; the slot holds the failure of the last finished refresh.
	pub(crate) async fn lock(&self) -> AsyncMutexGuard<'_, Option<Error>> {
		self.last_failure.lock().await
	}

	/// Publishes the outcome of a refresh to callers queued behind it.
	pub(crate) fn finish<T>(&self, slot: &mut Option<Error>, result: &Result<T>) {
		*slot = result.as_ref().err().cloned();

		self.completed.fetch_add(1, Ordering::Release);
	}
}

/// Returns (and creates on demand) the single-flight guard for a tenant.
pub(crate) fn refresh_guard<C, M>(
	broker: &TokenBroker<C, M>,
	tenant: &TenantId,
) -> Arc<RefreshGuard>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	broker.refresh_guards.lock().entry(tenant.clone()).or_default().clone()
}

/// Drops the tenant's guard from the map once no other caller holds or awaits it.
pub(crate) fn release_guard<C, M>(
	broker: &TokenBroker<C, M>,
	tenant: &TenantId,
	guard: Arc<RefreshGuard>,
) where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = broker.refresh_guards.lock();

	// One reference lives in the map and one is `guard`; callers clone under this lock.
	if guards.get(tenant).is_some_and(|entry| Arc::ptr_eq(entry, &guard))
		&& Arc::strong_count(&guard) == 2
	{
		guards.remove(tenant);
	}
}

/// Reads the tenant's credential, mapping absence to [`Error::NotFound`].
pub(crate) async fn load_credential<C, M>(
	broker: &TokenBroker<C, M>,
	tenant: &TenantId,
) -> Result<TenantCredential>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	broker.store.fetch(tenant).await?.ok_or_else(|| Error::NotFound { tenant: tenant.clone() })
}

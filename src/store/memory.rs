//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TenantCredential, TenantId},
	store::{CredentialStore, StoreFuture},
};

type CredentialMap = Arc<RwLock<HashMap<TenantId, TenantCredential>>>;

/// Storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(CredentialMap);
impl MemoryStore {
	/// Number of tenants with a stored credential.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if no credential is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl CredentialStore for MemoryStore {
	fn fetch<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<TenantCredential>> {
		let found = self.0.read().get(tenant).cloned();

		Box::pin(async move { Ok(found) })
	}

	fn upsert(&self, credential: TenantCredential) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(credential.tenant.clone(), credential);

			Ok(())
		})
	}
}

//! Storage contracts and built-in store implementations for tenant credentials.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TenantCredential, TenantId},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable mapping from tenant to its current OAuth credential.
///
/// Implementations must tolerate concurrent callers. Two racing upserts for the same tenant
/// resolve last-write-wins; the broker's per-tenant refresh guard keeps that race from
/// happening on its own refresh path.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the credential stored for `tenant`, if any.
	fn fetch<'a>(&'a self, tenant: &'a TenantId) -> StoreFuture<'a, Option<TenantCredential>>;

	/// Inserts or replaces the credential keyed by `credential.tenant`.
	fn upsert(&self, credential: TenantCredential) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("database unreachable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}

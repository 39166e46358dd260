// std
use std::sync::Arc;
// crates.io
use time::macros;
// self
use tenant_oauth_broker::{
	auth::{TenantCredential, TenantId, TokenSecret},
	store::{CredentialStore, MemoryStore},
};

fn tenant(raw: &str) -> TenantId {
	TenantId::new(raw).expect("Tenant identifier should be valid.")
}

fn credential(tenant: &TenantId, access: &str, refresh: &str) -> TenantCredential {
	TenantCredential {
		tenant: tenant.clone(),
		access_token: TokenSecret::new(access),
		refresh_token: TokenSecret::new(refresh),
		expires_at: macros::datetime!(2025-01-01 00:30 UTC),
	}
}

#[tokio::test]
async fn upsert_then_fetch_returns_the_credential() {
	let store = MemoryStore::default();
	let tenant = tenant("123");

	store.upsert(credential(&tenant, "A1", "R1")).await.expect("Upsert should succeed.");

	let fetched = store
		.fetch(&tenant)
		.await
		.expect("Fetch should succeed.")
		.expect("Credential should be present.");

	assert_eq!(fetched.access_token.expose(), "A1");
	assert_eq!(fetched.refresh_token.expose(), "R1");
	assert_eq!(fetched.expires_at_millis(), 1_735_691_400_000);
	assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn upsert_replaces_the_previous_credential() {
	let store = MemoryStore::default();
	let tenant = tenant("123");

	store.upsert(credential(&tenant, "A1", "R1")).await.expect("First upsert should succeed.");
	store.upsert(credential(&tenant, "A2", "R2")).await.expect("Second upsert should succeed.");

	let fetched = store
		.fetch(&tenant)
		.await
		.expect("Fetch should succeed.")
		.expect("Credential should be present.");

	assert_eq!(fetched.access_token.expose(), "A2");
	assert_eq!(fetched.refresh_token.expose(), "R2");
	assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn unknown_tenant_fetches_nothing() {
	let store = MemoryStore::default();

	store.upsert(credential(&tenant("123"), "A1", "R1")).await.expect("Upsert should succeed.");

	assert!(store.fetch(&tenant("456")).await.expect("Fetch should succeed.").is_none());
}

#[tokio::test]
async fn concurrent_upserts_for_distinct_tenants_all_land() {
	let store = Arc::new(MemoryStore::default());
	let mut handles = Vec::new();

	for i in 0..16 {
		let store = store.clone();

		handles.push(tokio::spawn(async move {
			let tenant = tenant(&i.to_string());

			store
				.upsert(credential(&tenant, &format!("A{i}"), &format!("R{i}")))
				.await
				.expect("Concurrent upsert should succeed.");
		}));
	}
	for handle in handles {
		handle.await.expect("Upsert task should not panic.");
	}

	assert_eq!(store.len(), 16);

	let fetched = store
		.fetch(&tenant("7"))
		.await
		.expect("Fetch should succeed.")
		.expect("Credential should be present.");

	assert_eq!(fetched.access_token.expose(), "A7");
}

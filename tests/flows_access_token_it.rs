#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use tenant_oauth_broker::{
	_preludet::*,
	auth::{TenantCredential, TenantId, TokenSecret},
	error::UpstreamError,
	store::{CredentialStore, MemoryStore},
};

const TOKEN_PATH: &str = "/oauth/v1/token";

fn tenant(raw: &str) -> TenantId {
	TenantId::new(raw).expect("Tenant identifier should be valid.")
}

fn millis(instant: OffsetDateTime) -> i64 {
	(instant.unix_timestamp_nanos() / 1_000_000) as i64
}

async fn seed(
	store: &MemoryStore,
	tenant: &TenantId,
	access: &str,
	refresh: &str,
	expires_at: OffsetDateTime,
) {
	let credential = TenantCredential {
		tenant: tenant.clone(),
		access_token: TokenSecret::new(access),
		refresh_token: TokenSecret::new(refresh),
		expires_at,
	};

	store.upsert(credential).await.expect("Failed to seed credential into the store.");
}

#[tokio::test]
async fn fresh_credential_is_served_without_outbound_calls() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("123");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(500);
		})
		.await;

	seed(&store, &tenant, "A1", "R1", OffsetDateTime::now_utc() + Duration::minutes(10)).await;

	let token = broker.access_token(&tenant).await.expect("Fresh token should be returned.");

	assert_eq!(token.expose(), "A1");
	assert_eq!(broker.refresh_metrics.cache_hits(), 1);
	assert_eq!(broker.refresh_metrics.attempts(), 0);

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn stale_credential_is_refreshed_and_rotated() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("123");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "R1")
				.form_urlencoded_tuple("client_id", TEST_CLIENT_ID)
				.form_urlencoded_tuple("client_secret", TEST_CLIENT_SECRET)
				.form_urlencoded_tuple("redirect_uri", "http://localhost:3000/oauth-callback");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"A2\",\"refresh_token\":\"R2\",\"expires_in\":1800}");
		})
		.await;

	seed(&store, &tenant, "A1", "R1", OffsetDateTime::now_utc() - Duration::SECOND).await;

	let before = OffsetDateTime::now_utc();
	let token = broker.access_token(&tenant).await.expect("Stale token should be refreshed.");
	let after = OffsetDateTime::now_utc();

	assert_eq!(token.expose(), "A2");

	mock.assert_calls_async(1).await;

	let stored = broker.credential(&tenant).await.expect("Credential should remain stored.");

	assert_eq!(stored.access_token.expose(), "A2");
	assert_eq!(stored.refresh_token.expose(), "R2");
	assert!(stored.expires_at_millis() >= millis(before) + 1_620_000);
	assert!(stored.expires_at_millis() <= millis(after) + 1_620_000);
	assert_eq!(broker.refresh_metrics.attempts(), 1);
	assert_eq!(broker.refresh_metrics.successes(), 1);
}

#[tokio::test]
async fn refresh_without_rotation_keeps_previous_refresh_token() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("555");

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).form_urlencoded_tuple("refresh_token", "R1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"A2\",\"expires_in\":1800}");
		})
		.await;

	seed(&store, &tenant, "A1", "R1", OffsetDateTime::now_utc() - Duration::minutes(1)).await;

	let token = broker.access_token(&tenant).await.expect("Refresh should succeed.");
	let stored = broker.credential(&tenant).await.expect("Credential should remain stored.");

	assert_eq!(token.expose(), "A2");
	assert_eq!(stored.refresh_token.expose(), "R1");
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_reqwest_test_broker(&server.base_url());
	let err = broker
		.access_token(&tenant("404"))
		.await
		.expect_err("Unknown tenants must not resolve.");

	assert!(matches!(&err, Error::NotFound { tenant } if tenant.to_string() == "404"));
	assert_eq!(err.status_code(), 404);

	let err =
		broker.credential(&tenant("404")).await.expect_err("Unknown tenants must not resolve.");

	assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("777");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(200))
				.body("{\"access_token\":\"A-shared\",\"refresh_token\":\"R-shared\",\"expires_in\":3600}");
		})
		.await;

	seed(&store, &tenant, "A-old", "R-old", OffsetDateTime::now_utc() - Duration::SECOND).await;

	let (a, b, c, d, e) = tokio::join!(
		broker.access_token(&tenant),
		broker.access_token(&tenant),
		broker.access_token(&tenant),
		broker.access_token(&tenant),
		broker.access_token(&tenant),
	);

	for result in [a, b, c, d, e] {
		let token = result.expect("Every concurrent caller should receive a token.");

		assert_eq!(token.expose(), "A-shared");
	}

	mock.assert_calls_async(1).await;

	assert_eq!(broker.refresh_metrics.attempts(), 1);
	assert_eq!(broker.refresh_metrics.cache_hits(), 4);
	assert_eq!(broker.tracked_refresh_guards(), 0);
}

#[tokio::test]
async fn concurrent_callers_share_one_failed_refresh() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("778");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(100))
				.body("{\"status\":\"BAD_REFRESH_TOKEN\",\"message\":\"missing or unknown refresh token\"}");
		})
		.await;

	seed(&store, &tenant, "A-old", "R-old", OffsetDateTime::now_utc() - Duration::SECOND).await;

	let (a, b, c, d, e) = tokio::join!(
		broker.access_token(&tenant),
		broker.access_token(&tenant),
		broker.access_token(&tenant),
		broker.access_token(&tenant),
		broker.access_token(&tenant),
	);

	for result in [a, b, c, d, e] {
		let err = result.expect_err("Every concurrent caller should receive the refresh failure.");

		assert!(matches!(err, Error::Upstream(UpstreamError::Rejected { status: 400, .. })));
		assert_eq!(err.status_code(), 400);
	}

	mock.assert_calls_async(1).await;

	assert_eq!(broker.refresh_metrics.attempts(), 1);
	assert_eq!(broker.refresh_metrics.failures(), 1);
	assert_eq!(broker.tracked_refresh_guards(), 0);

	// Callers arriving after the failed refresh settled start a new one.
	broker.access_token(&tenant).await.expect_err("The platform still rejects the token.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn failed_refresh_leaves_the_credential_untouched() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("321");
	let expired_at = OffsetDateTime::now_utc() - Duration::SECOND;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400).header("content-type", "application/json").body(
				"{\"status\":\"BAD_REFRESH_TOKEN\",\"message\":\"missing or unknown refresh token\"}",
			);
		})
		.await;

	seed(&store, &tenant, "A1", "R1", expired_at).await;

	let err = broker.access_token(&tenant).await.expect_err("Rejected refresh should fail.");

	assert!(matches!(err, Error::Upstream(UpstreamError::Rejected { status: 400, .. })));

	let stored = broker.credential(&tenant).await.expect("Credential should remain stored.");

	assert_eq!(stored.access_token.expose(), "A1");
	assert_eq!(stored.refresh_token.expose(), "R1");
	assert_eq!(broker.refresh_metrics.failures(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn explicit_refresh_always_contacts_the_platform() {
	let server = MockServer::start_async().await;
	let (broker, store) = build_reqwest_test_broker(&server.base_url());
	let tenant = tenant("888");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).form_urlencoded_tuple("refresh_token", "R1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"A2\",\"refresh_token\":\"R2\",\"expires_in\":1800}");
		})
		.await;

	seed(&store, &tenant, "A1", "R1", OffsetDateTime::now_utc() + Duration::hours(1)).await;

	let token = broker
		.refresh(&tenant, TokenSecret::new("R1"))
		.await
		.expect("Explicit refresh should succeed.");

	assert_eq!(token.expose(), "A2");

	mock.assert_calls_async(1).await;
}

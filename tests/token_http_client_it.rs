#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use tenant_oauth_broker::{
	_preludet::*,
	auth::{TenantCredential, TenantId, TokenSecret},
	error::{UpstreamCall, UpstreamError},
	flows::TokenBroker,
	http::TokenHttpClient,
	oauth::{
		TransportErrorMapper, map_generic_transport_error,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{HeaderValue, StatusCode, header::RETRY_AFTER},
		},
	},
	store::{CredentialStore, MemoryStore},
};

#[derive(Debug)]
enum FakeTransportError {
	ConnectionReset,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ConnectionReset => write!(f, "Connection reset by peer."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy, Debug)]
enum FakeBehavior {
	Throttled { retry_after_secs: u32 },
	ConnectionReset,
}

#[derive(Clone, Default)]
struct FakeHttpClient {
	behavior: Option<FakeBehavior>,
	requests: Arc<Mutex<Vec<String>>>,
}
impl FakeHttpClient {
	fn new(behavior: FakeBehavior) -> Self {
		Self { behavior: Some(behavior), requests: Default::default() }
	}

	fn recorded_requests(&self) -> Vec<String> {
		self.requests.lock().clone()
	}
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn handle(&self) -> Self::Handle {
		FakeHttpHandle { behavior: self.behavior, requests: self.requests.clone() }
	}
}

struct FakeHttpHandle {
	behavior: Option<FakeBehavior>,
	requests: Arc<Mutex<Vec<String>>>,
}
impl<'c> AsyncHttpClient<'c> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		self.requests.lock().push(format!("{} {}", request.method(), request.uri().path()));

		let behavior = self.behavior;

		Box::pin(async move {
			match behavior {
				Some(FakeBehavior::Throttled { retry_after_secs }) => {
					let mut response = HttpResponse::new(
						b"{\"status\":\"error\",\"message\":\"You have reached your secondly limit.\"}"
							.to_vec(),
					);

					*response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
					response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));

					Ok(response)
				},
				Some(FakeBehavior::ConnectionReset) | None =>
					Err(HttpClientError::Reqwest(Box::new(FakeTransportError::ConnectionReset))),
			}
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	calls: Arc<Mutex<Vec<UpstreamCall>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_calls(&self) -> Vec<UpstreamCall> {
		self.calls.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		call: UpstreamCall,
		error: HttpClientError<FakeTransportError>,
	) -> Error {
		self.calls.lock().push(call);

		map_generic_transport_error(call, error)
	}
}

type FakeBroker = TokenBroker<FakeHttpClient, RecordingTransportErrorMapper>;

fn fake_broker(
	client: FakeHttpClient,
	mapper: RecordingTransportErrorMapper,
) -> (FakeBroker, Arc<MemoryStore>) {
	let store_backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn CredentialStore> = store_backend.clone();
	let broker = FakeBroker::with_http_client(
		store,
		test_config("https://api.example.test"),
		client,
		mapper,
	);

	(broker, store_backend)
}

async fn seed_stale(store: &MemoryStore, tenant: &TenantId) {
	let credential = TenantCredential {
		tenant: tenant.clone(),
		access_token: TokenSecret::new("A1"),
		refresh_token: TokenSecret::new("R1"),
		expires_at: OffsetDateTime::now_utc() - Duration::SECOND,
	};

	store.upsert(credential).await.expect("Failed to seed credential into the store.");
}

#[tokio::test]
async fn throttled_response_surfaces_retry_after() {
	let client = FakeHttpClient::new(FakeBehavior::Throttled { retry_after_secs: 30 });
	let mapper = RecordingTransportErrorMapper::default();
	let (broker, _store) = fake_broker(client.clone(), mapper.clone());
	let err = broker
		.exchange_code("code-throttled")
		.await
		.expect_err("Throttled exchanges should fail.");
	let Error::Upstream(UpstreamError::Rejected { call, status, retry_after, payload }) = &err
	else {
		panic!("Expected a rejected upstream error, got {err:?}.");
	};

	assert_eq!(*call, UpstreamCall::Token);
	assert_eq!(*status, 429);
	assert_eq!(*retry_after, Some(Duration::seconds(30)));
	assert_eq!(payload.message.as_deref(), Some("You have reached your secondly limit."));
	assert_eq!(err.status_code(), 429);
	assert_eq!(client.recorded_requests(), vec!["POST /oauth/v1/token".to_owned()]);
	assert!(
		mapper.recorded_calls().is_empty(),
		"HTTP responses must not be routed through the transport error mapper."
	);
}

#[tokio::test]
async fn transport_failures_flow_through_the_mapper() {
	let client = FakeHttpClient::new(FakeBehavior::ConnectionReset);
	let mapper = RecordingTransportErrorMapper::default();
	let (broker, store) = fake_broker(client, mapper.clone());
	let tenant = TenantId::new("42").expect("Tenant identifier should be valid.");

	seed_stale(&store, &tenant).await;

	let err = broker.access_token(&tenant).await.expect_err("Transport failures should surface.");

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::Network { call: UpstreamCall::Token, .. })
	));
	assert_eq!(err.status_code(), 502);
	assert_eq!(mapper.recorded_calls(), vec![UpstreamCall::Token]);
	assert_eq!(broker.refresh_metrics.failures(), 1);

	let stored = broker.credential(&tenant).await.expect("Credential should remain stored.");

	assert_eq!(stored.access_token.expose(), "A1");
}

#[tokio::test]
async fn reqwest_timeouts_map_to_gateway_timeout() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(1_500))
				.body("{\"access_token\":\"A1\",\"refresh_token\":\"R1\",\"expires_in\":1800}");
		})
		.await;
	let mut config = test_config(&server.base_url());

	config.request_timeout = StdDuration::from_millis(200);

	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let broker = TokenBroker::new(store, config).expect("Reqwest broker should build.");
	let err = broker.exchange_code("code-slow").await.expect_err("Slow exchanges should time out.");

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::Timeout { call: UpstreamCall::Token })
	));
	assert_eq!(err.status_code(), 504);

	mock.assert_calls_async(1).await;
}

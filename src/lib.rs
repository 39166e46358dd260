//! Per-tenant OAuth 2.0 credential broker for CRM platform integrations: single-flight token
//! refresh, durable credential stores, and HMAC validation of platform-signed requests.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod signature;
pub mod store;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers shared by unit tests, integration tests, and demos.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::BrokerConfig,
		flows::TokenBroker,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::PlatformEndpoints,
		store::{CredentialStore, MemoryStore},
	};

	/// Broker type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBroker = TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client id shared by the test fixtures.
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret shared by the test fixtures (also the signature key).
	pub const TEST_CLIENT_SECRET: &str = "secret-test";

	/// Builds a broker configuration whose API endpoints point at `api_base` (usually an
	/// `httpmock` server).
	pub fn test_config(api_base: &str) -> BrokerConfig {
		let api_base = Url::parse(api_base).expect("Mock API base URL should parse.");
		let endpoints = PlatformEndpoints::builder()
			.api_base(api_base)
			.build()
			.expect("Mock platform endpoints should be valid.");

		BrokerConfig::builder()
			.client_id(TEST_CLIENT_ID)
			.client_secret(TEST_CLIENT_SECRET)
			.scope(["crm.objects.contacts.read", "crm.objects.contacts.write"])
			.redirect_uri(
				Url::parse("http://localhost:3000/oauth-callback")
					.expect("Redirect URI fixture should parse."),
			)
			.endpoints(endpoints)
			.request_timeout(StdDuration::from_secs(5))
			.build()
			.expect("Test broker configuration should be valid.")
	}

	/// Constructs a [`TokenBroker`] backed by an in-memory store and the reqwest transport
	/// used across integration tests.
	pub fn build_reqwest_test_broker(api_base: &str) -> (ReqwestTestBroker, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let broker = TokenBroker::new(store, test_config(api_base))
			.expect("Reqwest-backed test broker should build.");

		(broker, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

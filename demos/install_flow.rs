//! Walks through the install handshake and the validation of a platform-signed webhook.
//!
//! Reads `CLIENT_ID`/`CLIENT_SECRET` (and the other broker settings) from the environment,
//! falling back to placeholder credentials so the demo runs without an app.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use time::OffsetDateTime;
// self
use tenant_oauth_broker::{
	config::BrokerConfig,
	flows::ReqwestBroker,
	signature::{SignatureValidator, SignedRequest},
	store::{CredentialStore, MemoryStore},
};

fn main() -> Result<()> {
	color_eyre::install()?;

	let config = match BrokerConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			eprintln!("Falling back to demo credentials: {e}");

			BrokerConfig::builder()
				.client_id("demo-client")
				.client_secret("demo-secret")
				.scope_list("crm.objects.contacts.read oauth")
				.build()?
		},
	};
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let broker = ReqwestBroker::new(store, config.clone())?;
	let session = broker.start_authorization();

	println!("Send the installing user to {}.", &session.authorize_url);

	// The redirect hands `state` back next to the authorization code.
	session.validate_state(&session.state)?;
	println!("State round-tripped; pass the code to TokenBroker::exchange_code.");

	let validator = SignatureValidator::new(config.client_secret.clone());
	let url = "https://broker.example.com/webhooks/contacts";
	let body = br#"[{"eventId":1,"subscriptionType":"contact.creation","objectId":42}]"#;
	let timestamp = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
	let signature = validator.sign("POST", url, body, timestamp)?;
	let timestamp = timestamp.to_string();
	let request = SignedRequest {
		method: "POST",
		url,
		body,
		timestamp: &timestamp,
		signature: &signature,
	};

	validator.validate(&request)?;
	println!("Webhook signature {signature} verified.");

	Ok(())
}

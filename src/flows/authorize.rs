//! Install (consent) URL construction.

// crates.io
use rand::{Rng, distr::Alphanumeric};
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	config::BrokerConfig,
	flows::TokenBroker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

const STATE_LEN: usize = 32;

/// Install handshake returned by [`TokenBroker::start_authorization`].
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Consent URL the installing user should be sent to.
	pub authorize_url: Url,
	/// Opaque value that must round-trip through the redirect.
	pub state: String,
}
impl AuthorizationSession {
	/// Validates the `state` query parameter received on the redirect.
	///
	/// The comparison runs in constant time for equal-length values.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if bool::from(returned_state.as_bytes().ct_eq(self.state.as_bytes())) {
			Ok(())
		} else {
			Err(Error::Validation { reason: "authorization state mismatch".into() })
		}
	}
}

impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Consent URL carrying `client_id`, `scope`, and `redirect_uri`.
	pub fn authorization_url(&self) -> Url {
		build_authorization_url(&self.config, None)
	}

	/// Consent URL plus a random `state` to check on the redirect.
	pub fn start_authorization(&self) -> AuthorizationSession {
		let state = random_state();
		let authorize_url = build_authorization_url(&self.config, Some(&state));

		AuthorizationSession { authorize_url, state }
	}
}

/// Builds the consent URL for `config`, appending `state` when given.
pub fn build_authorization_url(config: &BrokerConfig, state: Option<&str>) -> Url {
	let mut url = config.endpoints.authorization.clone();

	{
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("client_id", &config.client_id);

		if !config.scope.is_empty() {
			pairs.append_pair("scope", &config.scope.normalized());
		}

		pairs.append_pair("redirect_uri", config.redirect_uri.as_str());

		if let Some(state) = state {
			pairs.append_pair("state", state);
		}
	}

	url
}

fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> BrokerConfig {
		BrokerConfig::builder()
			.client_id("client-1")
			.client_secret("secret")
			.scope_list("crm.objects.contacts.write oauth")
			.build()
			.expect("Config fixture should build.")
	}

	#[test]
	fn authorization_url_carries_client_scope_and_redirect() {
		let url = build_authorization_url(&config(), None);
		let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

		assert_eq!(url.host_str(), Some("app.hubspot.com"));
		assert_eq!(url.path(), "/oauth/authorize");
		assert_eq!(pairs["client_id"], "client-1");
		assert_eq!(pairs["scope"], "crm.objects.contacts.write oauth");
		assert_eq!(pairs["redirect_uri"], "http://localhost:3000/oauth-callback");
		assert!(!pairs.contains_key("state"));
	}

	#[test]
	fn state_is_random_and_validated() {
		let a = random_state();
		let b = random_state();

		assert_eq!(a.len(), STATE_LEN);
		assert_ne!(a, b);

		let session = AuthorizationSession {
			authorize_url: build_authorization_url(&config(), Some(&a)),
			state: a.clone(),
		};

		assert!(session.authorize_url.as_str().contains(&format!("state={a}")));
		assert!(session.validate_state(&a).is_ok());
		assert!(matches!(session.validate_state(&b), Err(Error::Validation { .. })));
		assert!(matches!(
			session.validate_state(&a[..STATE_LEN - 1]),
			Err(Error::Validation { .. })
		));
		assert!(matches!(session.validate_state(""), Err(Error::Validation { .. })));
	}
}

//! Authorization initiator: PKCE + state issuance and authorization URL construction.

// self
use crate::{
	_prelude::*,
	client,
	flows::{SignIn, pkce::{self, PkcePair}},
	http::ProviderHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::AuthorizationSession,
};

impl<C> SignIn<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Starts a sign-in attempt and returns the provider authorization URL.
	///
	/// Fails only for configuration problems: an unknown provider, missing client
	/// credentials, or an unavailable session store. Credentials are resolved before the
	/// session is stored, so a failed call leaves nothing behind.
	pub async fn begin(&self, provider: &str, redirect_uri: &Url) -> Result<Url> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "begin");

		span.record_provider(provider);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let provider = self.registry.resolve(provider)?;
				let credentials = self.client.credentials(&provider).await?;
				let pkce = PkcePair::generate();
				let state = pkce::generate_state();
				let url = client::build_authorization_url(
					&provider,
					&credentials.client_id,
					redirect_uri,
					&state,
					&pkce.challenge,
				);
				let session = AuthorizationSession::new(
					state,
					provider.id().clone(),
					pkce.verifier,
					redirect_uri.clone(),
					self.session_ttl,
				);

				self.store.store(session, self.session_ttl).await?;

				tracing::debug!("Authorization session issued.");

				Ok(url)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				tracing::error!(error = %e, "Sign-in could not be started.");
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::SecretRef,
		error::ConfigError,
		flows::compute_pkce_challenge,
		provider::{ProviderRegistry, presets},
		secret::StaticSecretStore,
		session::{SessionStore, StoreError},
	};

	fn registry() -> ProviderRegistry {
		ProviderRegistry::default()
			.with(
				presets::google(SecretRef::new("google").expect("Secret ref should be valid."))
					.expect("Google preset should build."),
			)
			.expect("Google should register.")
	}

	fn redirect() -> Url {
		Url::parse("https://app/cb").expect("Redirect fixture should parse.")
	}

	#[tokio::test]
	async fn begin_stores_a_session_matching_the_url() {
		let (sign_in, store) = build_reqwest_test_sign_in(
			registry(),
			test_secret_store("google", "google-client", "google-secret"),
			Arc::new(RecordingLoginStep::default()),
		);
		let url = sign_in.begin("google", &redirect()).await.expect("Begin should succeed.");
		let pairs = url.query_pairs().into_owned().collect::<HashMap<_, _>>();
		let state = pairs.get("state").expect("URL should carry a state.");
		let session = store
			.find(state)
			.await
			.expect("Find should succeed.")
			.expect("Session should be stored under the URL state.");

		assert!(url.as_str().contains("scope=openid%20email%20profile"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("google-client"));
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some("https://app/cb"));
		assert_eq!(pairs.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(
			pairs.get("code_challenge"),
			Some(&compute_pkce_challenge(session.code_verifier.expose()))
		);
		assert_eq!(session.provider.as_ref(), "google");
		assert_eq!(session.redirect_uri, redirect());
	}

	#[tokio::test]
	async fn unknown_provider_is_a_configuration_error() {
		let (sign_in, store) = build_reqwest_test_sign_in(
			registry(),
			test_secret_store("google", "id", "secret"),
			Arc::new(RecordingLoginStep::default()),
		);
		let err = sign_in.begin("myspace", &redirect()).await.expect_err("Begin must fail.");

		assert!(matches!(err, Error::Config(ConfigError::UnknownProvider { .. })));
		assert!(store.inner.is_empty());
	}

	#[tokio::test]
	async fn out_of_range_ttl_fails_without_panicking() {
		let (sign_in, store) = build_reqwest_test_sign_in(
			registry(),
			test_secret_store("google", "id", "secret"),
			Arc::new(RecordingLoginStep::default()),
		);
		let err = sign_in
			.with_session_ttl(Duration::MAX)
			.begin("google", &redirect())
			.await
			.expect_err("Begin must fail.");

		assert!(matches!(err, Error::Storage(StoreError::Backend { .. })));
		assert!(store.inner.is_empty());
	}

	#[tokio::test]
	async fn missing_credentials_leave_no_session_behind() {
		let (sign_in, store) = build_reqwest_test_sign_in(
			registry(),
			Arc::new(StaticSecretStore::default()),
			Arc::new(RecordingLoginStep::default()),
		);
		let err = sign_in.begin("google", &redirect()).await.expect_err("Begin must fail.");

		assert!(matches!(err, Error::Secret(_)));
		assert!(store.inner.is_empty());
	}
}

//! Sign-in flows: the authorization initiator and the callback state machine.

pub mod callback;
pub mod initiate;
pub mod login;

mod pkce;

pub use callback::*;
pub use login::*;
pub use pkce::{CODE_CHALLENGE_METHOD, compute_pkce_challenge};

// self
use crate::{
	_prelude::*,
	client::OidcClient,
	http::ProviderHttpClient,
	provider::ProviderRegistry,
	secret::SecretStore,
	session::{DEFAULT_SESSION_TTL, SessionStore},
};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	http::{DEFAULT_HTTP_TIMEOUT, ReqwestHttpClient},
};

/// Sign-in facade specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestSignIn = SignIn<ReqwestHttpClient>;

/// Coordinates sign-in attempts across every registered provider.
///
/// The facade owns the provider registry, the session store, the transport client, and the
/// login step so `begin` and `complete` only carry per-request data.
pub struct SignIn<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Providers that can be chosen by `begin`.
	pub registry: Arc<ProviderRegistry>,
	/// Shared authorization session store.
	pub store: Arc<dyn SessionStore>,
	/// Transport client used for provider calls.
	pub client: OidcClient<C>,
	/// External login/provisioning step.
	pub login: Arc<dyn LoginStep>,
	session_ttl: Duration,
}
impl<C> SignIn<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Creates a facade that reuses the caller-provided transport.
	pub fn with_http_client(
		registry: impl Into<Arc<ProviderRegistry>>,
		store: Arc<dyn SessionStore>,
		secrets: Arc<dyn SecretStore>,
		login: Arc<dyn LoginStep>,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			registry: registry.into(),
			store,
			client: OidcClient::new(http_client, secrets),
			login,
			session_ttl: DEFAULT_SESSION_TTL,
		}
	}

	/// Overrides the session lifetime (10 minutes by default).
	pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
		self.session_ttl = ttl;

		self
	}

	/// Lifetime given to new authorization sessions.
	pub fn session_ttl(&self) -> Duration {
		self.session_ttl
	}
}
#[cfg(feature = "reqwest")]
impl SignIn<ReqwestHttpClient> {
	/// Creates a facade with its own reqwest transport (10 second timeout, no redirects).
	pub fn new(
		registry: impl Into<Arc<ProviderRegistry>>,
		store: Arc<dyn SessionStore>,
		secrets: Arc<dyn SecretStore>,
		login: Arc<dyn LoginStep>,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			registry,
			store,
			secrets,
			login,
			ReqwestHttpClient::new(DEFAULT_HTTP_TIMEOUT)?,
		))
	}
}
impl<C> Clone for SignIn<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			registry: self.registry.clone(),
			store: self.store.clone(),
			client: self.client.clone(),
			login: self.login.clone(),
			session_ttl: self.session_ttl,
		}
	}
}
impl<C> Debug for SignIn<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignIn")
			.field("providers", &self.registry.ids())
			.field("session_ttl", &self.session_ttl)
			.finish()
	}
}

//! TOML configuration for the sign-in core.
//!
//! ```toml
//! [session]
//! ttl_secs = 600
//!
//! [http]
//! timeout_secs = 10
//!
//! [redirect]
//! callback = "https://resume.example/auth/oidc/callback"
//! success  = "https://resume.example/"
//! failure  = "https://resume.example/login"
//!
//! [[providers]]
//! preset = "google"
//!
//! [[providers]]
//! id                     = "corp"
//! authorization_endpoint = "https://id.corp.example/authorize"
//! token_endpoint         = "https://id.corp.example/token"
//! userinfo_endpoint      = "https://id.corp.example/userinfo"
//! scopes                 = ["openid", "email"]
//!
//! [secrets.google]
//! client_id     = "..."
//! client_secret = "..."
//! ```

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeList, SecretRef},
	error::ConfigError,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, Preset, ProviderDescriptor, ProviderQuirks,
		ProviderRegistry, RegisteredProvider,
	},
	secret::{
		ClientCredentials, EnvSecretStore, LayeredSecretStore, SecretStore, StaticSecretStore,
	},
};
#[cfg(feature = "reqwest")]
use crate::{
	flows::{LoginStep, ReqwestSignIn, SignIn},
	http::ReqwestHttpClient,
	session::SessionStore,
};

/// Longest accepted `session.ttl_secs`.
pub const MAX_SESSION_TTL_SECS: u64 = 86_400;

const DEFAULT_GENERIC_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Root configuration document.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInConfig {
	/// Authorization session settings.
	#[serde(default)]
	pub session: SessionSettings,
	/// Provider transport settings.
	#[serde(default)]
	pub http: HttpSettings,
	/// Browser-facing redirect targets.
	pub redirect: RedirectSettings,
	/// Enabled identity providers.
	#[serde(default)]
	pub providers: Vec<ProviderConfig>,
	/// Static client credentials keyed by secret reference.
	#[serde(default)]
	pub secrets: BTreeMap<String, ClientCredentials>,
	/// Prefix for credential environment variables (see [`EnvSecretStore`]).
	#[serde(default)]
	pub env_prefix: String,
}
impl SignInConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Reads, parses, and validates a TOML file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

		Self::from_toml_str(&raw)
	}

	/// Session lifetime.
	pub fn session_ttl(&self) -> Duration {
		i64::try_from(self.session.ttl_secs).map_or(Duration::MAX, Duration::seconds)
	}

	/// Per-request timeout for provider calls.
	pub fn http_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.http.timeout_secs)
	}

	/// Builds the provider registry from every `[[providers]]` entry.
	pub fn registry(&self) -> Result<ProviderRegistry, ConfigError> {
		let mut registry = ProviderRegistry::default();

		for provider in &self.providers {
			registry.register(provider.build()?)?;
		}

		Ok(registry)
	}

	/// Credentials from `[secrets.*]`, falling back to environment variables.
	pub fn secret_store(&self) -> Arc<dyn SecretStore> {
		let configured = self.secrets.iter().fold(StaticSecretStore::default(), |store, (k, v)| {
			store.with_credentials(k.clone(), v.clone())
		});

		Arc::new(
			LayeredSecretStore::default()
				.push(Arc::new(configured))
				.push(Arc::new(EnvSecretStore::with_prefix(self.env_prefix.clone()))),
		)
	}

	/// Reqwest transport honoring `http.timeout_secs`.
	#[cfg(feature = "reqwest")]
	pub fn http_client(&self) -> Result<ReqwestHttpClient, ConfigError> {
		ReqwestHttpClient::new(self.http_timeout())
	}

	/// Wires a complete sign-in facade from this configuration.
	#[cfg(feature = "reqwest")]
	pub fn sign_in(
		&self,
		store: Arc<dyn SessionStore>,
		login: Arc<dyn LoginStep>,
	) -> Result<ReqwestSignIn, ConfigError> {
		Ok(SignIn::with_http_client(
			self.registry()?,
			store,
			self.secret_store(),
			login,
			self.http_client()?,
		)
		.with_session_ttl(self.session_ttl()))
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.session.ttl_secs == 0 {
			return Err(ConfigError::InvalidSetting {
				setting: "session.ttl_secs",
				reason: "must be greater than zero",
			});
		}
		if self.http.timeout_secs == 0 {
			return Err(ConfigError::InvalidSetting {
				setting: "http.timeout_secs",
				reason: "must be greater than zero",
			});
		}
		if self.session.ttl_secs > MAX_SESSION_TTL_SECS {
			return Err(ConfigError::InvalidSetting {
				setting: "session.ttl_secs",
				reason: "must not exceed one day",
			});
		}

		Ok(())
	}
}

/// `[session]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
	/// Seconds an authorization session stays usable.
	pub ttl_secs: u64,
}
impl Default for SessionSettings {
	fn default() -> Self {
		Self { ttl_secs: 600 }
	}
}

/// `[http]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
	/// Per-request timeout for token and user-info calls.
	pub timeout_secs: u64,
}
impl Default for HttpSettings {
	fn default() -> Self {
		Self { timeout_secs: 10 }
	}
}

/// `[redirect]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectSettings {
	/// Redirect URI registered with every provider.
	pub callback: Url,
	/// Where the browser lands after a successful sign-in.
	pub success: Url,
	/// Where the browser lands after a failed sign-in; a `message` query is appended.
	pub failure: Url,
}
impl RedirectSettings {
	/// Parses the three redirect targets.
	pub fn new(callback: &str, success: &str, failure: &str) -> Result<Self, ConfigError> {
		let parse =
			|raw: &str| Url::parse(raw).map_err(|source| ConfigError::InvalidRedirect { source });

		Ok(Self { callback: parse(callback)?, success: parse(success)?, failure: parse(failure)? })
	}
}

/// One `[[providers]]` entry: a preset or a generic OpenID Connect provider.
///
/// Presets honor only `id` and `secret_ref`. Generic entries need `id` and the three endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
	/// Built-in provider to use.
	pub preset: Option<Preset>,
	/// Identifier used in `?provider=`; defaults to the preset name.
	pub id: Option<ProviderId>,
	/// Credential reference; defaults to the provider identifier.
	pub secret_ref: Option<SecretRef>,
	/// Authorization endpoint of a generic provider.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint of a generic provider.
	pub token_endpoint: Option<Url>,
	/// User-info endpoint of a generic provider.
	pub userinfo_endpoint: Option<Url>,
	/// Scopes of a generic provider; defaults to `openid email profile`.
	pub scopes: Option<ScopeList>,
	/// Token endpoint client authentication of a generic provider.
	pub client_auth: Option<ClientAuthMethod>,
	/// Scope delimiter of a generic provider.
	pub scope_delimiter: Option<char>,
	/// Static authorization URL parameters of a generic provider.
	pub extra_authorization_params: BTreeMap<String, String>,
	/// Static token request fields of a generic provider.
	pub extra_token_params: BTreeMap<String, String>,
}
impl ProviderConfig {
	/// Builds the registered provider described by this entry.
	pub fn build(&self) -> Result<RegisteredProvider, ConfigError> {
		match self.preset {
			Some(preset) => self.build_preset(preset),
			None => self.build_generic(),
		}
	}

	fn build_preset(&self, preset: Preset) -> Result<RegisteredProvider, ConfigError> {
		if self.has_generic_fields() {
			return Err(ConfigError::InvalidProvider {
				provider: preset.to_string(),
				reason: "presets accept only `id` and `secret_ref`",
			});
		}

		let id = match &self.id {
			Some(id) => id.clone(),
			None => ProviderId::new(preset.default_id())?,
		};
		let secret_ref = self.secret_ref_or(&id)?;

		preset.provider(id, secret_ref)
	}

	fn build_generic(&self) -> Result<RegisteredProvider, ConfigError> {
		let Some(id) = self.id.clone() else {
			return Err(ConfigError::InvalidProvider {
				provider: "<unnamed>".into(),
				reason: "generic providers need an `id`",
			});
		};
		let secret_ref = self.secret_ref_or(&id)?;
		let scope = match &self.scopes {
			Some(scopes) => scopes.clone(),
			None => ScopeList::new(DEFAULT_GENERIC_SCOPES)?,
		};
		let mut builder = ProviderDescriptor::builder(id)
			.scope(scope)
			.secret_ref(secret_ref)
			.client_auth(self.client_auth.unwrap_or_default());

		if let Some(url) = &self.authorization_endpoint {
			builder = builder.authorization_endpoint(url.clone());
		}
		if let Some(url) = &self.token_endpoint {
			builder = builder.token_endpoint(url.clone());
		}
		if let Some(url) = &self.userinfo_endpoint {
			builder = builder.userinfo_endpoint(url.clone());
		}
		if let Some(delimiter) = self.scope_delimiter {
			builder = builder.quirks(ProviderQuirks { scope_delimiter: delimiter });
		}

		let strategy = DefaultProviderStrategy {
			authorization_params: self.extra_authorization_params.clone(),
			token_params: self.extra_token_params.clone(),
		};

		Ok(RegisteredProvider::new(builder.build()?, Arc::new(strategy)))
	}

	fn secret_ref_or(&self, id: &ProviderId) -> Result<SecretRef, ConfigError> {
		match &self.secret_ref {
			Some(secret_ref) => Ok(secret_ref.clone()),
			None => Ok(SecretRef::new(id.as_ref())?),
		}
	}

	fn has_generic_fields(&self) -> bool {
		self.authorization_endpoint.is_some()
			|| self.token_endpoint.is_some()
			|| self.userinfo_endpoint.is_some()
			|| self.scopes.is_some()
			|| self.client_auth.is_some()
			|| self.scope_delimiter.is_some()
			|| !self.extra_authorization_params.is_empty()
			|| !self.extra_token_params.is_empty()
	}
}

//! Built-in descriptors and strategies for the identity providers the resume service ships with.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{NormalizedUserInfo, ProviderId, ScopeList, SecretRef},
	error::ConfigError,
	provider::{
		ProviderDescriptor, ProviderStrategy, RegisteredProvider, UserInfoError, as_object,
		claim_string, required_claim,
	},
};

/// Identity providers with built-in descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
	/// Google accounts (OpenID Connect).
	Google,
	/// GitHub OAuth apps.
	Github,
}
impl Preset {
	/// Identifier used when configuration does not override it.
	pub const fn default_id(self) -> &'static str {
		match self {
			Preset::Google => "google",
			Preset::Github => "github",
		}
	}

	/// Builds the registered provider under `id`, reading credentials through `secret_ref`.
	pub fn provider(
		self,
		id: ProviderId,
		secret_ref: SecretRef,
	) -> Result<RegisteredProvider, ConfigError> {
		match self {
			Preset::Google => {
				let descriptor = ProviderDescriptor::builder(id)
					.authorization_endpoint(endpoint(
						"https://accounts.google.com/o/oauth2/v2/auth",
					)?)
					.token_endpoint(endpoint("https://oauth2.googleapis.com/token")?)
					.userinfo_endpoint(endpoint(
						"https://openidconnect.googleapis.com/v1/userinfo",
					)?)
					.scope(scopes(["openid", "email", "profile"])?)
					.secret_ref(secret_ref)
					.build()?;

				Ok(RegisteredProvider::new(descriptor, Arc::new(GoogleStrategy)))
			},
			Preset::Github => {
				let descriptor = ProviderDescriptor::builder(id)
					.authorization_endpoint(endpoint("https://github.com/login/oauth/authorize")?)
					.token_endpoint(endpoint("https://github.com/login/oauth/access_token")?)
					.userinfo_endpoint(endpoint("https://api.github.com/user")?)
					.scope(scopes(["read:user", "user:email"])?)
					.secret_ref(secret_ref)
					.build()?;

				Ok(RegisteredProvider::new(descriptor, Arc::new(GithubStrategy)))
			},
		}
	}
}
impl Display for Preset {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.default_id())
	}
}

/// Google preset registered under `google`.
pub fn google(secret_ref: SecretRef) -> Result<RegisteredProvider, ConfigError> {
	Preset::Google.provider(ProviderId::new(Preset::Google.default_id())?, secret_ref)
}

/// GitHub preset registered under `github`.
pub fn github(secret_ref: SecretRef) -> Result<RegisteredProvider, ConfigError> {
	Preset::Github.provider(ProviderId::new(Preset::Github.default_id())?, secret_ref)
}

/// Google: account chooser on every sign-in, unverified emails are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoogleStrategy;
impl ProviderStrategy for GoogleStrategy {
	fn augment_authorization_params(&self, params: &mut BTreeMap<String, String>) {
		params.insert("prompt".into(), "select_account".into());
	}

	fn normalize_user_info(
		&self,
		provider: &ProviderId,
		payload: &Value,
	) -> Result<NormalizedUserInfo, UserInfoError> {
		let claims = as_object(payload)?;
		let provider_user_id = required_claim(claims, "sub")?;
		let verified = claims.get("email_verified").and_then(Value::as_bool).unwrap_or(true);
		let email = claim_string(claims, "email").filter(|_| verified);
		let username = claim_string(claims, "name")
			.or_else(|| email.clone())
			.unwrap_or_else(|| provider_user_id.clone());

		Ok(NormalizedUserInfo { provider: provider.clone(), provider_user_id, email, username })
	}
}

/// GitHub: no sign-up prompt, REST API headers on the user request, numeric `id` claim.
#[derive(Clone, Copy, Debug, Default)]
pub struct GithubStrategy;
impl GithubStrategy {
	const API_VERSION: &'static str = "2022-11-28";
	const USER_AGENT: &'static str = concat!("resume-oidc/", env!("CARGO_PKG_VERSION"));
}
impl ProviderStrategy for GithubStrategy {
	fn augment_authorization_params(&self, params: &mut BTreeMap<String, String>) {
		params.insert("allow_signup".into(), "false".into());
	}

	fn augment_userinfo_headers(&self, headers: &mut BTreeMap<String, String>) {
		headers.insert("accept".into(), "application/vnd.github+json".into());
		headers.insert("user-agent".into(), Self::USER_AGENT.into());
		headers.insert("x-github-api-version".into(), Self::API_VERSION.into());
	}

	fn normalize_user_info(
		&self,
		provider: &ProviderId,
		payload: &Value,
	) -> Result<NormalizedUserInfo, UserInfoError> {
		let claims = as_object(payload)?;
		let provider_user_id = required_claim(claims, "id")?;
		let username = required_claim(claims, "login")?;
		let email = claim_string(claims, "email");

		Ok(NormalizedUserInfo { provider: provider.clone(), provider_user_id, email, username })
	}
}

fn endpoint(raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { source })
}

fn scopes<const N: usize>(values: [&str; N]) -> Result<ScopeList, ConfigError> {
	Ok(ScopeList::new(values)?)
}

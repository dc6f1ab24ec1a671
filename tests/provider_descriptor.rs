#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use serde_json::json;
// self
use resume_oidc::{
	_preludet::*,
	auth::{ScopeList, SecretRef},
	config::{ProviderConfig, SignInConfig},
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, Preset, ProviderDescriptor,
		ProviderDescriptorBuilder, ProviderDescriptorError, ProviderQuirks, ProviderStrategy,
		RESERVED_AUTHORIZATION_PARAMS,
	},
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse provider URL fixture.")
}

fn builder(id: &str) -> ProviderDescriptorBuilder {
	ProviderDescriptor::builder(provider_id(id))
		.secret_ref(SecretRef::new(id).expect("Secret ref fixture should be valid."))
}

#[test]
fn descriptor_requires_every_endpoint_over_https() {
	let err = builder("partial")
		.authorization_endpoint(url("https://idp.test/auth"))
		.token_endpoint(url("https://idp.test/token"))
		.build()
		.expect_err("A missing user-info endpoint must be rejected.");

	assert_eq!(err, ProviderDescriptorError::MissingUserinfoEndpoint);

	let err = builder("insecure")
		.authorization_endpoint(url("https://idp.test/auth"))
		.token_endpoint(url("http://idp.test/token"))
		.userinfo_endpoint(url("https://idp.test/userinfo"))
		.build()
		.expect_err("Plain HTTP must be rejected outside loopback.");

	assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));

	let local = builder("local")
		.authorization_endpoint(url("http://127.0.0.1:8080/auth"))
		.token_endpoint(url("http://localhost:8080/token"))
		.userinfo_endpoint(url("http://[::1]:8080/userinfo"))
		.build()
		.expect("Loopback endpoints are allowed for local providers.");

	assert_eq!(local.client_auth, ClientAuthMethod::ClientSecretPost);
}

#[test]
fn scope_param_honors_the_delimiter_quirk() {
	let descriptor = builder("comma")
		.authorization_endpoint(url("https://idp.test/auth"))
		.token_endpoint(url("https://idp.test/token"))
		.userinfo_endpoint(url("https://idp.test/userinfo"))
		.scope(ScopeList::new(["read:user", "user:email", "read:user"]).expect("Scopes are valid."))
		.quirks(ProviderQuirks { scope_delimiter: ',' })
		.build()
		.expect("Descriptor should build.");

	assert_eq!(descriptor.scope_param().as_deref(), Some("read:user,user:email"));

	let err = builder("control")
		.authorization_endpoint(url("https://idp.test/auth"))
		.token_endpoint(url("https://idp.test/token"))
		.userinfo_endpoint(url("https://idp.test/userinfo"))
		.quirks(ProviderQuirks { scope_delimiter: '\n' })
		.build()
		.expect_err("Control characters cannot delimit scopes.");

	assert!(matches!(err, ProviderDescriptorError::InvalidScopeDelimiter { .. }));
}

#[test]
fn presets_expose_their_scopes_and_endpoints() {
	let google = Preset::Google
		.provider(provider_id("google"), SecretRef::new("GOOGLE").expect("Valid ref."))
		.expect("Google preset should build.");
	let github = Preset::Github
		.provider(provider_id("gh"), SecretRef::new("GITHUB").expect("Valid ref."))
		.expect("GitHub preset should build.");

	assert_eq!(google.descriptor.scope_param().as_deref(), Some("openid email profile"));
	assert_eq!(google.descriptor.endpoints.token.host_str(), Some("oauth2.googleapis.com"));
	assert_eq!(github.id().as_ref(), "gh");
	assert_eq!(github.descriptor.endpoints.userinfo.as_str(), "https://api.github.com/user");
}

#[test]
fn default_strategy_reads_standard_claims() {
	let strategy = DefaultProviderStrategy::default();
	let provider = provider_id("corp");
	let info = strategy
		.normalize_user_info(&provider, &json!({ "sub": "abc", "name": "Grace" }))
		.expect("Standard claims should normalize.");

	assert_eq!(info.provider_user_id, "abc");
	assert_eq!(info.email, None);
	assert_eq!(info.username, "Grace");
	assert!(strategy.normalize_user_info(&provider, &json!({ "email": "x@y.z" })).is_err());
}

#[test]
fn generic_config_entries_feed_the_strategy() {
	let entry = ProviderConfig {
		id: Some(provider_id("corp")),
		authorization_endpoint: Some(url("https://id.corp.test/authorize")),
		token_endpoint: Some(url("https://id.corp.test/token")),
		userinfo_endpoint: Some(url("https://id.corp.test/userinfo")),
		extra_authorization_params: BTreeMap::from([
			("prompt".to_owned(), "login".to_owned()),
			("state".to_owned(), "hijack".to_owned()),
		]),
		..Default::default()
	};
	let provider = entry.build().expect("Generic entry should build.");
	let mut params = BTreeMap::new();

	provider.strategy.augment_authorization_params(&mut params);

	assert_eq!(params.get("prompt").map(String::as_str), Some("login"));
	assert!(RESERVED_AUTHORIZATION_PARAMS.contains(&"state"));
}

#[test]
fn duplicate_provider_ids_fail_registry_construction() {
	let config = SignInConfig::from_toml_str(
		r#"
[redirect]
callback = "https://resume.test/cb"
success  = "https://resume.test/"
failure  = "https://resume.test/login"

[[providers]]
preset = "google"

[[providers]]
preset = "github"
id     = "google"
"#,
	)
	.expect("Document should parse.");

	assert!(config.registry().is_err());
}

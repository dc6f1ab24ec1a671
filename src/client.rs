//! OIDC transport client: authorization URL construction, code exchange, and user-info fetch.
//!
//! None of the network operations return errors. Token endpoint failures come back as
//! [`ExchangeOutcome::Rejected`] (transport problems use the `server_error` code) and user-info
//! failures come back as `None`, so the callback state machine has one uniform path per step.

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
use serde_json::Value;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{NormalizedUserInfo, Secret},
	http::{ProviderHttpClient, ResponseMetadataSlot},
	provider::{ClientAuthMethod, RESERVED_AUTHORIZATION_PARAMS, RegisteredProvider},
	secret::{ClientCredentials, SecretError, SecretStore},
};

/// OAuth error code used for transport, parse, and credential lookup failures.
pub const SERVER_ERROR: &str = "server_error";

type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = oauth2::Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Boxed future returned by [`OidcClient`] network operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Extra token response field carrying the OpenID Connect `id_token`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Raw (unverified) ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Tokens issued by a successful code exchange; held for one callback only.
#[derive(Clone, Debug)]
pub struct TokenSet {
	/// Access token used for the user-info request.
	pub access_token: Secret,
	/// OpenID Connect ID token, when the provider issued one.
	pub id_token: Option<Secret>,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<Secret>,
}

/// Error details of a rejected code exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenFailure {
	/// OAuth error code (`invalid_grant`, ...) or [`SERVER_ERROR`].
	pub error: String,
	/// Human-readable description; logged, never shown to the browser.
	pub error_description: Option<String>,
	/// HTTP status of the token endpoint response, if one arrived.
	pub status: Option<u16>,
}
impl TokenFailure {
	/// Builds a `server_error` failure for transport-level problems.
	pub fn server_error(description: impl Into<String>, status: Option<u16>) -> Self {
		Self { error: SERVER_ERROR.into(), error_description: Some(description.into()), status }
	}

	/// Returns true when the failure was produced locally rather than by the provider.
	pub fn is_server_error(&self) -> bool {
		self.error == SERVER_ERROR
	}
}
impl Display for TokenFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.error_description {
			Some(description) => write!(f, "{}: {description}", self.error),
			None => f.write_str(&self.error),
		}
	}
}

/// Result of [`OidcClient::exchange_token`].
#[derive(Clone, Debug)]
pub enum ExchangeOutcome {
	/// The provider issued tokens.
	Granted(TokenSet),
	/// The exchange failed; the callback must stop here.
	Rejected(TokenFailure),
}

/// Provider-agnostic transport client.
///
/// All provider differences flow through the registered descriptor and strategy; this type
/// only moves bytes.
pub struct OidcClient<C>
where
	C: ?Sized + ProviderHttpClient,
{
	http_client: Arc<C>,
	secrets: Arc<dyn SecretStore>,
}
impl<C> OidcClient<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Creates a client over the provided transport and credential source.
	pub fn new(http_client: impl Into<Arc<C>>, secrets: Arc<dyn SecretStore>) -> Self {
		Self { http_client: http_client.into(), secrets }
	}

	/// Looks up the client credentials for `provider`.
	pub async fn credentials(
		&self,
		provider: &RegisteredProvider,
	) -> Result<ClientCredentials, SecretError> {
		self.secrets.client_credentials(&provider.descriptor.secret_ref).await
	}

	/// Exchanges an authorization code for tokens.
	///
	/// Sends `grant_type=authorization_code`, `code`, `redirect_uri`, `code_verifier`, the
	/// client credentials (form body or HTTP Basic per the descriptor), and any strategy fields.
	pub fn exchange_token<'a>(
		&'a self,
		provider: &'a RegisteredProvider,
		code: &'a str,
		redirect_uri: &'a Url,
		code_verifier: &'a Secret,
	) -> ClientFuture<'a, ExchangeOutcome> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let descriptor = &provider.descriptor;
			let credentials = match self.credentials(provider).await {
				Ok(credentials) => credentials,
				Err(e) => {
					tracing::error!(
						provider = %descriptor.id,
						error = %e,
						"Client credentials are unavailable."
					);

					return ExchangeOutcome::Rejected(TokenFailure::server_error(
						e.to_string(),
						None,
					));
				},
			};
			let oauth_client = configured_client(provider, &credentials);
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut form = BTreeMap::new();

			provider.strategy.augment_token_request(&mut form);

			let mut request = oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(code_verifier.expose().to_owned()))
				.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(redirect_uri.clone())));

			for (key, value) in form {
				request = request.add_extra_param(key, value);
			}

			match request.request_async(&instrumented).await {
				Ok(response) => ExchangeOutcome::Granted(TokenSet {
					access_token: Secret::new(response.access_token().secret().to_owned()),
					id_token: response.extra_fields().id_token.clone().map(Secret::new),
					refresh_token: response
						.refresh_token()
						.map(|token| Secret::new(token.secret().to_owned())),
				}),
				Err(e) => {
					let failure = map_request_error(meta.take_status(), e);

					tracing::warn!(
						provider = %descriptor.id,
						error = %failure.error,
						description = failure.error_description.as_deref().unwrap_or_default(),
						status = failure.status,
						"Token endpoint rejected the authorization code."
					);

					ExchangeOutcome::Rejected(failure)
				},
			}
		})
	}

	/// Fetches and normalizes the user's profile; any failure yields `None`.
	pub fn fetch_user_info<'a>(
		&'a self,
		provider: &'a RegisteredProvider,
		access_token: &'a Secret,
	) -> ClientFuture<'a, Option<NormalizedUserInfo>> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let descriptor = &provider.descriptor;
			let mut headers =
				BTreeMap::from([(ACCEPT.as_str().to_owned(), "application/json".to_owned())]);

			provider.strategy.augment_userinfo_headers(&mut headers);

			let mut builder =
				Request::builder().method(Method::GET).uri(descriptor.endpoints.userinfo.as_str());

			for (name, value) in &headers {
				if !name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
					builder = builder.header(name.as_str(), value.as_str());
				}
			}

			let request = match builder
				.header(AUTHORIZATION, format!("Bearer {}", access_token.expose()))
				.body(Vec::new())
			{
				Ok(request) => request,
				Err(e) => {
					tracing::error!(
						provider = %descriptor.id,
						error = %e,
						"User-info request could not be built."
					);

					return None;
				},
			};
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = match instrumented.call(request).await {
				Ok(response) => response,
				Err(e) => {
					tracing::warn!(provider = %descriptor.id, error = %e, "User-info request failed.");

					return None;
				},
			};

			if !response.status().is_success() {
				tracing::warn!(
					provider = %descriptor.id,
					status = response.status().as_u16(),
					"User-info endpoint returned a non-success status."
				);

				return None;
			}

			let payload = match serde_json::from_slice::<Value>(response.body()) {
				Ok(payload) => payload,
				Err(e) => {
					tracing::warn!(
						provider = %descriptor.id,
						error = %e,
						"User-info body is not valid JSON."
					);

					return None;
				},
			};

			match provider.strategy.normalize_user_info(&descriptor.id, &payload) {
				Ok(info) => Some(info),
				Err(e) => {
					tracing::warn!(
						provider = %descriptor.id,
						error = %e,
						"User-info payload could not be normalized."
					);

					None
				},
			}
		})
	}
}
impl<C> Clone for OidcClient<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn clone(&self) -> Self {
		Self { http_client: self.http_client.clone(), secrets: self.secrets.clone() }
	}
}
impl<C> Debug for OidcClient<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OidcClient(..)")
	}
}

/// Builds the authorization URL the browser is sent to.
///
/// Every value is percent-encoded with `%20` for spaces. Strategy extras that collide with
/// [`RESERVED_AUTHORIZATION_PARAMS`] are dropped.
pub fn build_authorization_url(
	provider: &RegisteredProvider,
	client_id: &str,
	redirect_uri: &Url,
	state: &str,
	code_challenge: &str,
) -> Url {
	let descriptor = &provider.descriptor;
	let mut params = vec![
		("client_id", Cow::Borrowed(client_id)),
		("response_type", Cow::Borrowed("code")),
	];

	if let Some(scope) = descriptor.scope_param() {
		params.push(("scope", Cow::Owned(scope)));
	}

	params.push(("redirect_uri", Cow::Borrowed(redirect_uri.as_str())));
	params.push(("state", Cow::Borrowed(state)));
	params.push(("code_challenge", Cow::Borrowed(code_challenge)));
	params.push(("code_challenge_method", Cow::Borrowed("S256")));

	let mut extras = BTreeMap::new();

	provider.strategy.augment_authorization_params(&mut extras);

	let mut query = descriptor.endpoints.authorization.query().unwrap_or_default().to_owned();

	for (key, value) in params.iter().map(|(k, v)| (*k, v.as_ref())).chain(
		extras.iter().filter_map(|(k, v)| {
			if RESERVED_AUTHORIZATION_PARAMS.contains(&k.as_str()) {
				tracing::warn!(
					provider = %descriptor.id,
					param = %k,
					"Ignoring reserved authorization parameter from provider strategy."
				);

				None
			} else {
				Some((k.as_str(), v.as_str()))
			}
		}),
	) {
		if !query.is_empty() {
			query.push('&');
		}

		query.push_str(&encode_component(key));
		query.push('=');
		query.push_str(&encode_component(value));
	}

	let mut url = descriptor.endpoints.authorization.clone();

	url.set_query(Some(&query));

	url
}

fn configured_client(
	provider: &RegisteredProvider,
	credentials: &ClientCredentials,
) -> ConfiguredClient {
	let auth_type = match provider.descriptor.client_auth {
		ClientAuthMethod::ClientSecretPost => AuthType::RequestBody,
		ClientAuthMethod::ClientSecretBasic => AuthType::BasicAuth,
	};

	oauth2::Client::new(ClientId::new(credentials.client_id.clone()))
		.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
		.set_token_uri(TokenUrl::from_url(provider.descriptor.endpoints.token.clone()))
		.set_auth_type(auth_type)
}

fn map_request_error<E>(
	status: Option<u16>,
	err: RequestTokenError<HttpClientError<E>, BasicErrorResponse>,
) -> TokenFailure
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		RequestTokenError::ServerResponse(response) => TokenFailure {
			error: response.error().as_ref().to_owned(),
			error_description: response.error_description().cloned(),
			status,
		},
		RequestTokenError::Request(e) =>
			TokenFailure::server_error(format!("Token request failed: {e}."), status),
		RequestTokenError::Parse(e, _body) =>
			TokenFailure::server_error(format!("Token response is malformed: {e}."), status),
		RequestTokenError::Other(message) => TokenFailure::server_error(
			format!("Token endpoint returned an unexpected response: {message}."),
			status,
		),
	}
}

fn encode_component(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{ProviderId, ScopeList, SecretRef},
		provider::{DefaultProviderStrategy, ProviderDescriptor, presets},
	};

	fn redirect() -> Url {
		Url::parse("https://app.test/cb?from=login").expect("Redirect fixture should parse.")
	}

	fn pairs(url: &Url) -> HashMap<String, String> {
		url.query_pairs().into_owned().collect()
	}

	#[test]
	fn authorization_url_carries_every_required_parameter() {
		let google = presets::google(SecretRef::new("GOOGLE").expect("Secret ref should be valid."))
			.expect("Google preset should build.");
		let url = build_authorization_url(
			&google,
			"client-1",
			&redirect(),
			"state-xyz",
			"challenge-abc",
		);
		let pairs = pairs(&url);

		assert!(url.as_str().contains("scope=openid%20email%20profile"));
		assert!(url.as_str().contains("redirect_uri=https%3A%2F%2Fapp.test%2Fcb%3Ffrom%3Dlogin"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("state").map(String::as_str), Some("state-xyz"));
		assert_eq!(pairs.get("code_challenge").map(String::as_str), Some("challenge-abc"));
		assert_eq!(pairs.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(pairs.get("prompt").map(String::as_str), Some("select_account"));
	}

	#[test]
	fn reserved_extras_are_ignored_and_existing_query_is_kept() {
		let descriptor = ProviderDescriptor::builder(
			ProviderId::new("corp").expect("Provider fixture should be valid."),
		)
		.authorization_endpoint(
			Url::parse("https://id.corp.test/authorize?tenant=resume")
				.expect("Endpoint fixture should parse."),
		)
		.token_endpoint(Url::parse("https://id.corp.test/token").expect("Endpoint should parse."))
		.userinfo_endpoint(
			Url::parse("https://id.corp.test/userinfo").expect("Endpoint should parse."),
		)
		.scope(ScopeList::new(["openid"]).expect("Scope fixture should be valid."))
		.secret_ref(SecretRef::new("CORP").expect("Secret ref should be valid."))
		.build()
		.expect("Descriptor should build.");
		let strategy = DefaultProviderStrategy::default()
			.with_authorization_param("state", "forged")
			.with_authorization_param("login_hint", "a b+c");
		let provider = RegisteredProvider::new(descriptor, Arc::new(strategy));
		let url = build_authorization_url(
			&provider,
			"client-1",
			&redirect(),
			"real-state",
			"challenge",
		);

		assert!(url.as_str().starts_with("https://id.corp.test/authorize?tenant=resume&client_id="));
		assert!(url.as_str().contains("login_hint=a%20b%2Bc"));
		assert_eq!(url.query_pairs().filter(|(k, _)| k == "state").count(), 1);
		assert_eq!(pairs(&url).get("state").map(String::as_str), Some("real-state"));
	}

	#[test]
	fn token_failure_renders_code_and_description() {
		let failure = TokenFailure::server_error("connection reset", None);

		assert!(failure.is_server_error());
		assert_eq!(failure.to_string(), "server_error: connection reset");
	}

	#[test]
	fn id_token_field_is_optional() {
		let with: IdTokenFields =
			serde_json::from_str("{\"id_token\":\"a.b.c\"}").expect("Field should parse.");
		let without: IdTokenFields = serde_json::from_str("{}").expect("Empty object should parse.");

		assert_eq!(with.id_token.as_deref(), Some("a.b.c"));
		assert!(without.id_token.is_none());
	}
}

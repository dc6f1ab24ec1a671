#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
// self
use resume_oidc::{
	_preludet::*,
	auth::{ScopeList, Secret, SecretRef},
	client::{ExchangeOutcome, OidcClient, SERVER_ERROR},
	http::{ProviderHttpClient, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
	},
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, ProviderDescriptor, RegisteredProvider,
	},
};

#[derive(Debug)]
enum FakeTransportError {
	Unreachable,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Unreachable => write!(f, "Provider is unreachable."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Debug)]
struct RecordedRequest {
	headers: HeaderMap,
	body: String,
}

/// Transport that answers every request with one canned status and body, or fails outright.
#[derive(Clone, Default)]
struct FakeHttpClient {
	reply: Option<(u16, &'static str)>,
	requests: Arc<Mutex<Vec<RecordedRequest>>>,
}
impl FakeHttpClient {
	fn replying(status: u16, body: &'static str) -> Self {
		Self { reply: Some((status, body)), ..Default::default() }
	}

	fn unreachable() -> Self {
		Self::default()
	}

	fn recorded(&self) -> Vec<RecordedRequest> {
		self.requests.lock().clone()
	}
}
impl ProviderHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, client: self.clone() }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	client: FakeHttpClient,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let client = self.client.clone();

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);

			client.requests.lock().push(RecordedRequest {
				headers: request.headers().clone(),
				body: String::from_utf8_lossy(request.body()).into_owned(),
			});

			let Some((status, body)) = client.reply else {
				return Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Unreachable)));
			};

			slot.store(ResponseMetadata { status: Some(status) });

			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() = StatusCode::from_u16(status).expect("Status is valid.");
			response
				.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

			Ok(response)
		})
	}
}

fn provider(client_auth: ClientAuthMethod, base: &str) -> RegisteredProvider {
	let descriptor = ProviderDescriptor::builder(provider_id("fake"))
		.authorization_endpoint(Url::parse(&format!("{base}/authorize")).expect("URL should parse."))
		.token_endpoint(Url::parse(&format!("{base}/token")).expect("URL should parse."))
		.userinfo_endpoint(Url::parse(&format!("{base}/userinfo")).expect("URL should parse."))
		.scope(ScopeList::new(["openid"]).expect("Scopes should be valid."))
		.secret_ref(SecretRef::new("fake").expect("Secret ref should be valid."))
		.client_auth(client_auth)
		.build()
		.expect("Descriptor should build.");

	RegisteredProvider::new(
		descriptor,
		Arc::new(DefaultProviderStrategy::default().with_token_param("audience", "resume-api")),
	)
}

fn redirect() -> Url {
	Url::parse("https://app.test/cb").expect("Redirect should parse.")
}

#[tokio::test]
async fn oauth_errors_are_carried_with_their_status() {
	let transport = FakeHttpClient::replying(
		400,
		"{\"error\":\"invalid_grant\",\"error_description\":\"Code was already redeemed.\"}",
	);
	let client = <OidcClient<FakeHttpClient>>::new(
		transport.clone(),
		test_secret_store("fake", "client-fake", "secret-fake"),
	);
	let outcome = client
		.exchange_token(
			&provider(ClientAuthMethod::ClientSecretPost, "https://idp.test"),
			"code-1",
			&redirect(),
			&Secret::new("verifier-1"),
		)
		.await;
	let ExchangeOutcome::Rejected(failure) = outcome else {
		panic!("Exchange should be rejected.");
	};

	assert_eq!(failure.error, "invalid_grant");
	assert_eq!(failure.error_description.as_deref(), Some("Code was already redeemed."));
	assert_eq!(failure.status, Some(400));

	let body = &transport.recorded()[0].body;

	assert!(body.contains("code_verifier=verifier-1"));
	assert!(body.contains("audience=resume-api"));
	assert!(body.contains("client_secret=secret-fake"));
}

#[tokio::test]
async fn transport_failures_become_server_errors() {
	let client = <OidcClient<FakeHttpClient>>::new(
		FakeHttpClient::unreachable(),
		test_secret_store("fake", "client-fake", "secret-fake"),
	);
	let provider = provider(ClientAuthMethod::ClientSecretPost, "https://idp.test");
	let outcome =
		client.exchange_token(&provider, "code-1", &redirect(), &Secret::new("verifier")).await;

	assert!(matches!(outcome, ExchangeOutcome::Rejected(ref f) if f.error == SERVER_ERROR));
	assert!(client.fetch_user_info(&provider, &Secret::new("token")).await.is_none());
}

#[tokio::test]
async fn basic_auth_keeps_the_secret_out_of_the_form() {
	let transport =
		FakeHttpClient::replying(200, "{\"access_token\":\"a\",\"token_type\":\"bearer\"}");
	let client = <OidcClient<FakeHttpClient>>::new(
		transport.clone(),
		test_secret_store("fake", "client-fake", "secret-fake"),
	);
	let outcome = client
		.exchange_token(
			&provider(ClientAuthMethod::ClientSecretBasic, "https://idp.test"),
			"code-1",
			&redirect(),
			&Secret::new("verifier"),
		)
		.await;

	assert!(matches!(outcome, ExchangeOutcome::Granted(ref t) if t.access_token.expose() == "a"));

	let request = &transport.recorded()[0];

	assert!(request.headers.contains_key("authorization"));
	assert!(!request.body.contains("client_secret"));
}

#[tokio::test]
async fn reqwest_transport_fetches_and_normalizes_user_info() {
	let server = MockServer::start_async().await;
	let userinfo = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/userinfo")
				.header("authorization", "Bearer token-it")
				.header("accept", "application/json");
			then.status(200).header("content-type", "application/json").body(
				"{\"sub\":\"u-1\",\"email\":\"u1@example.com\",\"preferred_username\":\"uno\"}",
			);
		})
		.await;
	let client = <OidcClient<ReqwestHttpClient>>::new(
		test_reqwest_http_client(),
		test_secret_store("fake", "client-fake", "secret-fake"),
	);
	let info = client
		.fetch_user_info(
			&provider(ClientAuthMethod::ClientSecretPost, &server.base_url()),
			&Secret::new("token-it"),
		)
		.await
		.expect("User info should normalize.");

	userinfo.assert_async().await;
	assert_eq!(info.provider_user_id, "u-1");
	assert_eq!(info.username, "uno");
}

#[tokio::test]
async fn reqwest_transport_treats_malformed_payloads_as_missing() {
	let server = MockServer::start_async().await;
	let _userinfo = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo");
			then.status(200)
				.header("content-type", "application/json")
				.body("[\"not\",\"an\",\"object\"]");
		})
		.await;
	let client = <OidcClient<ReqwestHttpClient>>::new(
		test_reqwest_http_client(),
		test_secret_store("fake", "client-fake", "secret-fake"),
	);

	assert!(
		client
			.fetch_user_info(
				&provider(ClientAuthMethod::ClientSecretPost, &server.base_url()),
				&Secret::new("token-it"),
			)
			.await
			.is_none()
	);
}

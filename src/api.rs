//! Browser-facing HTTP endpoints built on axum.
//!
//! - `GET /auth/oidc/authorize?provider=<id>` answers `200` with the authorization URL as a
//!   plain-text body, `400` when the provider is missing or unknown, and `500` for any other
//!   configuration failure.
//! - `GET /auth/oidc/callback` always answers `302`: success is delegated to a
//!   [`SuccessResponder`], failures go to the failure page with a generic `message` query.

// crates.io
use axum::{
	Router,
	extract::{Query, State, rejection::QueryRejection},
	http::{HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
	routing::get,
};
// self
use crate::{
	_prelude::*,
	config::SignInConfig,
	error::ConfigError,
	flows::{CallbackParams, CallbackResult, SignIn},
	http::ProviderHttpClient,
};

/// Path of the initiation endpoint.
pub const AUTHORIZE_PATH: &str = "/auth/oidc/authorize";
/// Path of the provider redirect endpoint.
pub const CALLBACK_PATH: &str = "/auth/oidc/callback";

/// Produces the response for a successful sign-in.
///
/// Session cookies and tokens belong to the embedding application, so this hook is where
/// they are attached. Implementations must not put credentials in the redirect URL.
pub trait SuccessResponder
where
	Self: Send + Sync,
{
	/// Builds the success response for `user_id` holding `roles`.
	fn respond(&self, user_id: &str, roles: &[String], success_url: &Url) -> Response;
}

/// Redirects to the success page without setting any credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainRedirect;
impl SuccessResponder for PlainRedirect {
	fn respond(&self, _user_id: &str, _roles: &[String], success_url: &Url) -> Response {
		found(success_url)
	}
}

/// Redirect URIs used by the endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTargets {
	/// Redirect URI registered with providers.
	pub callback: Url,
	/// Landing page after a successful sign-in.
	pub success: Url,
	/// Landing page after a failed sign-in.
	pub failure: Url,
}
impl From<&SignInConfig> for RedirectTargets {
	fn from(config: &SignInConfig) -> Self {
		Self {
			callback: config.redirect.callback.clone(),
			success: config.redirect.success.clone(),
			failure: config.redirect.failure.clone(),
		}
	}
}

/// Shared router state.
pub struct ApiState<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Sign-in facade.
	pub sign_in: SignIn<C>,
	/// Redirect URIs.
	pub targets: RedirectTargets,
	/// Success response hook.
	pub responder: Arc<dyn SuccessResponder>,
}
impl<C> ApiState<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Creates state that answers successful sign-ins with [`PlainRedirect`].
	pub fn new(sign_in: SignIn<C>, targets: RedirectTargets) -> Self {
		Self { sign_in, targets, responder: Arc::new(PlainRedirect) }
	}

	/// Replaces the success response hook.
	pub fn with_responder(mut self, responder: Arc<dyn SuccessResponder>) -> Self {
		self.responder = responder;

		self
	}
}
impl<C> Clone for ApiState<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			sign_in: self.sign_in.clone(),
			targets: self.targets.clone(),
			responder: self.responder.clone(),
		}
	}
}
impl<C> Debug for ApiState<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiState")
			.field("sign_in", &self.sign_in)
			.field("targets", &self.targets)
			.finish()
	}
}

/// Query of the initiation endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
	/// Provider identifier.
	pub provider: Option<String>,
}

/// Builds the router serving both endpoints.
pub fn router<C>(state: ApiState<C>) -> Router
where
	C: ?Sized + ProviderHttpClient,
{
	Router::new()
		.route(AUTHORIZE_PATH, get(authorize::<C>))
		.route(CALLBACK_PATH, get(callback::<C>))
		.with_state(state)
}

async fn authorize<C>(
	State(state): State<ApiState<C>>,
	Query(query): Query<AuthorizeQuery>,
) -> Response
where
	C: ?Sized + ProviderHttpClient,
{
	let Some(provider) = query.provider.filter(|p| !p.is_empty()) else {
		return (StatusCode::BAD_REQUEST, "Query parameter `provider` is required.").into_response();
	};

	match state.sign_in.begin(&provider, &state.targets.callback).await {
		Ok(url) => (
			StatusCode::OK,
			[(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
			String::from(url),
		)
			.into_response(),
		Err(Error::Config(ConfigError::UnknownProvider { .. })) =>
			(StatusCode::BAD_REQUEST, "Unknown provider.").into_response(),
		Err(e) => {
			tracing::error!(error = %e, provider = %provider, "Failed to start a sign-in attempt.");

			(StatusCode::INTERNAL_SERVER_ERROR, "Sign-in is unavailable.").into_response()
		},
	}
}

async fn callback<C>(
	State(state): State<ApiState<C>>,
	query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response
where
	C: ?Sized + ProviderHttpClient,
{
	// A malformed query (e.g. a repeated key) counts as missing parameters.
	let params = match query {
		Ok(Query(params)) => params,
		Err(e) => {
			tracing::warn!(error = %e, "Rejected a malformed callback query.");

			CallbackParams::default()
		},
	};

	match state.sign_in.complete(params).await {
		CallbackResult::Success { user_id, roles } =>
			state.responder.respond(&user_id, &roles, &state.targets.success),
		CallbackResult::Failure { kind } => {
			let mut target = state.targets.failure.clone();

			target.query_pairs_mut().append_pair("message", kind.user_message());

			found(&target)
		},
	}
}

fn found(location: &Url) -> Response {
	match HeaderValue::from_str(location.as_str()) {
		Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
		Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
	}
}

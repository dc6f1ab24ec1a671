//! Callback orchestrator: the state machine that consumes an authorization session.
//!
//! Transitions run in a fixed order and the first violation ends the callback:
//!
//! 1. provider `error` parameter present: [`CallbackErrorKind::ProviderErrorParameter`]
//! 2. `code` or `state` missing: [`CallbackErrorKind::MissingRequiredParameter`]
//! 3. no live session for `state`: [`CallbackErrorKind::InvalidOrExpiredState`]
//! 4. token endpoint rejected the code: [`CallbackErrorKind::TokenExchangeFailed`]
//! 5. user info unavailable: [`CallbackErrorKind::UserinfoFetchFailed`]
//! 6. login step failed: [`CallbackErrorKind::LoginFailed`]
//!
//! Whenever a `state` is presented, its session is consumed before step 1 runs, so it is
//! removed exactly once whatever happens afterwards and can never be replayed.

// self
use crate::{
	_prelude::*,
	client::ExchangeOutcome,
	flows::SignIn,
	http::ProviderHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::AuthorizationSession,
};

/// Query parameters of the provider redirect.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	pub code: Option<String>,
	/// CSRF state issued by `begin`.
	pub state: Option<String>,
	/// OAuth error code reported by the provider.
	pub error: Option<String>,
	/// Provider's description of `error`.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Sets the authorization code.
	pub fn with_code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());

		self
	}

	/// Sets the state.
	pub fn with_state(mut self, state: impl Into<String>) -> Self {
		self.state = Some(state.into());

		self
	}

	/// Sets the provider error code.
	pub fn with_error(mut self, error: impl Into<String>) -> Self {
		self.error = Some(error.into());

		self
	}

	fn present(value: &Option<String>) -> Option<&str> {
		value.as_deref().filter(|v| !v.is_empty())
	}
}
impl Debug for CallbackParams {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackParams")
			.field("code_present", &self.code.is_some())
			.field("state_present", &self.state.is_some())
			.field("error", &self.error)
			.field("error_description", &self.error_description)
			.finish()
	}
}

/// Stages a callback passes through before it succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackStage {
	/// Redirect received.
	Received,
	/// `error`, `code`, and `state` checked.
	ParamsValidated,
	/// Live session found for `state`.
	SessionValidated,
	/// Tokens issued by the provider.
	TokenExchanged,
	/// Profile fetched and normalized.
	UserInfoFetched,
	/// Login step succeeded.
	LoggedIn,
}
impl CallbackStage {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallbackStage::Received => "received",
			CallbackStage::ParamsValidated => "params_validated",
			CallbackStage::SessionValidated => "session_validated",
			CallbackStage::TokenExchanged => "token_exchanged",
			CallbackStage::UserInfoFetched => "user_info_fetched",
			CallbackStage::LoggedIn => "logged_in",
		}
	}
}

/// Terminal failure kinds of a callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackErrorKind {
	/// The provider redirected back with an `error` parameter.
	ProviderErrorParameter,
	/// `code` or `state` was missing.
	MissingRequiredParameter,
	/// No live session matched `state`.
	InvalidOrExpiredState,
	/// The token endpoint rejected the exchange or could not be reached.
	TokenExchangeFailed,
	/// The user-info endpoint failed or returned an unusable payload.
	UserinfoFetchFailed,
	/// The login/provisioning step failed.
	LoginFailed,
}
impl CallbackErrorKind {
	/// Every kind, in state machine order.
	pub const ALL: [CallbackErrorKind; 6] = [
		CallbackErrorKind::ProviderErrorParameter,
		CallbackErrorKind::MissingRequiredParameter,
		CallbackErrorKind::InvalidOrExpiredState,
		CallbackErrorKind::TokenExchangeFailed,
		CallbackErrorKind::UserinfoFetchFailed,
		CallbackErrorKind::LoginFailed,
	];

	/// Stable error code.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallbackErrorKind::ProviderErrorParameter => "PROVIDER_ERROR_PARAMETER",
			CallbackErrorKind::MissingRequiredParameter => "MISSING_REQUIRED_PARAMETER",
			CallbackErrorKind::InvalidOrExpiredState => "INVALID_OR_EXPIRED_STATE",
			CallbackErrorKind::TokenExchangeFailed => "TOKEN_EXCHANGE_FAILED",
			CallbackErrorKind::UserinfoFetchFailed => "USERINFO_FETCH_FAILED",
			CallbackErrorKind::LoginFailed => "LOGIN_FAILED",
		}
	}

	/// Generic message that is safe to show in the browser.
	pub const fn user_message(self) -> &'static str {
		match self {
			CallbackErrorKind::ProviderErrorParameter =>
				"Sign-in was cancelled or denied at the identity provider.",
			CallbackErrorKind::MissingRequiredParameter =>
				"The sign-in response was incomplete. Please try again.",
			CallbackErrorKind::InvalidOrExpiredState =>
				"Your sign-in session has expired. Please start again.",
			CallbackErrorKind::TokenExchangeFailed =>
				"Sign-in could not be completed with the identity provider.",
			CallbackErrorKind::UserinfoFetchFailed =>
				"Your profile could not be read from the identity provider.",
			CallbackErrorKind::LoginFailed => "You could not be signed in with this account.",
		}
	}
}
impl Display for CallbackErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// The only externally observable artifact of a callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackResult {
	/// The user is signed in.
	Success {
		/// Application user identifier.
		user_id: String,
		/// Roles granted to the user.
		roles: Vec<String>,
	},
	/// The callback ended in a terminal failure.
	Failure {
		/// Classified failure.
		kind: CallbackErrorKind,
	},
}
impl CallbackResult {
	/// Returns the failure kind, if any.
	pub fn error_kind(&self) -> Option<CallbackErrorKind> {
		match self {
			CallbackResult::Success { .. } => None,
			CallbackResult::Failure { kind } => Some(*kind),
		}
	}

	/// Returns true for [`CallbackResult::Success`].
	pub fn is_success(&self) -> bool {
		matches!(self, CallbackResult::Success { .. })
	}
}
impl From<CallbackErrorKind> for CallbackResult {
	fn from(kind: CallbackErrorKind) -> Self {
		CallbackResult::Failure { kind }
	}
}

impl<C> SignIn<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Processes a provider redirect and classifies its outcome.
	pub async fn complete(&self, params: CallbackParams) -> CallbackResult {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "complete");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_callback(&span, params)).await;

		match &result {
			CallbackResult::Success { .. } => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			CallbackResult::Failure { kind } => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::record_callback_failure(*kind);
			},
		}

		result
	}

	async fn run_callback(&self, span: &FlowSpan, params: CallbackParams) -> CallbackResult {
		let mut stage = CallbackStage::Received;
		let session = match CallbackParams::present(&params.state) {
			Some(state) => self.consume_session(state).await,
			None => None,
		};

		if let Some(session) = &session {
			span.record_provider(session.provider.as_ref());
		}
		if let Some(error) = CallbackParams::present(&params.error) {
			tracing::warn!(
				error,
				description = params.error_description.as_deref().unwrap_or_default(),
				"Provider redirected back with an error."
			);

			return fail(stage, CallbackErrorKind::ProviderErrorParameter);
		}

		let (Some(code), Some(_)) =
			(CallbackParams::present(&params.code), CallbackParams::present(&params.state))
		else {
			return fail(stage, CallbackErrorKind::MissingRequiredParameter);
		};

		stage = CallbackStage::ParamsValidated;

		let Some(session) = session else {
			return fail(stage, CallbackErrorKind::InvalidOrExpiredState);
		};
		let provider = match self.registry.resolve(&session.provider) {
			Ok(provider) => provider,
			Err(e) => {
				tracing::error!(
					error = %e,
					"Session refers to a provider that is no longer configured."
				);

				return fail(stage, CallbackErrorKind::InvalidOrExpiredState);
			},
		};

		stage = CallbackStage::SessionValidated;

		let tokens = match self
			.client
			.exchange_token(&provider, code, &session.redirect_uri, &session.code_verifier)
			.await
		{
			ExchangeOutcome::Granted(tokens) => tokens,
			ExchangeOutcome::Rejected(_) =>
				return fail(stage, CallbackErrorKind::TokenExchangeFailed),
		};

		stage = CallbackStage::TokenExchanged;

		let Some(info) = self.client.fetch_user_info(&provider, &tokens.access_token).await else {
			return fail(stage, CallbackErrorKind::UserinfoFetchFailed);
		};

		stage = CallbackStage::UserInfoFetched;

		match self.login.execute(&info).await {
			Ok(outcome) => {
				tracing::info!(
					stage = CallbackStage::LoggedIn.as_str(),
					user_id = %outcome.user_id,
					"Sign-in completed."
				);

				CallbackResult::Success { user_id: outcome.user_id, roles: outcome.roles }
			},
			Err(e) => {
				tracing::warn!(error = %e, "Login step failed.");

				fail(stage, CallbackErrorKind::LoginFailed)
			},
		}
	}

	/// Removes the session for `state` and returns it if it was still live.
	///
	/// Store failures are logged and treated as an absent session.
	async fn consume_session(&self, state: &str) -> Option<AuthorizationSession> {
		match self.store.take(state).await {
			Ok(Some(session)) if session.is_expired_at(OffsetDateTime::now_utc()) => {
				tracing::debug!("Authorization session expired before the callback.");

				None
			},
			Ok(found) => found,
			Err(e) => {
				tracing::error!(error = %e, "Authorization session could not be consumed.");

				None
			},
		}
	}
}

fn fail(stage: CallbackStage, kind: CallbackErrorKind) -> CallbackResult {
	tracing::info!(stage = stage.as_str(), kind = kind.as_str(), "Callback failed.");

	kind.into()
}

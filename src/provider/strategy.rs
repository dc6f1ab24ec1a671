//! Provider strategy hooks that customize outgoing requests and normalize user info.
//!
//! Implementations decorate the authorization URL, the token request form, and the
//! user-info request headers, and turn the raw user-info payload into a
//! [`NormalizedUserInfo`] without tying the transport client to any provider.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{NormalizedUserInfo, ProviderId},
};

/// Query parameters the transport client always sets itself; strategies cannot override them.
pub const RESERVED_AUTHORIZATION_PARAMS: &[&str] = &[
	"client_id",
	"response_type",
	"scope",
	"redirect_uri",
	"state",
	"code_challenge",
	"code_challenge_method",
];

/// Strategy hook that lets providers shape requests and normalize user-info payloads.
///
/// Implementors are required to be `Send + Sync`, and the hooks work on crate-owned
/// data types (`BTreeMap`, `serde_json::Value`) so strategies stay decoupled from the HTTP
/// client. Every hook has a default: request hooks do nothing and
/// [`normalize_user_info`](Self::normalize_user_info) reads the standard OIDC claims.
pub trait ProviderStrategy: Send + Sync {
	/// Adds provider-specific query parameters to the authorization URL.
	///
	/// Keys listed in [`RESERVED_AUTHORIZATION_PARAMS`] are ignored by the transport client.
	fn augment_authorization_params(&self, _params: &mut BTreeMap<String, String>) {}

	/// Adds provider-specific form fields to the token request.
	fn augment_token_request(&self, _form: &mut BTreeMap<String, String>) {}

	/// Adds provider-specific headers to the user-info request.
	fn augment_userinfo_headers(&self, _headers: &mut BTreeMap<String, String>) {}

	/// Maps the raw user-info payload into the normalized shape.
	fn normalize_user_info(
		&self,
		provider: &ProviderId,
		payload: &Value,
	) -> Result<NormalizedUserInfo, UserInfoError> {
		let claims = as_object(payload)?;
		let provider_user_id = required_claim(claims, "sub")?;
		let email = claim_string(claims, "email");
		let username = claim_string(claims, "preferred_username")
			.or_else(|| claim_string(claims, "name"))
			.or_else(|| email.clone())
			.unwrap_or_else(|| provider_user_id.clone());

		Ok(NormalizedUserInfo { provider: provider.clone(), provider_user_id, email, username })
	}
}

/// Failures raised while normalizing a user-info payload.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UserInfoError {
	/// Payload is not a JSON object.
	#[error("User-info payload is not a JSON object.")]
	NotAnObject,
	/// A claim required to identify the user is missing or empty.
	#[error("User-info payload is missing the `{claim}` claim.")]
	MissingClaim {
		/// Claim name.
		claim: &'static str,
	},
}

/// Strategy for standards-compliant OIDC providers with optional static extras.
#[derive(Clone, Debug, Default)]
pub struct DefaultProviderStrategy {
	/// Extra authorization URL parameters.
	pub authorization_params: BTreeMap<String, String>,
	/// Extra token request fields.
	pub token_params: BTreeMap<String, String>,
}
impl DefaultProviderStrategy {
	/// Adds a static authorization URL parameter.
	pub fn with_authorization_param(
		mut self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.authorization_params.insert(key.into(), value.into());

		self
	}

	/// Adds a static token request field.
	pub fn with_token_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.token_params.insert(key.into(), value.into());

		self
	}
}
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn augment_authorization_params(&self, params: &mut BTreeMap<String, String>) {
		params.extend(self.authorization_params.iter().map(|(k, v)| (k.clone(), v.clone())));
	}

	fn augment_token_request(&self, form: &mut BTreeMap<String, String>) {
		form.extend(self.token_params.iter().map(|(k, v)| (k.clone(), v.clone())));
	}
}

/// Borrows the payload as a JSON object.
pub fn as_object(payload: &Value) -> Result<&Map<String, Value>, UserInfoError> {
	payload.as_object().ok_or(UserInfoError::NotAnObject)
}

/// Reads a claim as a non-empty string; numeric claims are rendered in decimal.
pub fn claim_string(claims: &Map<String, Value>, name: &str) -> Option<String> {
	match claims.get(name)? {
		Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

/// Reads a claim that must be present.
pub fn required_claim(
	claims: &Map<String, Value>,
	name: &'static str,
) -> Result<String, UserInfoError> {
	claim_string(claims, name).ok_or(UserInfoError::MissingClaim { claim: name })
}

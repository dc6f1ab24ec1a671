//! Provider-agnostic identity produced by a successful user-info fetch.

// self
use crate::{_prelude::*, auth::ProviderId};

/// Normalized user info handed to the login/provisioning step.
///
/// Produced fresh on every callback and never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedUserInfo {
	/// Provider that authenticated the user.
	pub provider: ProviderId,
	/// Stable subject identifier issued by the provider.
	pub provider_user_id: String,
	/// Email address, when the provider discloses one.
	pub email: Option<String>,
	/// Display or login name.
	pub username: String,
}

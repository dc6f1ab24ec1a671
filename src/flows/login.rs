//! Contract of the external login/provisioning step invoked at the end of a callback.

// self
use crate::{_prelude::*, auth::NormalizedUserInfo};

/// Boxed future returned by [`LoginStep::execute`].
pub type LoginFuture<'a> =
	Pin<Box<dyn Future<Output = Result<LoginOutcome, LoginError>> + 'a + Send>>;

/// Turns a normalized identity into an application user.
///
/// Implementations may create a new account or bind to an existing one. When the identity's
/// email already belongs to a local account linked through a different provider,
/// implementations return [`LoginError::AccountConflict`] instead of linking silently.
pub trait LoginStep
where
	Self: Send + Sync,
{
	/// Signs the identity in, provisioning it if needed.
	fn execute<'a>(&'a self, info: &'a NormalizedUserInfo) -> LoginFuture<'a>;
}

/// Application user produced by a successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
	/// Application user identifier.
	pub user_id: String,
	/// Roles granted to the user.
	pub roles: Vec<String>,
}
impl LoginOutcome {
	/// Creates an outcome for `user_id` with `roles`.
	pub fn new<I, S>(user_id: impl Into<String>, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { user_id: user_id.into(), roles: roles.into_iter().map(Into::into).collect() }
	}
}

/// Failures reported by a [`LoginStep`]; every variant ends the callback as `LOGIN_FAILED`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LoginError {
	/// The identity's email is already bound to another account under a different provider.
	#[error("Email is already linked to an account that signs in with `{existing_provider}`.")]
	AccountConflict {
		/// Provider the existing account is linked to.
		existing_provider: String,
	},
	/// The application refused the user (disabled, banned, ...).
	#[error("Login was rejected: {reason}.")]
	Rejected {
		/// Human-readable reason; logged only.
		reason: String,
	},
	/// The user directory could not be reached.
	#[error("Login backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcome_collects_roles() {
		let outcome = LoginOutcome::new("42", ["ROLE_USER", "ROLE_EDITOR"]);

		assert_eq!(outcome.user_id, "42");
		assert_eq!(outcome.roles, ["ROLE_USER", "ROLE_EDITOR"]);
	}

	#[test]
	fn conflict_message_names_the_existing_provider() {
		let err = LoginError::AccountConflict { existing_provider: "github".into() };

		assert!(err.to_string().contains("`github`"));
	}
}

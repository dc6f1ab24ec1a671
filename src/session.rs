//! Time-bounded storage for authorization sessions that correlate a redirect round-trip.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemorySessionStore;
#[cfg(feature = "redis")] pub use redis::RedisSessionStore;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, Secret},
};

/// Default lifetime of an authorization session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::minutes(10);

/// Boxed future returned by [`SessionStore`] operations.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage contract for authorization sessions keyed by their `state` value.
///
/// Every operation is a single key operation, so concurrent sign-ins never contend. `remove`
/// is idempotent, and a `find` after the TTL elapsed returns `None`.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Persists a freshly issued session that expires after `ttl`.
	fn store(&self, session: AuthorizationSession, ttl: Duration) -> SessionFuture<'_, ()>;

	/// Looks up a live session by `state`.
	fn find<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>>;

	/// Deletes the session for `state`; missing keys are not an error.
	fn remove<'a>(&'a self, state: &'a str) -> SessionFuture<'a, ()>;

	/// Consumes the session for `state`, leaving the key absent afterwards.
	///
	/// The key is removed even when no live session was found. Backends with an atomic
	/// get-and-delete primitive should override this.
	fn take<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>> {
		Box::pin(async move {
			let found = self.find(state).await;

			self.remove(state).await?;

			found
		})
	}
}

/// Ephemeral record correlating an authorization request with its callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSession {
	/// CSRF token round-tripped through the browser; primary key of the store.
	pub state: String,
	/// Provider chosen when the attempt began.
	pub provider: ProviderId,
	/// PKCE verifier; never leaves the server.
	pub code_verifier: Secret,
	/// Redirect URI sent in the authorization request, re-sent during the code exchange.
	pub redirect_uri: Url,
	/// Instant after which the session is no longer usable.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl AuthorizationSession {
	/// Creates a session expiring `ttl` from now, saturating at the latest representable instant.
	pub fn new(
		state: impl Into<String>,
		provider: ProviderId,
		code_verifier: impl Into<Secret>,
		redirect_uri: Url,
		ttl: Duration,
	) -> Self {
		Self {
			state: state.into(),
			provider,
			code_verifier: code_verifier.into(),
			redirect_uri,
			expires_at: OffsetDateTime::now_utc().saturating_add(ttl),
		}
	}

	/// Returns true once `now` reached the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("provider", &self.provider)
			.field("code_verifier", &self.code_verifier)
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Session payload could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session(ttl: Duration) -> AuthorizationSession {
		AuthorizationSession::new(
			"state-1",
			ProviderId::new("google").expect("Provider fixture should be valid."),
			"pkce-verifier-value",
			Url::parse("https://app.test/cb").expect("Redirect fixture should parse."),
			ttl,
		)
	}

	#[test]
	fn oversized_ttl_saturates_instead_of_overflowing() {
		let session = session(Duration::MAX);

		assert!(!session.is_expired_at(OffsetDateTime::now_utc()));
	}

	#[test]
	fn expiry_is_inclusive_of_the_deadline() {
		let session = session(DEFAULT_SESSION_TTL);

		assert!(!session.is_expired_at(session.expires_at - Duration::seconds(1)));
		assert!(session.is_expired_at(session.expires_at));
	}

	#[test]
	fn debug_output_redacts_the_verifier() {
		let rendered = format!("{:?}", session(DEFAULT_SESSION_TTL));

		assert!(rendered.contains("state-1"));
		assert!(!rendered.contains("pkce-verifier-value"));
	}

	#[test]
	fn sessions_serialize_for_shared_caches() {
		let original = session(DEFAULT_SESSION_TTL);
		let payload = serde_json::to_string(&original).expect("Session should serialize.");
		let decoded: AuthorizationSession =
			serde_json::from_str(&payload).expect("Session should deserialize.");

		assert_eq!(decoded.state, original.state);
		assert_eq!(decoded.code_verifier.expose(), "pkce-verifier-value");
		assert_eq!(decoded.expires_at.unix_timestamp(), original.expires_at.unix_timestamp());
	}
}

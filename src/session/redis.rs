//! Redis-backed session store for deployments with more than one backend instance.

// crates.io
use redis::{AsyncCommands, Client, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	session::{AuthorizationSession, SessionFuture, SessionStore, StoreError},
};

/// Key namespace shared by every session entry.
pub const SESSION_KEY_PREFIX: &str = "oidc:session:";

/// [`SessionStore`] over a Redis connection manager.
///
/// Sessions are stored as JSON under `oidc:session:<state>` with a native Redis TTL, and
/// [`take`](SessionStore::take) maps onto `GETDEL`.
#[derive(Clone)]
pub struct RedisSessionStore {
	manager: ConnectionManager,
	prefix: String,
}
impl RedisSessionStore {
	/// Wraps an established connection manager.
	pub fn new(manager: ConnectionManager) -> Self {
		Self { manager, prefix: SESSION_KEY_PREFIX.into() }
	}

	/// Opens a connection manager for `redis_url`.
	pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
		let client = Client::open(redis_url).map_err(backend)?;
		let manager = ConnectionManager::new(client).await.map_err(backend)?;

		tracing::info!("Connected the Redis session store.");

		Ok(Self::new(manager))
	}

	/// Overrides the key prefix.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();

		self
	}

	fn key(&self, state: &str) -> String {
		format!("{}{state}", self.prefix)
	}
}
impl Debug for RedisSessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisSessionStore").field("prefix", &self.prefix).finish()
	}
}
impl SessionStore for RedisSessionStore {
	fn store(&self, session: AuthorizationSession, ttl: Duration) -> SessionFuture<'_, ()> {
		Box::pin(async move {
			let payload = encode(&session)?;
			let key = self.key(&session.state);
			let mut conn = self.manager.clone();

			conn.set_ex::<_, _, ()>(key, payload, ttl_secs(ttl)).await.map_err(backend)
		})
	}

	fn find<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>> {
		Box::pin(async move {
			let mut conn = self.manager.clone();
			let payload: Option<Vec<u8>> = conn.get(self.key(state)).await.map_err(backend)?;

			decode_live(payload)
		})
	}

	fn remove<'a>(&'a self, state: &'a str) -> SessionFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.manager.clone();

			conn.del::<_, ()>(self.key(state)).await.map_err(backend)
		})
	}

	fn take<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>> {
		Box::pin(async move {
			let mut conn = self.manager.clone();
			let payload: Option<Vec<u8>> = conn.get_del(self.key(state)).await.map_err(backend)?;

			decode_live(payload)
		})
	}
}

fn encode(session: &AuthorizationSession) -> Result<Vec<u8>, StoreError> {
	serde_json::to_vec(session).map_err(|e| StoreError::Serialization { message: e.to_string() })
}

// Redis expiry has second granularity, so the deadline is rechecked on read.
fn decode_live(payload: Option<Vec<u8>>) -> Result<Option<AuthorizationSession>, StoreError> {
	let Some(bytes) = payload else {
		return Ok(None);
	};
	let session: AuthorizationSession = serde_json::from_slice(&bytes)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

	if session.is_expired_at(OffsetDateTime::now_utc()) {
		return Ok(None);
	}

	Ok(Some(session))
}

fn ttl_secs(ttl: Duration) -> u64 {
	let whole = ttl.whole_seconds();
	let ceil = if ttl.subsec_nanoseconds() > 0 { whole.saturating_add(1) } else { whole };

	u64::try_from(ceil).unwrap_or_default().max(1)
}

fn backend(e: redis::RedisError) -> StoreError {
	tracing::error!(error = %e, "Redis session store operation failed.");

	StoreError::Backend { message: e.to_string() }
}

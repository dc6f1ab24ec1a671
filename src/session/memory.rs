//! Thread-safe in-memory [`SessionStore`] for single-node deployments and tests.

// self
use crate::{
	_prelude::*,
	session::{AuthorizationSession, SessionFuture, SessionStore, StoreError},
};

#[derive(Clone, Debug)]
struct Entry {
	session: AuthorizationSession,
	deadline: OffsetDateTime,
}
impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		now < self.deadline
	}
}

type SessionMap = Arc<RwLock<HashMap<String, Entry>>>;

/// Process-local session store with lazy expiry.
///
/// Expired entries are dropped when they are next looked up or by an explicit
/// [`purge_expired`](Self::purge_expired) sweep.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore(SessionMap);
impl MemorySessionStore {
	/// Number of entries currently held, including expired ones not yet swept.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no entry is held.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every expired entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.0.write();
		let before = guard.len();

		guard.retain(|_, entry| entry.is_live(now));

		before - guard.len()
	}

	/// Replaces the stored verifier for `state`; returns false when the key is absent.
	///
	/// Only meant for exercising verifier mismatches in tests.
	#[cfg(any(test, feature = "test"))]
	pub fn overwrite_verifier(&self, state: &str, verifier: &str) -> bool {
		match self.0.write().get_mut(state) {
			Some(entry) => {
				entry.session.code_verifier = verifier.into();

				true
			},
			None => false,
		}
	}

	fn store_now(
		map: &SessionMap,
		session: AuthorizationSession,
		ttl: Duration,
	) -> Result<(), StoreError> {
		let deadline = OffsetDateTime::now_utc().checked_add(ttl).ok_or_else(|| {
			StoreError::Backend { message: format!("session TTL {ttl} is out of range") }
		})?;

		map.write().insert(session.state.clone(), Entry { session, deadline });

		Ok(())
	}

	fn find_now(map: &SessionMap, state: &str) -> Option<AuthorizationSession> {
		let now = OffsetDateTime::now_utc();

		{
			let guard = map.read();

			match guard.get(state) {
				Some(entry) if entry.is_live(now) => return Some(entry.session.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		map.write().remove(state);

		None
	}

	fn take_now(map: &SessionMap, state: &str) -> Option<AuthorizationSession> {
		let now = OffsetDateTime::now_utc();

		map.write().remove(state).filter(|entry| entry.is_live(now)).map(|entry| entry.session)
	}
}
impl SessionStore for MemorySessionStore {
	fn store(&self, session: AuthorizationSession, ttl: Duration) -> SessionFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::store_now(&map, session, ttl) })
	}

	fn find<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>> {
		Box::pin(async move { Ok(Self::find_now(&self.0, state)) })
	}

	fn remove<'a>(&'a self, state: &'a str) -> SessionFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().remove(state);

			Ok(())
		})
	}

	fn take<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>> {
		Box::pin(async move { Ok(Self::take_now(&self.0, state)) })
	}
}

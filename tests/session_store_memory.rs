#![cfg(all(feature = "reqwest", feature = "test"))]

// self
use resume_oidc::{
	_preludet::*,
	session::{AuthorizationSession, DEFAULT_SESSION_TTL, MemorySessionStore, SessionStore},
};

fn session(state: &str, ttl: Duration) -> AuthorizationSession {
	AuthorizationSession::new(
		state,
		provider_id("google"),
		format!("verifier-for-{state}"),
		Url::parse("https://app.test/cb").expect("Redirect fixture should parse."),
		ttl,
	)
}

#[tokio::test]
async fn concurrent_takes_hand_out_a_session_once() {
	let store = Arc::new(MemorySessionStore::default());

	store
		.store(session("contended", DEFAULT_SESSION_TTL), DEFAULT_SESSION_TTL)
		.await
		.expect("Store should succeed.");

	let tasks = (0..16)
		.map(|_| {
			let store = store.clone();

			tokio::spawn(async move { store.take("contended").await })
		})
		.collect::<Vec<_>>();
	let mut winners = 0;

	for task in tasks {
		if task.await.expect("Task should not panic.").expect("Take should succeed.").is_some() {
			winners += 1;
		}
	}

	assert_eq!(winners, 1);
	assert!(store.is_empty());
}

#[tokio::test]
async fn independent_states_never_interfere() {
	let store = MemorySessionStore::default();

	for i in 0..8 {
		let state = format!("state-{i}");

		store
			.store(session(&state, DEFAULT_SESSION_TTL), DEFAULT_SESSION_TTL)
			.await
			.expect("Store should succeed.");
	}

	let taken = store.take("state-3").await.expect("Take should succeed.").expect("Live session.");

	assert_eq!(taken.code_verifier.expose(), "verifier-for-state-3");
	assert_eq!(store.len(), 7);
	assert!(store.find("state-4").await.expect("Find should succeed.").is_some());
}

#[tokio::test]
async fn store_ttl_bounds_the_session_even_with_a_later_deadline() {
	let store = MemorySessionStore::default();

	store
		.store(session("short", Duration::minutes(10)), Duration::milliseconds(30))
		.await
		.expect("Store should succeed.");
	tokio::time::sleep(std::time::Duration::from_millis(80)).await;

	assert_eq!(store.purge_expired(), 1);
	assert!(store.find("short").await.expect("Find should succeed.").is_none());
}

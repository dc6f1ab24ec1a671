//! OpenID Connect sign-in core for the resume backend: PKCE authorization sessions, provider
//! descriptors, and a callback state machine that consumes every `state` exactly once.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(feature = "axum")] pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod provider;
pub mod secret;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		auth::{NormalizedUserInfo, ProviderId},
		flows::{LoginError, LoginFuture, LoginOutcome, LoginStep, SignIn},
		http::ReqwestHttpClient,
		provider::ProviderRegistry,
		secret::{ClientCredentials, SecretStore, StaticSecretStore},
		session::{AuthorizationSession, MemorySessionStore, SessionFuture, SessionStore},
	};

	/// Sign-in facade type alias used by reqwest-backed integration tests.
	pub type ReqwestTestSignIn = SignIn<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Static secret store seeded with one credential pair for `secret_ref`.
	pub fn test_secret_store(
		secret_ref: &str,
		client_id: &str,
		client_secret: &str,
	) -> Arc<dyn SecretStore> {
		Arc::new(
			StaticSecretStore::default()
				.with_credentials(secret_ref, ClientCredentials::new(client_id, client_secret)),
		)
	}

	/// Login step that records every identity it receives and answers with a fixed outcome.
	#[derive(Debug, Default)]
	pub struct RecordingLoginStep {
		/// Identities passed to [`LoginStep::execute`], in call order.
		pub calls: Mutex<Vec<NormalizedUserInfo>>,
		/// When set, every call fails with [`LoginError::Rejected`].
		pub reject: bool,
	}
	impl RecordingLoginStep {
		/// Creates a login step that always rejects.
		pub fn rejecting() -> Self {
			Self { calls: Mutex::new(Vec::new()), reject: true }
		}

		/// Number of recorded invocations.
		pub fn call_count(&self) -> usize {
			self.calls.lock().len()
		}
	}
	impl LoginStep for RecordingLoginStep {
		fn execute<'a>(&'a self, info: &'a NormalizedUserInfo) -> LoginFuture<'a> {
			Box::pin(async move {
				self.calls.lock().push(info.clone());

				if self.reject {
					return Err(LoginError::Rejected { reason: "Account is disabled.".into() });
				}

				Ok(LoginOutcome::new(
					format!("user-{}", info.provider_user_id),
					vec!["ROLE_USER".to_owned()],
				))
			})
		}
	}

	/// In-memory session store wrapper that counts removals per key.
	#[derive(Debug, Default)]
	pub struct CountingSessionStore {
		/// Backing store.
		pub inner: MemorySessionStore,
		removals: AtomicUsize,
	}
	impl CountingSessionStore {
		/// Total number of `remove` calls observed.
		pub fn removals(&self) -> usize {
			self.removals.load(Ordering::SeqCst)
		}
	}
	impl SessionStore for CountingSessionStore {
		fn store(&self, session: AuthorizationSession, ttl: Duration) -> SessionFuture<'_, ()> {
			self.inner.store(session, ttl)
		}

		fn find<'a>(&'a self, state: &'a str) -> SessionFuture<'a, Option<AuthorizationSession>> {
			self.inner.find(state)
		}

		fn remove<'a>(&'a self, state: &'a str) -> SessionFuture<'a, ()> {
			self.removals.fetch_add(1, Ordering::SeqCst);

			self.inner.remove(state)
		}
	}

	/// Constructs a [`SignIn`] backed by the provided registry, an in-memory session store,
	/// static credentials, and the reqwest transport used across integration tests.
	pub fn build_reqwest_test_sign_in(
		registry: ProviderRegistry,
		secrets: Arc<dyn SecretStore>,
		login: Arc<dyn LoginStep>,
	) -> (ReqwestTestSignIn, Arc<CountingSessionStore>) {
		let store_backend = Arc::new(CountingSessionStore::default());
		let store: Arc<dyn SessionStore> = store_backend.clone();
		let sign_in =
			SignIn::with_http_client(registry, store, secrets, login, test_reqwest_http_client());

		(sign_in, store_backend)
	}

	/// Parses a provider identifier fixture.
	pub fn provider_id(value: &str) -> ProviderId {
		ProviderId::new(value).expect("Provider identifier fixture should be valid.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))]
use {color_eyre as _, httpmock as _, tower as _, tracing_subscriber as _};

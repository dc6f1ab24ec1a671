//! Serves the sign-in endpoints from a TOML configuration with an in-memory account directory.
//!
//! ```sh
//! RESUME_OIDC_GOOGLE_CLIENT_ID=... RESUME_OIDC_GOOGLE_CLIENT_SECRET=... \
//!     cargo run --example serve --features axum -- demos/serve.toml
//! ```
//!
//! Accounts are keyed by provider and subject. An email already owned by an account from a
//! different provider is refused with [`LoginError::AccountConflict`].

// std
use std::{collections::HashMap, env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
// self
use resume_oidc::{
	api::{self, ApiState, RedirectTargets},
	auth::NormalizedUserInfo,
	config::SignInConfig,
	flows::{LoginError, LoginFuture, LoginOutcome, LoginStep},
	session::{MemorySessionStore, SessionStore},
};

#[derive(Debug, Default)]
struct InMemoryDirectory {
	accounts: Mutex<Directory>,
}

#[derive(Debug, Default)]
struct Directory {
	by_subject: HashMap<(String, String), String>,
	by_email: HashMap<String, (String, String)>,
}

impl LoginStep for InMemoryDirectory {
	fn execute<'a>(&'a self, info: &'a NormalizedUserInfo) -> LoginFuture<'a> {
		Box::pin(async move {
			let mut directory = self.accounts.lock();
			let subject = (info.provider.to_string(), info.provider_user_id.clone());

			if let Some(user_id) = directory.by_subject.get(&subject) {
				return Ok(LoginOutcome::new(user_id.clone(), ["ROLE_USER"]));
			}
			if let Some(email) = &info.email {
				if let Some((provider, _)) = directory.by_email.get(email) {
					return Err(LoginError::AccountConflict { existing_provider: provider.clone() });
				}

				directory.by_email.insert(email.clone(), subject.clone());
			}

			let user_id = format!("user-{}", directory.by_subject.len() + 1);

			directory.by_subject.insert(subject, user_id.clone());

			tracing::info!(user_id = %user_id, username = %info.username, "Provisioned a new account.");

			Ok(LoginOutcome::new(user_id, ["ROLE_USER"]))
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let path = env::args().nth(1).unwrap_or_else(|| "demos/serve.toml".into());
	let config = SignInConfig::from_path(&path)?;
	let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
	let sign_in = config.sign_in(store, Arc::new(InMemoryDirectory::default()))?;

	if sign_in.registry.is_empty() {
		return Err(eyre!("No provider is configured in {path}."));
	}

	let app = api::router(ApiState::new(sign_in, RedirectTargets::from(&config)));
	let listener = TcpListener::bind("127.0.0.1:8080").await?;

	tracing::info!(addr = %listener.local_addr()?, "Serving sign-in endpoints.");

	axum::serve(listener, app).await?;

	Ok(())
}

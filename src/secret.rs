//! Client credential lookup keyed by a descriptor's named secret reference.

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::{Secret, SecretRef},
};

/// Boxed future returned by [`SecretStore`] lookups.
pub type SecretFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ClientCredentials, SecretError>> + 'a + Send>>;

/// External secret store contract.
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Returns the client credentials registered under `secret_ref`.
	fn client_credentials<'a>(&'a self, secret_ref: &'a SecretRef) -> SecretFuture<'a>;
}

/// OAuth client identifier and secret issued by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// Public client identifier placed in the authorization URL.
	pub client_id: String,
	/// Confidential secret sent only to the token endpoint.
	pub client_secret: Secret,
}
impl ClientCredentials {
	/// Pairs a client identifier with its secret.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<Secret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into() }
	}
}

/// Failures raised while resolving client credentials.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SecretError {
	/// No credentials are registered under the reference.
	#[error("No client credentials are registered for `{secret_ref}`.")]
	Missing {
		/// Reference that was looked up.
		secret_ref: String,
	},
	/// The backing store could not be queried.
	#[error("Secret store is unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
}
impl SecretError {
	fn missing(secret_ref: &SecretRef) -> Self {
		Self::Missing { secret_ref: secret_ref.to_string() }
	}
}

/// Fixed map of credentials, typically loaded from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticSecretStore(HashMap<String, ClientCredentials>);
impl StaticSecretStore {
	/// Registers credentials under `secret_ref`, replacing any previous entry.
	pub fn insert(&mut self, secret_ref: impl Into<String>, credentials: ClientCredentials) {
		self.0.insert(secret_ref.into(), credentials);
	}

	/// Builder-style variant of [`insert`](Self::insert).
	pub fn with_credentials(
		mut self,
		secret_ref: impl Into<String>,
		credentials: ClientCredentials,
	) -> Self {
		self.insert(secret_ref, credentials);

		self
	}

	/// Number of registered references.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no credentials are registered.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl SecretStore for StaticSecretStore {
	fn client_credentials<'a>(&'a self, secret_ref: &'a SecretRef) -> SecretFuture<'a> {
		let found = self.0.get(secret_ref.as_ref()).cloned();

		Box::pin(async move { found.ok_or_else(|| SecretError::missing(secret_ref)) })
	}
}

/// Reads `<PREFIX><REF>_CLIENT_ID` and `<PREFIX><REF>_CLIENT_SECRET` from the environment.
///
/// The reference is upper-cased and `-`/`.` become `_`, so `google-work` reads
/// `GOOGLE_WORK_CLIENT_ID`.
#[derive(Clone, Debug, Default)]
pub struct EnvSecretStore {
	prefix: String,
}
impl EnvSecretStore {
	/// Uses `prefix` in front of every variable name.
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}

	/// Environment variable names consulted for `secret_ref`.
	pub fn variable_names(&self, secret_ref: &SecretRef) -> (String, String) {
		let stem = secret_ref
			.chars()
			.map(|c| match c {
				'-' | '.' => '_',
				c => c.to_ascii_uppercase(),
			})
			.collect::<String>();

		(
			format!("{}{stem}_CLIENT_ID", self.prefix),
			format!("{}{stem}_CLIENT_SECRET", self.prefix),
		)
	}
}
impl SecretStore for EnvSecretStore {
	fn client_credentials<'a>(&'a self, secret_ref: &'a SecretRef) -> SecretFuture<'a> {
		let (id_var, secret_var) = self.variable_names(secret_ref);
		let found = match (env::var(&id_var), env::var(&secret_var)) {
			(Ok(id), Ok(secret)) if !id.is_empty() =>
				Ok(ClientCredentials::new(id, Secret::new(secret))),
			_ => Err(SecretError::missing(secret_ref)),
		};

		Box::pin(async move { found })
	}
}

/// Consults each layer in order; the first layer holding the reference wins.
///
/// `Unavailable` errors stop the lookup instead of falling through.
#[derive(Clone, Default)]
pub struct LayeredSecretStore(Vec<Arc<dyn SecretStore>>);
impl LayeredSecretStore {
	/// Appends a lower-priority layer.
	pub fn push(mut self, layer: Arc<dyn SecretStore>) -> Self {
		self.0.push(layer);

		self
	}
}
impl Debug for LayeredSecretStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LayeredSecretStore").field("layers", &self.0.len()).finish()
	}
}
impl SecretStore for LayeredSecretStore {
	fn client_credentials<'a>(&'a self, secret_ref: &'a SecretRef) -> SecretFuture<'a> {
		Box::pin(async move {
			for layer in &self.0 {
				match layer.client_credentials(secret_ref).await {
					Err(SecretError::Missing { .. }) => continue,
					other => return other,
				}
			}

			Err(SecretError::missing(secret_ref))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn secret_ref(value: &str) -> SecretRef {
		SecretRef::new(value).expect("Secret ref fixture should be valid.")
	}

	#[tokio::test]
	async fn static_store_returns_registered_credentials() {
		let store = StaticSecretStore::default()
			.with_credentials("google", ClientCredentials::new("client", "shh"));
		let credentials = store
			.client_credentials(&secret_ref("google"))
			.await
			.expect("Registered credentials should resolve.");

		assert_eq!(credentials.client_id, "client");
		assert_eq!(credentials.client_secret.expose(), "shh");

		let err = store
			.client_credentials(&secret_ref("github"))
			.await
			.expect_err("Unknown references must fail.");

		assert_eq!(err, SecretError::Missing { secret_ref: "github".into() });
	}

	#[test]
	fn env_variable_names_are_normalized() {
		let store = EnvSecretStore::with_prefix("RESUME_");

		assert_eq!(
			store.variable_names(&secret_ref("google-work")),
			("RESUME_GOOGLE_WORK_CLIENT_ID".into(), "RESUME_GOOGLE_WORK_CLIENT_SECRET".into())
		);
	}

	#[tokio::test]
	async fn env_store_misses_unset_variables() {
		let store = EnvSecretStore::with_prefix("RESUME_OIDC_TEST_UNSET_");
		let err = store
			.client_credentials(&secret_ref("nobody"))
			.await
			.expect_err("Unset variables must be reported as missing.");

		assert!(matches!(err, SecretError::Missing { .. }));
	}

	#[tokio::test]
	async fn layered_store_falls_through_missing_layers() {
		let empty: Arc<dyn SecretStore> = Arc::new(StaticSecretStore::default());
		let seeded: Arc<dyn SecretStore> = Arc::new(
			StaticSecretStore::default()
				.with_credentials("github", ClientCredentials::new("gh", "gh-secret")),
		);
		let layered = LayeredSecretStore::default().push(empty).push(seeded);
		let credentials = layered
			.client_credentials(&secret_ref("github"))
			.await
			.expect("Second layer should answer.");

		assert_eq!(credentials.client_id, "gh");
		assert!(layered.client_credentials(&secret_ref("google")).await.is_err());
	}
}

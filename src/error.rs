//! Configuration-time error types shared across providers, stores, and the initiator.
//!
//! Callback-time failures are deliberately absent here: the callback path reports them as
//! [`crate::flows::CallbackResult::Failure`] values instead of propagating errors.

// std
use std::path::PathBuf;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::session::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Client credential lookup failure.
	#[error(transparent)]
	Secret(#[from] crate::secret::SecretError),
}

/// Configuration and validation failures raised while wiring or initiating sign-in.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Requested provider is not registered.
	#[error("Provider `{provider}` is not configured.")]
	UnknownProvider {
		/// Provider identifier as supplied by the caller.
		provider: String,
	},
	/// Two registered providers share the same identifier.
	#[error("Provider `{provider}` is registered more than once.")]
	DuplicateProvider {
		/// Conflicting provider identifier.
		provider: String,
	},
	/// A configured provider entry is inconsistent.
	#[error("Provider `{provider}` is misconfigured: {reason}.")]
	InvalidProvider {
		/// Provider identifier (or preset name) of the entry.
		provider: String,
		/// What is wrong with the entry.
		reason: &'static str,
	},
	/// A scalar setting is out of range.
	#[error("Setting `{setting}` is invalid: {reason}.")]
	InvalidSetting {
		/// Dotted setting path.
		setting: &'static str,
		/// What is wrong with the value.
		reason: &'static str,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Provider identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Endpoint URL cannot be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Scope list failed validation.
	#[error(transparent)]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration document could not be read.
	#[error("Failed to read configuration from {}.", path.display())]
	Read {
		/// Path that was being read.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration document is not valid TOML for [`crate::config::SignInConfig`].
	#[error("Configuration is malformed.")]
	Parse {
		/// Underlying deserialization failure.
		#[source]
		source: toml::de::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unknown_provider_is_a_config_error() {
		let err: Error = ConfigError::UnknownProvider { provider: "myspace".into() }.into();

		assert!(matches!(err, Error::Config(ConfigError::UnknownProvider { .. })));
		assert_eq!(err.to_string(), "Provider `myspace` is not configured.");
	}

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error =
			crate::session::StoreError::Backend { message: "cache unreachable".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("cache unreachable"));

		let source = StdError::source(&err)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}

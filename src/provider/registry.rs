//! Resolves provider identifiers to registered descriptor + strategy pairs.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	error::ConfigError,
	provider::{ProviderDescriptor, ProviderStrategy},
};

/// Descriptor paired with the strategy that implements its hooks.
#[derive(Clone)]
pub struct RegisteredProvider {
	/// Static provider metadata.
	pub descriptor: ProviderDescriptor,
	/// Provider-specific request shaping and user-info normalization.
	pub strategy: Arc<dyn ProviderStrategy>,
}
impl RegisteredProvider {
	/// Pairs a descriptor with its strategy.
	pub fn new(descriptor: ProviderDescriptor, strategy: Arc<dyn ProviderStrategy>) -> Self {
		Self { descriptor, strategy }
	}

	/// Identifier of the underlying descriptor.
	pub fn id(&self) -> &ProviderId {
		&self.descriptor.id
	}
}
impl Debug for RegisteredProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RegisteredProvider").field("descriptor", &self.descriptor).finish()
	}
}

/// Immutable-after-startup lookup table of configured providers.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
	providers: HashMap<ProviderId, Arc<RegisteredProvider>>,
}
impl ProviderRegistry {
	/// Registers a provider, rejecting duplicate identifiers.
	pub fn register(&mut self, provider: RegisteredProvider) -> Result<(), ConfigError> {
		let id = provider.id().clone();

		if self.providers.contains_key(&id) {
			return Err(ConfigError::DuplicateProvider { provider: id.to_string() });
		}

		self.providers.insert(id, Arc::new(provider));

		Ok(())
	}

	/// Builder-style variant of [`register`](Self::register).
	pub fn with(mut self, provider: RegisteredProvider) -> Result<Self, ConfigError> {
		self.register(provider)?;

		Ok(self)
	}

	/// Resolves a provider identifier as received from a request.
	pub fn resolve(&self, provider: &str) -> Result<Arc<RegisteredProvider>, ConfigError> {
		self.providers
			.get(provider)
			.cloned()
			.ok_or_else(|| ConfigError::UnknownProvider { provider: provider.to_owned() })
	}

	/// Registered identifiers in lexical order.
	pub fn ids(&self) -> Vec<&ProviderId> {
		let mut ids = self.providers.keys().collect::<Vec<_>>();

		ids.sort();

		ids
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.providers.len()
	}

	/// Returns true when no provider is registered.
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

//! Name-keyed registry of provider factories.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	provider::{Provider, ProviderError},
};

/// Builds a provider for one server definition.
pub type ProviderFactory =
	Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Inputs handed to a [`ProviderFactory`].
#[derive(Clone, Debug)]
pub struct ProviderConfig {
	/// Version recorded on the server, or `None` for the newest.
	pub version: Option<i32>,
	/// Provider-specific options from the server definition.
	pub options: BTreeMap<String, String>,
	/// Clock used to turn relative lifetimes into expiry instants.
	pub clock: Arc<dyn Clock>,
}

/// Registry mapping provider names to factories.
#[derive(Default)]
pub struct ProviderRegistry {
	factories: RwLock<BTreeMap<String, ProviderFactory>>,
}
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry preloaded with the built-in `basic` provider.
	#[cfg(feature = "reqwest")]
	pub fn with_defaults() -> Self {
		let registry = Self::new();

		registry.register(crate::provider::basic::NAME, crate::provider::BasicProvider::create);

		registry
	}

	/// Registers (or replaces) the factory for `name`.
	pub fn register<F>(&self, name: impl Into<String>, factory: F)
	where
		F: 'static + Fn(&ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync,
	{
		self.factories.write().insert(name.into(), Arc::new(factory));
	}

	/// Registered provider names in lexical order.
	pub fn names(&self) -> Vec<String> {
		self.factories.read().keys().cloned().collect()
	}

	/// Instantiates the provider registered as `name`.
	pub fn create(&self, name: &str, config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
		let factory = self
			.factories
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| Error::UnknownProvider { name: name.to_owned() })?;

		Ok(factory(config)?)
	}
}
impl Debug for ProviderRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRegistry").field("providers", &self.names()).finish()
	}
}

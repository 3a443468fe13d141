//! The credential lifecycle backend: storage, providers, clock, and background loops.
//!
//! [`Backend`] is a cheap, clonable handle. Request-path operations live in the `impl Backend`
//! blocks of [`crate::flows`] and of this module's children; the background loops in
//! [`crate::scheduler`] drive the same entry points.

pub mod client_creds;
pub mod config;
pub mod creds;
pub mod servers;
pub mod sts;
pub mod views;

pub use client_creds::*;
pub use creds::*;
pub use servers::*;
pub use views::*;

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	entry::{EntryStore, KeyDeriver, Tuning},
	provider::ProviderRegistry,
	scheduler::{DEFAULT_WORKER_CONCURRENCY, Scheduler},
	store::{DEFAULT_LOCK_SLOTS, Storage},
};

/// Builder for [`Backend`].
pub struct BackendOptions {
	storage: Arc<dyn Storage>,
	registry: Option<Arc<ProviderRegistry>>,
	clock: Arc<dyn Clock>,
	lock_slots: usize,
	worker_concurrency: usize,
	key_salt: Vec<u8>,
}
impl BackendOptions {
	/// Starts from `storage` with the system clock, the built-in providers, and default sizing.
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self {
			storage,
			registry: None,
			clock: Arc::new(SystemClock),
			lock_slots: DEFAULT_LOCK_SLOTS,
			worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
			key_salt: Vec::new(),
		}
	}

	/// Replaces the provider registry.
	pub fn with_registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
		self.registry = Some(registry);

		self
	}

	/// Replaces the clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Sets the number of lock slots per entry kind.
	pub fn with_lock_slots(mut self, lock_slots: usize) -> Self {
		self.lock_slots = lock_slots;

		self
	}

	/// Sets how many credentials the background loops process at once.
	pub fn with_worker_concurrency(mut self, worker_concurrency: usize) -> Self {
		self.worker_concurrency = worker_concurrency;

		self
	}

	/// Mixes `salt` into every storage key. Changing it orphans existing entries.
	pub fn with_key_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
		self.key_salt = salt.into();

		self
	}

	/// Builds a stopped backend; call [`Backend::initialize`] to start the background loops.
	pub fn build(self) -> Backend {
		let registry = self.registry.unwrap_or_else(|| Arc::new(default_registry()));

		Backend {
			inner: Arc::new(BackendInner {
				store: EntryStore::new(self.storage, KeyDeriver::new(self.key_salt), self.lock_slots),
				registry,
				clock: self.clock,
				scheduler: Scheduler::new(self.worker_concurrency),
				config_lock: AsyncMutex::new(()),
			}),
		}
	}
}
impl Debug for BackendOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BackendOptions")
			.field("clock", &self.clock)
			.field("lock_slots", &self.lock_slots)
			.field("worker_concurrency", &self.worker_concurrency)
			.field("key_salted", &!self.key_salt.is_empty())
			.finish()
	}
}

/// Credential lifecycle manager.
#[derive(Clone)]
pub struct Backend {
	inner: Arc<BackendInner>,
}
impl Backend {
	/// Starts (or restarts) the background loops and returns their generation.
	///
	/// Must be called from within a Tokio runtime.
	pub fn initialize(&self) -> u64 {
		self.inner.scheduler.restart(self)
	}

	/// Stops the background loops and waits for them to exit.
	///
	/// Work already handed to the worker pool keeps running to completion.
	pub async fn shutdown(&self) {
		for handle in self.inner.scheduler.stop() {
			if let Err(e) = handle.await {
				tracing::warn!(error = %e, "background loop ended abnormally");
			}
		}
	}

	/// Typed entry storage.
	pub fn store(&self) -> &EntryStore {
		&self.inner.store
	}

	/// Clock every time decision is made with.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.inner.clock
	}

	/// Provider factories.
	pub fn registry(&self) -> &ProviderRegistry {
		&self.inner.registry
	}

	/// Background loop owner.
	pub fn scheduler(&self) -> &Scheduler {
		&self.inner.scheduler
	}

	/// Current tuning; defaults when no configuration was written.
	pub(crate) async fn tuning(&self) -> Result<Tuning> {
		Ok(self.store().read_config().await?.map(|config| config.tuning).unwrap_or_default())
	}
}
impl Debug for Backend {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Backend")
			.field("store", &self.inner.store)
			.field("registry", &self.inner.registry)
			.field("clock", &self.inner.clock)
			.field("generation", &self.inner.scheduler.generation())
			.finish()
	}
}

struct BackendInner {
	store: EntryStore,
	registry: Arc<ProviderRegistry>,
	clock: Arc<dyn Clock>,
	scheduler: Scheduler,
	config_lock: AsyncMutex<()>,
}

#[cfg(feature = "reqwest")]
fn default_registry() -> ProviderRegistry {
	ProviderRegistry::with_defaults()
}

#[cfg(not(feature = "reqwest"))]
fn default_registry() -> ProviderRegistry {
	ProviderRegistry::new()
}

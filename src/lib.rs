//! OAuth 2.0 credential lifecycle engine: locked per-credential storage, proactive refresh,
//! RFC 8693 exchange caching, and policy-driven reaping, all driven by an injectable clock.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod backend;
pub mod clock;
pub mod entry;
pub mod error;
pub mod flows;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
pub mod provider;
pub mod reap;
pub mod scheduler;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::{_prelude::*, clock::Clock};

	// crates.io
	use time::macros::datetime;
	// self
	use crate::{
		auth::{CredentialName, ServerName},
		backend::{Backend, BackendOptions, ServerWrite},
		clock::ManualClock,
		entry::{AuthCodeEntry, ConfigEntry, Tuning},
		provider::{MockProvider, ProviderRegistry},
		store::MemoryStorage,
	};

	/// Instant every [`TestBackend`] clock starts at.
	pub const TEST_START: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
	/// Name the mock provider is registered under.
	pub const MOCK_PROVIDER: &str = "mock";

	/// Backend over in-memory storage, a manual clock, and a scriptable provider.
	#[derive(Debug)]
	pub struct TestBackend {
		/// Backend under test.
		pub backend: Backend,
		/// Clock driving every time decision.
		pub clock: ManualClock,
		/// Provider registered as [`MOCK_PROVIDER`].
		pub provider: MockProvider,
		/// Raw storage behind the backend.
		pub storage: MemoryStorage,
	}
	impl TestBackend {
		/// Builds a harness around a default [`MockProvider`].
		pub fn new() -> Self {
			Self::with_provider(MockProvider::new())
		}

		/// Builds a harness around `provider`.
		pub fn with_provider(provider: MockProvider) -> Self {
			let clock = ManualClock::new(TEST_START);
			let storage = MemoryStorage::default();
			let registry = ProviderRegistry::new();

			registry.register(MOCK_PROVIDER, provider.factory());

			let backend = BackendOptions::new(Arc::new(storage.clone()))
				.with_registry(Arc::new(registry))
				.with_clock(Arc::new(clock.clone()))
				.build();

			Self { backend, clock, provider, storage }
		}

		/// Default tuning without the provider timeout, whose timers would otherwise show up
		/// on the manual clock.
		pub fn tuning() -> Tuning {
			Tuning { provider_timeout_seconds: 0, ..Default::default() }
		}

		/// Writes `tuning` as the backend configuration, restarting the loops.
		pub async fn configure(&self, tuning: Tuning) -> u64 {
			self.backend
				.write_config(ConfigEntry { default_server: None, tuning })
				.await
				.expect("Failed to write test configuration.")
		}

		/// Registers a server named `name` backed by the mock provider.
		pub async fn add_server(&self, name: &str) -> ServerName {
			let name = server_name(name);
			let request = ServerWrite {
				client_id: "client".into(),
				provider: MOCK_PROVIDER.into(),
				..Default::default()
			};

			self.backend
				.write_server(name.clone(), request)
				.await
				.expect("Failed to write test server.");

			name
		}

		/// Stores `entry` directly, bypassing every flow.
		pub async fn put_auth_code(&self, entry: &AuthCodeEntry) {
			let key = self.backend.store().key::<AuthCodeEntry>(&entry.name);

			self.backend
				.store()
				.lock::<AuthCodeEntry>(&key)
				.await
				.write(entry)
				.await
				.expect("Failed to store test credential.");
		}

		/// Reads credential `name` without refreshing it.
		pub async fn auth_code(&self, name: &CredentialName) -> Option<AuthCodeEntry> {
			let key = self.backend.store().key::<AuthCodeEntry>(name);

			self.backend
				.store()
				.read::<AuthCodeEntry>(&key)
				.await
				.expect("Failed to read test credential.")
		}
	}
	impl Default for TestBackend {
		fn default() -> Self {
			Self::new()
		}
	}

	/// Parses a server name fixture.
	pub fn server_name(name: &str) -> ServerName {
		ServerName::new(name).expect("Server fixture name should be valid.")
	}

	/// Parses a credential name fixture.
	pub fn credential_name(name: &str) -> CredentialName {
		CredentialName::new(name).expect("Credential fixture name should be valid.")
	}

	/// Yields to the runtime until `condition` holds, failing after a bounded number of turns.
	pub async fn eventually<F>(mut condition: F)
	where
		F: FnMut() -> bool,
	{
		for _ in 0..10_000 {
			if condition() {
				return;
			}

			tokio::task::yield_now().await;
		}

		panic!("Condition should hold eventually.");
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

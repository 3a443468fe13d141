//! Backend configuration: read, validated write, delete. Writes restart the background loops.

// self
use crate::{_prelude::*, backend::Backend, entry::ConfigEntry};

impl Backend {
	/// Reads the stored configuration.
	pub async fn read_config(&self) -> Result<Option<ConfigEntry>> {
		self.store().read_config().await
	}

	/// Validates and stores `config`, then restarts the background loops with it.
	///
	/// Returns the generation of the new loops.
	pub async fn write_config(&self, config: ConfigEntry) -> Result<u64> {
		config.tuning.validate()?;

		let _guard = self.inner.config_lock.lock().await;

		self.store().write_config(&config).await?;

		Ok(self.initialize())
	}

	/// Removes the stored configuration, falling back to defaults, and restarts the loops.
	pub async fn delete_config(&self) -> Result<u64> {
		let _guard = self.inner.config_lock.lock().await;

		self.store().delete_config().await?;

		Ok(self.initialize())
	}
}

//! Typed entries, key derivation, and the locked read/write discipline over [`Storage`].
//!
//! Every mutation of a named entry happens through [`Locked`], which holds the entry kind's
//! lock slot for the key. Reads may bypass the lock and observe the last committed value.

pub mod auth_code;
pub mod client_creds;
pub mod config;
pub mod keys;
pub mod server;

pub use auth_code::*;
pub use client_creds::*;
pub use config::*;
pub use keys::*;
pub use server::*;

// std
use std::marker::PhantomData;
// crates.io
use async_lock::MutexGuard as AsyncMutexGuard;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::ErrorKind,
	store::{LockTable, Storage, StoreError},
};

/// Classified failure recorded on an entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryError {
	/// Who has to act to clear the failure.
	pub kind: ErrorKind,
	/// Human-readable message.
	pub message: String,
}
impl EntryError {
	/// Creates a new classified failure.
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into() }
	}
}

/// A named, persisted record.
pub trait Entry
where
	Self: 'static + Send + Sync + Serialize + DeserializeOwned,
{
	/// Kind used to pick the key prefix and lock table.
	const KIND: EntryKind;

	/// Name the entry was created under.
	fn name(&self) -> &str;

	/// Migrates fields written by older releases. Runs right after decoding.
	fn upgrade(&mut self) {}
}

/// Typed access to entries on top of host storage.
pub struct EntryStore {
	storage: Arc<dyn Storage>,
	keys: KeyDeriver,
	server_locks: LockTable,
	auth_code_locks: LockTable,
	client_creds_locks: LockTable,
}
impl EntryStore {
	/// Creates a store with one lock table of `lock_slots` slots per entry kind.
	pub fn new(storage: Arc<dyn Storage>, keys: KeyDeriver, lock_slots: usize) -> Self {
		Self {
			storage,
			keys,
			server_locks: LockTable::new(lock_slots),
			auth_code_locks: LockTable::new(lock_slots),
			client_creds_locks: LockTable::new(lock_slots),
		}
	}

	/// Underlying host storage.
	pub fn storage(&self) -> &Arc<dyn Storage> {
		&self.storage
	}

	/// Key deriver shared by every entry kind.
	pub fn keys(&self) -> &KeyDeriver {
		&self.keys
	}

	/// Storage key of the entry `name` of kind `E`.
	pub fn key<E>(&self, name: &str) -> EntryKey
	where
		E: Entry,
	{
		self.keys.derive(E::KIND, name)
	}

	/// Reads an entry without taking its lock.
	///
	/// Fails with [`Error::KeyMismatch`] when the stored entry names a different key.
	pub async fn read<E>(&self, key: &EntryKey) -> Result<Option<E>>
	where
		E: Entry,
	{
		let Some(bytes) = self.storage.get(key.as_str()).await? else { return Ok(None) };
		let mut entry: E = serde_json::from_slice(&bytes).map_err(StoreError::from)?;

		entry.upgrade();
		self.check_key(key, &entry)?;

		Ok(Some(entry))
	}

	/// Acquires the lock guarding `key` for a read-modify-write sequence.
	pub async fn lock<E>(&self, key: &EntryKey) -> Locked<'_, E>
	where
		E: Entry,
	{
		let guard = self.locks(E::KIND).lock(key.as_str()).await;

		Locked { store: self, key: key.clone(), _guard: guard, _entry: PhantomData }
	}

	/// Snapshot of every key of kind `E`.
	///
	/// Entries added or removed while the snapshot is consumed may or may not be included.
	pub async fn list_keys<E>(&self) -> Result<Vec<EntryKey>>
	where
		E: Entry,
	{
		let raw = self.storage.list(E::KIND.prefix()).await?;

		Ok(raw.into_iter().filter_map(|path| EntryKey::from_storage(E::KIND, path)).collect())
	}

	/// Reads the backend configuration, if one was written.
	pub async fn read_config(&self) -> Result<Option<ConfigEntry>> {
		let Some(bytes) = self.storage.get(CONFIG_KEY).await? else { return Ok(None) };

		Ok(Some(serde_json::from_slice(&bytes).map_err(StoreError::from)?))
	}

	pub(crate) async fn write_config(&self, config: &ConfigEntry) -> Result<()> {
		let bytes = serde_json::to_vec(config).map_err(StoreError::from)?;

		self.storage.put(CONFIG_KEY, bytes).await?;

		Ok(())
	}

	pub(crate) async fn delete_config(&self) -> Result<()> {
		Ok(self.storage.delete(CONFIG_KEY).await?)
	}

	fn locks(&self, kind: EntryKind) -> &LockTable {
		match kind {
			EntryKind::Server => &self.server_locks,
			EntryKind::AuthCode => &self.auth_code_locks,
			EntryKind::ClientCreds => &self.client_creds_locks,
		}
	}

	fn check_key<E>(&self, key: &EntryKey, entry: &E) -> Result<()>
	where
		E: Entry,
	{
		if self.keys.derive(E::KIND, entry.name()) != *key {
			return Err(Error::KeyMismatch { key: key.to_string(), name: entry.name().to_owned() });
		}

		Ok(())
	}
}
impl Debug for EntryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EntryStore")
			.field("keys", &self.keys)
			.field("lock_slots", &self.server_locks.len())
			.finish()
	}
}

/// Exclusive handle on one entry key; the lock is released on drop.
pub struct Locked<'a, E> {
	store: &'a EntryStore,
	key: EntryKey,
	_guard: AsyncMutexGuard<'a, ()>,
	_entry: PhantomData<fn() -> E>,
}
impl<E> Locked<'_, E>
where
	E: Entry,
{
	/// Key held by this handle.
	pub fn key(&self) -> &EntryKey {
		&self.key
	}

	/// Reads the current entry.
	pub async fn read(&self) -> Result<Option<E>> {
		self.store.read(&self.key).await
	}

	/// Replaces the entry.
	///
	/// Fails with [`Error::KeyMismatch`] when the entry's name does not derive to this key.
	pub async fn write(&self, entry: &E) -> Result<()> {
		self.store.check_key(&self.key, entry)?;

		let bytes = serde_json::to_vec(entry).map_err(StoreError::from)?;

		self.store.storage.put(self.key.as_str(), bytes).await?;

		Ok(())
	}

	/// Removes the entry. Removing a missing entry succeeds.
	pub async fn delete(&self) -> Result<()> {
		Ok(self.store.storage.delete(self.key.as_str()).await?)
	}
}
impl<E> Debug for Locked<'_, E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Locked").field(&self.key).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{CredentialName, ServerName},
		store::MemoryStorage,
	};

	fn store() -> (EntryStore, MemoryStorage) {
		let storage = MemoryStorage::default();

		(EntryStore::new(Arc::new(storage.clone()), KeyDeriver::default(), 8), storage)
	}

	fn server(name: &str) -> ServerEntry {
		ServerEntry::new(
			ServerName::new(name).expect("Server fixture name should be valid."),
			"client-id",
			"mock",
		)
	}

	#[tokio::test]
	async fn locked_write_then_read_round_trips() {
		let (store, _) = store();
		let key = store.key::<ServerEntry>("corp");

		store.lock::<ServerEntry>(&key).await.write(&server("corp")).await.expect("Write should succeed.");

		let read = store
			.read::<ServerEntry>(&key)
			.await
			.expect("Read should succeed.")
			.expect("Entry should exist after write.");

		assert_eq!(read.name.as_str(), "corp");
		assert_eq!(store.list_keys::<ServerEntry>().await.expect("List should succeed."), vec![key]);
	}

	#[tokio::test]
	async fn writes_under_a_foreign_key_are_rejected() {
		let (store, _) = store();
		let key = store.key::<ServerEntry>("corp");
		let err = store
			.lock::<ServerEntry>(&key)
			.await
			.write(&server("other"))
			.await
			.expect_err("Writing a mismatched entry should fail.");

		assert!(matches!(err, Error::KeyMismatch { .. }));
	}

	#[tokio::test]
	async fn reads_detect_entries_moved_between_keys() {
		let (store, storage) = store();
		let key = store.key::<ServerEntry>("corp");
		let foreign = serde_json::to_vec(&server("other")).expect("Fixture should serialize.");

		storage.put(key.as_str(), foreign).await.expect("Raw put should succeed.");

		let err = store.read::<ServerEntry>(&key).await.expect_err("Mismatched read should fail.");

		assert!(matches!(err, Error::KeyMismatch { ref name, .. } if name == "other"));
	}

	#[tokio::test]
	async fn list_keys_ignores_other_kinds() {
		let (store, _) = store();
		let creds_key = store.key::<AuthCodeEntry>("ci");
		let entry = AuthCodeEntry::new(
			CredentialName::new("ci").expect("Credential fixture name should be valid."),
			ServerName::new("corp").expect("Server fixture name should be valid."),
		);

		store.lock::<AuthCodeEntry>(&creds_key).await.write(&entry).await.expect("Write should succeed.");

		assert!(store.list_keys::<ServerEntry>().await.expect("List should succeed.").is_empty());
		assert_eq!(
			store.list_keys::<AuthCodeEntry>().await.expect("List should succeed."),
			vec![creds_key]
		);
	}
}

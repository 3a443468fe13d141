//! Raw key/value storage contract, built-in backends, and the per-key lock table.
//!
//! Values are opaque bytes; typed entries, key derivation, and lock discipline live in
//! [`crate::entry`].

pub mod file;
pub mod locks;
pub mod memory;

pub use file::FileStorage;
pub use locks::{DEFAULT_LOCK_SLOTS, LockTable};
pub use memory::MemoryStorage;

// self
use crate::_prelude::*;

/// Boxed future returned by [`Storage`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Host-provided key/value storage.
///
/// Implementations only need single-key atomicity; cross-key consistency is provided by the
/// lock table layered on top.
pub trait Storage
where
	Self: Send + Sync,
{
	/// Fetches the value stored at `key`, if any.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>>;

	/// Stores `value` at `key`, replacing any previous value.
	fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()>;

	/// Removes `key`. Deleting a missing key succeeds.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Lists every stored key starting with `prefix`, in lexical order.
	///
	/// The listing is a snapshot; keys written or deleted concurrently may or may not appear.
	fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>>;
}

/// Error type produced by [`Storage`] implementations and entry codecs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Entry could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl From<serde_json::Error> for StoreError {
	fn from(e: serde_json::Error) -> Self {
		Self::Serialization { message: e.to_string() }
	}
}

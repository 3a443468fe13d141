//! Thread-safe in-memory [`Storage`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{Storage, StoreFuture},
};

type StoreMap = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// Storage backend that keeps values in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(StoreMap);
impl MemoryStorage {
	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl Storage for MemoryStorage {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Vec<u8>>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}

	fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map
				.read()
				.range(prefix.to_owned()..)
				.take_while(|(key, _)| key.starts_with(prefix))
				.map(|(key, _)| key.clone())
				.collect())
		})
	}
}

//! Fixed-size table of async mutexes keyed by hashing the storage key.

// crates.io
use async_lock::MutexGuard as AsyncMutexGuard;
// self
use crate::_prelude::*;

/// Default number of lock slots per entry kind.
pub const DEFAULT_LOCK_SLOTS: usize = 256;

/// Maps arbitrary keys onto a bounded set of async mutexes.
///
/// Distinct keys may share a slot; that only costs contention, never correctness. Equal keys
/// always map to the same slot, which serializes every read-modify-write on a key.
pub struct LockTable {
	slots: Box<[AsyncMutex<()>]>,
}
impl LockTable {
	/// Creates a table with `slots` mutexes (at least one).
	pub fn new(slots: usize) -> Self {
		Self { slots: (0..slots.max(1)).map(|_| AsyncMutex::new(())).collect() }
	}

	/// Number of slots in the table.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Always `false`; a table has at least one slot.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Slot index guarding `key`.
	pub fn slot_index(&self, key: &str) -> usize {
		let mut hasher = DefaultHasher::new();

		key.hash(&mut hasher);

		(hasher.finish() % self.slots.len() as u64) as usize
	}

	/// Waits for the slot guarding `key` and holds it until the guard drops.
	pub async fn lock(&self, key: &str) -> AsyncMutexGuard<'_, ()> {
		self.slots[self.slot_index(key)].lock().await
	}
}
impl Default for LockTable {
	fn default() -> Self {
		Self::new(DEFAULT_LOCK_SLOTS)
	}
}
impl Debug for LockTable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LockTable").field("slots", &self.slots.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn equal_keys_share_a_slot() {
		let table = LockTable::default();

		assert_eq!(table.len(), DEFAULT_LOCK_SLOTS);
		assert_eq!(table.slot_index("creds/aa/bb/cc"), table.slot_index("creds/aa/bb/cc"));
		assert_eq!(LockTable::new(0).len(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn lock_serializes_holders_of_the_same_key() {
		let table = Arc::new(LockTable::new(4));
		let inside = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let mut tasks = tokio::task::JoinSet::new();

		for _ in 0..16 {
			let table = table.clone();
			let inside = inside.clone();
			let peak = peak.clone();

			tasks.spawn(async move {
				let _guard = table.lock("creds/shared").await;
				let now = inside.fetch_add(1, Ordering::SeqCst) + 1;

				peak.fetch_max(now, Ordering::SeqCst);
				tokio::task::yield_now().await;
				inside.fetch_sub(1, Ordering::SeqCst);
			});
		}
		while let Some(joined) = tasks.join_next().await {
			joined.expect("Lock holder task should not panic.");
		}

		assert_eq!(peak.load(Ordering::SeqCst), 1);
	}
}

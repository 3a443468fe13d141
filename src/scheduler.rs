//! Background refresh and reap loops.
//!
//! Each loop reads the tuning once when it starts, then waits one interval on the backend
//! clock, snapshots the credential keys, and hands every key to a shared, bounded worker pool.
//! Writing the configuration cancels both loops and spawns replacements tagged with a new
//! generation; work already handed to the pool always runs to completion.

pub mod reap;
pub mod refresh;

pub use reap::ReapDescriptor;
pub use refresh::RefreshDescriptor;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	backend::Backend,
	entry::{AuthCodeEntry, EntryKey, Tuning},
};

/// Items processed concurrently across both loops unless configured otherwise.
pub const DEFAULT_WORKER_CONCURRENCY: usize = 8;

/// A periodic job run over every authorization-code credential.
pub trait Descriptor
where
	Self: 'static + Send + Sync + Sized,
{
	/// Name used in logs.
	const NAME: &'static str;

	/// Loop period, or `None` when the loop is disabled.
	fn interval(tuning: &Tuning) -> Option<Duration>;

	/// Builds the per-generation job state.
	fn new(tuning: &Tuning) -> Self;

	/// Handles one credential. Failures are logged, never returned.
	fn process(&self, backend: Backend, key: EntryKey) -> impl Future<Output = ()> + Send;
}

/// Owner of the running loops.
#[derive(Debug)]
pub struct Scheduler {
	state: Mutex<SchedulerState>,
	generation: AtomicU64,
	workers: Arc<Semaphore>,
}
impl Scheduler {
	/// Creates a stopped scheduler whose loops share `worker_concurrency` worker slots.
	pub fn new(worker_concurrency: usize) -> Self {
		Self {
			state: Mutex::new(SchedulerState::default()),
			generation: AtomicU64::new(0),
			workers: Arc::new(Semaphore::new(worker_concurrency.max(1))),
		}
	}

	/// Generation of the most recently spawned loops; zero before the first start.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::SeqCst)
	}

	/// Returns `true` while loops of the current generation may be running.
	pub fn is_running(&self) -> bool {
		self.state.lock().cancel.is_some()
	}

	/// Cancels the running loops and spawns a new generation.
	pub(crate) fn restart(&self, backend: &Backend) -> u64 {
		let mut state = self.state.lock();

		if let Some(previous) = state.cancel.take() {
			previous.cancel();
		}

		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let cancel = CancellationToken::new();

		state.handles = vec![
			spawn_loop::<RefreshDescriptor>(backend.clone(), cancel.clone(), self.workers.clone(), generation),
			spawn_loop::<ReapDescriptor>(backend.clone(), cancel.clone(), self.workers.clone(), generation),
		];
		state.cancel = Some(cancel);
		tracing::info!(generation, "background loops restarted");

		generation
	}

	/// Cancels the running loops and returns their handles.
	pub(crate) fn stop(&self) -> Vec<JoinHandle<()>> {
		let mut state = self.state.lock();

		if let Some(cancel) = state.cancel.take() {
			cancel.cancel();
			tracing::info!(generation = self.generation(), "background loops stopped");
		}

		std::mem::take(&mut state.handles)
	}
}

#[derive(Debug, Default)]
struct SchedulerState {
	cancel: Option<CancellationToken>,
	handles: Vec<JoinHandle<()>>,
}

fn spawn_loop<D>(
	backend: Backend,
	cancel: CancellationToken,
	workers: Arc<Semaphore>,
	generation: u64,
) -> JoinHandle<()>
where
	D: Descriptor,
{
	tokio::spawn(async move {
		let tuning = match backend.tuning().await {
			Ok(tuning) => tuning,
			Err(e) => {
				tracing::warn!(descriptor = D::NAME, generation, error = %e, "cannot read tuning, loop not started");

				return;
			},
		};
		let Some(interval) = D::interval(&tuning) else {
			tracing::debug!(descriptor = D::NAME, generation, "loop disabled");

			return;
		};
		let descriptor = Arc::new(D::new(&tuning));

		tracing::debug!(descriptor = D::NAME, generation, %interval, "loop started");

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = backend.clock().after(interval) => {},
			}

			let keys = match backend.store().list_keys::<AuthCodeEntry>().await {
				Ok(keys) => keys,
				Err(e) => {
					tracing::warn!(descriptor = D::NAME, generation, error = %e, "cannot list credentials");

					continue;
				},
			};

			tracing::debug!(descriptor = D::NAME, generation, credentials = keys.len(), "tick");

			for key in keys {
				let permit = tokio::select! {
					biased;
					_ = cancel.cancelled() => break,
					permit = workers.clone().acquire_owned() => permit,
				};
				let Ok(permit) = permit else { break };
				let backend = backend.clone();
				let descriptor = descriptor.clone();

				tokio::spawn(async move {
					descriptor.process(backend, key).await;

					drop(permit);
				});
			}
		}

		tracing::debug!(descriptor = D::NAME, generation, "loop stopped");
	})
}

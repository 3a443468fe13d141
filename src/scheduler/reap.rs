//! Deletion of credentials the reap policy gave up on.

// self
use crate::{
	_prelude::*,
	backend::Backend,
	entry::{AuthCodeEntry, EntryKey, Tuning},
	obs::{self, OpKind, OpSpan},
	reap::{ReapDecision, ReapPolicy},
	scheduler::Descriptor,
};

/// Applies [`ReapPolicy`] to each credential under its lock.
#[derive(Clone, Debug)]
pub struct ReapDescriptor {
	policy: ReapPolicy,
	dry_run: bool,
}
impl ReapDescriptor {
	async fn reap(&self, backend: &Backend, key: &EntryKey) -> Result<()> {
		let locked = backend.store().lock::<AuthCodeEntry>(key).await;
		let Some(entry) = locked.read().await? else { return Ok(()) };
		let ReapDecision::Reap(reason) = self.policy.check(&entry, backend.clock().now()) else {
			return Ok(());
		};

		if self.dry_run {
			tracing::info!(credential = %entry.name, %reason, "would reap credential (dry run)");

			return Ok(());
		}

		locked.delete().await?;
		tracing::info!(credential = %entry.name, %reason, "reaped credential");
		obs::record_reap(reason.as_str());

		Ok(())
	}
}
impl Descriptor for ReapDescriptor {
	const NAME: &'static str = "reap";

	fn interval(tuning: &Tuning) -> Option<Duration> {
		tuning.reap_check_interval()
	}

	fn new(tuning: &Tuning) -> Self {
		Self { policy: ReapPolicy::from(tuning), dry_run: tuning.reap_dry_run }
	}

	async fn process(&self, backend: Backend, key: EntryKey) {
		let span = OpSpan::new(OpKind::Reap, "reap");

		if let Err(e) = span.instrument(self.reap(&backend, &key)).await {
			tracing::warn!(%key, error = %e, "reap check failed");
		}
	}
}

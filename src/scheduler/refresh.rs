//! Proactive refresh of every authorization-code credential.

// self
use crate::{
	_prelude::*,
	backend::Backend,
	entry::{EntryKey, Tuning},
	scheduler::Descriptor,
};

/// Refreshes credentials that would expire within the configured expiry delta.
#[derive(Clone, Debug)]
pub struct RefreshDescriptor {
	expiry_delta: Duration,
}
impl Descriptor for RefreshDescriptor {
	const NAME: &'static str = "refresh";

	fn interval(tuning: &Tuning) -> Option<Duration> {
		tuning.refresh_check_interval()
	}

	fn new(tuning: &Tuning) -> Self {
		Self { expiry_delta: tuning.refresh_expiry_delta() }
	}

	async fn process(&self, backend: Backend, key: EntryKey) {
		if let Err(e) = backend.get_or_refresh_key(&key, self.expiry_delta).await {
			tracing::warn!(%key, error = %e, "background refresh failed");
		}
	}
}

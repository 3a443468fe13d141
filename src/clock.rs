//! Injectable time source shared by validity checks, reaping, and the background loops.
//!
//! Every component reads "now" and waits for ticks through a [`Clock`] so tests can drive
//! the whole lifecycle with [`ManualClock`] instead of wall-clock sleeps.

// crates.io
use time::PrimitiveDateTime;
use tokio::sync::oneshot;
// self
use crate::_prelude::*;

// Deadline for timers whose duration overflows the calendar.
const FAR_FUTURE: OffsetDateTime = PrimitiveDateTime::MAX.assume_utc();

/// Future resolved once a [`Clock::after`] deadline passes.
pub type ClockFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Source of the current instant and of timer ticks.
pub trait Clock
where
	Self: 'static + Debug + Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;

	/// Resolves after `duration` has elapsed on this clock.
	///
	/// Non-positive durations resolve immediately.
	fn after(&self, duration: Duration) -> ClockFuture;
}

/// Wall clock backed by the system time and Tokio timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}

	fn after(&self, duration: Duration) -> ClockFuture {
		let wait = std::time::Duration::try_from(duration).unwrap_or_default();

		Box::pin(tokio::time::sleep(wait))
	}
}

/// Deterministic clock that only moves when told to.
///
/// Timers registered through [`Clock::after`] fire when [`ManualClock::advance`] or
/// [`ManualClock::set`] moves the clock past their deadline.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<ManualState>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(ManualState { now: start, waiters: Vec::new() })))
	}

	/// Moves the clock forward and fires every timer that became due.
	pub fn advance(&self, by: Duration) {
		let mut state = self.0.lock();
		let target = state.now.checked_add(by).unwrap_or(FAR_FUTURE);

		state.move_to(target);
	}

	/// Jumps to `instant`, firing every timer that became due.
	pub fn set(&self, instant: OffsetDateTime) {
		self.0.lock().move_to(instant);
	}

	/// Number of timers still waiting on this clock.
	///
	/// Timers whose future was dropped are not counted, so a cancelled loop disappears from
	/// the tally as soon as its pending tick is discarded.
	pub fn pending_timers(&self) -> usize {
		self.0.lock().waiters.iter().filter(|w| !w.tx.is_closed()).count()
	}

	/// Yields until exactly `count` live timers are registered.
	pub async fn wait_for_timers(&self, count: usize) {
		while self.pending_timers() != count {
			tokio::task::yield_now().await;
		}
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		self.0.lock().now
	}

	fn after(&self, duration: Duration) -> ClockFuture {
		let (tx, rx) = oneshot::channel();

		{
			let mut state = self.0.lock();

			if duration.is_positive() {
				let deadline = state.now.checked_add(duration).unwrap_or(FAR_FUTURE);

				state.waiters.retain(|w| !w.tx.is_closed());
				state.waiters.push(Waiter { deadline, tx });
			} else {
				let _ = tx.send(());
			}
		}

		Box::pin(async move {
			let _ = rx.await;
		})
	}
}

#[derive(Debug)]
struct ManualState {
	now: OffsetDateTime,
	waiters: Vec<Waiter>,
}
impl ManualState {
	fn move_to(&mut self, instant: OffsetDateTime) {
		self.now = instant;

		let (due, pending): (Vec<Waiter>, Vec<Waiter>) =
			std::mem::take(&mut self.waiters).into_iter().partition(|w| w.deadline <= instant);

		self.waiters = pending;

		for waiter in due {
			let _ = waiter.tx.send(());
		}
	}
}

#[derive(Debug)]
struct Waiter {
	deadline: OffsetDateTime,
	tx: oneshot::Sender<()>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[tokio::test]
	async fn manual_clock_fires_only_due_timers() {
		let clock = ManualClock::new(datetime!(2025-01-01 00:00 UTC));
		let short = clock.after(Duration::seconds(10));
		let long = clock.after(Duration::seconds(60));

		assert_eq!(clock.pending_timers(), 2);

		clock.advance(Duration::seconds(10));
		short.await;

		assert_eq!(clock.now(), datetime!(2025-01-01 00:00:10 UTC));
		assert_eq!(clock.pending_timers(), 1);

		clock.set(datetime!(2025-01-01 00:05 UTC));
		long.await;

		assert_eq!(clock.pending_timers(), 0);
	}

	#[tokio::test]
	async fn dropped_timers_are_not_counted() {
		let clock = ManualClock::default();
		let timer = clock.after(Duration::minutes(1));

		assert_eq!(clock.pending_timers(), 1);

		drop(timer);

		assert_eq!(clock.pending_timers(), 0);
	}

	#[tokio::test]
	async fn non_positive_durations_resolve_immediately() {
		let clock = ManualClock::default();

		clock.after(Duration::ZERO).await;
		clock.after(Duration::seconds(-5)).await;

		assert_eq!(clock.pending_timers(), 0);
	}

	#[tokio::test]
	async fn overflowing_timers_stay_pending() {
		let clock = ManualClock::new(datetime!(2025-01-01 00:00 UTC));
		let _timer = clock.after(Duration::MAX);

		clock.advance(Duration::days(365));

		assert_eq!(clock.pending_timers(), 1);
	}
}

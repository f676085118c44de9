// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh coordination.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	queued: AtomicU64,
	released: AtomicU64,
	abandoned: AtomicU64,
	fast_replays: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refresh network operations started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that stored a new credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that ended on the failure path.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that entered the pending queue.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	/// Returns the number of pending callers that left the queue with a delivery attempt.
	pub fn released(&self) -> u64 {
		self.released.load(Ordering::Relaxed)
	}

	/// Returns the number of released callers whose invoker had already gone away.
	pub fn abandoned(&self) -> u64 {
		self.abandoned.load(Ordering::Relaxed)
	}

	/// Returns the number of callers replayed against an already-refreshed credential.
	pub fn fast_replays(&self) -> u64 {
		self.fast_replays.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_released(&self, delivered: bool) {
		self.released.fetch_add(1, Ordering::Relaxed);

		if !delivered {
			self.abandoned.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_fast_replay(&self) {
		self.fast_replays.fetch_add(1, Ordering::Relaxed);
	}
}

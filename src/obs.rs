//! Optional observability helpers for client flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `bearer_gate.flow`. Request and
//!   replay spans carry `method`, `path` and `attempt`; refresh spans carry the session `epoch` and
//!   the number of `queued` callers. Every span records its final `outcome`.
//! - Enable `metrics` to increment the `bearer_gate_flow_total` counter (labels `flow`, `outcome`),
//!   record refresh latency in `bearer_gate_refresh_duration_seconds`, and expose the size of the
//!   batch each refresh serves as the `bearer_gate_refresh_queue_depth` gauge.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// A caller's request through the facade.
	Dispatch,
	/// The single in-flight refresh operation.
	Refresh,
	/// A queued caller replayed after a refresh.
	Replay,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Dispatch => "dispatch",
			FlowKind::Refresh => "refresh",
			FlowKind::Replay => "replay",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Work discarded because the session changed underneath it.
	Superseded,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Superseded => "superseded",
		}
	}

	/// Maps a finished call to its outcome label.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => FlowOutcome::Success,
			Err(Error::SessionSuperseded) => FlowOutcome::Superseded,
			Err(_) => FlowOutcome::Failure,
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counts one flow event in `bearer_gate_flow_total`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"bearer_gate_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long a refresh round took, labeled by how it ended.
pub fn record_refresh_duration(outcome: FlowOutcome, elapsed: std::time::Duration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!("bearer_gate_refresh_duration_seconds", "outcome" => outcome.as_str())
		.record(elapsed.as_secs_f64());
	#[cfg(not(feature = "metrics"))]
	let _ = (outcome, elapsed);
}

/// Publishes how many callers the refresh round about to start will serve.
pub fn record_queue_depth(queued: usize) {
	#[cfg(feature = "metrics")]
	metrics::gauge!("bearer_gate_refresh_queue_depth").set(queued as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = queued;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_accept_every_outcome_without_a_recorder_installed() {
		for outcome in [
			FlowOutcome::Attempt,
			FlowOutcome::Success,
			FlowOutcome::Failure,
			FlowOutcome::Superseded,
		] {
			record_flow_outcome(FlowKind::Refresh, outcome);
			record_refresh_duration(outcome, std::time::Duration::from_millis(5));
		}

		record_queue_depth(4);
	}
}

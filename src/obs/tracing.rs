// self
use crate::{
	_prelude::*,
	http::RequestDescriptor,
	obs::{FlowKind, FlowOutcome},
};

/// Future returned by [`FlowSpan::instrument`]; plain `F` when tracing is disabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; plain `F` when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span around one request, replay or refresh round.
///
/// The `outcome` field starts empty and is filled by [`FlowSpan::record_outcome`] once the work
/// settles, so a span closed early (caller dropped) shows no outcome at all.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Span for a caller request or its replay.
	pub fn request(kind: FlowKind, request: &RequestDescriptor) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_gate.flow",
				flow = kind.as_str(),
				method = request.method.as_str(),
				path = %request.path,
				attempt = request.attempt(),
				outcome = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, request);

			Self {}
		}
	}

	/// Span for one refresh round serving `queued` callers of session `epoch`.
	pub fn refresh(epoch: u64, queued: usize) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_gate.flow",
				flow = FlowKind::Refresh.as_str(),
				epoch,
				queued,
				outcome = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (epoch, queued);

			Self {}
		}
	}

	/// Fills the span's `outcome` field.
	pub fn record_outcome(&self, outcome: FlowOutcome) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = outcome;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn request_span_wraps_the_future_and_takes_an_outcome() {
		let request = RequestDescriptor::get("events").retried();
		let span = FlowSpan::request(FlowKind::Replay, &request);
		let value = span.instrument(async { 42 }).await;

		span.record_outcome(FlowOutcome::Success);

		assert_eq!(value, 42);
	}

	#[tokio::test]
	async fn refresh_span_wraps_the_future() {
		let span = FlowSpan::refresh(3, 2);

		assert!(span.instrument(async { true }).await);

		span.record_outcome(FlowOutcome::Superseded);
	}
}

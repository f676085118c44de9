//! Single-flight credential refresh with a FIFO queue of waiting callers.
//!
//! The first caller whose request is classified as needing a refresh becomes the trigger: it is
//! queued as the first pending caller and a background task performs the one refresh operation.
//! Every caller that needs a refresh while that operation is in flight joins the queue instead of
//! starting its own. When the refresh resolves the queue is drained exactly once:
//!
//! - on success the rotated credential is stored first, then every live caller is replayed once,
//!   concurrently, with the new access credential, and outcomes are delivered in queue order;
//! - on failure the store is cleared, every caller receives [`Error::RefreshFailed`], and the
//!   session is terminated once.
//!
//! The background task owns the refresh, so a caller that stops waiting never aborts it for the
//! others. Sign-in and sign-out advance the session epoch under the same lock that commits refresh
//! results, so a refresh started for an earlier session can neither overwrite a fresh login nor
//! wipe it; callers queued under the earlier session receive [`Error::SessionSuperseded`].

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures_util::future;
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	classify::classify,
	error::RefreshFailure,
	http::{Dispatcher, RequestDescriptor, Response},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{SessionTerminator, TerminationReason},
	store::CredentialStore,
};

type Delivery = oneshot::Sender<Result<Response>>;

/// Session position observed by a caller right before it dispatched.
///
/// The coordinator compares it against its own state to tell whether the caller used a credential
/// that has since been replaced, or belongs to a session that no longer exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionMark {
	epoch: u64,
	generation: u64,
}

struct PendingCaller {
	epoch: u64,
	request: RequestDescriptor,
	handle: Delivery,
}

#[derive(Default)]
struct CoordinatorState {
	// True while the queue is non-empty or a refresh operation is executing.
	refreshing: bool,
	queue: VecDeque<PendingCaller>,
	// Bumped by sign-in and sign-out.
	epoch: u64,
	// Bumped by every successful refresh.
	generation: u64,
}
impl CoordinatorState {
	fn drain(&mut self) -> VecDeque<PendingCaller> {
		self.refreshing = false;

		std::mem::take(&mut self.queue)
	}

	fn drain_stale(&mut self) -> Vec<PendingCaller> {
		let epoch = self.epoch;
		let (current, stale) = std::mem::take(&mut self.queue)
			.into_iter()
			.partition::<VecDeque<_>, _>(|caller| caller.epoch == epoch);

		self.queue = current;
		self.refreshing = !self.queue.is_empty();

		stale.into_iter().collect()
	}
}

enum Admission {
	Queued { outcome: oneshot::Receiver<Result<Response>>, trigger: bool },
	Replay(RequestDescriptor),
	Superseded,
}

/// Serializes credential refreshes and replays the callers waiting on them.
///
/// Cloning is cheap; clones share the same queue and state.
pub struct RefreshCoordinator<D>
where
	D: ?Sized + Dispatcher,
{
	inner: Arc<Shared<D>>,
}
impl<D> RefreshCoordinator<D>
where
	D: ?Sized + Dispatcher,
{
	/// Creates a coordinator that refreshes through `dispatcher` and persists into `store`.
	pub fn new(
		dispatcher: Arc<D>,
		store: Arc<dyn CredentialStore>,
		terminator: Arc<SessionTerminator>,
		refresh_timeout: Duration,
	) -> Self {
		Self {
			inner: Arc::new(Shared {
				dispatcher,
				store,
				terminator,
				refresh_timeout,
				state: Mutex::new(CoordinatorState::default()),
				session: AsyncMutex::new(()),
				metrics: RefreshMetrics::default(),
			}),
		}
	}

	/// Captures the session position; take it before reading the credential used to dispatch.
	pub fn mark(&self) -> SessionMark {
		let state = self.inner.state.lock();

		SessionMark { epoch: state.epoch, generation: state.generation }
	}

	/// Returns `true` while a refresh is executing or callers are queued.
	pub fn is_refreshing(&self) -> bool {
		self.inner.state.lock().refreshing
	}

	/// Number of callers currently waiting for the in-flight refresh.
	pub fn pending(&self) -> usize {
		self.inner.state.lock().queue.len()
	}

	/// Counters describing refresh activity so far.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Waits for a fresh credential on behalf of `request`, then replays it once.
	///
	/// `request` must be the original (not yet replayed) descriptor and `mark` the position taken
	/// before it was dispatched; an already replayed descriptor fails with
	/// [`Error::CredentialRejected`] without touching the queue. When a refresh already completed
	/// since `mark`, the request is replayed right away with the stored credential instead of
	/// starting another refresh.
	///
	/// The refresh itself runs on the ambient Tokio runtime, so this must be polled inside one.
	pub async fn await_refresh(
		&self,
		request: RequestDescriptor,
		mark: SessionMark,
	) -> Result<Response> {
		if request.is_retry() {
			return Err(Error::CredentialRejected { status: 401 });
		}

		let admission = {
			let mut state = self.inner.state.lock();

			if state.epoch != mark.epoch {
				Admission::Superseded
			} else if !state.refreshing && state.generation != mark.generation {
				Admission::Replay(request)
			} else {
				let (handle, outcome) = oneshot::channel();
				let trigger = !state.refreshing;

				state.refreshing = true;
				state.queue.push_back(PendingCaller { epoch: mark.epoch, request, handle });

				Admission::Queued { outcome, trigger }
			}
		};

		match admission {
			Admission::Superseded => Err(Error::SessionSuperseded),
			Admission::Replay(request) => {
				self.inner.metrics.record_fast_replay();
				obs_debug!(path = %request.path, "credential already refreshed; replaying directly");

				self.inner.replay_with_stored(request).await
			},
			Admission::Queued { outcome, trigger } => {
				self.inner.metrics.record_queued();

				if trigger {
					obs_info!("credential expired; starting refresh");

					tokio::spawn(Arc::clone(&self.inner).run());
				}

				outcome.await.unwrap_or(Err(Error::Cancelled))
			},
		}
	}

	/// Stores `pair` as a new session and re-arms the terminator.
	///
	/// Callers still queued for a refresh of the previous session receive
	/// [`Error::SessionSuperseded`], and that refresh's result is discarded.
	pub async fn sign_in(&self, pair: CredentialPair) -> Result<()> {
		let _session = self.inner.session.lock().await;

		self.inner.store.set(pair).await?;
		self.inner.state.lock().epoch += 1;
		self.inner.terminator.rearm();

		obs_info!("signed in");

		Ok(())
	}

	/// Ends the session: clears the store and notifies the host once.
	pub async fn sign_out(&self) {
		let _session = self.inner.session.lock().await;

		self.inner.state.lock().epoch += 1;
		self.inner.terminator.terminate(TerminationReason::SignedOut).await;
	}
}
impl<D> Clone for RefreshCoordinator<D>
where
	D: ?Sized + Dispatcher,
{
	fn clone(&self) -> Self {
		Self { inner: Arc::clone(&self.inner) }
	}
}
impl<D> Debug for RefreshCoordinator<D>
where
	D: ?Sized + Dispatcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &state.refreshing)
			.field("pending", &state.queue.len())
			.field("epoch", &state.epoch)
			.field("generation", &state.generation)
			.field("metrics", &self.inner.metrics)
			.finish()
	}
}

struct Shared<D>
where
	D: ?Sized + Dispatcher,
{
	dispatcher: Arc<D>,
	store: Arc<dyn CredentialStore>,
	terminator: Arc<SessionTerminator>,
	refresh_timeout: Duration,
	state: Mutex<CoordinatorState>,
	// Held while committing refresh results and while signing in or out.
	session: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl<D> Shared<D>
where
	D: ?Sized + Dispatcher,
{
	async fn run(self: Arc<Self>) {
		let mut next = self.begin_round();

		while let Some((epoch, queued)) = next {
			let span = FlowSpan::refresh(epoch, queued);
			let started = std::time::Instant::now();

			obs::record_queue_depth(queued);
			obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Attempt);

			let (outcome, more) = span.instrument(self.round(epoch)).await;

			span.record_outcome(outcome);
			obs::record_flow_outcome(FlowKind::Refresh, outcome);
			obs::record_refresh_duration(outcome, started.elapsed());

			next = if more { self.begin_round() } else { None };
		}
	}

	// Supersedes callers that queued before a sign-in or sign-out, then returns the epoch and size
	// of the batch still waiting, if any.
	fn begin_round(&self) -> Option<(u64, usize)> {
		let (stale, batch) = {
			let mut state = self.state.lock();
			let stale = state.drain_stale();

			(stale, state.refreshing.then(|| (state.epoch, state.queue.len())))
		};

		self.supersede(stale);

		batch
	}

	// Returns `true` while callers of the current session remain queued.
	fn supersede_stale(&self) -> bool {
		let (stale, more) = {
			let mut state = self.state.lock();
			let stale = state.drain_stale();

			(stale, state.refreshing)
		};

		self.supersede(stale);

		more
	}

	// Performs one refresh operation for session `epoch` and resolves the callers it covers.
	//
	// The flag is `true` when callers of a newer session are still queued and need a refresh of
	// their own.
	async fn round(&self, epoch: u64) -> (FlowOutcome, bool) {
		// Read under the session lock so a refresh never spends a newer session's credential.
		let current = {
			let _session = self.session.lock().await;

			if self.state.lock().epoch != epoch {
				None
			} else {
				Some(self.store.get().await)
			}
		};
		let Some(current) = current else {
			return (FlowOutcome::Superseded, self.supersede_stale());
		};

		self.metrics.record_attempt();

		let exchanged = match current {
			Ok(current) => self.exchange(current).await,
			Err(e) => Err(RefreshFailure::Storage(e.to_string())),
		};
		let session = self.session.lock().await;

		if self.state.lock().epoch != epoch {
			drop(session);
			obs_info!("session changed during refresh; discarding result");

			return (FlowOutcome::Superseded, self.supersede_stale());
		}

		let rotated = match exchanged {
			Ok(pair) => match self.store.set(pair.clone()).await {
				Ok(()) => Ok(pair),
				Err(e) => Err(RefreshFailure::Storage(e.to_string())),
			},
			Err(reason) => Err(reason),
		};

		match rotated {
			Ok(pair) => {
				let callers = {
					let mut state = self.state.lock();

					state.generation += 1;

					state.drain()
				};

				drop(session);
				self.metrics.record_success();
				obs_info!(callers = callers.len(), "credential refreshed; replaying queued callers");
				self.replay(callers, &pair.access).await;

				(FlowOutcome::Success, false)
			},
			Err(reason) => {
				self.metrics.record_failure();
				obs_warn!(%reason, "credential refresh failed; terminating session");
				self.fail(reason).await;
				drop(session);

				(FlowOutcome::Failure, false)
			},
		}
	}

	async fn exchange(
		&self,
		current: Option<CredentialPair>,
	) -> Result<CredentialPair, RefreshFailure> {
		let current = current.ok_or(RefreshFailure::MissingRefreshCredential)?;
		let refresh = current.refresh.clone().ok_or(RefreshFailure::MissingRefreshCredential)?;
		let grant = tokio::time::timeout(
			self.refresh_timeout.unsigned_abs(),
			self.dispatcher.refresh(&refresh),
		)
		.await
		.map_err(|_| RefreshFailure::TimedOut)?
		.map_err(RefreshFailure::from)?;

		current.rotate(grant).map_err(|e| RefreshFailure::Malformed(e.to_string()))
	}

	// Runs with the session lock held so no sign-in can interleave with the wipe.
	async fn fail(&self, reason: RefreshFailure) {
		if let Err(e) = self.store.clear().await {
			obs_warn!(error = %e, "failed to clear stored credentials after refresh failure");
		}

		let callers = self.state.lock().drain();

		for caller in callers {
			self.deliver(caller.handle, Err(Error::RefreshFailed { reason: reason.clone() }));
		}

		self.terminator.terminate(TerminationReason::RefreshFailed(reason)).await;
	}

	async fn replay(&self, callers: VecDeque<PendingCaller>, access: &TokenSecret) {
		let (live, gone) = callers
			.into_iter()
			.partition::<Vec<_>, _>(|caller| !caller.handle.is_closed());

		for caller in gone {
			self.deliver(caller.handle, Err(Error::Cancelled));
		}

		let outcomes = future::join_all(live.iter().map(|caller| {
			let request = caller.request.retried();

			async move { self.send(request, access).await }
		}))
		.await;

		for (caller, outcome) in live.into_iter().zip(outcomes) {
			self.deliver(caller.handle, outcome);
		}
	}

	async fn replay_with_stored(&self, request: RequestDescriptor) -> Result<Response> {
		let pair = self.store.get().await?.ok_or(Error::NotSignedIn)?;

		self.send(request.retried(), &pair.access).await
	}

	async fn send(&self, request: RequestDescriptor, access: &TokenSecret) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Replay;

		let span = FlowSpan::request(KIND, &request);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let outcome = self.dispatcher.send(&request, Some(access)).await;

				classify(outcome, &request).into_result()
			})
			.await;

		let outcome = FlowOutcome::of(&result);

		span.record_outcome(outcome);
		obs::record_flow_outcome(KIND, outcome);

		result
	}

	fn supersede(&self, callers: Vec<PendingCaller>) {
		if !callers.is_empty() {
			obs_info!(stale = callers.len(), "session changed; superseding waiters");
		}

		for caller in callers {
			self.deliver(caller.handle, Err(Error::SessionSuperseded));
		}
	}

	fn deliver(&self, handle: Delivery, outcome: Result<Response>) {
		let delivered = handle.send(outcome).is_ok();

		self.metrics.record_released(delivered);
	}
}

//! Session termination: wipes stored credentials and tells the host to show its signed-out view.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{_prelude::*, error::RefreshFailure, store::CredentialStore};

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminationReason {
	/// The refresh operation failed (including a missing refresh credential).
	RefreshFailed(RefreshFailure),
	/// The host signed the user out.
	SignedOut,
}
impl Display for TerminationReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::RefreshFailed(reason) => write!(f, "refresh failed: {reason}"),
			Self::SignedOut => f.write_str("signed out"),
		}
	}
}

/// Host capability invoked when the session ends, typically a redirect to the sign-in entry point.
pub trait SessionListener
where
	Self: Send + Sync,
{
	/// Called at most once per session.
	fn on_session_terminated(&self, reason: &TerminationReason);
}
impl<F> SessionListener for F
where
	F: Fn(&TerminationReason) + Send + Sync,
{
	fn on_session_terminated(&self, reason: &TerminationReason) {
		self(reason)
	}
}

/// Clears the store and notifies the host once per session.
///
/// Terminating twice leaves the same end state as terminating once: the store is cleared again
/// (a no-op on an empty store) and the listener is not called a second time until
/// [`SessionTerminator::rearm`] marks a new session.
pub struct SessionTerminator {
	store: Arc<dyn CredentialStore>,
	listener: Option<Arc<dyn SessionListener>>,
	armed: AtomicBool,
}
impl SessionTerminator {
	/// Creates a terminator for `store`, armed for the current session.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self { store, listener: None, armed: AtomicBool::new(true) }
	}

	/// Attaches the host listener.
	pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
		self.listener = Some(listener);

		self
	}

	/// Marks a new session so the next termination notifies the host again.
	pub fn rearm(&self) {
		self.armed.store(true, Ordering::SeqCst);
	}

	/// Returns `true` if the current session has already been terminated.
	pub fn is_terminated(&self) -> bool {
		!self.armed.load(Ordering::SeqCst)
	}

	/// Clears stored credentials and notifies the host if this session was still live.
	pub async fn terminate(&self, reason: TerminationReason) {
		if let Err(e) = self.store.clear().await {
			obs_warn!(error = %e, "failed to clear stored credentials during termination");
		}
		if !self.armed.swap(false, Ordering::SeqCst) {
			obs_debug!(%reason, "session already terminated");

			return;
		}

		obs_info!(%reason, "session terminated");

		if let Some(listener) = &self.listener {
			listener.on_session_terminated(&reason);
		}
	}
}
impl Debug for SessionTerminator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTerminator")
			.field("listener_set", &self.listener.is_some())
			.field("terminated", &self.is_terminated())
			.finish()
	}
}

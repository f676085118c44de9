//! Demonstrates plugging a custom [`Dispatcher`] into [`ApiClient`].
//!
//! 1. Implement [`Dispatcher::send`] so credential expiry is reported as
//!    [`DispatchOutcome::AuthExpired`] and every other failure as [`DispatchOutcome::OtherFailure`].
//! 2. Implement [`Dispatcher::refresh`] to exchange the refresh credential for a [`RefreshGrant`].
//! 3. Build the client with a store and a [`SessionListener`] that stands in for the host's
//!    redirect to its sign-in screen.
//! 4. Fire several requests at once with an expired credential and watch them share one refresh.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use futures_util::future;
use parking_lot::Mutex;
// self
use bearer_gate::{
	auth::{CredentialPair, RefreshGrant, TokenSecret},
	client::ApiClient,
	error::{self, Error},
	http::{DispatchFuture, DispatchOutcome, Dispatcher, RequestDescriptor, Response},
	session::TerminationReason,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let backend = Arc::new(InProcessBackend::default());
	let client = ApiClient::<InProcessBackend>::builder(Arc::clone(&backend), store)
		.session_listener(Arc::new(|reason: &TerminationReason| {
			println!("Session ended ({reason}); the host would now show its sign-in screen.");
		}))
		.build()?;

	client.sign_in(CredentialPair::new("expired-access")?.with_refresh("refresh-1")).await?;

	let paths = ["sponsors", "events", "news", "media"];
	let results = future::join_all(paths.iter().map(|path| client.get(*path))).await;

	for (path, result) in paths.iter().zip(results) {
		println!("GET {path} -> {}", result?.text());
	}

	println!(
		"Refresh calls: {}; callers released by the coordinator: {}.",
		backend.refreshes.load(Ordering::SeqCst),
		client.refresh_metrics().released()
	);

	backend.revoke_refresh();
	backend.expire_access();

	match client.get("events").await {
		Ok(_) => println!("Backend unexpectedly accepted a revoked session."),
		Err(e) => println!("Request failed after the refresh credential was revoked: {e}"),
	}

	println!("Store still holds credentials: {}.", client.credentials().await?.is_some());

	Ok(())
}

#[derive(Default)]
struct InProcessBackend {
	accepted: Mutex<Option<String>>,
	refresh_revoked: Mutex<bool>,
	refreshes: AtomicUsize,
}
impl InProcessBackend {
	fn expire_access(&self) {
		*self.accepted.lock() = None;
	}

	fn revoke_refresh(&self) {
		*self.refresh_revoked.lock() = true;
	}
}
impl Dispatcher for InProcessBackend {
	fn send<'a>(
		&'a self,
		request: &'a RequestDescriptor,
		credential: Option<&'a TokenSecret>,
	) -> DispatchFuture<'a, DispatchOutcome> {
		Box::pin(async move {
			let accepted = self.accepted.lock().clone();

			match (credential, accepted) {
				(Some(presented), Some(accepted)) if presented.expose() == accepted =>
					DispatchOutcome::Success(Response::new(
						200,
						format!("{} page served with {accepted}", request.path),
					)),
				_ => DispatchOutcome::AuthExpired { status: 401 },
			}
		})
	}

	fn refresh<'a>(&'a self, _: &'a TokenSecret) -> DispatchFuture<'a, error::Result<RefreshGrant>> {
		Box::pin(async move {
			let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

			tokio::time::sleep(std::time::Duration::from_millis(50)).await;

			if *self.refresh_revoked.lock() {
				return Err(Error::Rejected {
					status: 401,
					body: String::from("refresh credential revoked"),
					retry_after: None,
				});
			}

			let access = format!("access-{n}");

			*self.accepted.lock() = Some(access.clone());

			Ok(RefreshGrant::new(access))
		})
	}
}

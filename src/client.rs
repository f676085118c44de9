//! Public client facade: the single entry point application code calls.
//!
//! Every request reads the stored access credential, goes through the [`Dispatcher`], and has its
//! outcome classified. Credential expiry hands the caller to the [`RefreshCoordinator`], which either
//! replays it once after a refresh or fails it; every other outcome is returned as-is. Callers
//! never see the refresh machinery beyond the errors documented on [`Error`].

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	classify::{Verdict, classify},
	config::ClientConfig,
	http::{Dispatcher, RequestDescriptor, Response},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::{RefreshCoordinator, RefreshMetrics},
	session::{SessionListener, SessionTerminator},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{config::DispatcherConfig, http::ReqwestDispatcher};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's bundled reqwest dispatcher.
pub type ReqwestApiClient = ApiClient<ReqwestDispatcher>;

/// Authenticated backend client with transparent single-flight credential refresh.
///
/// Cloning is cheap; clones share the dispatcher, store, and refresh queue.
pub struct ApiClient<D>
where
	D: ?Sized + Dispatcher,
{
	dispatcher: Arc<D>,
	store: Arc<dyn CredentialStore>,
	terminator: Arc<SessionTerminator>,
	coordinator: RefreshCoordinator<D>,
	config: ClientConfig,
}
impl<D> ApiClient<D>
where
	D: ?Sized + Dispatcher,
{
	/// Starts building a client around `dispatcher` and `store`.
	pub fn builder(
		dispatcher: impl Into<Arc<D>>,
		store: Arc<dyn CredentialStore>,
	) -> ApiClientBuilder<D> {
		ApiClientBuilder {
			dispatcher: dispatcher.into(),
			store,
			config: ClientConfig::default(),
			listener: None,
		}
	}

	/// Sends `request`, refreshing the credential once if the backend reports it expired.
	///
	/// Authenticated requests fail with [`Error::NotSignedIn`] when no credential is stored, without
	/// touching the network. When a caller timeout is configured and elapses, the call resolves to
	/// [`Error::Cancelled`]; an in-flight refresh keeps running for the other callers.
	pub async fn request(&self, request: RequestDescriptor) -> Result<Response> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::request(KIND, &request);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				match self.config.caller_timeout {
					Some(limit) => tokio::time::timeout(limit.unsigned_abs(), self.dispatch(request))
						.await
						.unwrap_or(Err(Error::Cancelled)),
					None => self.dispatch(request).await,
				}
			})
			.await;

		let outcome = FlowOutcome::of(&result);

		span.record_outcome(outcome);
		obs::record_flow_outcome(KIND, outcome);

		result
	}

	/// Sends `request` and decodes the JSON response body into `T`.
	pub async fn request_json<T>(&self, request: RequestDescriptor) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.request(request).await?.json()
	}

	/// `GET path`.
	pub async fn get(&self, path: impl Into<String>) -> Result<Response> {
		self.request(RequestDescriptor::get(path)).await
	}

	/// `DELETE path`.
	pub async fn delete(&self, path: impl Into<String>) -> Result<Response> {
		self.request(RequestDescriptor::delete(path)).await
	}

	/// `POST path` with a JSON body.
	pub async fn post_json<B>(&self, path: impl Into<String>, body: &B) -> Result<Response>
	where
		B: ?Sized + Serialize,
	{
		self.request(RequestDescriptor::post(path).with_json(body)?).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put_json<B>(&self, path: impl Into<String>, body: &B) -> Result<Response>
	where
		B: ?Sized + Serialize,
	{
		self.request(RequestDescriptor::put(path).with_json(body)?).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch_json<B>(&self, path: impl Into<String>, body: &B) -> Result<Response>
	where
		B: ?Sized + Serialize,
	{
		self.request(RequestDescriptor::patch(path).with_json(body)?).await
	}

	/// Starts a new session with `pair`.
	///
	/// Callers still waiting on a refresh of the previous session fail with
	/// [`Error::SessionSuperseded`].
	pub async fn sign_in(&self, pair: CredentialPair) -> Result<()> {
		self.coordinator.sign_in(pair).await
	}

	/// Ends the session: wipes every stored slot and notifies the session listener.
	pub async fn sign_out(&self) {
		self.coordinator.sign_out().await
	}

	/// Currently stored credential pair.
	pub async fn credentials(&self) -> Result<Option<CredentialPair>> {
		Ok(self.store.get().await?)
	}

	/// Stored user/session metadata.
	pub async fn profile(&self) -> Result<Option<serde_json::Value>> {
		Ok(self.store.profile().await?)
	}

	/// Replaces the stored user/session metadata.
	pub async fn set_profile(&self, profile: serde_json::Value) -> Result<()> {
		Ok(self.store.set_profile(profile).await?)
	}

	/// Returns `true` once the current session has been terminated.
	pub fn is_terminated(&self) -> bool {
		self.terminator.is_terminated()
	}

	/// Refresh coordinator shared by every clone of this client.
	pub fn coordinator(&self) -> &RefreshCoordinator<D> {
		&self.coordinator
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Dispatcher in use.
	pub fn dispatcher(&self) -> &D {
		&self.dispatcher
	}

	async fn dispatch(&self, request: RequestDescriptor) -> Result<Response> {
		let mark = self.coordinator.mark();
		let credential = if request.is_authenticated() {
			Some(self.store.get().await?.ok_or(Error::NotSignedIn)?.access)
		} else {
			None
		};
		let outcome = self.dispatcher.send(&request, credential.as_ref()).await;

		match classify(outcome, &request) {
			Verdict::NeedsRefresh => {
				obs_debug!(path = %request.path, "credential expired; waiting for refresh");

				self.coordinator.await_refresh(request, mark).await
			},
			verdict => verdict.into_result(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestDispatcher> {
	/// Starts building a client on the bundled reqwest dispatcher.
	pub fn reqwest(
		config: DispatcherConfig,
		store: Arc<dyn CredentialStore>,
	) -> Result<ApiClientBuilder<ReqwestDispatcher>> {
		Ok(Self::builder(ReqwestDispatcher::new(config)?, store))
	}
}
impl<D> Clone for ApiClient<D>
where
	D: ?Sized + Dispatcher,
{
	fn clone(&self) -> Self {
		Self {
			dispatcher: Arc::clone(&self.dispatcher),
			store: Arc::clone(&self.store),
			terminator: Arc::clone(&self.terminator),
			coordinator: self.coordinator.clone(),
			config: self.config.clone(),
		}
	}
}
impl<D> Debug for ApiClient<D>
where
	D: ?Sized + Dispatcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("config", &self.config)
			.field("coordinator", &self.coordinator)
			.field("terminator", &self.terminator)
			.finish()
	}
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder<D>
where
	D: ?Sized + Dispatcher,
{
	dispatcher: Arc<D>,
	store: Arc<dyn CredentialStore>,
	config: ClientConfig,
	listener: Option<Arc<dyn SessionListener>>,
}
impl<D> ApiClientBuilder<D>
where
	D: ?Sized + Dispatcher,
{
	/// Overrides the client configuration.
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;

		self
	}

	/// Registers the host hook invoked when the session ends.
	pub fn session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
		self.listener = Some(listener);

		self
	}

	/// Validates the configuration and assembles the client.
	pub fn build(self) -> Result<ApiClient<D>> {
		self.config.validate()?;

		let mut terminator = SessionTerminator::new(Arc::clone(&self.store));

		if let Some(listener) = self.listener {
			terminator = terminator.with_listener(listener);
		}

		let terminator = Arc::new(terminator);
		let coordinator = RefreshCoordinator::new(
			Arc::clone(&self.dispatcher),
			Arc::clone(&self.store),
			Arc::clone(&terminator),
			self.config.refresh_timeout,
		);

		Ok(ApiClient {
			dispatcher: self.dispatcher,
			store: self.store,
			terminator,
			coordinator,
			config: self.config,
		})
	}
}
impl<D> Debug for ApiClientBuilder<D>
where
	D: ?Sized + Dispatcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClientBuilder")
			.field("config", &self.config)
			.field("listener_set", &self.listener.is_some())
			.finish()
	}
}

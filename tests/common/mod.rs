#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
// self
use bearer_gate::{
	auth::{CredentialPair, RefreshGrant, TokenSecret},
	client::ApiClient,
	config::ClientConfig,
	error::{Error, RefreshFailure, Result, TransportError},
	http::{DispatchFuture, DispatchOutcome, Dispatcher, RequestDescriptor, Response},
	session::{SessionListener, TerminationReason},
	store::{CredentialStore, MemoryStore},
};

pub const INITIAL_ACCESS: &str = "access-0";
pub const INITIAL_REFRESH: &str = "refresh-0";

/// What the scripted backend does when asked to refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshScript {
	/// Issues `access-N` (and `refresh-N` when rotation is on) and starts accepting it.
	Rotate,
	/// Answers with the given status.
	Reject(u16),
	/// Fails at the network level.
	Unreachable,
	/// Never answers.
	Hang,
}

/// One recorded `send` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
	pub path: String,
	pub credential: Option<String>,
	pub attempt: u8,
}

/// In-process backend that accepts exactly one access credential at a time.
///
/// Paths starting with `missing` answer 404, `always-expired` rejects every credential, and `slow`
/// takes a while before answering.
pub struct ScriptedDispatcher {
	accepted: Mutex<String>,
	script: Mutex<RefreshScript>,
	refresh_delay: std::time::Duration,
	rotate_refresh: bool,
	issued: AtomicUsize,
	refresh_calls: AtomicUsize,
	refresh_credentials: Mutex<Vec<String>>,
	sent: Mutex<Vec<Sent>>,
}
impl ScriptedDispatcher {
	/// Backend whose initial credential is already expired.
	pub fn expired() -> Self {
		Self {
			accepted: Mutex::new(String::from("nothing-yet")),
			script: Mutex::new(RefreshScript::Rotate),
			refresh_delay: std::time::Duration::from_millis(30),
			rotate_refresh: false,
			issued: AtomicUsize::new(0),
			refresh_calls: AtomicUsize::new(0),
			refresh_credentials: Mutex::new(Vec::new()),
			sent: Mutex::new(Vec::new()),
		}
	}

	/// Backend that still accepts the initial credential.
	pub fn valid() -> Self {
		let dispatcher = Self::expired();

		dispatcher.accept(INITIAL_ACCESS);

		dispatcher
	}

	pub fn with_script(self, script: RefreshScript) -> Self {
		*self.script.lock() = script;

		self
	}

	pub fn with_refresh_delay(mut self, delay: std::time::Duration) -> Self {
		self.refresh_delay = delay;

		self
	}

	pub fn with_rotating_refresh(mut self) -> Self {
		self.rotate_refresh = true;

		self
	}

	/// Makes `token` the only credential the backend accepts.
	pub fn accept(&self, token: &str) {
		*self.accepted.lock() = token.to_owned();
	}

	pub fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	pub fn refresh_credentials(&self) -> Vec<String> {
		self.refresh_credentials.lock().clone()
	}

	pub fn sent(&self) -> Vec<Sent> {
		self.sent.lock().clone()
	}

	pub fn sent_to(&self, path: &str) -> Vec<Sent> {
		self.sent().into_iter().filter(|sent| sent.path == path).collect()
	}
}
impl Dispatcher for ScriptedDispatcher {
	fn send<'a>(
		&'a self,
		request: &'a RequestDescriptor,
		credential: Option<&'a TokenSecret>,
	) -> DispatchFuture<'a, DispatchOutcome> {
		Box::pin(async move {
			let presented = credential.map(|secret| secret.expose().to_owned());

			self.sent.lock().push(Sent {
				path: request.path.clone(),
				credential: presented.clone(),
				attempt: request.attempt(),
			});

			if request.path.starts_with("slow") {
				tokio::time::sleep(std::time::Duration::from_millis(200)).await;
			}
			if request.path.starts_with("missing") {
				return DispatchOutcome::OtherFailure(Error::Rejected {
					status: 404,
					body: String::from("not found"),
					retry_after: None,
				});
			}
			if request.path == "always-expired" {
				return DispatchOutcome::AuthExpired { status: 401 };
			}
			if !request.is_authenticated() {
				return DispatchOutcome::Success(Response::new(200, "public"));
			}

			let accepted = self.accepted.lock().clone();

			match presented {
				Some(token) if token == accepted => DispatchOutcome::Success(Response::new(
					200,
					format!(r#"{{"path":"{}","token":"{token}"}}"#, request.path),
				)),
				_ => DispatchOutcome::AuthExpired { status: 401 },
			}
		})
	}

	fn refresh<'a>(&'a self, refresh: &'a TokenSecret) -> DispatchFuture<'a, Result<RefreshGrant>> {
		Box::pin(async move {
			self.refresh_calls.fetch_add(1, Ordering::SeqCst);
			self.refresh_credentials.lock().push(refresh.expose().to_owned());
			tokio::time::sleep(self.refresh_delay).await;

			let script = *self.script.lock();

			match script {
				RefreshScript::Rotate => {
					let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
					let access = format!("access-{n}");
					let mut grant = RefreshGrant::new(access.as_str());

					if self.rotate_refresh {
						grant = grant.with_refresh(format!("refresh-{n}"));
					}

					self.accept(&access);

					Ok(grant)
				},
				RefreshScript::Reject(status) =>
					Err(Error::RefreshFailed { reason: RefreshFailure::Rejected { status } }),
				RefreshScript::Unreachable => Err(TransportError::Io(
					std::io::ErrorKind::ConnectionRefused.into(),
				)
				.into()),
				RefreshScript::Hang => std::future::pending().await,
			}
		})
	}
}

/// Records every termination the client reports.
#[derive(Clone, Default)]
pub struct TerminationLog(Arc<Mutex<Vec<TerminationReason>>>);
impl TerminationLog {
	pub fn reasons(&self) -> Vec<TerminationReason> {
		self.0.lock().clone()
	}

	pub fn count(&self) -> usize {
		self.0.lock().len()
	}
}
impl SessionListener for TerminationLog {
	fn on_session_terminated(&self, reason: &TerminationReason) {
		self.0.lock().push(reason.clone());
	}
}

/// Everything a coordinator test needs to drive and inspect a client.
pub struct Harness {
	pub client: ApiClient<ScriptedDispatcher>,
	pub backend: Arc<ScriptedDispatcher>,
	pub store: Arc<MemoryStore>,
	pub terminations: TerminationLog,
}

pub fn initial_pair() -> CredentialPair {
	CredentialPair::new(INITIAL_ACCESS)
		.expect("Initial pair fixture should build.")
		.with_refresh(INITIAL_REFRESH)
}

pub fn harness(backend: ScriptedDispatcher, pair: Option<CredentialPair>) -> Harness {
	harness_with_config(backend, pair, ClientConfig::default())
}

pub fn harness_with_config(
	backend: ScriptedDispatcher,
	pair: Option<CredentialPair>,
	config: ClientConfig,
) -> Harness {
	let backend = Arc::new(backend);
	let store = Arc::new(pair.map(MemoryStore::with_credentials).unwrap_or_default());
	let terminations = TerminationLog::default();
	let shared: Arc<dyn CredentialStore> = store.clone();
	let client = ApiClient::<ScriptedDispatcher>::builder(backend.clone(), shared)
		.config(config)
		.session_listener(Arc::new(terminations.clone()))
		.build()
		.expect("Client fixture should build.");

	Harness { client, backend, store, terminations }
}

//! Transport primitives for authenticated backend calls.
//!
//! The module exposes [`Dispatcher`], the client's only dependency on an HTTP stack, together with
//! the [`RequestDescriptor`] it replays and the [`DispatchOutcome`] it reports. Implementations must
//! surface credential expiry as [`DispatchOutcome::AuthExpired`], distinct from every other failure,
//! because that is the only signal the refresh coordinator acts on. Everything else (TLS, socket
//! retries, wire encodings) stays inside the implementation.

pub mod request;
pub mod response;
#[cfg(feature = "reqwest")] pub mod transport;

pub use request::*;
pub use response::*;
#[cfg(feature = "reqwest")] pub use transport::*;

// self
use crate::{
	_prelude::*,
	auth::{RefreshGrant, TokenSecret},
	error::RefreshFailure,
};

/// Boxed future returned by [`Dispatcher`] operations.
pub type DispatchFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Abstraction over HTTP transports able to send backend requests and call the refresh endpoint.
///
/// Implementations must be `Send + Sync + 'static` so a single instance can be shared between the
/// client facade and the spawned refresh task, and the futures they return must be `Send`.
pub trait Dispatcher
where
	Self: 'static + Send + Sync,
{
	/// Sends `request`, attaching `credential` as a bearer token when present.
	fn send<'a>(
		&'a self,
		request: &'a RequestDescriptor,
		credential: Option<&'a TokenSecret>,
	) -> DispatchFuture<'a, DispatchOutcome>;

	/// Exchanges the refresh credential for a new access credential.
	///
	/// Any failure, including a rejected refresh credential, is reported as an error; the caller
	/// treats every error as a failed refresh.
	fn refresh<'a>(&'a self, refresh: &'a TokenSecret) -> DispatchFuture<'a, Result<RefreshGrant>>;
}

/// Result of a single dispatch attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
	/// The backend accepted the request.
	Success(Response),
	/// The backend rejected the credential as expired.
	AuthExpired {
		/// Status code that carried the expiry signal.
		status: u16,
	},
	/// Any other failure: application errors, transport failures, local errors.
	OtherFailure(Error),
}

#[derive(Deserialize)]
struct RefreshPayload {
	#[serde(alias = "access", alias = "accessToken", alias = "token")]
	access_token: String,
	#[serde(default, alias = "refresh", alias = "refreshToken")]
	refresh_token: Option<String>,
	#[serde(default, alias = "expiresIn")]
	expires_in: Option<i64>,
}

/// Parses a refresh endpoint body into a [`RefreshGrant`].
///
/// `pointer` is a JSON pointer selecting the object that carries the tokens (empty for the root),
/// which covers backends that wrap payloads in `{ "data": { ... } }` envelopes.
pub fn parse_refresh_grant(body: &[u8], pointer: &str) -> Result<RefreshGrant> {
	let malformed =
		|message: String| Error::RefreshFailed { reason: RefreshFailure::Malformed(message) };
	let document: serde_json::Value =
		serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
	let target = document
		.pointer(pointer)
		.ok_or_else(|| malformed(format!("no object at `{pointer}`")))?;
	let payload: RefreshPayload =
		serde_path_to_error::deserialize(target).map_err(|e| malformed(e.to_string()))?;
	let mut grant = RefreshGrant::new(payload.access_token);

	if let Some(refresh) = payload.refresh_token {
		grant = grant.with_refresh(refresh);
	}
	if let Some(secs) = payload.expires_in.filter(|secs| *secs > 0) {
		grant = grant.with_expires_in(Duration::seconds(secs));
	}
	if grant.access.is_blank() {
		return Err(malformed("access token is empty".into()));
	}

	Ok(grant)
}

//! Credential storage contracts and built-in store implementations.
//!
//! A store holds three named slots: the access credential, the refresh credential, and optional
//! user/session metadata. Stores are not concurrency-aware beyond keeping each operation atomic;
//! serializing refreshes is the coordinator's job. [`CredentialStore::clear`] must drop all three
//! slots as one unit so no reader ever observes a half-cleared session.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the signed-in session.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored credential pair, if any.
	fn get(&self) -> StoreFuture<'_, Option<CredentialPair>>;

	/// Persists or replaces the credential pair, keeping the profile slot untouched.
	fn set(&self, pair: CredentialPair) -> StoreFuture<'_, ()>;

	/// Drops the access, refresh, and profile slots together.
	fn clear(&self) -> StoreFuture<'_, ()>;

	/// Returns the stored user/session metadata, if any.
	fn profile(&self) -> StoreFuture<'_, Option<serde_json::Value>>;

	/// Persists or replaces the user/session metadata.
	fn set_profile(&self, profile: serde_json::Value) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Everything a store keeps for one session, laid out as the persisted slots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
	/// Access credential slot.
	#[serde(rename = "access_token", default, skip_serializing_if = "Option::is_none")]
	pub access: Option<TokenSecret>,
	/// Refresh credential slot.
	#[serde(rename = "refresh_token", default, skip_serializing_if = "Option::is_none")]
	pub refresh: Option<TokenSecret>,
	/// Instant the access credential was stored.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<OffsetDateTime>,
	/// Instant the access credential expires, when known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<OffsetDateTime>,
	/// User/session metadata slot.
	#[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
	pub profile: Option<serde_json::Value>,
}
impl StoreSnapshot {
	/// Rebuilds the credential pair; a snapshot without a usable access slot yields `None`.
	pub fn credentials(&self) -> Option<CredentialPair> {
		let access = self.access.clone().filter(|secret| !secret.is_blank())?;
		let mut pair = CredentialPair::new(access).ok()?;

		if let Some(refresh) = self.refresh.clone() {
			pair = pair.with_refresh(refresh);
		}
		if let Some(issued_at) = self.issued_at {
			pair = pair.with_issued_at(issued_at);
		}
		if let Some(expires_at) = self.expires_at {
			pair = pair.with_expires_at(expires_at);
		}

		Some(pair)
	}

	/// Writes the pair into the credential slots.
	pub fn put_credentials(&mut self, pair: CredentialPair) {
		self.access = Some(pair.access);
		self.refresh = pair.refresh;
		self.issued_at = Some(pair.issued_at);
		self.expires_at = pair.expires_at;
	}

	/// Returns `true` when every slot is empty.
	pub fn is_empty(&self) -> bool {
		self.access.is_none()
			&& self.refresh.is_none()
			&& self.issued_at.is_none()
			&& self.expires_at.is_none()
			&& self.profile.is_none()
	}
}

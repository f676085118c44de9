//! Thread-safe in-memory [`CredentialStore`] implementation for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	store::{CredentialStore, StoreError, StoreFuture, StoreSnapshot},
};

type SnapshotCell = Arc<RwLock<StoreSnapshot>>;

/// Storage backend that keeps the session in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SnapshotCell);
impl MemoryStore {
	/// Creates a store that already holds the provided pair.
	pub fn with_credentials(pair: CredentialPair) -> Self {
		let mut snapshot = StoreSnapshot::default();

		snapshot.put_credentials(pair);

		Self(Arc::new(RwLock::new(snapshot)))
	}

	/// Returns a copy of every slot for inspection.
	pub fn snapshot(&self) -> StoreSnapshot {
		self.0.read().clone()
	}

	fn set_now(cell: SnapshotCell, pair: CredentialPair) -> Result<(), StoreError> {
		cell.write().put_credentials(pair);

		Ok(())
	}

	fn clear_now(cell: SnapshotCell) -> Result<(), StoreError> {
		*cell.write() = StoreSnapshot::default();

		Ok(())
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Option<CredentialPair>> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().credentials()) })
	}

	fn set(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move { Self::set_now(cell, pair) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move { Self::clear_now(cell) })
	}

	fn profile(&self) -> StoreFuture<'_, Option<serde_json::Value>> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().profile.clone()) })
	}

	fn set_profile(&self, profile: serde_json::Value) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			cell.write().profile = Some(profile);

			Ok(())
		})
	}
}

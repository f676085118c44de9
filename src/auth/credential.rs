//! The persisted access/refresh pair and the grant returned by the refresh endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors produced while constructing a [`CredentialPair`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialError {
	/// Issued when the access token is empty or whitespace.
	#[error("Access token must not be empty.")]
	BlankAccessToken,
}

/// Access and refresh credentials for one signed-in session.
///
/// The access token is never blank. A missing refresh token means expiry is terminal for the
/// session: the coordinator will not attempt a refresh and the session is logged out instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived bearer token attached to every request.
	pub access: TokenSecret,
	/// Longer-lived token used only to obtain a new access token.
	pub refresh: Option<TokenSecret>,
	/// Instant the current access token was stored.
	pub issued_at: OffsetDateTime,
	/// Instant the access token stops being valid, when the backend said so.
	pub expires_at: Option<OffsetDateTime>,
}
impl CredentialPair {
	/// Builds a validated pair holding only an access token.
	pub fn new(access: impl Into<TokenSecret>) -> Result<Self, CredentialError> {
		let access = access.into();

		if access.is_blank() {
			return Err(CredentialError::BlankAccessToken);
		}

		Ok(Self { access, refresh: None, issued_at: OffsetDateTime::now_utc(), expires_at: None })
	}

	/// Attaches a refresh token; a blank value leaves the pair without one.
	pub fn with_refresh(mut self, refresh: impl Into<TokenSecret>) -> Self {
		self.refresh = Some(refresh.into()).filter(|secret| !secret.is_blank());

		self
	}

	/// Overrides the issued-at instant.
	pub fn with_issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = instant;

		self
	}

	/// Sets the access token expiry.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Returns `true` if a known expiry lies at or before `now`.
	///
	/// A pair without an expiry is never considered expired; the backend decides.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= now)
	}

	/// Returns `true` if a refresh credential is available.
	pub fn can_refresh(&self) -> bool {
		self.refresh.is_some()
	}

	/// Applies a refresh grant, replacing the access token and rotating the refresh token only
	/// when the grant carries a new one. The grant's lifetime hint becomes the new expiry.
	pub fn rotate(&self, grant: RefreshGrant) -> Result<Self, CredentialError> {
		if grant.access.is_blank() {
			return Err(CredentialError::BlankAccessToken);
		}

		let refresh =
			grant.refresh.filter(|secret| !secret.is_blank()).or_else(|| self.refresh.clone());

		let issued_at = OffsetDateTime::now_utc();
		let expires_at = grant.expires_in.map(|lifetime| issued_at + lifetime);

		Ok(Self { access: grant.access, refresh, issued_at, expires_at })
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access", &"<redacted>")
			.field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Tokens returned by a successful refresh call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshGrant {
	/// New access token.
	pub access: TokenSecret,
	/// Rotated refresh token, if the backend issued one.
	pub refresh: Option<TokenSecret>,
	/// Lifetime hint for the new access token.
	pub expires_in: Option<Duration>,
}
impl RefreshGrant {
	/// Creates a grant carrying only a new access token.
	pub fn new(access: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: None, expires_in: None }
	}

	/// Attaches a rotated refresh token.
	pub fn with_refresh(mut self, refresh: impl Into<TokenSecret>) -> Self {
		self.refresh = Some(refresh.into());

		self
	}

	/// Attaches a lifetime hint.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_in = Some(expires_in);

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn blank_access_token_is_rejected() {
		let err = CredentialPair::new("  ").expect_err("Blank access tokens must be rejected.");

		assert_eq!(err, CredentialError::BlankAccessToken);
	}

	#[test]
	fn blank_refresh_token_is_treated_as_absent() {
		let pair = CredentialPair::new("access").expect("Pair fixture should build.").with_refresh("");

		assert!(!pair.can_refresh());
		assert!(pair.clone().with_refresh("refresh").can_refresh());
	}

	#[test]
	fn rotation_keeps_refresh_token_unless_replaced() {
		let pair = CredentialPair::new("access-old")
			.expect("Pair fixture should build.")
			.with_refresh("refresh-old");
		let kept = pair.rotate(RefreshGrant::new("access-new")).expect("Rotation should succeed.");

		assert_eq!(kept.access.expose(), "access-new");
		assert_eq!(kept.refresh.as_ref().map(TokenSecret::expose), Some("refresh-old"));

		let replaced = pair
			.rotate(RefreshGrant::new("access-next").with_refresh("refresh-next"))
			.expect("Rotation with a new refresh token should succeed.");

		assert_eq!(replaced.refresh.as_ref().map(TokenSecret::expose), Some("refresh-next"));
	}

	#[test]
	fn grant_lifetime_becomes_the_expiry() {
		let pair = CredentialPair::new("access-old")
			.expect("Pair fixture should build.")
			.with_expires_at(OffsetDateTime::UNIX_EPOCH);

		assert!(pair.is_expired_at(OffsetDateTime::now_utc()));

		let rotated = pair
			.rotate(RefreshGrant::new("access-new").with_expires_in(Duration::minutes(15)))
			.expect("Rotation should succeed.");

		assert_eq!(rotated.expires_at, Some(rotated.issued_at + Duration::minutes(15)));
		assert!(!rotated.is_expired_at(rotated.issued_at));
		assert!(rotated.is_expired_at(rotated.issued_at + Duration::minutes(15)));

		let open_ended =
			rotated.rotate(RefreshGrant::new("access-next")).expect("Rotation should succeed.");

		assert_eq!(open_ended.expires_at, None);
		assert!(!open_ended.is_expired_at(OffsetDateTime::now_utc()));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let pair = CredentialPair::new("access-value")
			.expect("Pair fixture should build.")
			.with_refresh("refresh-value");
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("access-value"));
		assert!(!rendered.contains("refresh-value"));
		assert!(rendered.contains("<redacted>"));
	}
}

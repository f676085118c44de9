//! Failure classification: decides whether an outcome is final or worth one refresh-and-replay.

// self
use crate::{
	_prelude::*,
	http::{DispatchOutcome, RequestDescriptor, Response},
};

/// What the client should do with a dispatch outcome.
#[derive(Debug)]
pub enum Verdict {
	/// Return the response to the caller.
	Success(Response),
	/// Hand the caller to the refresh coordinator.
	NeedsRefresh,
	/// Return the error to the caller without any retry.
	Terminal(Error),
}
impl Verdict {
	/// Converts a final verdict into the caller's result.
	///
	/// [`Verdict::NeedsRefresh`] is never final; it maps to [`Error::CredentialRejected`] with
	/// status `401` so a misuse cannot turn into a silent success.
	pub fn into_result(self) -> Result<Response> {
		match self {
			Verdict::Success(response) => Ok(response),
			Verdict::Terminal(e) => Err(e),
			Verdict::NeedsRefresh => Err(Error::CredentialRejected { status: 401 }),
		}
	}
}

/// Classifies `outcome` for `request`.
///
/// Only credential expiry on an authenticated request that has not been replayed yet qualifies
/// for a refresh. A replayed request that expires again is terminal, which bounds every request
/// to one replay even against a backend that keeps rejecting fresh credentials. Application errors
/// pass through untouched.
pub fn classify(outcome: DispatchOutcome, request: &RequestDescriptor) -> Verdict {
	match outcome {
		DispatchOutcome::Success(response) => Verdict::Success(response),
		DispatchOutcome::AuthExpired { status } if !request.is_authenticated() =>
			Verdict::Terminal(Error::Rejected { status, body: String::new(), retry_after: None }),
		DispatchOutcome::AuthExpired { status } if request.is_retry() =>
			Verdict::Terminal(Error::CredentialRejected { status }),
		DispatchOutcome::AuthExpired { .. } => Verdict::NeedsRefresh,
		DispatchOutcome::OtherFailure(e) => Verdict::Terminal(e),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn expired() -> DispatchOutcome {
		DispatchOutcome::AuthExpired { status: 401 }
	}

	#[test]
	fn first_expiry_needs_refresh() {
		let request = RequestDescriptor::get("events");

		assert!(matches!(classify(expired(), &request), Verdict::NeedsRefresh));
	}

	#[test]
	fn expiry_after_replay_is_terminal() {
		let request = RequestDescriptor::get("events").retried();

		assert!(matches!(
			classify(expired(), &request),
			Verdict::Terminal(Error::CredentialRejected { status: 401 })
		));
	}

	#[test]
	fn anonymous_expiry_is_a_plain_rejection() {
		let request = RequestDescriptor::post("auth/login").anonymous();

		assert!(matches!(
			classify(expired(), &request),
			Verdict::Terminal(Error::Rejected { status: 401, .. })
		));
	}

	#[test]
	fn application_errors_pass_through_untouched() {
		let request = RequestDescriptor::delete("sponsors/9");
		let outcome = DispatchOutcome::OtherFailure(Error::Rejected {
			status: 404,
			body: "not found".into(),
			retry_after: None,
		});

		match classify(outcome, &request) {
			Verdict::Terminal(Error::Rejected { status, body, .. }) => {
				assert_eq!(status, 404);
				assert_eq!(body, "not found");
			},
			other => panic!("Unexpected verdict: {other:?}."),
		}
	}

	#[test]
	fn success_carries_the_response() {
		let request = RequestDescriptor::get("news");
		let verdict = classify(DispatchOutcome::Success(Response::new(200, "[]")), &request);

		assert_eq!(verdict.into_result().expect("Success should convert to Ok.").text(), "[]");
	}
}

//! Request descriptors replayed by the coordinator after a refresh.

// self
use crate::{_prelude::*, error::ConfigError};

/// HTTP methods used by the admin API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// JSON document.
	Json(serde_json::Value),
	/// `application/x-www-form-urlencoded` fields.
	Form(BTreeMap<String, String>),
}

/// Everything needed to send a request again, unchanged except for the credential.
///
/// The attempt count is immutable from the outside: [`RequestDescriptor::retried`] returns a new
/// descriptor instead of flipping a flag, so a descriptor reused by the caller never inherits the
/// retry state of an earlier call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the dispatcher's base URL.
	pub path: String,
	/// Query parameters, in order.
	pub query: Vec<(String, String)>,
	/// Extra headers, in order.
	pub headers: Vec<(String, String)>,
	/// Request payload.
	pub body: RequestBody,
	attempt: u8,
	authenticated: bool,
}
impl RequestDescriptor {
	/// Creates an authenticated request for `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: Vec::new(),
			body: RequestBody::Empty,
			attempt: 0,
			authenticated: true,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = RequestBody::Json(serde_json::to_value(body)?);

		Ok(self)
	}

	/// Uses an already-built JSON value as the payload.
	pub fn with_json_value(mut self, body: serde_json::Value) -> Self {
		self.body = RequestBody::Json(body);

		self
	}

	/// Uses form fields as the payload.
	pub fn with_form<I, K, V>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.body =
			RequestBody::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect());

		self
	}

	/// Sends the request without a credential and never refreshes on its behalf (sign-in calls).
	pub fn anonymous(mut self) -> Self {
		self.authenticated = false;

		self
	}

	/// Returns `true` if the request carries the stored credential.
	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}

	/// Number of times this descriptor was replayed after a refresh.
	pub fn attempt(&self) -> u8 {
		self.attempt
	}

	/// Returns `true` if the request was already replayed once after a refresh.
	pub fn is_retry(&self) -> bool {
		self.attempt > 0
	}

	/// Returns a copy marked as replayed after a refresh.
	pub fn retried(&self) -> Self {
		let mut next = self.clone();

		next.attempt = self.attempt.saturating_add(1);

		next
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retried_returns_a_new_descriptor() {
		let original = RequestDescriptor::get("banners").with_query("page", 2);
		let replay = original.retried();

		assert!(!original.is_retry());
		assert!(replay.is_retry());
		assert_eq!(replay.attempt(), 1);
		assert_eq!(replay.path, original.path);
		assert_eq!(replay.query, vec![("page".to_string(), "2".to_string())]);
	}

	#[test]
	fn anonymous_requests_skip_authentication() {
		let login = RequestDescriptor::post("auth/login")
			.with_form([("username", "admin"), ("password", "secret")])
			.anonymous();

		assert!(!login.is_authenticated());
		assert!(matches!(login.body, RequestBody::Form(ref fields) if fields.len() == 2));
	}

	#[test]
	fn json_bodies_serialize_eagerly() {
		#[derive(Serialize)]
		struct Banner<'a> {
			title: &'a str,
			position: u8,
		}

		let request = RequestDescriptor::put("banners/3")
			.with_json(&Banner { title: "Spring", position: 1 })
			.expect("Serializable bodies should convert to JSON.");

		assert_eq!(
			request.body,
			RequestBody::Json(serde_json::json!({ "title": "Spring", "position": 1 }))
		);
		assert_eq!(request.method.to_string(), "PUT");
	}
}

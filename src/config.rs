//! Client and transport configuration.
//!
//! Both structs deserialize from JSON (durations as integer milliseconds) and can be assembled
//! through builders; either way they pass through `validate` before use.

// self
use crate::{_prelude::*, error::ConfigError};

/// Coordinator and facade settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Upper bound for one refresh call; an elapsed bound is a failed refresh.
	#[serde(rename = "refresh_timeout_ms", with = "millis")]
	pub refresh_timeout: Duration,
	/// Optional bound for a whole `request` call, including any wait on a refresh.
	#[serde(rename = "caller_timeout_ms", with = "opt_millis")]
	pub caller_timeout: Option<Duration>,
}
impl ClientConfig {
	const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(10);

	/// Returns a builder seeded with defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder { config: Self::default() }
	}

	/// Checks timeouts are positive.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.refresh_timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout { field: "refresh" });
		}
		if self.caller_timeout.is_some_and(|timeout| !timeout.is_positive()) {
			return Err(ConfigError::NonPositiveTimeout { field: "caller" });
		}

		Ok(())
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self { refresh_timeout: Self::DEFAULT_REFRESH_TIMEOUT, caller_timeout: None }
	}
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	/// Overrides the refresh call bound (defaults to 10 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.config.refresh_timeout = timeout;

		self
	}

	/// Bounds every `request` call, queue wait included.
	pub fn caller_timeout(mut self, timeout: Duration) -> Self {
		self.config.caller_timeout = Some(timeout);

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

/// How the refresh credential travels to the refresh endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshWire {
	/// JSON body `{ "<field>": "<refresh>" }`.
	JsonField {
		/// Body field name.
		field: String,
	},
	/// Form body `<field>=<refresh>`.
	FormField {
		/// Form field name.
		field: String,
	},
	/// `Authorization: Bearer <refresh>` with an empty body.
	BearerHeader,
}
impl Default for RefreshWire {
	fn default() -> Self {
		Self::JsonField { field: "refresh_token".into() }
	}
}

/// Settings for the bundled reqwest dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Refresh endpoint path, relative to `base_url`.
	#[serde(default = "DispatcherConfig::default_refresh_path")]
	pub refresh_path: String,
	/// Refresh credential encoding.
	#[serde(default)]
	pub refresh_wire: RefreshWire,
	/// JSON pointer to the object holding the new tokens in the refresh response.
	#[serde(default)]
	pub grant_pointer: String,
	/// Per-call transport timeout, applied to refresh calls as well.
	#[serde(
		rename = "request_timeout_ms",
		with = "millis",
		default = "DispatcherConfig::default_request_timeout"
	)]
	pub request_timeout: Duration,
	/// Statuses that signal an expired credential.
	#[serde(default = "DispatcherConfig::default_expiry_statuses")]
	pub expiry_statuses: Vec<u16>,
}
impl DispatcherConfig {
	/// Returns a builder for the provided base URL.
	pub fn builder(base_url: Url) -> DispatcherConfigBuilder {
		DispatcherConfigBuilder {
			config: Self {
				base_url,
				refresh_path: Self::default_refresh_path(),
				refresh_wire: RefreshWire::default(),
				grant_pointer: String::new(),
				request_timeout: Self::default_request_timeout(),
				expiry_statuses: Self::default_expiry_statuses(),
			},
		}
	}

	/// Checks the base URL, timeout, pointer, and expiry statuses.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if !self.request_timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout { field: "request" });
		}
		if !self.grant_pointer.is_empty() && !self.grant_pointer.starts_with('/') {
			return Err(ConfigError::InvalidGrantPointer { pointer: self.grant_pointer.clone() });
		}
		if self.expiry_statuses.is_empty() {
			return Err(ConfigError::NoExpiryStatuses);
		}
		if let Some(status) = self.expiry_statuses.iter().find(|s| !(400..500).contains(*s)) {
			return Err(ConfigError::InvalidExpiryStatus { status: *status });
		}

		Ok(())
	}

	/// Returns `true` if `status` signals an expired credential.
	pub fn is_expiry(&self, status: u16) -> bool {
		self.expiry_statuses.contains(&status)
	}

	/// Resolves `path` against the base URL; leading slashes stay under the base path.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let mut base = self.base_url.clone();

		if !base.path().ends_with('/') {
			let with_slash = format!("{}/", base.path());

			base.set_path(&with_slash);
		}

		base.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	fn default_refresh_path() -> String {
		"auth/refresh".into()
	}

	fn default_request_timeout() -> Duration {
		Duration::seconds(30)
	}

	fn default_expiry_statuses() -> Vec<u16> {
		vec![401]
	}
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug)]
pub struct DispatcherConfigBuilder {
	config: DispatcherConfig,
}
impl DispatcherConfigBuilder {
	/// Overrides the refresh endpoint path (defaults to `auth/refresh`).
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.config.refresh_path = path.into();

		self
	}

	/// Overrides how the refresh credential is sent.
	pub fn refresh_wire(mut self, wire: RefreshWire) -> Self {
		self.config.refresh_wire = wire;

		self
	}

	/// Points at the object carrying tokens inside the refresh response.
	pub fn grant_pointer(mut self, pointer: impl Into<String>) -> Self {
		self.config.grant_pointer = pointer.into();

		self
	}

	/// Overrides the per-call transport timeout (defaults to 30 seconds).
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;

		self
	}

	/// Replaces the statuses that signal an expired credential (defaults to `401`).
	pub fn expiry_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.config.expiry_statuses = statuses.into_iter().collect();

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<DispatcherConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

mod millis {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_milliseconds().clamp(0, i64::MAX as i128) as i64)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}

mod opt_millis {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(duration) => super::millis::serialize(duration, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Option::<i64>::deserialize(deserializer).map(|value| value.map(Duration::milliseconds))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://admin.example.com/api").expect("Base URL fixture should parse.")
	}

	#[test]
	fn endpoint_keeps_the_base_path() {
		let config = DispatcherConfig::builder(base()).build().expect("Defaults should validate.");

		assert_eq!(
			config.endpoint("/news/12").expect("Paths should join.").as_str(),
			"https://admin.example.com/api/news/12"
		);
		assert_eq!(
			config.endpoint(&config.refresh_path).expect("Refresh path should join.").as_str(),
			"https://admin.example.com/api/auth/refresh"
		);
	}

	#[test]
	fn dispatcher_config_rejects_bad_values() {
		let err = DispatcherConfig::builder(base())
			.expiry_statuses([])
			.build()
			.expect_err("An empty expiry set must be rejected.");

		assert!(matches!(err, ConfigError::NoExpiryStatuses));

		let err = DispatcherConfig::builder(base())
			.expiry_statuses([401, 500])
			.build()
			.expect_err("Server error statuses cannot signal expiry.");

		assert!(matches!(err, ConfigError::InvalidExpiryStatus { status: 500 }));

		let err = DispatcherConfig::builder(base())
			.grant_pointer("data")
			.build()
			.expect_err("Pointers must start with a slash.");

		assert!(matches!(err, ConfigError::InvalidGrantPointer { .. }));

		let mailto = Url::parse("mailto:admin@example.com").expect("Mailto URL should parse.");
		let err = DispatcherConfig::builder(mailto)
			.build()
			.expect_err("Non-base URLs must be rejected.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
	}

	#[test]
	fn client_config_rejects_non_positive_timeouts() {
		let err = ClientConfig::builder()
			.refresh_timeout(Duration::ZERO)
			.build()
			.expect_err("Zero refresh timeouts must be rejected.");

		assert!(matches!(err, ConfigError::NonPositiveTimeout { field: "refresh" }));

		let err = ClientConfig::builder()
			.caller_timeout(Duration::seconds(-1))
			.build()
			.expect_err("Negative caller timeouts must be rejected.");

		assert!(matches!(err, ConfigError::NonPositiveTimeout { field: "caller" }));
	}

	#[test]
	fn configs_load_from_json_with_defaults() {
		let client: ClientConfig = serde_json::from_str(r#"{"caller_timeout_ms":2500}"#)
			.expect("Client config should deserialize.");

		assert_eq!(client.refresh_timeout, Duration::seconds(10));
		assert_eq!(client.caller_timeout, Some(Duration::milliseconds(2500)));

		let dispatcher: DispatcherConfig = serde_json::from_str(
			r#"{
				"base_url": "https://admin.example.com/api/",
				"refresh_wire": { "kind": "bearer_header" },
				"grant_pointer": "/data"
			}"#,
		)
		.expect("Dispatcher config should deserialize.");

		assert_eq!(dispatcher.refresh_wire, RefreshWire::BearerHeader);
		assert_eq!(dispatcher.refresh_path, "auth/refresh");
		assert_eq!(dispatcher.expiry_statuses, vec![401]);
		assert_eq!(dispatcher.request_timeout, Duration::seconds(30));
		dispatcher.validate().expect("Loaded dispatcher config should validate.");
	}
}

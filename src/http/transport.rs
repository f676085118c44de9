//! Bundled reqwest-backed [`Dispatcher`].

// crates.io
use reqwest::{
	RequestBuilder,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::{RefreshGrant, TokenSecret},
	config::{DispatcherConfig, RefreshWire},
	error::{ConfigError, RefreshFailure, TransportError},
	http::{
		DispatchFuture, DispatchOutcome, Dispatcher, Method, RequestBody, RequestDescriptor,
		Response, parse_refresh_grant,
	},
};

/// Dispatcher that talks to the backend through a shared [`ReqwestClient`].
///
/// Redirects are not followed: an auth gateway that answers an expired credential with a redirect
/// to a login page must be configured to answer with an expiry status instead.
#[derive(Clone, Debug)]
pub struct ReqwestDispatcher {
	client: ReqwestClient,
	config: DispatcherConfig,
}
impl ReqwestDispatcher {
	/// Builds a dispatcher with its own reqwest client.
	pub fn new(config: DispatcherConfig) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Self::with_client(client, config)
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient, config: DispatcherConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self { client, config })
	}

	/// Configuration in use.
	pub fn config(&self) -> &DispatcherConfig {
		&self.config
	}

	fn build(
		&self,
		request: &RequestDescriptor,
		credential: Option<&TokenSecret>,
	) -> Result<RequestBuilder> {
		let mut url = self.config.endpoint(&request.path)?;

		if !request.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&request.query);
		}

		let mut builder = self
			.client
			.request(method(request.method), url)
			.timeout(self.config.request_timeout.unsigned_abs());

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(secret) = credential {
			builder = builder.header(AUTHORIZATION, secret.bearer());
		}

		builder = match &request.body {
			RequestBody::Empty => builder,
			RequestBody::Json(value) => builder
				.header(CONTENT_TYPE, "application/json")
				.body(serde_json::to_vec(value).map_err(ConfigError::from)?),
			RequestBody::Form(fields) => builder.form(fields),
		};

		Ok(builder)
	}

	async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
		let response = builder.send().await.map_err(TransportError::from)?;
		let status = response.status().as_u16();
		let headers = collect_headers(response.headers());
		let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

		Ok(Response { status, headers, body })
	}

	fn outcome(&self, response: Response) -> DispatchOutcome {
		if self.config.is_expiry(response.status) {
			return DispatchOutcome::AuthExpired { status: response.status };
		}
		if response.is_success() {
			return DispatchOutcome::Success(response);
		}

		let retry_after = response.header(RETRY_AFTER.as_str()).and_then(parse_retry_after);

		DispatchOutcome::OtherFailure(Error::Rejected {
			status: response.status,
			body: response.text(),
			retry_after,
		})
	}

	fn refresh_request(&self, refresh: &TokenSecret) -> Result<RequestBuilder> {
		let url = self.config.endpoint(&self.config.refresh_path)?;
		let builder =
			self.client.post(url).timeout(self.config.request_timeout.unsigned_abs());
		let builder = match &self.config.refresh_wire {
			RefreshWire::JsonField { field } => {
				let mut body = serde_json::Map::new();

				body.insert(field.clone(), serde_json::Value::from(refresh.expose()));

				builder
					.header(CONTENT_TYPE, "application/json")
					.body(serde_json::to_vec(&body).map_err(ConfigError::from)?)
			},
			RefreshWire::FormField { field } =>
				builder.form(&[(field.as_str(), refresh.expose())]),
			RefreshWire::BearerHeader => builder.header(AUTHORIZATION, refresh.bearer()),
		};

		Ok(builder)
	}
}
impl Dispatcher for ReqwestDispatcher {
	fn send<'a>(
		&'a self,
		request: &'a RequestDescriptor,
		credential: Option<&'a TokenSecret>,
	) -> DispatchFuture<'a, DispatchOutcome> {
		Box::pin(async move {
			let builder = match self.build(request, credential) {
				Ok(builder) => builder,
				Err(e) => return DispatchOutcome::OtherFailure(e),
			};

			match self.execute(builder).await {
				Ok(response) => self.outcome(response),
				Err(e) => DispatchOutcome::OtherFailure(e),
			}
		})
	}

	fn refresh<'a>(&'a self, refresh: &'a TokenSecret) -> DispatchFuture<'a, Result<RefreshGrant>> {
		Box::pin(async move {
			let response = self.execute(self.refresh_request(refresh)?).await?;

			if !response.is_success() {
				return Err(Error::RefreshFailed {
					reason: RefreshFailure::Rejected { status: response.status },
				});
			}

			parse_refresh_grant(&response.body, &self.config.grant_pointer)
		})
	}
}

fn method(method: Method) -> reqwest::Method {
	match method {
		Method::Get => reqwest::Method::GET,
		Method::Post => reqwest::Method::POST,
		Method::Put => reqwest::Method::PUT,
		Method::Patch => reqwest::Method::PATCH,
		Method::Delete => reqwest::Method::DELETE,
	}
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
	headers
		.iter()
		.filter_map(|(name, value)| {
			value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
		})
		.collect()
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		assert_eq!(parse_retry_after(" 120 "), Some(Duration::minutes(2)));
		assert_eq!(parse_retry_after("Tue, 01 Jan 2008 00:00:00 +0000"), None);
		assert_eq!(parse_retry_after("soon"), None);
	}

	#[test]
	fn expiry_statuses_take_precedence_over_success_checks() {
		let config = DispatcherConfig::builder(
			Url::parse("https://admin.example.com/").expect("Base URL fixture should parse."),
		)
		.expiry_statuses([401, 419])
		.build()
		.expect("Dispatcher config fixture should validate.");
		let dispatcher = ReqwestDispatcher::with_client(ReqwestClient::new(), config)
			.expect("Dispatcher fixture should build.");

		assert!(matches!(
			dispatcher.outcome(Response::new(419, "")),
			DispatchOutcome::AuthExpired { status: 419 }
		));
		assert!(matches!(dispatcher.outcome(Response::new(201, "{}")), DispatchOutcome::Success(_)));

		match dispatcher.outcome(Response::new(422, "title required").with_header("Retry-After", "3"))
		{
			DispatchOutcome::OtherFailure(Error::Rejected { status, body, retry_after }) => {
				assert_eq!(status, 422);
				assert_eq!(body, "title required");
				assert_eq!(retry_after, Some(Duration::seconds(3)));
			},
			other => panic!("Unexpected outcome: {other:?}."),
		}
	}
}

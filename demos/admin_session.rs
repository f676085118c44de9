//! Runs an admin-panel style session against a real backend through the bundled reqwest dispatcher.
//!
//! The session is persisted in a JSON file so a second run reuses it. Configure through env vars:
//!
//! - `BEARER_GATE_BASE_URL` (default `http://127.0.0.1:8080/api/`)
//! - `BEARER_GATE_SESSION_FILE` (default `admin-session.json` in the temp dir)
//! - `BEARER_GATE_ACCESS_TOKEN` / `BEARER_GATE_REFRESH_TOKEN` seed a new session when none is stored

// std
use std::{env, path::PathBuf, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use bearer_gate::{
	auth::CredentialPair,
	client::ReqwestApiClient,
	config::{ClientConfig, DispatcherConfig},
	error::Error,
	http::RequestDescriptor,
	session::TerminationReason,
	store::FileStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let base_url = env::var("BEARER_GATE_BASE_URL")
		.unwrap_or_else(|_| String::from("http://127.0.0.1:8080/api/"));
	let session_file = env::var("BEARER_GATE_SESSION_FILE")
		.map(PathBuf::from)
		.unwrap_or_else(|_| env::temp_dir().join("admin-session.json"));
	let store = Arc::new(FileStore::open(session_file)?);
	let dispatcher_config = DispatcherConfig::builder(Url::parse(&base_url)?)
		.grant_pointer("/data")
		.request_timeout(time::Duration::seconds(15))
		.build()?;
	let client_config = ClientConfig::builder()
		.refresh_timeout(time::Duration::seconds(10))
		.caller_timeout(time::Duration::seconds(45))
		.build()?;
	let client = ReqwestApiClient::reqwest(dispatcher_config, store.clone())?
		.config(client_config)
		.session_listener(Arc::new(|reason: &TerminationReason| {
			println!("Session ended ({reason}); redirecting to /login.");
		}))
		.build()?;

	if client.credentials().await?.is_none() {
		let access = env::var("BEARER_GATE_ACCESS_TOKEN")
			.map_err(|_| eyre!("No stored session; set BEARER_GATE_ACCESS_TOKEN to sign in."))?;
		let mut pair = CredentialPair::new(access)?;

		if let Ok(refresh) = env::var("BEARER_GATE_REFRESH_TOKEN") {
			pair = pair.with_refresh(refresh);
		}

		client.sign_in(pair).await?;

		println!("Signed in; session stored at {}.", store.path().display());
	}

	for path in ["events", "news", "sponsors"] {
		match client.request_json::<serde_json::Value>(RequestDescriptor::get(path)).await {
			Ok(page) => println!("GET {path} -> {page}"),
			Err(e) if e.is_terminal_session() => {
				println!("GET {path} -> session is gone: {e}");

				break;
			},
			Err(Error::Rejected { status, body, .. }) => println!("GET {path} -> {status}: {body}"),
			Err(e) => return Err(e.into()),
		}
	}

	println!(
		"Refreshes attempted: {}, succeeded: {}.",
		client.refresh_metrics().attempts(),
		client.refresh_metrics().successes()
	);

	Ok(())
}

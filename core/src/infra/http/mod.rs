//! HTTP plumbing shared by the sync and license clients

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{error::Error as StdError, io, time::Duration};
use thiserror::Error;

const USER_AGENT: &str = concat!("tether/", env!("CARGO_PKG_VERSION"));

/// Coarse class of a transport failure, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
	Network,
	Timeout,
	ConnectionRefused,
	ConnectionReset,
	Other,
}

impl std::fmt::Display for ErrorCategory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Network => "network",
			Self::Timeout => "timeout",
			Self::ConnectionRefused => "connection_refused",
			Self::ConnectionReset => "connection_reset",
			Self::Other => "other",
		})
	}
}

/// A request that never produced a usable response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	#[error("network error: {0}")]
	Network(String),

	#[error("request timed out: {0}")]
	Timeout(String),

	#[error("connection refused: {0}")]
	ConnectionRefused(String),

	#[error("connection reset: {0}")]
	ConnectionReset(String),

	#[error("{0}")]
	Other(String),
}

impl TransportError {
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::Network(_) => ErrorCategory::Network,
			Self::Timeout(_) => ErrorCategory::Timeout,
			Self::ConnectionRefused(_) => ErrorCategory::ConnectionRefused,
			Self::ConnectionReset(_) => ErrorCategory::ConnectionReset,
			Self::Other(_) => ErrorCategory::Other,
		}
	}
}

impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		let message = e.to_string();

		if e.is_timeout() {
			return Self::Timeout(message);
		}

		match io_error_kind(&e) {
			Some(io::ErrorKind::ConnectionRefused) => return Self::ConnectionRefused(message),
			Some(
				io::ErrorKind::ConnectionReset
				| io::ErrorKind::ConnectionAborted
				| io::ErrorKind::BrokenPipe
				| io::ErrorKind::UnexpectedEof,
			) => return Self::ConnectionReset(message),
			Some(io::ErrorKind::TimedOut) => return Self::Timeout(message),
			_ => {}
		}

		// hyper does not always keep the io::Error in the chain
		let chain = error_chain(&e).to_lowercase();
		if chain.contains("connection refused") {
			return Self::ConnectionRefused(message);
		}
		if chain.contains("connection reset") || chain.contains("connection closed") {
			return Self::ConnectionReset(message);
		}

		if let Some(status) = e.status() {
			return Self::Other(format!("HTTP {status}"));
		}

		if e.is_decode() || e.is_body() || e.is_builder() {
			return Self::Other(message);
		}

		if e.is_connect() || e.is_request() {
			return Self::Network(message);
		}

		Self::Other(message)
	}
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
	let mut source = Some(err);
	while let Some(e) = source {
		if let Some(io_err) = e.downcast_ref::<io::Error>() {
			return Some(io_err.kind());
		}
		source = e.source();
	}
	None
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
	let mut out = err.to_string();
	let mut source = err.source();
	while let Some(e) = source {
		out.push_str(": ");
		out.push_str(&e.to_string());
		source = e.source();
	}
	out
}

/// Attach a bearer credential when one is configured
pub trait WithAuth {
	fn with_auth(self, token: Option<&str>) -> Self;
}

impl WithAuth for reqwest::RequestBuilder {
	fn with_auth(self, token: Option<&str>) -> Self {
		match token {
			Some(token) if !token.is_empty() => self.bearer_auth(token),
			_ => self,
		}
	}
}

/// Build a client whose every request is bounded by `timeout`
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
	reqwest::Client::builder()
		.timeout(timeout)
		.connect_timeout(timeout.min(Duration::from_secs(10)))
		.user_agent(USER_AGENT)
		.build()
		.map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))
}

/// POST `body` as JSON and decode a JSON response.
///
/// Non-2xx statuses and bodies that do not decode into `Resp` are transport
/// failures; callers never guess at success from a partial response.
pub async fn post_json<Req, Resp>(
	client: &reqwest::Client,
	url: reqwest::Url,
	token: Option<&str>,
	body: &Req,
) -> Result<Resp, TransportError>
where
	Req: Serialize + ?Sized,
	Resp: DeserializeOwned,
{
	let response = client
		.post(url)
		.with_auth(token)
		.json(body)
		.send()
		.await?
		.error_for_status()?;

	let bytes = response.bytes().await?;

	serde_json::from_slice(&bytes)
		.map_err(|e| TransportError::Other(format!("unexpected response body: {e}")))
}

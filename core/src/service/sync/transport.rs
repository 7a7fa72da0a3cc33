//! Remote side of synchronization
//!
//! The engine only sees the [`SyncTransport`] and [`NetworkProbe`] traits. The
//! reqwest and TCP implementations here are what [`crate::Core`] wires up by
//! default.

use crate::{
	config::SyncConfig,
	infra::{
		db::entities::changes_outbox::ChangeOperation,
		http::{self, TransportError},
		outbox::ChangeEntry,
	},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Pushes batches of outbox entries to the remote endpoint
#[async_trait]
pub trait SyncTransport: Send + Sync {
	/// Whether an endpoint is configured at all
	fn is_configured(&self) -> bool;

	/// Send one batch. A returned response is the server's per-entry verdict;
	/// an error means nothing is known about any entry in the batch.
	async fn push(&self, changes: &[ChangeEntry]) -> Result<PushResponse, TransportError>;
}

/// Cheap reachability check run before a batch is sent
#[async_trait]
pub trait NetworkProbe: Send + Sync {
	async fn is_reachable(&self) -> bool;
}

/// One change as sent over the wire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChange<'a> {
	pub id: &'a str,
	pub table_name: &'a str,
	pub operation: ChangeOperation,
	pub record_id: &'a str,
	pub old_values: Option<&'a Value>,
	pub new_values: Option<&'a Value>,
	pub created_at: DateTime<Utc>,
	pub sync_attempts: i32,
}

impl<'a> From<&'a ChangeEntry> for WireChange<'a> {
	fn from(entry: &'a ChangeEntry) -> Self {
		Self {
			id: &entry.id,
			table_name: &entry.table_name,
			operation: entry.operation,
			record_id: &entry.record_id,
			old_values: entry.old_values.as_ref(),
			new_values: entry.new_values.as_ref(),
			created_at: entry.created_at,
			sync_attempts: entry.sync_attempts,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct PushRequest<'a> {
	pub changes: Vec<WireChange<'a>>,
}

/// The server's verdict on a batch.
///
/// `synced` and `failed` are required so a body of some other shape is a
/// transport failure rather than a silent success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
	pub synced: u64,
	pub failed: u64,
	#[serde(default)]
	pub errors: Option<Vec<RejectedChange>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedChange {
	pub change_id: String,
	#[serde(default)]
	pub error: String,
}

impl PushResponse {
	pub fn rejected(&self) -> &[RejectedChange] {
		self.errors.as_deref().unwrap_or_default()
	}
}

/// [`SyncTransport`] over HTTPS with a bearer credential
pub struct HttpSyncTransport {
	client: reqwest::Client,
	endpoint: Option<reqwest::Url>,
	api_token: Option<String>,
}

impl HttpSyncTransport {
	pub fn new(
		endpoint: Option<reqwest::Url>,
		api_token: Option<String>,
		timeout: Duration,
	) -> Result<Self, TransportError> {
		Ok(Self {
			client: http::build_client(timeout)?,
			endpoint,
			api_token,
		})
	}

	pub fn from_config(config: &SyncConfig) -> anyhow::Result<Self> {
		Ok(Self::new(
			config.endpoint_url()?,
			config.api_token.clone(),
			config.request_timeout(),
		)?)
	}
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
	fn is_configured(&self) -> bool {
		self.endpoint.is_some()
	}

	async fn push(&self, changes: &[ChangeEntry]) -> Result<PushResponse, TransportError> {
		let Some(endpoint) = self.endpoint.clone() else {
			return Err(TransportError::Other("no sync endpoint configured".into()));
		};

		let request = PushRequest {
			changes: changes.iter().map(WireChange::from).collect(),
		};

		debug!(endpoint = %endpoint, count = changes.len(), "Pushing change batch");

		http::post_json(&self.client, endpoint, self.api_token.as_deref(), &request).await
	}
}

/// Reachability by opening a TCP connection to the sync endpoint's host
pub struct TcpProbe {
	target: Option<(String, u16)>,
	timeout: Duration,
}

impl TcpProbe {
	pub fn new(endpoint: Option<&reqwest::Url>, timeout: Duration) -> Self {
		let target = endpoint.and_then(|url| {
			let host = url.host_str()?.trim_matches(['[', ']']).to_string();
			let port = url.port_or_known_default()?;
			Some((host, port))
		});

		Self { target, timeout }
	}

	pub fn from_config(config: &SyncConfig) -> anyhow::Result<Self> {
		Ok(Self::new(
			config.endpoint_url()?.as_ref(),
			config.probe_timeout(),
		))
	}
}

#[async_trait]
impl NetworkProbe for TcpProbe {
	async fn is_reachable(&self) -> bool {
		let Some((host, port)) = &self.target else {
			return false;
		};

		match tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), *port))).await {
			Ok(Ok(_)) => true,
			Ok(Err(e)) => {
				debug!(host = %host, port, error = %e, "Sync endpoint unreachable");
				false
			}
			Err(_) => {
				debug!(host = %host, port, "Reachability probe timed out");
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::infra::http::{test_server, ErrorCategory};
	use pretty_assertions::assert_eq;
	use serde_json::json;

	fn entry(id: &str) -> ChangeEntry {
		ChangeEntry {
			id: id.into(),
			table_name: "inventory_items".into(),
			operation: ChangeOperation::Update,
			record_id: "item-1".into(),
			old_values: Some(json!({ "quantity": 1 })),
			new_values: Some(json!({ "quantity": 2 })),
			created_at: Utc::now(),
			synced_at: None,
			sync_attempts: 2,
			error: Some("timeout".into()),
		}
	}

	fn transport(addr: std::net::SocketAddr) -> HttpSyncTransport {
		let url = reqwest::Url::parse(&format!("http://{addr}/changes")).unwrap();
		HttpSyncTransport::new(Some(url), Some("token-1".into()), Duration::from_secs(2)).unwrap()
	}

	#[test]
	fn wire_format_is_camel_case() {
		let entry = entry("c-1");
		let body = serde_json::to_value(PushRequest {
			changes: vec![WireChange::from(&entry)],
		})
		.unwrap();

		let change = &body["changes"][0];
		assert_eq!(change["id"], "c-1");
		assert_eq!(change["tableName"], "inventory_items");
		assert_eq!(change["operation"], "UPDATE");
		assert_eq!(change["recordId"], "item-1");
		assert_eq!(change["oldValues"], json!({ "quantity": 1 }));
		assert_eq!(change["syncAttempts"], 2);
		assert!(change.get("error").is_none());
	}

	#[tokio::test]
	async fn push_decodes_per_entry_verdict() {
		let (addr, request) = test_server::respond_once(
			200,
			json!({
				"synced": 1,
				"failed": 1,
				"errors": [{ "changeId": "c-2", "error": "schema mismatch" }]
			})
			.to_string(),
		)
		.await;

		let response = transport(addr)
			.push(&[entry("c-1"), entry("c-2")])
			.await
			.unwrap();

		assert_eq!(response.synced, 1);
		assert_eq!(
			response.rejected(),
			&[RejectedChange {
				change_id: "c-2".into(),
				error: "schema mismatch".into(),
			}]
		);

		let request = request.await.unwrap();
		assert!(request.to_lowercase().contains("authorization: bearer token-1"));
		assert!(request.contains(r#""tableName":"inventory_items""#));
	}

	#[tokio::test]
	async fn unexpected_body_shape_is_a_failure() {
		let (addr, _) = test_server::respond_once(200, r#"{"ok":true}"#.into()).await;

		let err = transport(addr).push(&[entry("c-1")]).await.unwrap_err();
		assert_eq!(err.category(), ErrorCategory::Other);
	}

	#[test]
	fn unconfigured_transport() {
		let transport = HttpSyncTransport::new(None, None, Duration::from_secs(1)).unwrap();
		assert!(!transport.is_configured());
	}

	#[tokio::test]
	async fn probe_reports_listener_state() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let open = reqwest::Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
		assert!(TcpProbe::new(Some(&open), Duration::from_secs(1)).is_reachable().await);

		let closed = reqwest::Url::parse(&format!("http://{}/", test_server::closed_port())).unwrap();
		assert!(!TcpProbe::new(Some(&closed), Duration::from_secs(1)).is_reachable().await);

		assert!(!TcpProbe::new(None, Duration::from_secs(1)).is_reachable().await);
	}
}

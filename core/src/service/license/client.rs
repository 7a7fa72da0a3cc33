//! License authority client

use crate::infra::http::{self, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
	pub user_id: String,
	pub device_id: String,
	pub device_name: String,
	pub app_version: String,
}

/// Entitlement asserted by the license authority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
	#[serde(default)]
	pub license_id: Option<String>,
	#[serde(default)]
	pub plan: Option<String>,
	pub status: String,
	#[serde(default)]
	pub grace_period: Option<GracePeriod>,
	#[serde(default)]
	pub features: BTreeMap<String, bool>,
	#[serde(default)]
	pub sync_enabled: bool,
	#[serde(default)]
	pub can_create_jobs: bool,
	#[serde(default)]
	pub can_add_inventory: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriod {
	#[serde(default)]
	pub expires_at: Option<String>,
}

#[async_trait]
pub trait LicenseClient: Send + Sync {
	fn is_configured(&self) -> bool;

	async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, TransportError>;
}

pub struct HttpLicenseClient {
	client: reqwest::Client,
	endpoint: Option<reqwest::Url>,
	api_token: Option<String>,
}

impl HttpLicenseClient {
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
}

#[async_trait]
impl LicenseClient for HttpLicenseClient {
	fn is_configured(&self) -> bool {
		self.endpoint.is_some()
	}

	async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, TransportError> {
		let Some(endpoint) = self.endpoint.clone() else {
			return Err(TransportError::Other("no license endpoint configured".into()));
		};

		debug!(endpoint = %endpoint, device_id = %request.device_id, "Verifying license");

		http::post_json(&self.client, endpoint, self.api_token.as_deref(), request).await
	}
}

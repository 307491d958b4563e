//! Block-explorer ABI lookup
//!
//! Fetches the verified ABI of a contract through the Etherscan-style
//! `module=contract&action=getabi` endpoint.

use crate::error::{MonitorError, Result};
use alloy_primitives::Address;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RawAbiResponse {
    status: Option<String>,
    message: Option<String>,
    result: Option<String>,
}

/// Client for an Etherscan-compatible explorer API.
pub struct ExplorerClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl ExplorerClient {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    /// Raw ABI JSON of a verified contract.
    pub async fn get_contract_abi(&self, address: Address) -> Result<String> {
        let address = format!("0x{:x}", address);
        info!(address = %address, "fetching contract ABI from explorer");

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MonitorError::Transport(format!(
                "explorer returned HTTP {}: {}",
                status, body
            )));
        }

        parse_abi_response(&body)
    }
}

/// Interpret an explorer `{status, message, result}` body.
///
/// `status != "1"` is a failure whose detail is in `result`.
pub fn parse_abi_response(body: &str) -> Result<String> {
    let raw: RawAbiResponse = serde_json::from_str(body)
        .map_err(|e| MonitorError::Transport(format!("unreadable explorer response: {}", e)))?;

    if raw.status.as_deref() != Some("1") {
        let detail = raw
            .result
            .or(raw.message)
            .unwrap_or_else(|| "no detail".to_string());
        return Err(MonitorError::Explorer(detail));
    }

    raw.result
        .ok_or_else(|| MonitorError::Explorer("response has no result".to_string()))
}

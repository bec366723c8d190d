//! Physical connection to the messaging bridge.

use crate::config;
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Connection status as reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Open,
    Pairing,
    Closed,
}

/// The messaging gateway connection. Production is the reqwest-backed
/// bridge client; tests stub this out.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Open (or resume) the session.
    async fn connect(&self) -> Result<(), GatewayError>;

    /// Fetch a fresh pairing code for an unpaired session.
    async fn request_pairing_code(&self) -> Result<String, GatewayError>;

    /// Deliver one text message to a fully-qualified destination number.
    async fn deliver(&self, destination: &str, text: &str) -> Result<(), GatewayError>;

    /// Poll the bridge's view of the connection.
    async fn probe(&self) -> Result<ConnectionStatus, GatewayError>;

    /// Close the session handle cleanly.
    async fn close(&self) -> Result<(), GatewayError>;
}

/// HTTP client for the local bridge process.
pub struct BridgeClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PairingCodeResponse {
    code: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: ConnectionStatus,
}

#[derive(Deserialize)]
struct BridgeErrorBody {
    #[serde(default)]
    error: String,
}

impl BridgeClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config() -> Result<Self, GatewayError> {
        let cfg = &config::get().gateway;
        Self::new(
            cfg.bridge_url.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Map a non-success response onto the gateway error taxonomy. Unknown
    /// recipients come back as 404 from the deliver endpoint.
    async fn classify_failure(
        response: reqwest::Response,
        destination: Option<&str>,
    ) -> GatewayError {
        let status = response.status();
        let body: BridgeErrorBody = response.json().await.unwrap_or(BridgeErrorBody {
            error: String::new(),
        });
        match (status, destination) {
            (StatusCode::NOT_FOUND, Some(dest)) => GatewayError::UnknownRecipient(dest.to_string()),
            _ if body.error.is_empty() => {
                GatewayError::Transport(format!("bridge returned status {}", status))
            }
            _ => GatewayError::Transport(body.error),
        }
    }
}

#[async_trait]
impl GatewayTransport for BridgeClient {
    async fn connect(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url("/session/connect"))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify_failure(response, None).await)
        }
    }

    async fn request_pairing_code(&self) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(self.url("/session/pairing-code"))
            .send()
            .await?;
        if response.status().is_success() {
            let body: PairingCodeResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Transport(format!("bad pairing-code body: {}", e)))?;
            Ok(body.code)
        } else {
            Err(Self::classify_failure(response, None).await)
        }
    }

    async fn deliver(&self, destination: &str, text: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url("/messages"))
            .json(&serde_json::json!({
                "destination": destination,
                "text": text,
            }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify_failure(response, Some(destination)).await)
        }
    }

    async fn probe(&self) -> Result<ConnectionStatus, GatewayError> {
        let response = self
            .client
            .get(self.url("/session/status"))
            .send()
            .await?;
        if response.status().is_success() {
            let body: StatusResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Transport(format!("bad status body: {}", e)))?;
            Ok(body.status)
        } else {
            Err(Self::classify_failure(response, None).await)
        }
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let response = self.client.post(self.url("/session/close")).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify_failure(response, None).await)
        }
    }
}

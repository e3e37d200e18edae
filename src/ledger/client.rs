//! HTTP client for the ledger adapter

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::types::{
    NewPrivateDocument, PrivateDocument, SignatureReceipt, SignatureRegistry, SignatureSubmission,
};
use super::LedgerAdapter;
use crate::types::{BridgeError, Result};

/// Ledger client configuration
#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    /// Base URL of the adapter, e.g. "http://localhost:8081"
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// reqwest-backed `LedgerAdapter`
pub struct LedgerClient {
    config: LedgerClientConfig,
    client: Client,
}

impl LedgerClient {
    pub fn new(config: LedgerClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let response = check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            BridgeError::LedgerResponseParsing(format!("unexpected adapter response: {}", e))
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        let url = response.url().path().to_string();
        return Err(BridgeError::NotFound(format!("ledger resource {}", url)));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BridgeError::LedgerUnavailable(format!(
            "adapter returned {}: {}",
            status.as_u16(),
            body
        )));
    }

    Ok(response)
}

#[async_trait]
impl LedgerAdapter for LedgerClient {
    async fn list_private_documents(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.url("/private-documents")).send().await?;
        self.handle_response(response).await
    }

    async fn get_private_document(&self, id: &str) -> Result<PrivateDocument> {
        let url = self.url(&format!("/private-documents/{}", urlencoding::encode(id)));
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn delete_private_document(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/private-documents/{}", urlencoding::encode(id)));
        let response = self.client.delete(&url).send().await?;
        check_status(response).await?;
        debug!(id = %id, "Deleted private document from ledger adapter");
        Ok(())
    }

    async fn publish_private_document(
        &self,
        document: &NewPrivateDocument,
    ) -> Result<PrivateDocument> {
        let response = self
            .client
            .post(self.url("/private-documents"))
            .json(document)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn get_signatures(&self, reference_id: &str, msp_id: &str) -> Result<SignatureRegistry> {
        let url = self.url(&format!(
            "/signatures/{}/{}",
            urlencoding::encode(reference_id),
            urlencoding::encode(msp_id)
        ));
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn put_signature(
        &self,
        reference_id: &str,
        submission: &SignatureSubmission,
    ) -> Result<SignatureReceipt> {
        let url = self.url(&format!("/signatures/{}", urlencoding::encode(reference_id)));
        let response = self.client.put(&url).json(submission).send().await?;
        self.handle_response(response).await
    }
}

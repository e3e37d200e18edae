//! Settlement calculator gateway
//!
//! The discrepancy engine is an external service; docbridge only hands it the
//! usage (and the partner usage when one is linked) and stores whatever JSON
//! result it returns.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::model::Document;
use crate::types::{BridgeError, Result};

/// Computes a settlement body from one usage and optionally its partner
#[async_trait]
pub trait SettlementCalculator: Send + Sync {
    async fn calculate(&self, usage: &Document, partner_usage: Option<&Document>) -> Result<Value>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculationRequest<'a> {
    usage: &'a Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    partner_usage: Option<&'a Document>,
}

// ============================================================================
// HTTP client
// ============================================================================

/// reqwest-backed calculator
pub struct CalculatorClient {
    base_url: String,
    client: Client,
}

impl CalculatorClient {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn calculate_url(&self) -> String {
        format!("{}/settlements/calculate", self.base_url)
    }
}

#[async_trait]
impl SettlementCalculator for CalculatorClient {
    async fn calculate(&self, usage: &Document, partner_usage: Option<&Document>) -> Result<Value> {
        let request = CalculationRequest { usage, partner_usage };
        let response = self
            .client
            .post(self.calculate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| BridgeError::Calculator(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Calculator(format!(
                "calculator returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let result = response
            .json::<Value>()
            .await
            .map_err(|e| BridgeError::Calculator(format!("invalid calculator response: {}", e)))?;
        debug!(usage_id = %usage.id, partner = partner_usage.is_some(), "Settlement calculated");
        Ok(result)
    }
}

// ============================================================================
// Fixed result (tests and dev mode)
// ============================================================================

/// Calculator returning a fixed result and remembering what it was asked
#[derive(Default)]
pub struct StaticCalculator {
    result: Value,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl StaticCalculator {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (usage id, partner usage id) per call
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettlementCalculator for StaticCalculator {
    async fn calculate(&self, usage: &Document, partner_usage: Option<&Document>) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((usage.id.clone(), partner_usage.map(|p| p.id.clone())));
        }
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentKind, DocumentState, HistoryAction, UsageDetails};
    use serde_json::json;

    fn usage() -> Document {
        Document::new(
            "u-1".into(),
            DocumentKind::Usage(UsageDetails {
                contract_id: "c-1".into(),
                contract_reference_id: None,
                msp_owner: "A1".into(),
                msp_receiver: "B1".into(),
                partner_usage_id: None,
            }),
            "usage".into(),
            "1".into(),
            DocumentState::Sent,
            json!({}),
            HistoryAction::Created,
        )
    }

    #[test]
    fn test_request_omits_missing_partner() {
        let usage = usage();
        let value = serde_json::to_value(CalculationRequest {
            usage: &usage,
            partner_usage: None,
        })
        .unwrap();
        assert_eq!(value["usage"]["id"], "u-1");
        assert!(value.get("partnerUsage").is_none());
    }

    #[test]
    fn test_calculate_url() {
        let client = CalculatorClient::new("http://calc:8082/", 1_000).unwrap();
        assert_eq!(client.calculate_url(), "http://calc:8082/settlements/calculate");
    }

    #[tokio::test]
    async fn test_static_calculator_records_calls() {
        let calculator = StaticCalculator::new(json!({ "total": 1 }));
        let result = calculator.calculate(&usage(), None).await.unwrap();
        assert_eq!(result["total"], 1);
        assert_eq!(calculator.calls(), vec![("u-1".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_unreachable_calculator() {
        let client = CalculatorClient::new("http://127.0.0.1:9", 500).unwrap();
        let result = client.calculate(&usage(), None).await;
        assert!(matches!(result, Err(BridgeError::Calculator(_))));
    }
}

//! HTTP client for the review queue
//!
//! Pending submission packets live in the review queue service. Approval is
//! the only pending-to-resolved transition; discard drops a packet without
//! touching any canonical record.

use crate::gateway::{EvidenceUpload, GatewayError, GatewayResult, Resolution, ReviewQueueGateway};
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use shellmatch_common::config::GatewayConfig;
use shellmatch_common::ReviewItem;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    items: Vec<ReviewItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: String,
}

/// Review queue HTTP client
pub struct ReviewQueueClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl ReviewQueueClient {
    /// Build a client from gateway configuration
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be built (should not happen with
    /// valid config)
    pub fn new(config: &GatewayConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn status_error(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) if !envelope.error.is_empty() => envelope.error,
            _ => format!("HTTP {}", status),
        };
        GatewayError::Status { status, message }
    }
}

impl ReviewQueueGateway for ReviewQueueClient {
    async fn list(&self) -> GatewayResult<Vec<ReviewItem>> {
        let response = self
            .authorize(self.client.get(self.url("/api/review-queue")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: ListEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        debug!(count = envelope.items.len(), "Review queue listed");
        Ok(envelope.items)
    }

    async fn approve(&self, item_id: &str, resolution: &Resolution) -> GatewayResult<()> {
        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/api/review/{}/approve", item_id))),
            )
            .json(resolution)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        info!(item_id, "Review item approved");
        Ok(())
    }

    async fn discard(&self, item_id: &str) -> GatewayResult<()> {
        let response = self
            .authorize(
                self.client
                    .delete(self.url(&format!("/api/review/{}", item_id))),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        info!(item_id, "Review item discarded");
        Ok(())
    }

    async fn add_evidence(&self, item_id: &str, images: &[EvidenceUpload]) -> GatewayResult<()> {
        let mut form = multipart::Form::new();
        for (idx, image) in images.iter().enumerate() {
            let part = multipart::Part::bytes(image.bytes.clone())
                .file_name(image.filename.clone());
            form = form
                .part(format!("file_{}", idx), part)
                .text(
                    format!("type_{}", idx),
                    serde_json::to_value(image.kind)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_else(|| "other".to_string()),
                );
        }

        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/api/review-queue/{}/additional-images", item_id))),
            )
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        info!(item_id, count = images.len(), "Evidence images added");
        Ok(())
    }

    async fn remove_evidence(&self, item_id: &str, filename: &str) -> GatewayResult<()> {
        let response = self
            .authorize(
                self.client
                    .delete(self.url(&format!("/api/review-queue/{}/additional-images", item_id))),
            )
            .json(&json!({ "filename": filename }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        info!(item_id, filename, "Evidence image removed");
        Ok(())
    }
}

impl std::fmt::Debug for ReviewQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewQueueClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellmatch_common::ReviewStatus;

    #[test]
    fn list_envelope_parses_items() {
        let raw = r#"{
            "success": true,
            "items": [{
                "id": "req-001",
                "photo_ref": "uploads/req-001.jpg",
                "status": "pending",
                "candidates": [
                    {"turtle_ref": "T1", "rank": 1, "score": 0.92, "image_ref": "c/r1.jpg"},
                    {"turtle_ref": "T2", "rank": 2, "score": 0.81, "image_ref": "c/r2.jpg"}
                ]
            }]
        }"#;
        let envelope: ListEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.items.len(), 1);
        let item = &envelope.items[0];
        assert_eq!(item.status, ReviewStatus::Pending);
        assert_eq!(item.candidates[0].rank, 1);
        assert_eq!(item.candidates[1].turtle_ref, "T2");
    }

    #[test]
    fn empty_queue_parses() {
        let envelope: ListEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(envelope.items.is_empty());
    }
}

//! HTTP client for the canonical record store
//!
//! The store is a spreadsheet-backed service; its API rate-limits hard
//! (429s upstream), so all calls run through a token-bucket rate limiter.
//! List and generate operations use an extended timeout because the
//! upstream service may retry once internally before answering.

use crate::gateway::{
    GatewayError, GatewayResult, LookupOutcome, NameEntry, RecordGateway, RegionHint,
};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use shellmatch_common::config::GatewayConfig;
use shellmatch_common::CanonicalRecord;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info};

/// Backup tabs are never valid partitions for workflow writes or listings
const BACKUP_PARTITIONS: [&str; 3] = ["Backup (Initial State)", "Backup (Inital State)", "Backup"];

#[derive(Debug, Deserialize)]
struct GetEnvelope {
    #[serde(default)]
    data: CanonicalRecord,
    #[serde(default)]
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct CreateEnvelope {
    primary_id: String,
}

#[derive(Debug, Deserialize)]
struct GeneratePrimaryIdEnvelope {
    primary_id: String,
}

#[derive(Debug, Deserialize)]
struct GenerateBiologyIdEnvelope {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PartitionsEnvelope {
    #[serde(default)]
    sheets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NamesEnvelope {
    #[serde(default)]
    names: Vec<NameEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: String,
}

/// Record store HTTP client
pub struct RecordStoreClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    /// Extended timeout for list/generate operations
    extended_timeout: Duration,
    /// Token bucket guarding the upstream spreadsheet API quota
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RecordStoreClient {
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

        // 2 req/sec keeps well under the upstream spreadsheet read quota
        let rate_limiter =
            RateLimiter::direct(Quota::per_second(NonZeroU32::new(2).expect("2 is non-zero")));

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            extended_timeout: Duration::from_secs(config.extended_timeout_secs),
            rate_limiter,
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

    /// Turn a non-success response into a `GatewayError::Status`, pulling
    /// the upstream error message out of the JSON envelope when present.
    async fn status_error(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) if !envelope.error.is_empty() => envelope.error,
            _ => format!("HTTP {}", status),
        };
        GatewayError::Status { status, message }
    }
}

impl RecordGateway for RecordStoreClient {
    async fn get(
        &self,
        primary_id: &str,
        hint: Option<&RegionHint>,
    ) -> GatewayResult<LookupOutcome> {
        self.rate_limiter.until_ready().await;

        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(hint) = hint {
            if let Some(partition) = &hint.partition {
                query.push(("sheet_name", partition.as_str()));
            }
            query.push(("state", hint.state.as_str()));
            query.push(("location", hint.location.as_str()));
        }

        debug!(primary_id, with_hint = hint.is_some(), "Record lookup");

        let response = self
            .authorize(self.client.get(self.url(&format!("/api/sheets/turtle/{}", primary_id))))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: GetEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        debug!(
            primary_id,
            exists = envelope.exists,
            populated = envelope.record_populated(),
            "Record lookup complete"
        );

        Ok(LookupOutcome {
            record: envelope.data,
            exists: envelope.exists,
        })
    }

    async fn create(&self, partition: &str, record: &CanonicalRecord) -> GatewayResult<String> {
        self.rate_limiter.until_ready().await;

        let body = json!({
            "sheet_name": partition,
            "turtle_data": record,
        });

        let response = self
            .authorize(self.client.post(self.url("/api/sheets/turtle")))
            .timeout(self.extended_timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: CreateEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        info!(primary_id = %envelope.primary_id, partition, "Record created");
        Ok(envelope.primary_id)
    }

    async fn update(
        &self,
        primary_id: &str,
        partition: &str,
        record: &CanonicalRecord,
    ) -> GatewayResult<()> {
        self.rate_limiter.until_ready().await;

        let body = json!({
            "sheet_name": partition,
            "turtle_data": record,
        });

        let response = self
            .authorize(
                self.client
                    .put(self.url(&format!("/api/sheets/turtle/{}", primary_id))),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        info!(primary_id, partition, "Record updated");
        Ok(())
    }

    async fn generate_primary_id(&self, state: &str, location: &str) -> GatewayResult<String> {
        self.rate_limiter.until_ready().await;

        let response = self
            .authorize(self.client.post(self.url("/api/sheets/generate-primary-id")))
            .timeout(self.extended_timeout)
            .json(&json!({ "state": state, "location": location }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: GeneratePrimaryIdEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        debug!(primary_id = %envelope.primary_id, "Generated primary id");
        Ok(envelope.primary_id)
    }

    async fn generate_biology_id(&self, gender: &str, partition: &str) -> GatewayResult<String> {
        self.rate_limiter.until_ready().await;

        // Sequence scan runs upstream and is partition-scoped; give it the
        // extended timeout.
        let response = self
            .authorize(self.client.post(self.url("/api/sheets/generate-id")))
            .timeout(self.extended_timeout)
            .json(&json!({ "sex": gender, "sheet_name": partition }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: GenerateBiologyIdEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        debug!(id = %envelope.id, partition, "Generated biology id");
        Ok(envelope.id)
    }

    async fn list_partitions(&self) -> GatewayResult<Vec<String>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .authorize(self.client.get(self.url("/api/sheets/sheets")))
            .timeout(self.extended_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: PartitionsEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        // The server filters backup tabs already; filter again so a stale
        // server never hands the workflow a backup partition.
        let partitions: Vec<String> = envelope
            .sheets
            .into_iter()
            .filter(|name| !BACKUP_PARTITIONS.contains(&name.as_str()))
            .collect();

        Ok(partitions)
    }

    async fn list_all_names(&self) -> GatewayResult<Vec<NameEntry>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .authorize(self.client.get(self.url("/api/sheets/turtle-names")))
            .timeout(self.extended_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let envelope: NamesEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        Ok(envelope.names)
    }

    async fn create_partition(&self, name: &str) -> GatewayResult<()> {
        self.rate_limiter.until_ready().await;

        let response = self
            .authorize(self.client.post(self.url("/api/sheets/sheets")))
            .timeout(self.extended_timeout)
            .json(&json!({ "sheet_name": name }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        info!(partition = name, "Partition created");
        Ok(())
    }
}

impl GetEnvelope {
    fn record_populated(&self) -> usize {
        self.data.populated_field_count()
    }
}

impl std::fmt::Debug for RecordStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStoreClient")
            .field("base_url", &self.base_url)
            .field("extended_timeout", &self.extended_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> RecordStoreClient {
        let config = GatewayConfig {
            base_url: "http://records.test:5000/".to_string(),
            ..Default::default()
        };
        RecordStoreClient::new(&config)
    }

    #[test]
    fn base_url_is_normalized() {
        let client = test_client();
        assert_eq!(client.base_url, "http://records.test:5000");
        assert_eq!(
            client.url("/api/sheets/turtle/T1"),
            "http://records.test:5000/api/sheets/turtle/T1"
        );
    }

    #[test]
    fn get_envelope_defaults_to_not_found() {
        let envelope: GetEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(!envelope.exists);
        assert_eq!(envelope.data.populated_field_count(), 0);
    }

    #[test]
    fn get_envelope_parses_record_and_flag() {
        let envelope: GetEnvelope = serde_json::from_str(
            r#"{"success": true, "exists": true, "data": {"primary_id": "T9", "name": "Shelly"}}"#,
        )
        .unwrap();
        assert!(envelope.exists);
        assert_eq!(envelope.data.primary_id, "T9");
        assert_eq!(envelope.data.name, "Shelly");
    }

    #[test]
    fn backup_partitions_are_filtered() {
        for backup in BACKUP_PARTITIONS {
            assert!(BACKUP_PARTITIONS.contains(&backup));
        }
        let names = vec![
            "Nebraska".to_string(),
            "Backup".to_string(),
            "Kansas".to_string(),
        ];
        let kept: Vec<_> = names
            .into_iter()
            .filter(|n| !BACKUP_PARTITIONS.contains(&n.as_str()))
            .collect();
        assert_eq!(kept, vec!["Nebraska", "Kansas"]);
    }

    #[tokio::test]
    async fn rate_limiter_spaces_requests() {
        use std::time::Instant;

        let client = test_client();

        // First two permits are immediate at 2 req/sec burst
        let start = Instant::now();
        client.rate_limiter.until_ready().await;
        assert!(start.elapsed().as_millis() < 100);
    }
}

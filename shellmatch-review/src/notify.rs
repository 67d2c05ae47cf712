//! Commit notification trigger
//!
//! A successful new-identity commit may trigger an external notification
//! (the surrounding product emails the team about new records). The
//! workflow only invokes the trigger and never depends on its outcome:
//! the webhook implementation spawns the POST and logs failures.

use serde::Serialize;
use shellmatch_common::RecordKey;
use std::time::Duration;
use tracing::{debug, warn};

/// What happened, for the notification payload
#[derive(Debug, Clone, Serialize)]
pub struct CommitNotice {
    pub item_id: String,
    #[serde(flatten)]
    pub record_key: RecordKey,
    pub created_new_identity: bool,
}

/// Fire-and-forget notification sink
pub trait Notifier {
    fn notify(&self, notice: CommitNotice);
}

/// Notifier that does nothing (tests, deployments without a webhook)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, notice: CommitNotice) {
        debug!(item_id = %notice.item_id, "Notification skipped (no sink configured)");
    }
}

/// Posts the notice to a configured webhook URL on a background task
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// # Panics
    /// Panics if the HTTP client cannot be built (should not happen with
    /// valid config)
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notice: CommitNotice) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&notice).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(item_id = %notice.item_id, "Commit notification delivered");
                }
                Ok(response) => {
                    warn!(
                        item_id = %notice.item_id,
                        status = response.status().as_u16(),
                        "Commit notification rejected"
                    );
                }
                Err(e) => {
                    warn!(item_id = %notice.item_id, "Commit notification failed: {}", e);
                }
            }
        });
    }
}

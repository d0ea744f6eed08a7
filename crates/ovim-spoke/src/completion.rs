//! Completion callback into the desired-state API.
//!
//! Once a spoke agent confirms a VDC deletion, the hub tells its own
//! desired-state API to drop the VDC object. Failures are logged by the
//! caller and not retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SpokeError, SpokeResult};

/// Body of `POST /api/v1/vdcs/{name}/deletion-complete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletionComplete {
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// HTTP client for the same-process desired-state API.
#[derive(Clone)]
pub struct CompletionClient {
    base_url: String,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(base_url: &str, timeout: Duration) -> SpokeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SpokeError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn deletion_complete_url(&self, vdc_name: &str) -> String {
        format!("{}/api/v1/vdcs/{vdc_name}/deletion-complete", self.base_url)
    }

    /// Ask the desired-state API to remove a VDC whose spoke side is gone.
    pub async fn complete_deletion(
        &self,
        vdc_name: &str,
        body: &DeletionComplete,
    ) -> SpokeResult<()> {
        let url = self.deletion_complete_url(vdc_name);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SpokeError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            debug!(vdc = %vdc_name, %status, "deletion completion accepted");
            Ok(())
        } else {
            Err(SpokeError::Status(status.as_u16()))
        }
    }
}

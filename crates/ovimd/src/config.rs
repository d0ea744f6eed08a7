//! Hub configuration, loaded from an optional TOML file.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ovim_api::DEFAULT_SPOKE_TOKEN;
use ovim_reconcile::{ReconcilerConfig, Vdc};
use ovim_spoke::resolver::default_cluster_fqdns;
use ovim_spoke::SpokeConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub listen_port: u16,
    /// Base URL for the completion callback; defaults to the local listener.
    pub local_base_url: Option<String>,
    pub spoke_token: String,
    pub reconcile_interval_secs: u64,
    pub push_timeout_secs: u64,
    pub completion_timeout_secs: u64,
    pub delivery_workers: usize,
    pub delivery_queue_capacity: usize,
    /// Display staleness for `GET /spoke/agents`.
    pub stale_after_secs: u64,
    /// Agent freshness required before the reconciler replicates.
    pub reconcile_stale_after_secs: u64,
    pub callback_fqdns: HashMap<String, String>,
    /// VDC objects loaded into the in-memory store at startup.
    pub seed_vdcs: Vec<Vdc>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            local_base_url: None,
            spoke_token: DEFAULT_SPOKE_TOKEN.to_string(),
            reconcile_interval_secs: 30,
            push_timeout_secs: 30,
            completion_timeout_secs: 30,
            delivery_workers: 8,
            delivery_queue_capacity: 1024,
            stale_after_secs: 300,
            reconcile_stale_after_secs: 120,
            callback_fqdns: default_cluster_fqdns(),
            seed_vdcs: Vec::new(),
        }
    }
}

impl HubConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: HubConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.delivery_workers > 0, "delivery_workers must be at least 1");
        anyhow::ensure!(
            self.delivery_queue_capacity > 0,
            "delivery_queue_capacity must be at least 1"
        );
        anyhow::ensure!(
            self.reconcile_interval_secs > 0,
            "reconcile_interval_secs must be at least 1"
        );
        anyhow::ensure!(!self.spoke_token.is_empty(), "spoke_token must not be empty");
        Ok(())
    }

    pub fn local_base_url(&self) -> String {
        self.local_base_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.listen_port))
    }

    pub fn spoke(&self) -> SpokeConfig {
        SpokeConfig {
            local_base_url: self.local_base_url(),
            push_timeout: Duration::from_secs(self.push_timeout_secs),
            completion_timeout: Duration::from_secs(self.completion_timeout_secs),
            workers: self.delivery_workers,
            queue_capacity: self.delivery_queue_capacity,
            cluster_fqdns: self.callback_fqdns.clone(),
        }
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            interval: Duration::from_secs(self.reconcile_interval_secs),
            stale_after: Duration::from_secs(self.reconcile_stale_after_secs),
            ..Default::default()
        }
    }
}

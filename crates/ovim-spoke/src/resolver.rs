//! Callback address resolution.
//!
//! Agents often report a loopback callback URL because they only know
//! their in-pod address. The hub rewrites those to the cluster's
//! externally routable FQDN so push delivery can cross the ingress.

use std::collections::HashMap;
use std::net::IpAddr;

use reqwest::Url;
use tracing::{debug, warn};

/// Built-in cluster → FQDN mappings.
pub const DEFAULT_CLUSTER_FQDNS: &[(&str, &str)] =
    &[("local-cluster", "agent-ovim.apps.ostest.test.metalkube.org")];

/// Static cluster ID → external FQDN map.
#[derive(Debug, Clone, Default)]
pub struct CallbackResolver {
    fqdns: HashMap<String, String>,
}

impl CallbackResolver {
    pub fn new(fqdns: HashMap<String, String>) -> Self {
        Self { fqdns }
    }

    /// Resolver preloaded with [`DEFAULT_CLUSTER_FQDNS`].
    pub fn with_defaults() -> Self {
        Self::new(default_cluster_fqdns())
    }

    /// Rewrite a loopback callback URL to `https://<fqdn>` for the cluster.
    ///
    /// The original port and path are dropped: mapped targets terminate
    /// TLS on 443. Non-loopback URLs and unmapped clusters pass through.
    pub fn resolve(&self, cluster_id: &str, original: &str) -> String {
        if !is_loopback_url(original) {
            return original.to_string();
        }

        match self.fqdns.get(cluster_id) {
            Some(fqdn) => {
                let resolved = format!("https://{fqdn}");
                debug!(%cluster_id, %original, %resolved, "callback url rewritten");
                resolved
            }
            None => {
                warn!(
                    %cluster_id,
                    %original,
                    "no external address mapped for cluster; keeping loopback callback"
                );
                original.to_string()
            }
        }
    }
}

/// The default map as an owned `HashMap`.
pub fn default_cluster_fqdns() -> HashMap<String, String> {
    DEFAULT_CLUSTER_FQDNS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn is_loopback_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

//! VDC desired-state objects and the store that owns them.
//!
//! The hub does not own VDC objects; the declarative-resource store
//! does. The reconciler reaches it through [`VdcStore`]. Replication
//! progress is written as annotations on the object itself.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};

// ── Annotation keys ────────────────────────────────────────────────

pub const ANNOTATION_REPLICATION_REQUIRED: &str = "spoke-replication-required";
pub const ANNOTATION_REPLICATION_IN_PROGRESS: &str = "spoke-replication-in-progress";
pub const ANNOTATION_REPLICATION_STARTED: &str = "spoke-replication-started";
pub const ANNOTATION_AGENT_ID: &str = "spoke-agent-id";
pub const ANNOTATION_DELETION_REQUIRED: &str = "spoke-deletion-required";

/// Compute quota granted to a VDC.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VdcQuota {
    pub cpu_cores: u32,
    pub memory_gi: u32,
    pub storage_gi: u32,
}

/// Per-container defaults and bounds inside the VDC namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VdcLimitRange {
    pub min_cpu_millicores: u32,
    pub max_cpu_millicores: u32,
    pub min_memory_mi: u32,
    pub max_memory_mi: u32,
}

/// A virtual data center as held by the desired-state store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Vdc {
    pub name: String,
    pub org_name: String,
    pub display_name: String,
    pub zone_id: String,
    /// Namespace the spoke should create; derived when empty.
    pub workload_namespace: String,
    pub quota: VdcQuota,
    pub limit_range: Option<VdcLimitRange>,
    pub network_policy: String,
    pub annotations: BTreeMap<String, String>,
}

impl Vdc {
    /// Namespace the VDC's workloads live in on the spoke cluster.
    pub fn target_namespace(&self) -> String {
        if self.workload_namespace.is_empty() {
            format!("vdc-{}-{}", self.org_name, self.name)
        } else {
            self.workload_namespace.clone()
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Whether an annotation is set to "true".
    pub fn flag(&self, key: &str) -> bool {
        self.annotation(key) == Some("true")
    }
}

/// Access to the declarative-resource store holding VDC objects.
pub trait VdcStore: Clone + Send + Sync + 'static {
    fn list(&self) -> impl Future<Output = ReconcileResult<Vec<Vdc>>> + Send;

    fn get(&self, name: &str) -> impl Future<Output = ReconcileResult<Option<Vdc>>> + Send;

    /// Replace a stored VDC, annotations included.
    fn update(&self, vdc: Vdc) -> impl Future<Output = ReconcileResult<()>> + Send;

    /// Remove a VDC. Returns true if it existed.
    fn delete(&self, name: &str) -> impl Future<Output = ReconcileResult<bool>> + Send;
}

/// Process-local `VdcStore`, used when no external store is wired in.
#[derive(Clone, Default)]
pub struct InMemoryVdcStore {
    vdcs: Arc<RwLock<HashMap<String, Vdc>>>,
}

impl InMemoryVdcStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a VDC.
    pub async fn insert(&self, vdc: Vdc) {
        debug!(vdc = %vdc.name, "vdc stored");
        self.vdcs.write().await.insert(vdc.name.clone(), vdc);
    }
}

impl VdcStore for InMemoryVdcStore {
    async fn list(&self) -> ReconcileResult<Vec<Vdc>> {
        let mut vdcs: Vec<Vdc> = self.vdcs.read().await.values().cloned().collect();
        vdcs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vdcs)
    }

    async fn get(&self, name: &str) -> ReconcileResult<Option<Vdc>> {
        Ok(self.vdcs.read().await.get(name).cloned())
    }

    async fn update(&self, vdc: Vdc) -> ReconcileResult<()> {
        let mut vdcs = self.vdcs.write().await;
        match vdcs.get_mut(&vdc.name) {
            Some(slot) => {
                *slot = vdc;
                Ok(())
            }
            None => Err(ReconcileError::NotFound(vdc.name)),
        }
    }

    async fn delete(&self, name: &str) -> ReconcileResult<bool> {
        let existed = self.vdcs.write().await.remove(name).is_some();
        debug!(vdc = %name, existed, "vdc deleted");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vdc(name: &str) -> Vdc {
        Vdc {
            name: name.to_string(),
            org_name: "acme".to_string(),
            zone_id: "z1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn target_namespace_derived_when_unset() {
        let mut v = vdc("dev");
        assert_eq!(v.target_namespace(), "vdc-acme-dev");
        v.workload_namespace = "custom-ns".to_string();
        assert_eq!(v.target_namespace(), "custom-ns");
    }

    #[test]
    fn flag_requires_literal_true() {
        let mut v = vdc("dev");
        v.annotations
            .insert(ANNOTATION_REPLICATION_REQUIRED.to_string(), "True".to_string());
        assert!(!v.flag(ANNOTATION_REPLICATION_REQUIRED));
        v.annotations
            .insert(ANNOTATION_REPLICATION_REQUIRED.to_string(), "true".to_string());
        assert!(v.flag(ANNOTATION_REPLICATION_REQUIRED));
    }

    #[tokio::test]
    async fn in_memory_store_crud() {
        let store = InMemoryVdcStore::new();
        store.insert(vdc("b")).await;
        store.insert(vdc("a")).await;

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        let mut a = store.get("a").await.unwrap().unwrap();
        a.display_name = "Alpha".to_string();
        store.update(a).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().display_name, "Alpha");

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(matches!(
            store.update(vdc("a")).await,
            Err(ReconcileError::NotFound(_))
        ));
    }
}

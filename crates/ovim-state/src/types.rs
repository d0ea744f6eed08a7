//! Domain types for spoke coordination.
//!
//! These are the wire types exchanged with spoke agents (status reports,
//! operations, operation results) plus the hub-side metadata and summary
//! views derived from them. All types serialize as snake_case JSON.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier reported by a spoke agent.
pub type AgentId = String;

/// Hub-issued operation identifier.
pub type OperationId = String;

/// Opaque JSON object used for operation payloads and results.
pub type JsonObject = Map<String, Value>;

/// The only agent status string treated specially.
pub const STATUS_ACTIVE: &str = "active";

/// Status reported for agents whose last report is too old.
pub const STATUS_STALE: &str = "stale";

/// Default staleness threshold for display purposes (5 minutes).
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;

// ── Agent status ───────────────────────────────────────────────────

/// Latest status report posted by a spoke agent.
///
/// Overwritten wholesale on every report; never merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentStatusReport {
    pub agent_id: AgentId,
    pub cluster_id: String,
    pub zone_id: String,
    /// Free-form health string; only "active" has meaning to the hub.
    pub status: String,
    pub version: String,
    pub metrics: HashMap<String, Value>,
    /// Inventory snapshots, used only for counting.
    pub vdcs: Vec<Value>,
    pub vms: Vec<Value>,
    /// Unix timestamp (seconds), stamped by the hub on receipt.
    pub last_hub_contact: u64,
    /// Unix timestamp (seconds), stamped by the hub on receipt.
    pub report_time: u64,
    pub errors: Vec<String>,
    /// Callback URL as reported by the agent, before address resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl AgentStatusReport {
    /// Check that the identity fields are present.
    pub fn validate(&self) -> crate::StateResult<()> {
        let missing: Vec<&str> = [
            ("agent_id", &self.agent_id),
            ("cluster_id", &self.cluster_id),
            ("zone_id", &self.zone_id),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::StateError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Seconds since the report was received.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.report_time)
    }

    /// Whether the agent reported itself as "active".
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

/// Read-time view of an agent returned by `GET /spoke/agents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSummary {
    pub agent_id: AgentId,
    pub cluster_id: String,
    pub zone_id: String,
    /// Reported status, replaced by "stale" when the report is too old.
    pub status: String,
    pub reported_status: String,
    pub version: String,
    pub is_stale: bool,
    pub report_time: u64,
    pub last_hub_contact: u64,
    pub vdc_count: usize,
    pub vm_count: usize,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

// ── Operations ─────────────────────────────────────────────────────

/// Kind of remotely executed work.
///
/// Unknown type strings are preserved as `Other` so callers can queue
/// free-form operations through the diagnostic endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    CreateVdc,
    DeleteVdc,
    CreateResourceQuota,
    CreateLimitRange,
    Other(String),
}

impl OperationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateVdc => "create_vdc",
            Self::DeleteVdc => "delete_vdc",
            Self::CreateResourceQuota => "create_resource_quota",
            Self::CreateLimitRange => "create_limit_range",
            Self::Other(s) => s,
        }
    }

    /// Whether results of this type finish a creation.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            Self::CreateVdc | Self::CreateResourceQuota | Self::CreateLimitRange
        )
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::DeleteVdc)
    }
}

impl From<String> for OperationType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create_vdc" => Self::CreateVdc,
            "delete_vdc" => Self::DeleteVdc,
            "create_resource_quota" => Self::CreateResourceQuota,
            "create_limit_range" => Self::CreateLimitRange,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for OperationType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<OperationType> for String {
    fn from(t: OperationType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work for a spoke agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    #[serde(default)]
    pub payload: JsonObject,
    /// Unix timestamp (seconds) when the hub created the operation.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub timeout_seconds: u64,
}

// ── Results ────────────────────────────────────────────────────────

/// Terminal result of an operation, posted by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OperationResult {
    pub operation_id: OperationId,
    /// "success"/"completed" or "error"/"failed"; other values are opaque.
    pub status: String,
    pub result: JsonObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: u64,
    /// Execution time on the agent, in milliseconds.
    pub duration: u64,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status.as_str(), "success" | "completed")
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status.as_str(), "error" | "failed")
    }

    /// The `status` field inside the result payload, if any.
    pub fn payload_status(&self) -> Option<&str> {
        self.result.get("status").and_then(Value::as_str)
    }

    /// Whether the payload reports a finished deletion.
    pub fn reports_deletion(&self) -> bool {
        matches!(
            self.payload_status(),
            Some("deleted" | "deleted_with_warnings")
        )
    }

    /// Whether the payload looks like a creation result.
    pub fn reports_creation(&self) -> bool {
        self.result.contains_key("namespace")
    }

    /// String warnings carried in the result payload.
    pub fn warnings(&self) -> Vec<String> {
        self.result
            .get("warnings")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|w| w.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ── Metadata ───────────────────────────────────────────────────────

/// Correlation record written when an operation is issued.
///
/// Lets the result processor finish type-specific work after the
/// operation has been pushed or drained and is no longer queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationMetadata {
    pub operation_id: OperationId,
    pub op_type: OperationType,
    pub vdc_name: String,
    pub agent_id: AgentId,
    pub created_at: u64,
}

/// Current Unix time in seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(agent: &str, cluster: &str, zone: &str) -> AgentStatusReport {
        AgentStatusReport {
            agent_id: agent.to_string(),
            cluster_id: cluster.to_string(),
            zone_id: zone.to_string(),
            status: STATUS_ACTIVE.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_accepts_complete_identity() {
        assert!(report("a1", "c1", "z1").validate().is_ok());
    }

    #[test]
    fn validate_names_missing_fields() {
        let err = report("a1", "", " ").validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cluster_id"));
        assert!(msg.contains("zone_id"));
        assert!(!msg.contains("agent_id"));
    }

    #[test]
    fn operation_type_round_trips_known_and_free_form() {
        assert_eq!(OperationType::from("delete_vdc"), OperationType::DeleteVdc);
        assert_eq!(
            OperationType::from("resize_disk"),
            OperationType::Other("resize_disk".to_string())
        );

        let op: Operation = serde_json::from_value(json!({
            "id": "op-1",
            "type": "create_limit_range",
        }))
        .unwrap();
        assert_eq!(op.op_type, OperationType::CreateLimitRange);
        assert!(op.payload.is_empty());

        let v = serde_json::to_value(&op).unwrap();
        assert_eq!(v["type"], "create_limit_range");
    }

    #[test]
    fn result_shape_helpers() {
        let result: OperationResult = serde_json::from_value(json!({
            "operation_id": "op-1",
            "status": "completed",
            "result": {"status": "deleted_with_warnings", "warnings": ["pvc left", 3]},
        }))
        .unwrap();

        assert!(result.is_success());
        assert!(!result.is_failure());
        assert!(result.reports_deletion());
        assert!(!result.reports_creation());
        assert_eq!(result.warnings(), vec!["pvc left".to_string()]);
    }

    #[test]
    fn age_never_underflows() {
        let mut r = report("a1", "c1", "z1");
        r.report_time = 2_000;
        assert_eq!(r.age_secs(1_000), 0);
        assert_eq!(r.age_secs(2_301), 301);
    }
}

//! Operation payloads sent to spoke agents for VDC lifecycle work.

use serde_json::{json, Value};

use ovim_state::JsonObject;

use crate::vdc::Vdc;

/// Payload for a `create_vdc` operation.
pub fn create_vdc_payload(vdc: &Vdc) -> JsonObject {
    let mut payload = base_payload(vdc);
    payload.insert(
        "display_name".to_string(),
        Value::String(vdc.display_name.clone()),
    );
    payload.insert(
        "resource_quota".to_string(),
        json!({
            "cpu": vdc.quota.cpu_cores.to_string(),
            "memory": format!("{}Gi", vdc.quota.memory_gi),
            "storage": format!("{}Gi", vdc.quota.storage_gi),
        }),
    );
    if let Some(lr) = &vdc.limit_range {
        payload.insert(
            "limit_range".to_string(),
            json!({
                "min_cpu": format!("{}m", lr.min_cpu_millicores),
                "max_cpu": format!("{}m", lr.max_cpu_millicores),
                "min_memory": format!("{}Mi", lr.min_memory_mi),
                "max_memory": format!("{}Mi", lr.max_memory_mi),
            }),
        );
    }
    let policy = if vdc.network_policy.is_empty() {
        "default"
    } else {
        vdc.network_policy.as_str()
    };
    payload.insert("network_policy".to_string(), Value::String(policy.to_string()));
    payload
}

/// Payload for a `delete_vdc` operation.
pub fn delete_vdc_payload(vdc: &Vdc) -> JsonObject {
    base_payload(vdc)
}

fn base_payload(vdc: &Vdc) -> JsonObject {
    let mut payload = JsonObject::new();
    payload.insert("vdc_name".to_string(), Value::String(vdc.name.clone()));
    payload.insert("org_name".to_string(), Value::String(vdc.org_name.clone()));
    payload.insert("zone_id".to_string(), Value::String(vdc.zone_id.clone()));
    payload.insert("namespace".to_string(), Value::String(vdc.target_namespace()));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdc::{VdcLimitRange, VdcQuota};

    fn vdc() -> Vdc {
        Vdc {
            name: "dev".to_string(),
            org_name: "acme".to_string(),
            display_name: "Development".to_string(),
            zone_id: "z1".to_string(),
            quota: VdcQuota {
                cpu_cores: 8,
                memory_gi: 32,
                storage_gi: 500,
            },
            ..Default::default()
        }
    }

    #[test]
    fn create_payload_carries_quota_and_default_policy() {
        let p = create_vdc_payload(&vdc());
        assert_eq!(p["vdc_name"], "dev");
        assert_eq!(p["namespace"], "vdc-acme-dev");
        assert_eq!(p["resource_quota"]["cpu"], "8");
        assert_eq!(p["resource_quota"]["memory"], "32Gi");
        assert_eq!(p["resource_quota"]["storage"], "500Gi");
        assert_eq!(p["network_policy"], "default");
        assert!(!p.contains_key("limit_range"));
    }

    #[test]
    fn create_payload_includes_limit_range_when_set() {
        let mut v = vdc();
        v.limit_range = Some(VdcLimitRange {
            min_cpu_millicores: 100,
            max_cpu_millicores: 4000,
            min_memory_mi: 128,
            max_memory_mi: 8192,
        });
        v.network_policy = "isolated".to_string();

        let p = create_vdc_payload(&v);
        assert_eq!(p["limit_range"]["min_cpu"], "100m");
        assert_eq!(p["limit_range"]["max_memory"], "8192Mi");
        assert_eq!(p["network_policy"], "isolated");
    }

    #[test]
    fn delete_payload_is_identity_only() {
        let p = delete_vdc_payload(&vdc());
        assert_eq!(p.len(), 4);
        assert_eq!(p["org_name"], "acme");
    }
}

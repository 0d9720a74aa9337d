//! Loading and validating descriptor bundles.
//!
//! A bundle is a JSON object with optional `nsd`, `vnfd` and
//! `ns_instance_config` arrays. [`from_bundle`] parses each entry into its
//! typed struct and checks the cross references a record manager relies
//! on, so that instantiation never meets a dangling reference.

use std::collections::HashSet;
use std::fmt;

use crate::types::*;

/// Errors while loading a descriptor bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The bundle is missing a required top-level field.
    MissingField { field: String },
    /// A descriptor failed to parse or references something it lacks.
    ConstructError {
        kind: String,
        id: String,
        message: String,
    },
    /// The bundle structure is invalid.
    InvalidBundle(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::MissingField { field } => {
                write!(f, "bundle missing required field: '{}'", field)
            }
            DescriptorError::ConstructError { kind, id, message } => {
                write!(f, "{} '{}': {}", kind, id, message)
            }
            DescriptorError::InvalidBundle(msg) => write!(f, "invalid bundle: {}", msg),
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Parsed and validated contents of a bundle.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBundle {
    pub nsds: Vec<Nsd>,
    pub vnfds: Vec<Vnfd>,
    pub ns_instances: Vec<NsInstanceConfig>,
}

fn construct_err(kind: &str, id: &str, message: impl Into<String>) -> DescriptorError {
    DescriptorError::ConstructError {
        kind: kind.to_string(),
        id: id.to_string(),
        message: message.into(),
    }
}

fn parse_array<T: serde::de::DeserializeOwned>(
    bundle: &serde_json::Value,
    field: &str,
    kind: &str,
) -> Result<Vec<T>, DescriptorError> {
    let Some(value) = bundle.get(field) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| DescriptorError::InvalidBundle(format!("'{}' must be an array", field)))?;
    items
        .iter()
        .map(|item| {
            let id = item.get("id").and_then(|v| v.as_str()).unwrap_or("<unknown>");
            serde_json::from_value(item.clone()).map_err(|e| construct_err(kind, id, e.to_string()))
        })
        .collect()
}

/// Deserialize and validate a descriptor bundle.
pub fn from_bundle(bundle: &serde_json::Value) -> Result<DescriptorBundle, DescriptorError> {
    if !bundle.is_object() {
        return Err(DescriptorError::InvalidBundle(
            "bundle must be a JSON object".to_string(),
        ));
    }
    if bundle.get("nsd").is_none() && bundle.get("vnfd").is_none() {
        return Err(DescriptorError::MissingField {
            field: "nsd".to_string(),
        });
    }

    let nsds: Vec<Nsd> = parse_array(bundle, "nsd", "Nsd")?;
    let vnfds: Vec<Vnfd> = parse_array(bundle, "vnfd", "Vnfd")?;
    let ns_instances: Vec<NsInstanceConfig> =
        parse_array(bundle, "ns_instance_config", "NsInstanceConfig")?;

    for vnfd in &vnfds {
        validate_vnfd(vnfd)?;
    }
    for nsd in &nsds {
        validate_nsd(nsd, &vnfds)?;
    }
    for ns in &ns_instances {
        let nsd_known = ns.nsd.is_some()
            || ns
                .nsd_ref
                .as_deref()
                .is_some_and(|r| nsds.iter().any(|n| n.id == r));
        if !nsd_known {
            return Err(construct_err(
                "NsInstanceConfig",
                &ns.id,
                "neither an inline nsd nor a known nsd_ref",
            ));
        }
    }

    Ok(DescriptorBundle {
        nsds,
        vnfds,
        ns_instances,
    })
}

// ── Validation ──────────────────────────────────────────────────────

/// Check an NSD's internal references. When `vnfds` is non-empty the
/// constituent VNFD references and their connection points must resolve
/// against it too.
pub fn validate_nsd(nsd: &Nsd, vnfds: &[Vnfd]) -> Result<(), DescriptorError> {
    let err = |m: String| construct_err("Nsd", &nsd.id, m);

    let mut seen = HashSet::new();
    for c in &nsd.constituent_vnfd {
        if !seen.insert(c.member_vnf_index) {
            return Err(err(format!(
                "duplicate member_vnf_index {}",
                c.member_vnf_index
            )));
        }
        if !vnfds.is_empty() && !vnfds.iter().any(|v| v.id == c.vnfd_id_ref) {
            return Err(err(format!(
                "constituent {} references unknown vnfd '{}'",
                c.member_vnf_index, c.vnfd_id_ref
            )));
        }
    }

    for vld in &nsd.vld {
        if let Some(profile) = &vld.ip_profile_ref {
            if nsd.ip_profile(profile).is_none() {
                return Err(err(format!(
                    "vld '{}' references unknown ip profile '{}'",
                    vld.id, profile
                )));
            }
        }
        for cp in &vld.vnfd_connection_point_ref {
            let Some(c) = nsd.constituent(cp.member_vnf_index_ref) else {
                return Err(err(format!(
                    "vld '{}' references unknown member index {}",
                    vld.id, cp.member_vnf_index_ref
                )));
            };
            if c.vnfd_id_ref != cp.vnfd_id_ref {
                return Err(err(format!(
                    "vld '{}' member {} is vnfd '{}', not '{}'",
                    vld.id, cp.member_vnf_index_ref, c.vnfd_id_ref, cp.vnfd_id_ref
                )));
            }
            if let Some(vnfd) = vnfds.iter().find(|v| v.id == cp.vnfd_id_ref) {
                if vnfd.connection_point(&cp.vnfd_connection_point_ref).is_none() {
                    return Err(err(format!(
                        "vld '{}' references unknown connection point '{}' on vnfd '{}'",
                        vld.id, cp.vnfd_connection_point_ref, vnfd.id
                    )));
                }
            }
        }
    }

    for group in &nsd.scaling_group_descriptor {
        if group.min_instance_count > group.max_instance_count {
            return Err(err(format!(
                "scaling group '{}' has min {} above max {}",
                group.name, group.min_instance_count, group.max_instance_count
            )));
        }
        for member in &group.vnfd_member {
            if nsd.constituent(member.member_vnf_index_ref).is_none() {
                return Err(err(format!(
                    "scaling group '{}' references unknown member index {}",
                    group.name, member.member_vnf_index_ref
                )));
            }
        }
        for action in &group.scaling_config_action {
            if nsd
                .service_primitive(&action.ns_service_primitive_name_ref)
                .is_none()
            {
                return Err(err(format!(
                    "scaling group '{}' action '{}' references unknown primitive '{}'",
                    group.name,
                    action.trigger.as_str(),
                    action.ns_service_primitive_name_ref
                )));
            }
        }
    }

    let vnfd_ids: HashSet<&str> = nsd
        .constituent_vnfd
        .iter()
        .map(|c| c.vnfd_id_ref.as_str())
        .collect();
    for dep in &nsd.vnf_dependency {
        for r in [&dep.vnf_source_ref, &dep.vnf_depends_on_ref] {
            if !vnfd_ids.contains(r.as_str()) {
                return Err(err(format!("vnf dependency references unknown vnfd '{}'", r)));
            }
        }
    }

    for fg in &nsd.vnffgd {
        for rsp in &fg.rsp {
            for hop in &rsp.vnfd_connection_point_ref {
                if nsd.constituent(hop.member_vnf_index_ref).is_none() {
                    return Err(err(format!(
                        "vnffgd '{}' rsp '{}' references unknown member index {}",
                        fg.id, rsp.id, hop.member_vnf_index_ref
                    )));
                }
            }
        }
        for cl in &fg.classifier {
            if !fg.rsp.iter().any(|r| r.id == cl.rsp_id_ref) {
                return Err(err(format!(
                    "vnffgd '{}' classifier '{}' references unknown rsp '{}'",
                    fg.id, cl.id, cl.rsp_id_ref
                )));
            }
        }
    }

    Ok(())
}

/// Check a VNFD's internal references.
pub fn validate_vnfd(vnfd: &Vnfd) -> Result<(), DescriptorError> {
    let err = |m: String| construct_err("Vnfd", &vnfd.id, m);

    if vnfd.vdu.is_empty() {
        return Err(err("no vdu defined".to_string()));
    }
    if let Some(mgmt) = vnfd.mgmt_interface.as_ref().and_then(|m| m.vdu_id.as_deref()) {
        if vnfd.vdu(mgmt).is_none() {
            return Err(err(format!("mgmt interface references unknown vdu '{}'", mgmt)));
        }
    }

    let vdu_ids: HashSet<&str> = vnfd.vdu.iter().map(|v| v.id.as_str()).collect();
    for vdu in &vnfd.vdu {
        for intf in &vdu.interface {
            match intf.kind {
                InterfaceKind::External => {
                    if let Some(cp) = &intf.external_connection_point_ref {
                        if vnfd.connection_point(cp).is_none() {
                            return Err(err(format!(
                                "vdu '{}' interface '{}' references unknown connection point '{}'",
                                vdu.id, intf.name, cp
                            )));
                        }
                    }
                }
                InterfaceKind::Internal => {
                    let Some(cp) = &intf.internal_connection_point_ref else {
                        return Err(err(format!(
                            "vdu '{}' internal interface '{}' has no internal_connection_point_ref",
                            vdu.id, intf.name
                        )));
                    };
                    if vdu.internal_connection_point(cp).is_none() {
                        return Err(err(format!(
                            "vdu '{}' interface '{}' references unknown internal connection point '{}'",
                            vdu.id, intf.name, cp
                        )));
                    }
                }
            }
        }

        if let Some(script) = &vdu.cloud_init {
            for referenced in cloud_init_vdu_refs(script) {
                if !vdu_ids.contains(referenced.as_str()) {
                    return Err(err(format!(
                        "vdu '{}' cloud-init references unknown vdu '{}'",
                        vdu.id, referenced
                    )));
                }
            }
        }
    }

    for vld in &vnfd.internal_vld {
        for cp in &vld.internal_connection_point {
            let known = vnfd
                .vdu
                .iter()
                .any(|v| v.internal_connection_point(&cp.id_ref).is_some());
            if !known {
                return Err(err(format!(
                    "internal vld '{}' references unknown connection point '{}'",
                    vld.id, cp.id_ref
                )));
            }
        }
        if let Some(profile) = &vld.ip_profile_ref {
            if vnfd.ip_profile(profile).is_none() {
                return Err(err(format!(
                    "internal vld '{}' references unknown ip profile '{}'",
                    vld.id, profile
                )));
            }
        }
    }

    Ok(())
}

/// VDU ids referenced as `{{ vdu[<id>]... }}` in a cloud-init script.
pub fn cloud_init_vdu_refs(script: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut rest = script;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let inner = after[..end].trim();
        if let Some(tail) = inner.strip_prefix("vdu[") {
            if let Some(close) = tail.find(']') {
                let id = tail[..close].to_string();
                if !refs.contains(&id) {
                    refs.push(id);
                }
            }
        }
        rest = &after[end + 2..];
    }
    refs
}

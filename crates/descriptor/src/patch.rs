//! Typed input-parameter patches.
//!
//! A descriptor declares which of its fields an NS instance may override
//! (`input_parameter_xpath`, the allow-list). An NS instance config carries
//! a list of `(field, value)` pairs. Applying them is a direct field
//! assignment on the typed descriptor; no generic path interpretation
//! happens at apply time.
//!
//! Field paths have a compact textual form used in JSON:
//!
//! - NSD: `name`, `short-name`, `vendor`, `description`, `version`,
//!   `vld[<id>].vim-network-name`, `vld[<id>].ip-profile-ref`,
//!   `constituent-vnfd[<index>].start-by-default`,
//!   `scaling-group-descriptor[<name>].min-instance-count`,
//!   `scaling-group-descriptor[<name>].max-instance-count`
//! - VNFD: `vendor`, `description`, `version`, `vdu[<id>].image`,
//!   `vdu[<id>].image-checksum`, `vdu[<id>].count`, `vdu[<id>].cloud-init`,
//!   `vdu[<id>].vm-flavor.vcpu-count`, `vdu[<id>].vm-flavor.memory-mb`,
//!   `vdu[<id>].vm-flavor.storage-gb`, `internal-vld[<id>].vim-network-name`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Nsd, VmFlavor, Vnfd};

// ── Errors ──────────────────────────────────────────────────────────

/// Errors from parsing or applying a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The field path text is not a recognised path.
    UnknownPath(String),
    /// The path is well formed but names an element the descriptor lacks.
    MissingTarget { path: String },
    /// The value does not parse for the field's type.
    InvalidValue { path: String, value: String },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::UnknownPath(p) => write!(f, "unrecognised input parameter path '{}'", p),
            PatchError::MissingTarget { path } => {
                write!(f, "input parameter path '{}' names no descriptor element", path)
            }
            PatchError::InvalidValue { path, value } => {
                write!(f, "invalid value '{}' for input parameter '{}'", value, path)
            }
        }
    }
}

impl std::error::Error for PatchError {}

// ── Parameter records ───────────────────────────────────────────────

/// One `(field, value)` override requested by an NS instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputParameter<F> {
    pub xpath: F,
    pub value: String,
}

/// One allow-list entry on a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputParameterSpec<F> {
    pub xpath: F,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// What happened when a parameter list was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome<F> {
    /// Fields assigned, from either a request or an allow-list default.
    pub applied: Vec<F>,
    /// Requested fields absent from the allow-list; left untouched.
    pub skipped: Vec<F>,
}

impl<F> Default for PatchOutcome<F> {
    fn default() -> Self {
        Self {
            applied: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// A descriptor that accepts typed patches.
pub trait PatchTarget {
    type Field: Clone + PartialEq + fmt::Display;

    fn allow_list(&self) -> &[InputParameterSpec<Self::Field>];

    fn assign(&mut self, field: &Self::Field, value: &str) -> Result<(), PatchError>;
}

/// Apply `params` to `target`, honouring its allow-list.
///
/// Allow-listed fields with a `default_value` that the request does not
/// mention receive the default. Requested fields outside the allow-list
/// are reported in [`PatchOutcome::skipped`] and not applied.
pub fn apply_input_parameters<T: PatchTarget>(
    target: &mut T,
    params: &[InputParameter<T::Field>],
) -> Result<PatchOutcome<T::Field>, PatchError> {
    let allowed: Vec<InputParameterSpec<T::Field>> = target.allow_list().to_vec();
    let mut outcome = PatchOutcome::default();

    for param in params {
        if allowed.iter().any(|spec| spec.xpath == param.xpath) {
            target.assign(&param.xpath, &param.value)?;
            outcome.applied.push(param.xpath.clone());
        } else {
            outcome.skipped.push(param.xpath.clone());
        }
    }

    for spec in &allowed {
        let requested = params.iter().any(|p| p.xpath == spec.xpath);
        if let (false, Some(default)) = (requested, spec.default_value.as_deref()) {
            target.assign(&spec.xpath, default)?;
            outcome.applied.push(spec.xpath.clone());
        }
    }

    Ok(outcome)
}

// ── Path parsing helpers ────────────────────────────────────────────

/// Split `kind[key].rest` into its three parts.
fn split_indexed(path: &str) -> Option<(&str, &str, &str)> {
    let open = path.find('[')?;
    let close = path[open..].find(']')? + open;
    let rest = path[close + 1..].strip_prefix('.')?;
    Some((&path[..open], &path[open + 1..close], rest))
}

fn parse_num<N: FromStr>(path: &str, value: &str) -> Result<N, PatchError> {
    value.trim().parse().map_err(|_| PatchError::InvalidValue {
        path: path.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(path: &str, value: &str) -> Result<bool, PatchError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(PatchError::InvalidValue {
            path: path.to_string(),
            value: value.to_string(),
        }),
    }
}

// ── NSD fields ──────────────────────────────────────────────────────

/// A patchable NSD field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NsdField {
    Name,
    ShortName,
    Vendor,
    Description,
    Version,
    VldVimNetworkName { vld_id: String },
    VldIpProfileRef { vld_id: String },
    ConstituentStartByDefault { member_vnf_index: u32 },
    ScalingGroupMinInstances { group: String },
    ScalingGroupMaxInstances { group: String },
}

impl fmt::Display for NsdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NsdField::Name => write!(f, "name"),
            NsdField::ShortName => write!(f, "short-name"),
            NsdField::Vendor => write!(f, "vendor"),
            NsdField::Description => write!(f, "description"),
            NsdField::Version => write!(f, "version"),
            NsdField::VldVimNetworkName { vld_id } => {
                write!(f, "vld[{}].vim-network-name", vld_id)
            }
            NsdField::VldIpProfileRef { vld_id } => write!(f, "vld[{}].ip-profile-ref", vld_id),
            NsdField::ConstituentStartByDefault { member_vnf_index } => {
                write!(f, "constituent-vnfd[{}].start-by-default", member_vnf_index)
            }
            NsdField::ScalingGroupMinInstances { group } => {
                write!(f, "scaling-group-descriptor[{}].min-instance-count", group)
            }
            NsdField::ScalingGroupMaxInstances { group } => {
                write!(f, "scaling-group-descriptor[{}].max-instance-count", group)
            }
        }
    }
}

impl FromStr for NsdField {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "name" => NsdField::Name,
            "short-name" => NsdField::ShortName,
            "vendor" => NsdField::Vendor,
            "description" => NsdField::Description,
            "version" => NsdField::Version,
            _ => match split_indexed(s) {
                Some(("vld", id, "vim-network-name")) => NsdField::VldVimNetworkName {
                    vld_id: id.to_string(),
                },
                Some(("vld", id, "ip-profile-ref")) => NsdField::VldIpProfileRef {
                    vld_id: id.to_string(),
                },
                Some(("constituent-vnfd", idx, "start-by-default")) => {
                    NsdField::ConstituentStartByDefault {
                        member_vnf_index: idx
                            .parse()
                            .map_err(|_| PatchError::UnknownPath(s.to_string()))?,
                    }
                }
                Some(("scaling-group-descriptor", g, "min-instance-count")) => {
                    NsdField::ScalingGroupMinInstances {
                        group: g.to_string(),
                    }
                }
                Some(("scaling-group-descriptor", g, "max-instance-count")) => {
                    NsdField::ScalingGroupMaxInstances {
                        group: g.to_string(),
                    }
                }
                _ => return Err(PatchError::UnknownPath(s.to_string())),
            },
        };
        Ok(field)
    }
}

impl TryFrom<String> for NsdField {
    type Error = PatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NsdField> for String {
    fn from(field: NsdField) -> Self {
        field.to_string()
    }
}

impl PatchTarget for Nsd {
    type Field = NsdField;

    fn allow_list(&self) -> &[InputParameterSpec<NsdField>] {
        &self.input_parameter_xpath
    }

    fn assign(&mut self, field: &NsdField, value: &str) -> Result<(), PatchError> {
        let path = field.to_string();
        let missing = || PatchError::MissingTarget { path: path.clone() };
        match field {
            NsdField::Name => self.name = value.to_string(),
            NsdField::ShortName => self.short_name = Some(value.to_string()),
            NsdField::Vendor => self.vendor = Some(value.to_string()),
            NsdField::Description => self.description = Some(value.to_string()),
            NsdField::Version => self.version = Some(value.to_string()),
            NsdField::VldVimNetworkName { vld_id } => {
                let vld = self.vld.iter_mut().find(|v| &v.id == vld_id).ok_or_else(missing)?;
                vld.vim_network_name = Some(value.to_string());
            }
            NsdField::VldIpProfileRef { vld_id } => {
                let vld = self.vld.iter_mut().find(|v| &v.id == vld_id).ok_or_else(missing)?;
                vld.ip_profile_ref = Some(value.to_string());
            }
            NsdField::ConstituentStartByDefault { member_vnf_index } => {
                let flag = parse_bool(&path, value)?;
                let c = self
                    .constituent_vnfd
                    .iter_mut()
                    .find(|c| c.member_vnf_index == *member_vnf_index)
                    .ok_or_else(missing)?;
                c.start_by_default = flag;
            }
            NsdField::ScalingGroupMinInstances { group } => {
                let n = parse_num(&path, value)?;
                let g = self
                    .scaling_group_descriptor
                    .iter_mut()
                    .find(|g| &g.name == group)
                    .ok_or_else(missing)?;
                g.min_instance_count = n;
            }
            NsdField::ScalingGroupMaxInstances { group } => {
                let n = parse_num(&path, value)?;
                let g = self
                    .scaling_group_descriptor
                    .iter_mut()
                    .find(|g| &g.name == group)
                    .ok_or_else(missing)?;
                g.max_instance_count = n;
            }
        }
        Ok(())
    }
}

// ── VNFD fields ─────────────────────────────────────────────────────

/// A patchable VNFD field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VnfdField {
    Vendor,
    Description,
    Version,
    VduImage { vdu_id: String },
    VduImageChecksum { vdu_id: String },
    VduCount { vdu_id: String },
    VduCloudInit { vdu_id: String },
    VduVcpuCount { vdu_id: String },
    VduMemoryMb { vdu_id: String },
    VduStorageGb { vdu_id: String },
    InternalVldVimNetworkName { vld_id: String },
}

impl fmt::Display for VnfdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VnfdField::Vendor => write!(f, "vendor"),
            VnfdField::Description => write!(f, "description"),
            VnfdField::Version => write!(f, "version"),
            VnfdField::VduImage { vdu_id } => write!(f, "vdu[{}].image", vdu_id),
            VnfdField::VduImageChecksum { vdu_id } => write!(f, "vdu[{}].image-checksum", vdu_id),
            VnfdField::VduCount { vdu_id } => write!(f, "vdu[{}].count", vdu_id),
            VnfdField::VduCloudInit { vdu_id } => write!(f, "vdu[{}].cloud-init", vdu_id),
            VnfdField::VduVcpuCount { vdu_id } => write!(f, "vdu[{}].vm-flavor.vcpu-count", vdu_id),
            VnfdField::VduMemoryMb { vdu_id } => write!(f, "vdu[{}].vm-flavor.memory-mb", vdu_id),
            VnfdField::VduStorageGb { vdu_id } => {
                write!(f, "vdu[{}].vm-flavor.storage-gb", vdu_id)
            }
            VnfdField::InternalVldVimNetworkName { vld_id } => {
                write!(f, "internal-vld[{}].vim-network-name", vld_id)
            }
        }
    }
}

impl FromStr for VnfdField {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "vendor" => VnfdField::Vendor,
            "description" => VnfdField::Description,
            "version" => VnfdField::Version,
            _ => match split_indexed(s) {
                Some(("vdu", id, rest)) => {
                    let vdu_id = id.to_string();
                    match rest {
                        "image" => VnfdField::VduImage { vdu_id },
                        "image-checksum" => VnfdField::VduImageChecksum { vdu_id },
                        "count" => VnfdField::VduCount { vdu_id },
                        "cloud-init" => VnfdField::VduCloudInit { vdu_id },
                        "vm-flavor.vcpu-count" => VnfdField::VduVcpuCount { vdu_id },
                        "vm-flavor.memory-mb" => VnfdField::VduMemoryMb { vdu_id },
                        "vm-flavor.storage-gb" => VnfdField::VduStorageGb { vdu_id },
                        _ => return Err(PatchError::UnknownPath(s.to_string())),
                    }
                }
                Some(("internal-vld", id, "vim-network-name")) => {
                    VnfdField::InternalVldVimNetworkName {
                        vld_id: id.to_string(),
                    }
                }
                _ => return Err(PatchError::UnknownPath(s.to_string())),
            },
        };
        Ok(field)
    }
}

impl TryFrom<String> for VnfdField {
    type Error = PatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VnfdField> for String {
    fn from(field: VnfdField) -> Self {
        field.to_string()
    }
}

impl PatchTarget for Vnfd {
    type Field = VnfdField;

    fn allow_list(&self) -> &[InputParameterSpec<VnfdField>] {
        &self.input_parameter_xpath
    }

    fn assign(&mut self, field: &VnfdField, value: &str) -> Result<(), PatchError> {
        let path = field.to_string();
        let missing = || PatchError::MissingTarget { path: path.clone() };
        let vdu_id = match field {
            VnfdField::Vendor => {
                self.vendor = Some(value.to_string());
                return Ok(());
            }
            VnfdField::Description => {
                self.description = Some(value.to_string());
                return Ok(());
            }
            VnfdField::Version => {
                self.version = Some(value.to_string());
                return Ok(());
            }
            VnfdField::InternalVldVimNetworkName { vld_id } => {
                let vld = self
                    .internal_vld
                    .iter_mut()
                    .find(|v| &v.id == vld_id)
                    .ok_or_else(missing)?;
                vld.vim_network_name = Some(value.to_string());
                return Ok(());
            }
            VnfdField::VduImage { vdu_id }
            | VnfdField::VduImageChecksum { vdu_id }
            | VnfdField::VduCount { vdu_id }
            | VnfdField::VduCloudInit { vdu_id }
            | VnfdField::VduVcpuCount { vdu_id }
            | VnfdField::VduMemoryMb { vdu_id }
            | VnfdField::VduStorageGb { vdu_id } => vdu_id,
        };

        let vdu = self
            .vdu
            .iter_mut()
            .find(|v| &v.id == vdu_id)
            .ok_or_else(missing)?;
        match field {
            VnfdField::VduImage { .. } => vdu.image = Some(value.to_string()),
            VnfdField::VduImageChecksum { .. } => vdu.image_checksum = Some(value.to_string()),
            VnfdField::VduCount { .. } => vdu.count = parse_num(&path, value)?,
            VnfdField::VduCloudInit { .. } => vdu.cloud_init = Some(value.to_string()),
            VnfdField::VduVcpuCount { .. } => {
                vdu.vm_flavor.get_or_insert_with(VmFlavor::default).vcpu_count =
                    Some(parse_num(&path, value)?)
            }
            VnfdField::VduMemoryMb { .. } => {
                vdu.vm_flavor.get_or_insert_with(VmFlavor::default).memory_mb =
                    Some(parse_num(&path, value)?)
            }
            VnfdField::VduStorageGb { .. } => {
                vdu.vm_flavor.get_or_insert_with(VmFlavor::default).storage_gb =
                    Some(parse_num(&path, value)?)
            }
            _ => unreachable!("non-VDU fields returned above"),
        }
        Ok(())
    }
}

//! Typed structs for network service and VNF descriptors.
//!
//! Descriptors are immutable once loaded: records hold an `Arc` snapshot
//! for their whole lifetime. The only sanctioned mutation is applying an
//! input-parameter patch (see [`crate::patch`]) before the snapshot is
//! taken.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::patch::{InputParameterSpec, NsdField, VnfdField};

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn default_max_instances() -> u32 {
    10
}

// ── Network service descriptor ──────────────────────────────────────

/// A network service descriptor (NSD).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nsd {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub constituent_vnfd: Vec<ConstituentVnfd>,
    #[serde(default)]
    pub vld: Vec<Vld>,
    #[serde(default)]
    pub ip_profiles: Vec<IpProfile>,
    #[serde(default)]
    pub vnffgd: Vec<Vnffgd>,
    #[serde(default)]
    pub scaling_group_descriptor: Vec<ScalingGroupDescriptor>,
    #[serde(default)]
    pub vnf_dependency: Vec<VnfDependency>,
    /// Allow-list of patchable fields, with optional default values.
    #[serde(default)]
    pub input_parameter_xpath: Vec<InputParameterSpec<NsdField>>,
    #[serde(default)]
    pub service_primitive: Vec<ServicePrimitive>,
    /// Directory holding the NSD package (scaling scripts, cloud-init files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_dir: Option<PathBuf>,
}

impl Nsd {
    pub fn constituent(&self, member_vnf_index: u32) -> Option<&ConstituentVnfd> {
        self.constituent_vnfd
            .iter()
            .find(|c| c.member_vnf_index == member_vnf_index)
    }

    pub fn vld(&self, vld_id: &str) -> Option<&Vld> {
        self.vld.iter().find(|v| v.id == vld_id)
    }

    pub fn ip_profile(&self, name: &str) -> Option<&IpProfile> {
        self.ip_profiles.iter().find(|p| p.name == name)
    }

    pub fn scaling_group(&self, name: &str) -> Option<&ScalingGroupDescriptor> {
        self.scaling_group_descriptor.iter().find(|g| g.name == name)
    }

    pub fn service_primitive(&self, name: &str) -> Option<&ServicePrimitive> {
        self.service_primitive.iter().find(|p| p.name == name)
    }

    /// Member indexes that belong to some scaling group. Those VNFs are not
    /// part of the base deployment; they are created per scaling instance.
    pub fn scaled_member_indexes(&self) -> Vec<u32> {
        self.scaling_group_descriptor
            .iter()
            .flat_map(|g| g.vnfd_member.iter().map(|m| m.member_vnf_index_ref))
            .collect()
    }
}

/// A VNF placed in the network service at a member index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstituentVnfd {
    pub member_vnf_index: u32,
    pub vnfd_id_ref: String,
    #[serde(default = "default_true")]
    pub start_by_default: bool,
}

/// A virtual link descriptor at NS level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vld {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub vl_type: Option<String>,
    /// Pre-existing VIM network to attach to instead of creating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vim_network_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_network: Option<ProviderNetwork>,
    #[serde(default)]
    pub mgmt_network: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_profile_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub vnfd_connection_point_ref: Vec<VnfdConnectionPointRef>,
    #[serde(default)]
    pub virtual_connection_points: Vec<VirtualConnectionPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderNetwork {
    pub physical_network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VnfdConnectionPointRef {
    pub member_vnf_index_ref: u32,
    pub vnfd_id_ref: String,
    pub vnfd_connection_point_ref: String,
}

/// An overlay connection point sharing the underlying network of a VL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualConnectionPoint {
    pub name: String,
    #[serde(default)]
    pub associated_cps: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub cp_type: Option<String>,
}

// ── IP profiles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_profile_params: Option<IpProfileParams>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    #[default]
    Ipv4,
    Ipv6,
}

/// IP profile parameters. Every field is optional; the orchestrator fills
/// gaps with derived defaults before a network is requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IpProfileParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<IpVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,
    #[serde(default)]
    pub dns_server: Vec<DnsServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_params: Option<DhcpParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsServer {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DhcpParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

// ── Dependencies, scaling, primitives ───────────────────────────────

/// `vnf_source_ref` may only start once `vnf_depends_on_ref` has been
/// instantiated. Both are VNFD ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VnfDependency {
    pub vnf_source_ref: String,
    pub vnf_depends_on_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingGroupDescriptor {
    pub name: String,
    #[serde(default)]
    pub min_instance_count: u32,
    #[serde(default = "default_max_instances")]
    pub max_instance_count: u32,
    #[serde(default)]
    pub vnfd_member: Vec<ScalingVnfdMember>,
    #[serde(default)]
    pub scaling_config_action: Vec<ScalingConfigAction>,
}

impl ScalingGroupDescriptor {
    pub fn config_action(&self, trigger: ScalingTrigger) -> Option<&ScalingConfigAction> {
        self.scaling_config_action
            .iter()
            .find(|a| a.trigger == trigger)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingVnfdMember {
    pub member_vnf_index_ref: u32,
    #[serde(default = "default_one")]
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingTrigger {
    PreScaleOut,
    PostScaleOut,
    PreScaleIn,
    PostScaleIn,
}

impl ScalingTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingTrigger::PreScaleOut => "pre-scale-out",
            ScalingTrigger::PostScaleOut => "post-scale-out",
            ScalingTrigger::PreScaleIn => "pre-scale-in",
            ScalingTrigger::PostScaleIn => "post-scale-in",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingConfigAction {
    pub trigger: ScalingTrigger,
    pub ns_service_primitive_name_ref: String,
}

/// A named NS-level operation, optionally backed by a script in the
/// NSD package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePrimitive {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_defined_script: Option<String>,
}

// ── VNF forwarding graphs ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vnffgd {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rsp: Vec<RspDescriptor>,
    #[serde(default)]
    pub classifier: Vec<ClassifierDescriptor>,
}

/// Rendered service path template: an ordered list of VNF hops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RspDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub vnfd_connection_point_ref: Vec<RspHopRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RspHopRef {
    pub member_vnf_index_ref: u32,
    pub order: u32,
    pub vnfd_id_ref: String,
    pub vnfd_ingress_connection_point_ref: String,
    pub vnfd_egress_connection_point_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierDescriptor {
    pub id: String,
    pub name: String,
    pub rsp_id_ref: String,
    pub member_vnf_index_ref: u32,
    pub vnfd_id_ref: String,
    pub vnfd_connection_point_ref: String,
    #[serde(default)]
    pub match_attributes: Vec<MatchAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MatchAttributes {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_proto: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,
}

// ── VNF descriptor ──────────────────────────────────────────────────

/// A VNF descriptor (VNFD).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vnfd {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_interface: Option<MgmtInterface>,
    #[serde(default)]
    pub connection_point: Vec<ConnectionPoint>,
    #[serde(default)]
    pub vdu: Vec<Vdu>,
    #[serde(default)]
    pub internal_vld: Vec<InternalVld>,
    #[serde(default)]
    pub ip_profiles: Vec<IpProfile>,
    /// Role of this VNF in a service function chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_function_chain: Option<SfcRole>,
    #[serde(default)]
    pub input_parameter_xpath: Vec<InputParameterSpec<VnfdField>>,
    /// Directory holding the VNFD package (cloud-init files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_dir: Option<PathBuf>,
}

impl Vnfd {
    pub fn vdu(&self, vdu_id: &str) -> Option<&Vdu> {
        self.vdu.iter().find(|v| v.id == vdu_id)
    }

    pub fn connection_point(&self, name: &str) -> Option<&ConnectionPoint> {
        self.connection_point.iter().find(|c| c.name == name)
    }

    pub fn ip_profile(&self, name: &str) -> Option<&IpProfile> {
        self.ip_profiles.iter().find(|p| p.name == name)
    }

    /// The VDU carrying the management interface, if declared.
    pub fn mgmt_vdu_id(&self) -> Option<&str> {
        self.mgmt_interface
            .as_ref()
            .and_then(|m| m.vdu_id.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SfcRole {
    Unaware,
    Classifier,
    Sf,
    Sff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MgmtInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdu_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// An external connection point of a VNF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionPoint {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub cp_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_security_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VmFlavor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpu_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_gb: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// A virtual deployment unit: one VM template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vdu {
    pub id: String,
    pub name: String,
    #[serde(default = "default_one")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_flavor: Option<VmFlavor>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub interface: Vec<VduInterface>,
    #[serde(default)]
    pub internal_connection_point: Vec<InternalConnectionPoint>,
    /// Inline cloud-init text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<String>,
    /// Cloud-init file name inside the VNFD package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_boot_data: Option<SupplementalBootData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_vpci: Option<String>,
}

impl Vdu {
    pub fn internal_connection_point(&self, id: &str) -> Option<&InternalConnectionPoint> {
        self.internal_connection_point.iter().find(|cp| cp.id == id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfaceKind {
    External,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VduInterface {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InterfaceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_connection_point_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_connection_point_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_interface: Option<VirtualInterface>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VirtualInterface {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpci: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InternalConnectionPoint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_security_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SupplementalBootData {
    #[serde(default)]
    pub custom_meta_data: Vec<CustomMetaData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomMetaData {
    pub name: String,
    pub value: String,
    /// `CLOUD_INIT` entries are substitutable as `{{ CI... }}` tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// A network internal to one VNF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InternalVld {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub vl_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vim_network_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_profile_ref: Option<String>,
    #[serde(default)]
    pub internal_connection_point: Vec<InternalCpRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InternalCpRef {
    pub id_ref: String,
}

// ── NS instance config ──────────────────────────────────────────────

/// The `ns-instance-config` record: a request to run an NSD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NsInstanceConfig {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inline NSD snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsd: Option<Nsd>,
    /// Catalog reference, used when `nsd` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsd_ref: Option<String>,
    /// Primary cloud account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    /// Named external resource orchestrator; absent selects the native path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_orchestrator: Option<String>,
    #[serde(default)]
    pub vnf_datacenter_map: Vec<VnfDatacenterMapping>,
    #[serde(default)]
    pub vl_datacenter_map: Vec<VlDatacenterMapping>,
    #[serde(default)]
    pub input_parameter: Vec<crate::patch::InputParameter<NsdField>>,
    #[serde(default)]
    pub vnf_input_parameter: Vec<VnfInputParameters>,
    #[serde(default)]
    pub scaling_group: Vec<ConfiguredScalingGroup>,
    #[serde(default)]
    pub key_pair: Vec<KeyPair>,
    #[serde(default)]
    pub user: Vec<User>,
}

impl NsInstanceConfig {
    pub fn vnf_datacenter(&self, member_vnf_index: u32) -> Option<&str> {
        self.vnf_datacenter_map
            .iter()
            .find(|m| m.member_vnf_index_ref == member_vnf_index)
            .map(|m| m.datacenter.as_str())
    }

    pub fn vl_datacenters(&self, vld_id: &str) -> Vec<&str> {
        self.vl_datacenter_map
            .iter()
            .filter(|m| m.vld_id_ref == vld_id)
            .flat_map(|m| m.datacenters.iter().map(|d| d.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VnfDatacenterMapping {
    pub member_vnf_index_ref: u32,
    pub datacenter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VlDatacenterMapping {
    pub vld_id_ref: String,
    #[serde(default)]
    pub datacenters: Vec<String>,
}

/// Input parameters targeting one constituent VNF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VnfInputParameters {
    pub member_vnf_index_ref: u32,
    pub vnfd_id_ref: String,
    #[serde(default)]
    pub input_parameter: Vec<crate::patch::InputParameter<VnfdField>>,
}

/// Scaling instances to reload on instantiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfiguredScalingGroup {
    pub scaling_group_name_ref: String,
    #[serde(default)]
    pub instance: Vec<ConfiguredInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfiguredInstance {
    pub id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyPair {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<String>,
    #[serde(default)]
    pub key_pair: Vec<KeyPair>,
}

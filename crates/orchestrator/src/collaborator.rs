//! Interfaces to the systems the orchestrator drives.
//!
//! Four collaborators sit behind the native plugin:
//! - [`ResourceManager`] - VM lifecycle for VDU records
//! - [`NetworkProvider`] - network lifecycle for virtual link records
//! - [`VnffgManager`] - forwarding-graph programming on the SDN side
//! - [`ConfigAgent`] - scaling hook scripts
//!
//! Responses that are not final (`Pending`) are followed up through the
//! record store: the resource manager writes `resource-mgmt/vdu-event/<id>`
//! records and the network provider updates `vlr-catalog/<id>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nfvo_descriptor::{MatchAttributes, ProviderNetwork, ScalingTrigger, VmFlavor, Volume};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::ip_profile::ResolvedIpProfile;

// ──────────────────────────────────────────────
// Resource manager
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Pending,
    Active,
    Failed,
}

/// One port of a requested VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConnectionPoint {
    pub name: String,
    /// Network id of the VLR the port attaches to.
    pub virtual_link_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_security_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpci: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRequest {
    /// Stable per VDU record, so a repeated request finds the same VM.
    pub request_id: String,
    pub name: String,
    pub node_id: String,
    pub vdu_id_ref: String,
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_checksum: Option<String>,
    #[serde(default)]
    pub flavor: VmFlavor,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    pub allocate_public_address: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_init: Option<String>,
    #[serde(default)]
    pub connection_points: Vec<VmConnectionPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInterface {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_link_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_point_id: Option<String>,
}

/// What the resource manager knows about one VM request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfo {
    pub request_id: String,
    pub resource_state: ResourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub connection_points: Vec<VmInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,
    /// Failure reason when `resource_state` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[async_trait]
pub trait ResourceManager: Send + Sync + 'static {
    async fn create_vm(&self, request: VmRequest) -> Result<VmInfo, OrchestratorError>;

    async fn read_vm(&self, request_id: &str) -> Result<Option<VmInfo>, OrchestratorError>;

    async fn delete_vm(&self, request_id: &str) -> Result<(), OrchestratorError>;

    async fn console_url(&self, request_id: &str) -> Result<Option<String>, OrchestratorError>;
}

// ──────────────────────────────────────────────
// Network provider
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Running,
    Failed,
    VlAllocPending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub vlr_id: String,
    pub name: String,
    pub vld_name: String,
    pub datacenter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vim_network_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_network: Option<ProviderNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_profile: Option<ResolvedIpProfile>,
    #[serde(default)]
    pub virtual_connection_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub status: NetworkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[async_trait]
pub trait NetworkProvider: Send + Sync + 'static {
    /// Create the network. `Ok(None)` is an empty response from the
    /// provider and fails the VLR.
    async fn create_network(
        &self,
        request: NetworkRequest,
    ) -> Result<Option<NetworkResponse>, OrchestratorError>;

    async fn delete_network(
        &self,
        vlr_id: &str,
        network_id: Option<&str>,
    ) -> Result<(), OrchestratorError>;
}

// ──────────────────────────────────────────────
// VNFFG manager
// ──────────────────────────────────────────────

/// One hop of a rendered service path, bound to a running VNF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspHop {
    pub hop_number: u32,
    pub vnfr_id: String,
    pub vnfr_name: String,
    pub ingress: PortBinding,
    pub egress: PortBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortBinding {
    pub connection_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspRequest {
    pub id: String,
    pub name: String,
    pub hops: Vec<RspHop>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRequest {
    pub id: String,
    pub name: String,
    pub rsp_id_ref: String,
    pub rsp_name: String,
    pub vnfr_id: String,
    pub port: PortBinding,
    pub match_attributes: Vec<MatchAttributes>,
}

/// A service function forwarder derived from an SFF-role VNF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SffRequest {
    pub name: String,
    pub vnfr_id: String,
    pub mgmt_address: Option<String>,
    pub mgmt_port: u16,
    pub data_plane_ip: Option<String>,
    pub data_plane_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnffgRequest {
    pub vnffgr_id: String,
    pub nsr_id: String,
    pub name: String,
    pub rsps: Vec<RspRequest>,
    pub classifiers: Vec<ClassifierRequest>,
    pub sffs: Vec<SffRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspStatus {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_id: Option<u32>,
    pub state: ResourceState,
}

#[async_trait]
pub trait VnffgManager: Send + Sync + 'static {
    async fn create_vnffg(&self, request: VnffgRequest) -> Result<Vec<RspStatus>, OrchestratorError>;

    async fn terminate_vnffg(&self, vnffgr_id: &str) -> Result<(), OrchestratorError>;
}

// ──────────────────────────────────────────────
// Config agent
// ──────────────────────────────────────────────

/// Everything a scaling hook script gets to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingHookRequest {
    pub nsr_id: String,
    pub nsr_name: String,
    pub scaling_group: String,
    pub instance_id: u32,
    pub trigger: ScalingTrigger,
    pub primitive: String,
    /// Script resolved against the NSD package directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    pub vnfrs: Vec<serde_json::Value>,
}

#[async_trait]
pub trait ConfigAgent: Send + Sync + 'static {
    /// Run one hook. `Ok(false)` means the hook ran and reported failure.
    async fn run_scaling_hook(
        &self,
        request: &ScalingHookRequest,
        timeout: Duration,
    ) -> Result<bool, OrchestratorError>;
}

/// Runs the hook's script with the request serialized to a temporary
/// JSON file passed as its only argument.
#[derive(Debug, Default)]
pub struct ScriptConfigAgent;

#[async_trait]
impl ConfigAgent for ScriptConfigAgent {
    async fn run_scaling_hook(
        &self,
        request: &ScalingHookRequest,
        timeout: Duration,
    ) -> Result<bool, OrchestratorError> {
        let script = match &request.script {
            Some(path) => path.clone(),
            None => return Ok(true),
        };
        let mut input = tempfile::NamedTempFile::new()
            .map_err(|e| OrchestratorError::config(format!("hook input file: {}", e)))?;
        serde_json::to_writer(&mut input, request)
            .map_err(|e| OrchestratorError::config(format!("hook input: {}", e)))?;

        let child = tokio::process::Command::new(&script)
            .arg(input.path())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => Ok(output.status.success()),
            Ok(Err(e)) => Err(OrchestratorError::config(format!(
                "cannot run {}: {}",
                script.display(),
                e
            ))),
            Err(_) => Err(OrchestratorError::timeout(
                format!("{} hook {}", request.trigger.as_str(), script.display()),
                timeout,
            )),
        }
    }
}

// ──────────────────────────────────────────────
// Bundle
// ──────────────────────────────────────────────

/// The collaborator set handed to an orchestrator context.
#[derive(Clone)]
pub struct Collaborators {
    pub resources: Arc<dyn ResourceManager>,
    pub networks: Arc<dyn NetworkProvider>,
    pub vnffg: Arc<dyn VnffgManager>,
    pub config_agent: Arc<dyn ConfigAgent>,
    pub ro: Arc<dyn crate::plugin::RoConnector>,
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn hook(script: Option<PathBuf>) -> ScalingHookRequest {
        ScalingHookRequest {
            nsr_id: "n1".into(),
            nsr_name: "ns".into(),
            scaling_group: "g".into(),
            instance_id: 1,
            trigger: ScalingTrigger::PreScaleOut,
            primitive: "scale".into(),
            script,
            vnfrs: vec![],
        }
    }

    fn write_script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("hook.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn no_script_is_success() {
        let ok = ScriptConfigAgent
            .run_scaling_hook(&hook(None), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn exit_status_decides_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "grep -q pre-scale-out \"$1\"");
        let ok = ScriptConfigAgent
            .run_scaling_hook(&hook(Some(script)), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(ok);

        let script = write_script(dir.path(), "exit 3");
        let ok = ScriptConfigAgent
            .run_scaling_hook(&hook(Some(script)), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleep 5");
        let err = ScriptConfigAgent
            .run_scaling_hook(&hook(Some(script)), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Timeout { .. }));
    }
}

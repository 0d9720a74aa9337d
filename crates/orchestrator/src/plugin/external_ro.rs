//! Deployment through an external resource orchestrator.
//!
//! The whole NS becomes one RO instance, created from a scenario built
//! out of the NSR's VLRs and VNFRs. VLs are considered ready as soon as
//! they are handed over; VNFRs are published pending and moved on by a
//! monitor task that polls the instance until every VNF runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use nfvo_descriptor::{IpVersion, NsInstanceConfig, Nsd};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use slog::{debug, info, o, warn, Logger};
use tokio::time::Instant;

use super::{OrchestrationPlugin, PluginKind, RoClient};
use crate::config::{RoAccount, Timeouts};
use crate::context::OrchestratorContext;
use crate::error::OrchestratorError;
use crate::ip_profile::{resolve_ip_profile, ResolvedIpProfile};
use crate::lock;
use crate::nsr::{Nsr, NsrState, Progress};
use crate::vdur::{VdurRecord, VdurState};
use crate::vlr::Vlr;
use crate::vnfr::{CpRecord, ExternalVnfStatus, Vnfr, VnfrState, UNSET_IP, UNSET_MAC};
use crate::wait::poll_until;

const MONITOR_TASK: &str = "ro-monitor";

#[derive(Debug, Default)]
struct RoInner {
    state: Option<NsrState>,
    deploy_started: bool,
    instance_uuid: Option<String>,
    /// VNFR id → RO instance uuid, for VNFs added by scale-out after the
    /// NS instance was deployed.
    scaled: HashMap<String, String>,
}

pub struct ExternalRoPlugin {
    account: RoAccount,
    client: Arc<dyn RoClient>,
    timeouts: Timeouts,
    log: Logger,
    inner: Mutex<RoInner>,
}

impl ExternalRoPlugin {
    pub fn new(ctx: &OrchestratorContext, account: &RoAccount, client: Arc<dyn RoClient>) -> Self {
        ExternalRoPlugin {
            account: account.clone(),
            client,
            timeouts: ctx.timeouts().clone(),
            log: ctx.log().new(o!("plugin" => "external-ro", "ro_account" => account.name.clone())),
            inner: Mutex::new(RoInner::default()),
        }
    }

    pub fn instance_uuid(&self) -> Option<String> {
        lock(&self.inner).instance_uuid.clone()
    }

    fn spawn_monitor(&self, nsr: &Nsr, name: String, uuid: String, vnfrs: Vec<Arc<Vnfr>>, progress: bool) {
        let monitor = Monitor {
            client: self.client.clone(),
            nsr: nsr.weak(),
            uuid,
            vnfrs,
            progress,
            poll: self.timeouts.external_ro_poll(),
            timeout: self.timeouts.external_ro_instance(),
            log: self.log.new(o!("task" => name.clone())),
        };
        nsr.tasks().spawn(name, monitor.run());
    }

    /// A VNF created by scale-out after deployment gets an instance of its
    /// own.
    async fn deploy_scaled_vnf(&self, nsr: &Nsr, vnfr: &Arc<Vnfr>) -> Result<(), OrchestratorError> {
        let Some(scaling) = vnfr.scaling() else {
            return Ok(());
        };
        let scenario = json!({
            "name": vnfr.name(),
            "description": format!("{} scaling instance {}", nsr.name(), scaling.instance_id),
            "scenario": format!("{}__{}", nsr.nsd().id, scaling.group),
            "datacenter": vnfr.datacenter(),
            "vnfs": { ro_vnf_name(vnfr): { "datacenter": vnfr.datacenter() } },
        });
        let uuid = self.client.create_instance(scenario).await?;
        info!(self.log, "scaled vnf deployed"; "vnfr" => vnfr.name(), "uuid" => &uuid);
        lock(&self.inner)
            .scaled
            .insert(vnfr.id().to_string(), uuid.clone());
        self.spawn_monitor(
            nsr,
            format!("{}-{}", MONITOR_TASK, vnfr.id()),
            uuid,
            vec![vnfr.clone()],
            false,
        );
        Ok(())
    }
}

#[async_trait]
impl OrchestrationPlugin for ExternalRoPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::ExternalRo
    }

    fn set_state(&self, state: NsrState) {
        debug!(self.log, "nsr state"; "state" => state.as_str());
        lock(&self.inner).state = Some(state);
    }

    fn waits_for_vls(&self) -> bool {
        false
    }

    async fn deploy(&self, nsr: &Arc<Nsr>) -> Result<(), OrchestratorError> {
        if matches!(lock(&self.inner).state, Some(s) if s.is_terminating()) {
            debug!(self.log, "skipping deploy of terminating nsr");
            return Ok(());
        }
        lock(&self.inner).deploy_started = true;

        let existing = self.client.list_instances().await?;
        let uuid = match existing.get(nsr.name()) {
            Some(uuid) => {
                info!(self.log, "reusing ro instance"; "uuid" => uuid);
                uuid.clone()
            }
            None => {
                let scenario = build_scenario(
                    nsr.config(),
                    nsr.nsd(),
                    &nsr.vlrs(),
                    &nsr.vnfrs(),
                    nsr.ssh_public_key().as_deref(),
                )?;
                let uuid = self.client.create_instance(scenario).await?;
                info!(self.log, "ro instance created"; "uuid" => &uuid, "url" => &self.account.url);
                uuid
            }
        };
        lock(&self.inner).instance_uuid = Some(uuid.clone());
        self.spawn_monitor(nsr, MONITOR_TASK.to_string(), uuid, nsr.vnfrs(), true);
        Ok(())
    }

    async fn instantiate_vl(&self, _nsr: &Nsr, vlr: &Arc<Vlr>) -> Result<(), OrchestratorError> {
        vlr.mark_active().await
    }

    async fn instantiate_vnf(
        &self,
        nsr: &Nsr,
        vnfr: &Arc<Vnfr>,
        _restart_mode: bool,
    ) -> Result<(), OrchestratorError> {
        vnfr.publish_pending().await?;
        let deployed = lock(&self.inner).instance_uuid.is_some();
        if deployed && vnfr.scaling().is_some() {
            if let Err(e) = self.deploy_scaled_vnf(nsr, vnfr).await {
                vnfr.instantiation_failed(e.to_string()).await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn terminate_ns(&self, nsr: &Nsr) -> Result<(), OrchestratorError> {
        if !lock(&self.inner).deploy_started {
            debug!(self.log, "nothing deployed on the ro");
            return Ok(());
        }
        poll_until(
            "ro instance uuid",
            self.timeouts.dependency_poll(),
            self.timeouts.external_ro_terminate(),
            || lock(&self.inner).instance_uuid.is_some(),
        )
        .await?;

        nsr.tasks().cancel(MONITOR_TASK).await;
        let (uuid, scaled) = {
            let mut inner = lock(&self.inner);
            (inner.instance_uuid.take(), std::mem::take(&mut inner.scaled))
        };
        for (vnfr_id, scaled_uuid) in scaled {
            nsr.tasks().cancel(&format!("{}-{}", MONITOR_TASK, vnfr_id)).await;
            if let Err(e) = self.client.delete_instance(&scaled_uuid).await {
                warn!(self.log, "scaled instance delete failed"; "uuid" => &scaled_uuid, "error" => %e);
            }
        }
        if let Some(uuid) = uuid {
            info!(self.log, "deleting ro instance"; "uuid" => &uuid);
            self.client.delete_instance(&uuid).await?;
        }
        Ok(())
    }

    async fn terminate_vnf(&self, nsr: &Nsr, vnfr: &Arc<Vnfr>) {
        vnfr.mark_terminated().await;
        let scaled = lock(&self.inner).scaled.remove(vnfr.id());
        if let Some(uuid) = scaled {
            nsr.tasks().cancel(&format!("{}-{}", MONITOR_TASK, vnfr.id())).await;
            if let Err(e) = self.client.delete_instance(&uuid).await {
                warn!(self.log, "scaled instance delete failed"; "uuid" => &uuid, "error" => %e);
            }
        }
    }

    async fn terminate_vl(&self, vlr: &Arc<Vlr>) {
        vlr.mark_terminated().await
    }
}

// ── Scenario ────────────────────────────────────────────────────────

/// `<vnfd name>.<member index>`, the VNF name the RO reports back.
fn ro_vnf_name(vnfr: &Vnfr) -> String {
    format!("{}.{}", vnfr.vnfd().name, vnfr.member_vnf_index())
}

/// The instance-create body for the whole NS.
pub fn build_scenario(
    config: &NsInstanceConfig,
    nsd: &Nsd,
    vlrs: &[Arc<Vlr>],
    vnfrs: &[Arc<Vnfr>],
    ns_public_key: Option<&str>,
) -> Result<Value, OrchestratorError> {
    let mut body = Map::new();
    body.insert("name".into(), json!(config.name));
    body.insert(
        "description".into(),
        json!(config.description.clone().unwrap_or_default()),
    );
    body.insert("scenario".into(), json!(nsd.id));
    if let Some(dc) = &config.datacenter {
        body.insert("datacenter".into(), json!(dc));
    }
    if let Some(cloud_config) = cloud_config(config, ns_public_key) {
        body.insert("cloud-config".into(), cloud_config);
    }

    let vnfs: Map<String, Value> = vnfrs
        .iter()
        .map(|v| (ro_vnf_name(v), json!({ "datacenter": v.datacenter() })))
        .collect();
    body.insert("vnfs".into(), Value::Object(vnfs));

    let mut networks = Map::new();
    for vld in &nsd.vld {
        let mut sites = Vec::new();
        let mut profile = None;
        for vlr in vlrs.iter().filter(|v| v.vld_ref() == vld.id) {
            let mut site = Map::new();
            if let Some(name) = &vld.vim_network_name {
                site.insert("netmap-use".into(), json!(name));
            } else if let Some(params) = &vlr.spec().ip_profile {
                profile = Some(resolve_ip_profile(params)?);
            } else {
                site.insert("netmap-create".into(), json!(vlr.name()));
            }
            site.insert("datacenter".into(), json!(vlr.datacenter()));
            sites.push(Value::Object(site));
        }
        let mut network = Map::new();
        network.insert("sites".into(), Value::Array(sites));
        if let Some(profile) = profile {
            network.insert("ip-profile".into(), ip_profile_json(&profile));
        }
        networks.insert(vld.name.clone(), Value::Object(network));
    }
    body.insert("networks".into(), Value::Object(networks));
    Ok(Value::Object(body))
}

fn cloud_config(config: &NsInstanceConfig, ns_public_key: Option<&str>) -> Option<Value> {
    let mut keys: Vec<&str> = config.key_pair.iter().map(|k| k.key.as_str()).collect();
    keys.extend(ns_public_key);
    let users: Vec<Value> = config
        .user
        .iter()
        .map(|u| {
            json!({
                "name": u.name,
                "user-info": u.user_info.clone().unwrap_or_default(),
                "key-pairs": u.key_pair.iter().map(|k| k.key.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();
    if keys.is_empty() && users.is_empty() {
        return None;
    }
    let mut out = Map::new();
    if !keys.is_empty() {
        out.insert("key-pairs".into(), json!(keys));
    }
    if !users.is_empty() {
        out.insert("users".into(), Value::Array(users));
    }
    Some(Value::Object(out))
}

fn ip_profile_json(profile: &ResolvedIpProfile) -> Value {
    let mut out = json!({
        "ip-version": match profile.ip_version {
            IpVersion::Ipv4 => "IPv4",
            IpVersion::Ipv6 => "IPv6",
        },
        "subnet-address": profile.subnet_address,
        "gateway-address": profile.gateway_address,
        "dhcp": {
            "enabled": profile.dhcp_enabled,
            "start-address": profile.dhcp_start_address,
            "count": profile.dhcp_count,
        },
    });
    if let (Some(dns), Some(map)) = (profile.dns_server.first(), out.as_object_mut()) {
        map.insert("dns-address".into(), json!(dns));
    }
    out
}

// ── Instance status ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoInstanceStatus {
    #[serde(default)]
    pub vnfs: Vec<RoVnfStatus>,
    #[serde(default)]
    pub nets: Vec<RoNetStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoVnfStatus {
    pub vnf_name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub vms: Vec<RoVmStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoVmStatus {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub vim_vm_id: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<RoInterface>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoInterface {
    #[serde(default)]
    pub external_name: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub vim_interface_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoNetStatus {
    pub status: String,
}

impl RoInstanceStatus {
    pub fn progress(&self) -> Progress {
        let vms: Vec<&RoVmStatus> = self.vnfs.iter().flat_map(|v| v.vms.iter()).collect();
        Progress {
            networks_total: self.nets.len() as u32,
            networks_active: self.nets.iter().filter(|n| n.status == "ACTIVE").count() as u32,
            vms_total: vms.len() as u32,
            vms_active: vms.iter().filter(|vm| vm.status == "ACTIVE").count() as u32,
        }
    }

    fn vnf(&self, member_vnf_index: u32) -> Option<&RoVnfStatus> {
        let suffix = format!(".{}", member_vnf_index);
        self.vnfs.iter().find(|v| v.vnf_name.ends_with(&suffix))
    }
}

/// Map one VNF's RO status onto a VNFR report. `None` while some VM is
/// still coming up.
///
/// `mgmt_cps` are the VNF's connection points on management VLDs, used
/// for the management address when the RO reports none for the VNF.
pub fn vnf_status<F>(vnf: &RoVnfStatus, mgmt_cps: &[String], cp_vlr: F) -> Option<ExternalVnfStatus>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(vm) = vnf.vms.iter().find(|vm| vm.status.starts_with("ERROR")) {
        return Some(ExternalVnfStatus::Failed {
            reason: vm
                .error_msg
                .clone()
                .unwrap_or_else(|| format!("VM {} in {}", vm.uuid, vm.status)),
        });
    }
    if vnf.vms.iter().any(|vm| vm.status != "ACTIVE") {
        return None;
    }

    let mut connection_points = Vec::new();
    for vm in &vnf.vms {
        for intf in &vm.interfaces {
            let Some(name) = intf.external_name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            connection_points.push(CpRecord {
                name: name.to_string(),
                vlr_ref: cp_vlr(name),
                ip_address: intf.ip_address.clone().unwrap_or_else(|| UNSET_IP.to_string()),
                mac_address: intf
                    .mac_address
                    .clone()
                    .unwrap_or_else(|| UNSET_MAC.to_string()),
                connection_point_id: intf.vim_interface_id.clone(),
                vm_id: vm.vim_vm_id.clone(),
            });
        }
    }

    let mgmt_ip = match &vnf.ip_address {
        Some(ip) => Some(ip.trim().to_string()),
        None => connection_points
            .iter()
            .find(|cp| mgmt_cps.contains(&cp.name))
            .map(|cp| cp.ip_address.clone()),
    }?;

    let vdurs = vnf
        .vms
        .iter()
        .map(|vm| {
            let name = vm.name.clone().unwrap_or_else(|| vm.uuid.clone());
            VdurRecord {
                id: vm.uuid.clone(),
                vdu_id_ref: name.clone(),
                unique_short_name: name.clone(),
                name,
                operational_status: VdurState::Ready,
                vm_management_ip: None,
                vm_id: vm.vim_vm_id.clone(),
                image: None,
                flavor: None,
                failure: None,
            }
        })
        .collect();
    Some(ExternalVnfStatus::Running {
        mgmt_ip,
        connection_points,
        vdurs,
    })
}

/// Connection points of member `index` attached to management VLDs.
fn mgmt_connection_points(nsd: &Nsd, index: u32) -> Vec<String> {
    nsd.vld
        .iter()
        .filter(|vld| vld.mgmt_network)
        .flat_map(|vld| vld.vnfd_connection_point_ref.iter())
        .filter(|r| r.member_vnf_index_ref == index)
        .map(|r| r.vnfd_connection_point_ref.clone())
        .collect()
}

// ── Monitor ─────────────────────────────────────────────────────────

struct Monitor {
    client: Arc<dyn RoClient>,
    nsr: Weak<Nsr>,
    uuid: String,
    vnfrs: Vec<Arc<Vnfr>>,
    /// Whether this instance's counts feed the NSR's progress.
    progress: bool,
    poll: Duration,
    timeout: Duration,
    log: Logger,
}

impl Monitor {
    async fn run(self) {
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.poll).await;
            let Some(nsr) = self.nsr.upgrade() else {
                return;
            };
            if nsr.state().is_terminating() {
                debug!(self.log, "nsr terminating, monitor done");
                return;
            }
            let timed_out = started.elapsed() > self.timeout;

            let status = match self.client.get_instance(&self.uuid).await {
                Ok(value) => match serde_json::from_value::<RoInstanceStatus>(value) {
                    Ok(status) => status,
                    Err(e) => {
                        warn!(self.log, "unreadable instance status"; "error" => %e);
                        if timed_out {
                            self.fail_pending(format!("unreadable RO status: {}", e)).await;
                            return;
                        }
                        continue;
                    }
                },
                Err(e) => {
                    warn!(self.log, "instance status read failed"; "error" => %e);
                    if timed_out {
                        self.fail_pending(e.to_string()).await;
                        return;
                    }
                    continue;
                }
            };

            if self.progress {
                nsr.set_ro_progress(status.progress());
                nsr.publish_opdata_quietly().await;
            }

            for vnfr in self.pending() {
                let Some(vnf) = status.vnf(vnfr.member_vnf_index()) else {
                    vnfr.apply_external_status(ExternalVnfStatus::Failed {
                        reason: format!("VNF {} not found on the resource orchestrator", vnfr.name()),
                    })
                    .await;
                    continue;
                };
                let mgmt_cps = mgmt_connection_points(nsr.nsd(), vnfr.member_vnf_index());
                let report = vnf_status(vnf, &mgmt_cps, |cp| {
                    vnfr.cp_vlr(cp).map(|v| v.id().to_string())
                });
                match report {
                    Some(report) => vnfr.apply_external_status(report).await,
                    None if timed_out => {
                        vnfr.apply_external_status(ExternalVnfStatus::Failed {
                            reason: format!(
                                "timed out after {}s waiting for VNF {} on the resource orchestrator",
                                self.timeout.as_secs(),
                                vnfr.name()
                            ),
                        })
                        .await
                    }
                    None => {}
                }
            }

            if self.pending().is_empty() {
                info!(self.log, "all vnfs settled on the ro");
                return;
            }
        }
    }

    fn pending(&self) -> Vec<Arc<Vnfr>> {
        self.vnfrs
            .iter()
            .filter(|v| matches!(v.state(), VnfrState::Init | VnfrState::VlInitPhase | VnfrState::VmInitPhase))
            .cloned()
            .collect()
    }

    async fn fail_pending(&self, reason: String) {
        for vnfr in self.pending() {
            vnfr.apply_external_status(ExternalVnfStatus::Failed {
                reason: reason.clone(),
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: Value) -> RoInstanceStatus {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn counts_active_vms_and_nets() {
        let s = status(json!({
            "vnfs": [
                { "vnf_name": "ping.1", "vms": [
                    { "uuid": "a", "status": "ACTIVE" },
                    { "uuid": "b", "status": "BUILD" }
                ]}
            ],
            "nets": [{ "status": "ACTIVE" }, { "status": "DOWN" }, { "status": "ACTIVE" }]
        }));
        let p = s.progress();
        assert_eq!((p.vms_active, p.vms_total), (1, 2));
        assert_eq!((p.networks_active, p.networks_total), (2, 3));
        assert_eq!(s.vnf(1).unwrap().vnf_name, "ping.1");
        assert!(s.vnf(11).is_none());
    }

    #[test]
    fn vm_error_fails_the_vnf() {
        let s = status(json!({ "vnfs": [{ "vnf_name": "ping.1", "vms": [
            { "uuid": "a", "status": "ACTIVE" },
            { "uuid": "b", "status": "ERROR_ON_CREATE", "error_msg": "no host" }
        ]}]}));
        let report = vnf_status(&s.vnfs[0], &[], |_| None);
        assert_eq!(
            report,
            Some(ExternalVnfStatus::Failed {
                reason: "no host".into()
            })
        );
    }

    #[test]
    fn building_vm_is_not_settled() {
        let s = status(json!({ "vnfs": [{ "vnf_name": "ping.1", "ip_address": "10.0.0.5",
            "vms": [{ "uuid": "a", "status": "BUILD" }] }]}));
        assert_eq!(vnf_status(&s.vnfs[0], &[], |_| None), None);
    }

    #[test]
    fn mgmt_ip_falls_back_to_management_connection_point() {
        let s = status(json!({ "vnfs": [{ "vnf_name": "ping.1", "vms": [{
            "uuid": "a", "name": "ping-vm", "status": "ACTIVE", "vim_vm_id": "vim-1",
            "interfaces": [
                { "external_name": "data", "ip_address": "10.1.0.4", "mac_address": "fa:16:3e:00:00:01" },
                { "external_name": "mgmt", "ip_address": "172.16.0.9", "mac_address": null },
                { "external_name": null, "ip_address": "10.9.9.9" }
            ]
        }]}]}));
        let report = vnf_status(&s.vnfs[0], &["mgmt".to_string()], |cp| Some(format!("vlr-{}", cp)));
        let Some(ExternalVnfStatus::Running {
            mgmt_ip,
            connection_points,
            vdurs,
        }) = report
        else {
            panic!("expected running, got {:?}", report);
        };
        assert_eq!(mgmt_ip, "172.16.0.9");
        assert_eq!(connection_points.len(), 2);
        assert_eq!(connection_points[1].mac_address, UNSET_MAC);
        assert_eq!(connection_points[0].vlr_ref.as_deref(), Some("vlr-data"));
        assert_eq!(vdurs[0].id, "a");
        assert_eq!(vdurs[0].vm_id.as_deref(), Some("vim-1"));
    }

    #[test]
    fn no_mgmt_address_keeps_waiting() {
        let s = status(json!({ "vnfs": [{ "vnf_name": "ping.1", "vms": [{
            "uuid": "a", "status": "ACTIVE",
            "interfaces": [{ "external_name": "data", "ip_address": "10.1.0.4" }]
        }]}]}));
        assert_eq!(vnf_status(&s.vnfs[0], &["mgmt".to_string()], |_| None), None);
    }

    #[test]
    fn ip_profile_rendering() {
        let profile = ResolvedIpProfile {
            ip_version: IpVersion::Ipv4,
            subnet_address: "10.0.0.0/24".into(),
            gateway_address: "10.0.0.1".into(),
            dns_server: vec!["10.0.0.2".into()],
            dhcp_enabled: true,
            dhcp_start_address: "10.0.0.3".into(),
            dhcp_count: 50,
            dhcp_end_address: "10.0.0.52".into(),
            security_group: None,
        };
        let out = ip_profile_json(&profile);
        assert_eq!(out["ip-version"], "IPv4");
        assert_eq!(out["dns-address"], "10.0.0.2");
        assert_eq!(out["dhcp"]["count"], 50);
    }

    #[test]
    fn cloud_config_only_when_there_is_access() {
        let mut config: NsInstanceConfig =
            serde_json::from_value(json!({ "id": "n", "name": "ns" })).unwrap();
        assert!(cloud_config(&config, None).is_none());
        let out = cloud_config(&config, Some("ssh-ed25519 AAAA")).unwrap();
        assert_eq!(out["key-pairs"][0], "ssh-ed25519 AAAA");

        config.user = serde_json::from_value(json!([{ "name": "ops", "key_pair": [{ "name": "k", "key": "ssh-rsa B" }] }])).unwrap();
        let out = cloud_config(&config, None).unwrap();
        assert!(out.get("key-pairs").is_none());
        assert_eq!(out["users"][0]["key-pairs"][0], "ssh-rsa B");
    }
}

use std::sync::Arc;
use std::time::Duration;

use nfvo_descriptor::{NsInstanceConfig, ScalingTrigger, Vld, Vnfd};
use nfvo_store::{read_as, RecordStore};
use serde_json::{json, Value};

use super::*;
use crate::manager::NsManager;
use crate::paths;
use crate::scaling::InstanceState;
use crate::sim::{SimCloud, SIM_RO_ACCOUNT};
use crate::vlr::VlrState;
use crate::vnfr::VnfrState;

// ── Fixtures ────────────────────────────────────────────────────────

fn vnfd(id: &str, vdu: &str) -> Vnfd {
    serde_json::from_value(json!({
        "id": id,
        "name": id,
        "mgmt_interface": { "vdu_id": vdu, "port": 22 },
        "connection_point": [{ "name": "data" }],
        "vdu": [{
            "id": vdu,
            "name": vdu,
            "image": "cirros",
            "interface": [{
                "name": "eth0",
                "type": "EXTERNAL",
                "external_connection_point_ref": "data"
            }]
        }]
    }))
    .unwrap()
}

fn data_vld() -> Value {
    json!({
        "id": "vl-data",
        "name": "data",
        "vnfd_connection_point_ref": [
            { "member_vnf_index_ref": 1, "vnfd_id_ref": "ping", "vnfd_connection_point_ref": "data" },
            { "member_vnf_index_ref": 2, "vnfd_id_ref": "pong", "vnfd_connection_point_ref": "data" }
        ]
    })
}

fn pingpong_nsd() -> Value {
    json!({
        "id": "pingpong-nsd",
        "name": "pingpong",
        "constituent_vnfd": [
            { "member_vnf_index": 1, "vnfd_id_ref": "ping" },
            { "member_vnf_index": 2, "vnfd_id_ref": "pong" }
        ],
        "vld": [data_vld()]
    })
}

/// Ping is a fixed member; pong only exists in instances of `pong-group`.
fn scaled_nsd(min: u32, max: u32) -> Value {
    let mut nsd = pingpong_nsd();
    nsd["scaling_group_descriptor"] = json!([{
        "name": "pong-group",
        "min_instance_count": min,
        "max_instance_count": max,
        "vnfd_member": [{ "member_vnf_index_ref": 2, "count": 1 }],
        "scaling_config_action": [
            { "trigger": "pre-scale-out", "ns_service_primitive_name_ref": "rebalance" },
            { "trigger": "post-scale-out", "ns_service_primitive_name_ref": "rebalance" },
            { "trigger": "post-scale-in", "ns_service_primitive_name_ref": "rebalance" }
        ]
    }]);
    nsd["service_primitive"] = json!([{ "name": "rebalance" }]);
    nsd
}

fn ns_config(nsd: Value) -> NsInstanceConfig {
    serde_json::from_value(json!({ "id": "ns-1", "name": "pingpong-1", "nsd": nsd })).unwrap()
}

async fn create(cloud: &SimCloud, config: NsInstanceConfig) -> Arc<Nsr> {
    let ctx = cloud.test_context();
    ctx.catalog().add_vnfd(vnfd("ping", "ping-vm")).unwrap();
    ctx.catalog().add_vnfd(vnfd("pong", "pong-vm")).unwrap();
    Nsr::create(&ctx, config, false).await.unwrap()
}

async fn wait_for(nsr: &Nsr, state: NsrState) {
    for _ in 0..500 {
        if nsr.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "nsr never reached {}; history {:?}",
        state,
        nsr.state_history()
    );
}

async fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn event_names(nsr: &Nsr) -> Vec<String> {
    nsr.events().into_iter().map(|e| e.event).collect()
}

// ── Instantiation ───────────────────────────────────────────────────

#[tokio::test]
async fn instantiation_walks_the_phases_in_order() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    assert_eq!(
        nsr.state_history(),
        vec![
            NsrState::Init,
            NsrState::VlInitPhase,
            NsrState::VnfInitPhase,
            NsrState::Running
        ]
    );
    assert_eq!(nsr.config_status(), ConfigStatus::Configured);
    assert!(nsr.vlrs().iter().all(|v| v.state() == VlrState::Active));
    assert!(nsr.vnfrs().iter().all(|v| v.state() == VnfrState::Ready));
    assert_eq!(cloud.networks.created().len(), 1);
    assert_eq!(cloud.resources.created().len(), 2);

    let events = event_names(&nsr);
    let begin_vls = events.iter().position(|e| e == "begin-external-vls-instantiation");
    let begin_vnfs = events.iter().position(|e| e == "begin-vnf-instantiation");
    assert!(begin_vls.is_some() && begin_vls < begin_vnfs);
    assert_eq!(events.last().map(String::as_str), Some("ns-running"));
}

#[tokio::test]
async fn opdata_reflects_the_running_ns() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    let opdata: NsrOpdata = read_as(cloud.store.as_ref(), &paths::ns_instance_opdata("ns-1"))
        .await
        .unwrap()
        .expect("opdata published");
    assert_eq!(opdata.operational_status, NsrState::Running);
    assert_eq!(opdata.config_status, ConfigStatus::Configured);
    assert_eq!(opdata.nsd_ref, "pingpong-nsd");
    assert_eq!(opdata.resource_orchestrator, PluginKind::Native);
    assert_eq!(opdata.vlr.len(), 1);
    assert_eq!(opdata.constituent_vnfr_ref.len(), 2);
    assert!(opdata.ssh_key_generated.is_some());
    assert!(nsr.ssh_public_key().is_some());
    assert_eq!(opdata.orchestration_progress.vms.active, 2);
}

#[tokio::test]
async fn instantiating_twice_is_rejected() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    assert!(matches!(
        nsr.instantiate().await,
        Err(OrchestratorError::NetworkServiceRecord { .. })
    ));
}

#[tokio::test]
async fn failed_vdu_fails_the_ns_with_details() {
    let cloud = SimCloud::new();
    cloud.resources.fail_vdu("pong-vm", "no host available");
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Failed).await;

    assert_eq!(nsr.config_status(), ConfigStatus::Failed);
    let failure = nsr
        .events()
        .into_iter()
        .find(|e| e.event == "vnf-failed")
        .expect("vnf-failed event");
    assert!(failure
        .details
        .unwrap_or_default()
        .contains("no host available"));
    assert!(!nsr.state_history().contains(&NsrState::Running));
}

#[tokio::test]
async fn failed_vl_stops_before_the_vnf_phase() {
    let cloud = SimCloud::new();
    cloud.networks.fail_vld("data", "vlan pool exhausted");
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();

    assert_eq!(nsr.state(), NsrState::Failed);
    assert!(!nsr.state_history().contains(&NsrState::VnfInitPhase));
    assert!(cloud.resources.created().is_empty());
    assert!(event_names(&nsr).contains(&"vl-failed".to_string()));
}

#[tokio::test]
async fn pending_vl_completes_through_the_dispatcher() {
    let cloud = SimCloud::new();
    cloud
        .networks
        .pending_vld("data", Some(Duration::from_millis(30)));
    let ctx = cloud.test_context();
    ctx.catalog().add_vnfd(vnfd("ping", "ping-vm")).unwrap();
    ctx.catalog().add_vnfd(vnfd("pong", "pong-vm")).unwrap();
    let manager = Arc::new(NsManager::new(ctx));
    let dispatcher = tokio::spawn(manager.clone().run_dispatcher());

    let nsr = manager.create_nsr(ns_config(pingpong_nsd())).await.unwrap();
    manager.instantiate_nsr(nsr.id()).unwrap();
    wait_for(&nsr, NsrState::Running).await;

    let vlr = &nsr.vlrs()[0];
    assert_eq!(vlr.state(), VlrState::Active);
    assert!(vlr.network_id().is_some());
    dispatcher.abort();
}

#[tokio::test]
async fn dependent_vnf_starts_after_its_dependency() {
    let cloud = SimCloud::new();
    let mut nsd = pingpong_nsd();
    nsd["vnf_dependency"] = json!([{ "vnf_source_ref": "ping", "vnf_depends_on_ref": "pong" }]);
    cloud
        .resources
        .pending_vdu("pong-vm", Some(Duration::from_millis(30)));
    let nsr = create(&cloud, ns_config(nsd)).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    let history = cloud.resources.history();
    let pong_active = history
        .iter()
        .position(|h| h.starts_with("active:") && h.contains("pong-vm"))
        .unwrap();
    let ping_create = history
        .iter()
        .position(|h| h.starts_with("create:") && h.contains("ping-vm"))
        .unwrap();
    assert!(pong_active < ping_create, "history {:?}", history);
}

fn ping_pong_graph() -> Value {
    json!([{
        "id": "fg-1",
        "name": "ping-to-pong",
        "rsp": [{
            "id": "rsp-1",
            "name": "ping-pong-path",
            "vnfd_connection_point_ref": [
                {
                    "member_vnf_index_ref": 1,
                    "order": 0,
                    "vnfd_id_ref": "ping",
                    "vnfd_ingress_connection_point_ref": "data",
                    "vnfd_egress_connection_point_ref": "data"
                },
                {
                    "member_vnf_index_ref": 2,
                    "order": 1,
                    "vnfd_id_ref": "pong",
                    "vnfd_ingress_connection_point_ref": "data",
                    "vnfd_egress_connection_point_ref": "data"
                }
            ]
        }]
    }])
}

#[tokio::test]
async fn forwarding_graph_is_built_after_the_vnfs() {
    let cloud = SimCloud::new();
    let mut nsd = pingpong_nsd();
    nsd["vnffgd"] = ping_pong_graph();
    let nsr = create(&cloud, ns_config(nsd)).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    let history = nsr.state_history();
    let vnf = history.iter().position(|s| *s == NsrState::VnfInitPhase);
    let fg = history.iter().position(|s| *s == NsrState::VnffgInitPhase);
    assert!(vnf.is_some() && vnf < fg);
    assert_eq!(cloud.vnffg.requests().len(), 1);
    assert_eq!(nsr.vnffgrs().len(), 1);
}

#[tokio::test]
async fn rejected_forwarding_graph_fails_the_ns() {
    let cloud = SimCloud::new();
    cloud.vnffg.fail_create("classifier table full");
    let mut nsd = pingpong_nsd();
    nsd["vnffgd"] = json!([{ "id": "fg-1", "name": "empty-graph" }]);
    let nsr = create(&cloud, ns_config(nsd)).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Failed).await;
    assert!(event_names(&nsr).contains(&"vnffg-failed".to_string()));
}

#[tokio::test]
async fn missing_nsd_is_a_config_error() {
    let cloud = SimCloud::new();
    let ctx = cloud.test_context();
    let config: NsInstanceConfig =
        serde_json::from_value(json!({ "id": "ns-1", "name": "x", "nsd_ref": "nope" })).unwrap();
    assert!(matches!(
        Nsr::create(&ctx, config, false).await,
        Err(OrchestratorError::Config { .. })
    ));
    assert!(ctx.get_nsr("ns-1").is_none());
}

#[tokio::test]
async fn unknown_resource_orchestrator_is_a_config_error() {
    let cloud = SimCloud::new();
    let ctx = cloud.test_context();
    ctx.catalog().add_vnfd(vnfd("ping", "ping-vm")).unwrap();
    ctx.catalog().add_vnfd(vnfd("pong", "pong-vm")).unwrap();
    let mut config = ns_config(pingpong_nsd());
    config.resource_orchestrator = Some("elsewhere".into());
    assert!(matches!(
        Nsr::create(&ctx, config, false).await,
        Err(OrchestratorError::Config { .. })
    ));
}

#[tokio::test]
async fn external_ro_deploys_the_whole_ns() {
    let cloud = SimCloud::new();
    let mut config = ns_config(pingpong_nsd());
    config.resource_orchestrator = Some(SIM_RO_ACCOUNT.into());
    let nsr = create(&cloud, config).await;
    assert_eq!(nsr.plugin_kind(), PluginKind::ExternalRo);

    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(cloud.ro.created().len(), 1);
    assert!(cloud.resources.created().is_empty());

    nsr.terminate().await;
    assert_eq!(nsr.state(), NsrState::Terminated);
    assert_eq!(cloud.ro.deleted().len(), 1);
}

#[tokio::test]
async fn external_ro_deploys_before_the_forwarding_graph_phase() {
    let cloud = SimCloud::new();
    cloud.ro.build_polls(3);
    let mut nsd = pingpong_nsd();
    nsd["vnffgd"] = ping_pong_graph();
    let mut config = ns_config(nsd);
    config.resource_orchestrator = Some(SIM_RO_ACCOUNT.into());
    let nsr = create(&cloud, config).await;

    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(cloud.ro.created().len(), 1);
    assert_eq!(cloud.vnffg.requests().len(), 1);
    assert!(nsr.vnfrs().iter().all(|v| v.state() == VnfrState::Ready));
}

// ── Termination ─────────────────────────────────────────────────────

#[tokio::test]
async fn terminate_releases_everything() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    nsr.terminate().await;
    assert_eq!(nsr.state(), NsrState::Terminated);
    let history = nsr.state_history();
    let vnf = history.iter().position(|s| *s == NsrState::VnfTerminatePhase);
    let vl = history.iter().position(|s| *s == NsrState::VlTerminatePhase);
    assert!(vnf.is_some() && vnf < vl);

    assert_eq!(cloud.resources.deleted().len(), 2);
    assert_eq!(cloud.networks.deleted().len(), 1);
    assert!(nsr.ssh_public_key().is_none());
    let opdata: Option<Value> = read_as(cloud.store.as_ref(), &paths::ns_instance_opdata("ns-1"))
        .await
        .unwrap();
    assert!(opdata.is_none());
    assert!(event_names(&nsr).contains(&"terminated".to_string()));
}

#[tokio::test]
async fn terminate_is_idempotent() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    nsr.terminate().await;
    nsr.terminate().await;
    let terminated = nsr
        .state_history()
        .into_iter()
        .filter(|s| *s == NsrState::Terminated)
        .count();
    assert_eq!(terminated, 1);
    assert_eq!(cloud.resources.deleted().len(), 2);
}

#[tokio::test]
async fn terminate_before_instantiate_skips_the_teardown_phases() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.terminate().await;

    assert_eq!(
        nsr.state_history(),
        vec![NsrState::Init, NsrState::Terminate, NsrState::Terminated]
    );
    assert!(cloud.networks.deleted().is_empty());
}

#[tokio::test]
async fn terminate_during_a_pending_vl_preempts_the_vnf_phase() {
    let cloud = SimCloud::new();
    cloud.networks.pending_vld("data", None);
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;

    let running = nsr.clone();
    let pipeline = tokio::spawn(async move { running.instantiate().await });
    wait_until("vl pending", || {
        nsr.vlrs()
            .iter()
            .any(|v| v.state() == VlrState::InstantiationPending)
    })
    .await;

    nsr.terminate().await;
    assert_eq!(nsr.state(), NsrState::TerminateRcvd);
    pipeline.await.unwrap().unwrap();

    assert_eq!(nsr.state(), NsrState::Terminated);
    let history = nsr.state_history();
    assert!(!history.contains(&NsrState::VnfInitPhase));
    assert!(history.contains(&NsrState::VlTerminatePhase));
    assert!(cloud.resources.created().is_empty());
    assert_eq!(cloud.networks.deleted().len(), 1);
}

// ── Scaling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn default_instances_are_created_during_instantiation() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(scaled_nsd(1, 3))).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    assert!(nsr.state_history().contains(&NsrState::ScalingOut));
    let groups = nsr.scaling_group_records();
    assert_eq!(groups[0].instance.len(), 1);
    assert!(groups[0].instance[0].is_default);
    assert_eq!(nsr.vnfrs().len(), 2);
    assert!(cloud
        .config_agent
        .history()
        .contains(&"pong-group/1/pre-scale-out".to_string()));
}

#[tokio::test]
async fn scale_out_then_in() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(scaled_nsd(0, 1))).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(nsr.vnfrs().len(), 1);

    let id = nsr.scale_out("pong-group", None).await.unwrap();
    assert_eq!(id, 1);
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(nsr.vnfrs().len(), 2);
    wait_until("post-scale-out hook", || {
        cloud
            .config_agent
            .history()
            .contains(&"pong-group/1/post-scale-out".to_string())
    })
    .await;

    let err = nsr.scale_out("pong-group", None).await.unwrap_err();
    assert!(err.to_string().contains("Max instances"), "{}", err);

    nsr.scale_in("pong-group", id).await.unwrap();
    wait_until("instance removal", || {
        nsr.scaling_group_records()[0].instance.is_empty()
    })
    .await;
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(nsr.vnfrs().len(), 1);
    assert_eq!(cloud.resources.deleted().len(), 1);

    let history = nsr.state_history();
    assert!(history.contains(&NsrState::ScalingOut));
    assert!(history.contains(&NsrState::ScalingIn));
}

#[tokio::test]
async fn scaling_requires_a_running_ns() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(scaled_nsd(0, 2))).await;
    assert!(matches!(
        nsr.scale_out("pong-group", None).await,
        Err(OrchestratorError::ScalingOperation { .. })
    ));
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;
    assert!(matches!(
        nsr.scale_out("no-such-group", None).await,
        Err(OrchestratorError::ScalingOperation { .. })
    ));
    assert!(matches!(
        nsr.scale_in("pong-group", 7).await,
        Err(OrchestratorError::ScalingOperation { .. })
    ));
}

#[tokio::test]
async fn failed_scale_out_returns_the_ns_to_running() {
    let cloud = SimCloud::new();
    cloud.resources.fail_vdu("pong-vm", "quota exceeded");
    let nsr = create(&cloud, ns_config(scaled_nsd(0, 2))).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    nsr.scale_out("pong-group", None).await.unwrap();
    wait_until("scaled vnf failure", || {
        nsr.vnfrs().iter().any(|v| v.state() == VnfrState::Failed)
    })
    .await;
    wait_for(&nsr, NsrState::Running).await;

    assert_eq!(
        nsr.scaling_group_records()[0].instance[0].op_status,
        InstanceState::Failed
    );
    assert!(!nsr.state_history().contains(&NsrState::Failed));
}

#[tokio::test]
async fn failed_pre_scale_out_hook_aborts_the_instance() {
    let cloud = SimCloud::new();
    cloud.config_agent.fail_trigger(ScalingTrigger::PreScaleOut);
    let nsr = create(&cloud, ns_config(scaled_nsd(0, 2))).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    assert!(matches!(
        nsr.scale_out("pong-group", None).await,
        Err(OrchestratorError::ScalingOperation { .. })
    ));
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(cloud.resources.created().len(), 1);
    assert!(event_names(&nsr).contains(&"config-failed".to_string()));
}

// ── Dynamic virtual links ───────────────────────────────────────────

#[tokio::test]
async fn virtual_links_can_be_added_and_removed() {
    let cloud = SimCloud::new();
    let nsr = create(&cloud, ns_config(pingpong_nsd())).await;
    nsr.instantiate().await.unwrap();
    wait_for(&nsr, NsrState::Running).await;

    let vld: Vld =
        serde_json::from_value(json!({ "id": "vl-extra", "name": "extra" })).unwrap();
    let vlr_id = nsr.create_vl_instance(vld.clone()).await.unwrap();
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(nsr.vlrs().len(), 2);
    assert!(matches!(
        nsr.create_vl_instance(vld).await,
        Err(OrchestratorError::NsrVlUpdate { .. })
    ));

    nsr.delete_vl_instance("vl-extra").await.unwrap();
    wait_for(&nsr, NsrState::Running).await;
    assert_eq!(nsr.vlrs().len(), 1);
    assert!(cloud.networks.deleted().contains(&vlr_id));

    let history = nsr.state_history();
    assert!(history.contains(&NsrState::VlInstantiate));
    assert!(history.contains(&NsrState::VlTerminate));
    assert!(matches!(
        nsr.delete_vl_instance("vl-extra").await,
        Err(OrchestratorError::NsrVlUpdate { .. })
    ));
}

// ── Recovery ────────────────────────────────────────────────────────

fn sorted_ids(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut ids: Vec<String> = ids.collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn recover_rebuilds_stored_instances_in_place() {
    let cloud = SimCloud::new();
    let first = NsManager::new(cloud.test_context());
    first.context().catalog().add_vnfd(vnfd("ping", "ping-vm")).unwrap();
    first.context().catalog().add_vnfd(vnfd("pong", "pong-vm")).unwrap();
    let nsr = first.create_nsr(ns_config(pingpong_nsd())).await.unwrap();
    first.instantiate_nsr("ns-1").unwrap();
    wait_for(&nsr, NsrState::Running).await;

    let vlr_ids = sorted_ids(nsr.vlrs().iter().map(|v| v.id().to_string()));
    let vnfr_ids = sorted_ids(nsr.vnfrs().iter().map(|v| v.id().to_string()));
    let vms = cloud.resources.created().len();
    let networks = cloud.networks.created().len();
    assert_eq!(vms, 2);

    // A fresh manager over the same store, as after a process restart.
    let second = NsManager::new(cloud.test_context());
    second.context().catalog().add_vnfd(vnfd("ping", "ping-vm")).unwrap();
    second.context().catalog().add_vnfd(vnfd("pong", "pong-vm")).unwrap();
    assert_eq!(second.recover().await.unwrap(), vec!["ns-1".to_string()]);

    let again = second.context().get_nsr("ns-1").unwrap();
    assert!(again.restart_mode());
    wait_for(&again, NsrState::Running).await;
    assert_eq!(
        sorted_ids(again.vlrs().iter().map(|v| v.id().to_string())),
        vlr_ids
    );
    assert_eq!(
        sorted_ids(again.vnfrs().iter().map(|v| v.id().to_string())),
        vnfr_ids
    );
    assert_eq!(cloud.resources.created().len(), vms);
    assert_eq!(cloud.networks.created().len(), networks);

    // Already running here: nothing left to recover.
    assert!(second.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn recover_skips_configs_that_cannot_be_rebuilt() {
    let cloud = SimCloud::new();
    let manager = NsManager::new(cloud.test_context());
    let config: NsInstanceConfig = serde_json::from_value(
        json!({ "id": "orphan", "name": "orphan", "nsd_ref": "gone-nsd" }),
    )
    .unwrap();
    let path = paths::ns_instance_config("orphan");
    cloud
        .store
        .update(&path, serde_json::to_value(&config).unwrap())
        .await
        .unwrap();

    assert!(manager.recover().await.unwrap().is_empty());
    assert!(manager.context().get_nsr("orphan").is_none());
}

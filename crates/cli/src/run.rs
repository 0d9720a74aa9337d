//! `nfvo run`: instantiate the NS instances of a bundle on a simulated
//! cloud and print where they ended up.

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use nfvo_descriptor::DescriptorBundle;
use nfvo_orchestrator::sim::SimCloud;
use nfvo_orchestrator::{
    NsManager, NsrOpdata, NsrState, OrchestratorConfig, OrchestratorError, VnfrRecord,
};
use slog::{info, Logger};
use tokio::time::Instant;

use crate::bundle::{load_bundle, load_config, logger, sim_config};
use crate::{fail, OutputFormat};

/// Reason reported by VMs of a `--fail-vdu` VDU.
const SIMULATED_FAILURE: &str = "simulated VDU failure";
const SETTLE_POLL: Duration = Duration::from_millis(20);

pub(crate) struct RunOptions<'a> {
    pub bundle: &'a Path,
    pub config: Option<&'a Path>,
    pub fail_vdu: &'a [String],
    pub timeout_secs: u64,
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Everything printed for a run.
struct RunReport {
    nsrs: Vec<NsrOpdata>,
    vnfrs: Vec<VnfrRecord>,
}

pub(crate) fn cmd_run(opts: RunOptions<'_>) {
    let bundle = load_bundle(opts.bundle).unwrap_or_else(|e| fail(&e, opts.output, false));
    if bundle.ns_instances.is_empty() {
        fail(
            &format!(
                "'{}' has no ns_instance_config entries to run",
                opts.bundle.display()
            ),
            opts.output,
            false,
        );
    }
    let config = load_config(opts.config).unwrap_or_else(|e| fail(&e, opts.output, false));
    let log = logger(&config, opts.quiet).unwrap_or_else(|e| fail(&e, opts.output, false));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => fail(&format!("failed to create tokio runtime: {}", e), opts.output, false),
    };
    let limit = Duration::from_secs(opts.timeout_secs);
    let report = match rt.block_on(run_bundle(
        bundle,
        config,
        opts.config.is_some(),
        log,
        opts.fail_vdu,
        limit,
    )) {
        Ok(report) => report,
        Err(e) => fail(&e.to_string(), opts.output, false),
    };

    print_report(&report, opts.output);
    if report
        .nsrs
        .iter()
        .any(|n| n.operational_status == NsrState::Failed)
    {
        process::exit(1);
    }
}

async fn run_bundle(
    bundle: DescriptorBundle,
    config: OrchestratorConfig,
    configured: bool,
    log: Logger,
    fail_vdu: &[String],
    limit: Duration,
) -> Result<RunReport, OrchestratorError> {
    let cloud = SimCloud::new();
    for vdu in fail_vdu {
        cloud.resources.fail_vdu(vdu, SIMULATED_FAILURE);
    }
    let config = sim_config(&cloud, config, configured);
    let manager = Arc::new(NsManager::new(cloud.context(config, log.clone())));
    let dispatcher = tokio::spawn(manager.clone().run_dispatcher());
    let outcome = drive(&manager, bundle, limit, &log).await;
    dispatcher.abort();
    outcome
}

async fn drive(
    manager: &Arc<NsManager>,
    bundle: DescriptorBundle,
    limit: Duration,
    log: &Logger,
) -> Result<RunReport, OrchestratorError> {
    manager.context().catalog().load_bundle(&bundle)?;

    let mut ids = Vec::new();
    for config in bundle.ns_instances {
        let nsr = manager.create_nsr(config).await?;
        manager.instantiate_nsr(nsr.id())?;
        ids.push(nsr.id().to_string());
    }

    let mut report = RunReport {
        nsrs: Vec::new(),
        vnfrs: Vec::new(),
    };
    for id in &ids {
        report.nsrs.push(wait_settled(manager, id, limit).await?);
    }
    report.vnfrs = manager.vnf_manager().list_vnfrs().await?;
    report.vnfrs.sort_by(|a, b| a.name.cmp(&b.name));

    for id in &ids {
        manager.terminate_nsr(id).await?;
    }
    info!(log, "run complete"; "ns_count" => ids.len());
    Ok(report)
}

/// Wait until the published opdata of `nsr_id` shows RUNNING or FAILED.
async fn wait_settled(
    manager: &NsManager,
    nsr_id: &str,
    limit: Duration,
) -> Result<NsrOpdata, OrchestratorError> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(opdata) = manager.nsr_opdata(nsr_id).await? {
            if matches!(
                opdata.operational_status,
                NsrState::Running | NsrState::Failed
            ) {
                return Ok(opdata);
            }
        }
        if Instant::now() >= deadline {
            return Err(OrchestratorError::timeout(
                format!("ns {} to settle", nsr_id),
                limit,
            ));
        }
        tokio::time::sleep(SETTLE_POLL).await;
    }
}

fn print_report(report: &RunReport, output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "ns_instance_opdata": report.nsrs,
                "vnfr_catalog": report.vnfrs,
            });
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for nsr in &report.nsrs {
                println!(
                    "ns {} ({}): {}",
                    nsr.name_ref, nsr.ns_instance_config_ref, nsr.operational_status
                );
                let progress = &nsr.orchestration_progress;
                println!(
                    "  networks {}/{} active, vms {}/{} active",
                    progress.networks.active,
                    progress.networks.total,
                    progress.vms.active,
                    progress.vms.total
                );
                for vnfr in report
                    .vnfrs
                    .iter()
                    .filter(|v| v.nsr_id_ref == nsr.ns_instance_config_ref)
                {
                    println!("  vnfr {}: {}", vnfr.name, vnfr.operational_status);
                    if let Some(details) = &vnfr.operational_status_details {
                        println!("    {}", details);
                    }
                }
                for event in &nsr.operational_events {
                    match &event.details {
                        Some(details) => println!("  event {}: {}", event.event, details),
                        None => println!("  event {}", event.event),
                    }
                }
            }
        }
    }
}

//! Reading bundle and configuration files named on the command line.

use std::path::Path;

use nfvo_descriptor::{from_bundle, DescriptorBundle};
use nfvo_orchestrator::logging::{discard, setup_log};
use nfvo_orchestrator::sim::SimCloud;
use nfvo_orchestrator::OrchestratorConfig;
use slog::Logger;

/// Read, parse and validate a descriptor bundle file.
pub(crate) fn load_bundle(path: &Path) -> Result<DescriptorBundle, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))?;
    from_bundle(&doc).map_err(|e| format!("{}: {}", path.display(), e))
}

/// The configuration at `path`, or the defaults when none was given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig, String> {
    match path {
        Some(path) => OrchestratorConfig::load(path).map_err(|e| e.to_string()),
        None => Ok(OrchestratorConfig::default()),
    }
}

pub(crate) fn logger(config: &OrchestratorConfig, quiet: bool) -> Result<Logger, String> {
    if quiet {
        return Ok(discard());
    }
    setup_log(&config.log).map_err(|e| e.to_string())
}

/// Point `config` at `cloud`: keys go under the cloud's own directory
/// unless a config file chose one, and the simulated external RO account
/// is always available.
pub(crate) fn sim_config(
    cloud: &SimCloud,
    mut config: OrchestratorConfig,
    from_file: bool,
) -> OrchestratorConfig {
    if !from_file {
        config.key_dir = cloud.key_dir().to_path_buf();
    }
    for account in cloud.test_config().ro_account {
        if config.ro_account(&account.name).is_none() {
            config.ro_account.push(account);
        }
    }
    config
}

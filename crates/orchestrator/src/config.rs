//! Orchestrator configuration.
//!
//! Loaded from TOML; every field has a default so an empty file (or no
//! file at all) yields a working native-only configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Project name, the first component of derived VLR names.
    pub project: String,
    /// Root directory for per-NSR SSH key material.
    pub key_dir: PathBuf,
    pub timeouts: Timeouts,
    pub log: LogConfig,
    pub ro_account: Vec<RoAccount>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            project: "default".to_string(),
            key_dir: std::env::temp_dir().join("nfvo-keys"),
            timeouts: Timeouts::default(),
            log: LogConfig::default(),
            ro_account: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, OrchestratorError> {
        toml::from_str(text).map_err(|e| OrchestratorError::config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn ro_account(&self, name: &str) -> Option<&RoAccount> {
        self.ro_account.iter().find(|a| a.name == name)
    }
}

// ── Timeouts ────────────────────────────────────────────────────────

/// Every bounded wait in the orchestrator takes its limit from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub vnf_batch_secs: u64,
    pub vnffg_settle_secs: u64,
    pub vnffg_poll_ms: u64,
    pub dependency_poll_ms: u64,
    /// Bound on cross-record dependency waits (VDU cloud-init, VNF
    /// dependency, VNFFG hops).
    pub dependency_secs: u64,
    pub vl_ready_secs: u64,
    pub external_ro_poll_ms: u64,
    pub external_ro_instance_secs: u64,
    pub external_ro_terminate_secs: u64,
    pub scale_hook_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            vnf_batch_secs: 30,
            vnffg_settle_secs: 90,
            vnffg_poll_ms: 2000,
            dependency_poll_ms: 1000,
            dependency_secs: 300,
            vl_ready_secs: 300,
            external_ro_poll_ms: 1000,
            external_ro_instance_secs: 300,
            external_ro_terminate_secs: 30,
            scale_hook_secs: 60,
        }
    }
}

impl Timeouts {
    pub fn vnf_batch(&self) -> Duration {
        Duration::from_secs(self.vnf_batch_secs)
    }

    pub fn vnffg_settle(&self) -> Duration {
        Duration::from_secs(self.vnffg_settle_secs)
    }

    pub fn vnffg_poll(&self) -> Duration {
        Duration::from_millis(self.vnffg_poll_ms)
    }

    pub fn dependency_poll(&self) -> Duration {
        Duration::from_millis(self.dependency_poll_ms)
    }

    pub fn dependency(&self) -> Duration {
        Duration::from_secs(self.dependency_secs)
    }

    pub fn vl_ready(&self) -> Duration {
        Duration::from_secs(self.vl_ready_secs)
    }

    pub fn external_ro_poll(&self) -> Duration {
        Duration::from_millis(self.external_ro_poll_ms)
    }

    pub fn external_ro_instance(&self) -> Duration {
        Duration::from_secs(self.external_ro_instance_secs)
    }

    pub fn external_ro_terminate(&self) -> Duration {
        Duration::from_secs(self.external_ro_terminate_secs)
    }

    pub fn scale_hook(&self) -> Duration {
        Duration::from_secs(self.scale_hook_secs)
    }
}

// ── Logging ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogMode {
    StderrTerminal,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of `trace`, `debug`, `info`, `warning`, `error`, `critical`.
    pub level: String,
    pub mode: LogMode,
    /// Log file, required when `mode = "file"`.
    pub path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            mode: LogMode::StderrTerminal,
            path: None,
        }
    }
}

// ── External resource orchestrators ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoKind {
    Openmano,
}

/// A named external RO endpoint. An NS instance naming one of these in
/// `resource_orchestrator` is deployed through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoAccount {
    pub name: String,
    #[serde(default = "default_ro_kind")]
    pub kind: RoKind,
    pub url: String,
    pub tenant: String,
}

fn default_ro_kind() -> RoKind {
    RoKind::Openmano
}

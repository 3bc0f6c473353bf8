use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::explorer::explorer::TransferSettings;
use crate::explorer::runner::{DelayRule, RunnerSettings};
use crate::widget::clickability::ClickabilityRules;

pub const DEFAULT_CONFIG_FILE: &str = "ui-transfer.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "ui-transfer",
    version,
    about = "Transfer GUI tests between apps with similar features"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ui-transfer.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Similarity oracle endpoint; switches the oracle to http
    #[arg(long, global = true)]
    pub oracle_endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transfer a source test to the target app on a live device
    Transfer {
        /// Source test events (JSON array)
        #[arg(long)]
        events: PathBuf,

        /// Statically extracted widgets of the target app (JSON array)
        #[arg(long)]
        widgets: Option<PathBuf>,

        /// Static navigation model of the target app
        #[arg(long, requires = "rid_names")]
        graph: Option<PathBuf>,

        /// Resource id -> name map for the navigation model
        #[arg(long)]
        rid_names: Option<PathBuf>,

        /// Name of the output document (default: events file stem)
        #[arg(long)]
        test_name: Option<String>,

        /// Resume from a session snapshot
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Appium server URL
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Rank static widgets against one source event, offline
    Rank {
        #[arg(long)]
        events: PathBuf,

        #[arg(long)]
        widgets: PathBuf,

        /// Zero-based source event index
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Number of candidates kept
        #[arg(long)]
        top: Option<usize>,
    },

    /// List paths between two screens of a static navigation model
    Paths {
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        rid_names: PathBuf,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `ui-transfer.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub clickability: ClickabilityRules,
    #[serde(default)]
    pub delays: Vec<DelayRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSection {
    /// Declared package of the target app
    #[serde(default)]
    pub package: String,

    #[serde(default)]
    pub launch_screen: Option<String>,

    /// Screen patterns treated as outside the app (e.g. embedded login SDKs)
    #[serde(default)]
    pub out_of_scope: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_true")]
    pub use_stopwords: bool,

    #[serde(default = "default_top")]
    pub top_candidates: usize,

    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    #[serde(default = "default_threshold")]
    pub fitness_threshold: f64,

    #[serde(default = "default_budget")]
    pub time_budget_secs: u64,

    #[serde(default = "default_probe")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_wait")]
    pub default_wait_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            use_stopwords: true,
            top_candidates: default_top(),
            max_paths: default_max_paths(),
            fitness_threshold: default_threshold(),
            time_budget_secs: default_budget(),
            probe_timeout_ms: default_probe(),
            default_wait_ms: default_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Extra desired capabilities sent when the session is opened
    #[serde(default)]
    pub capabilities: BTreeMap<String, serde_json::Value>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            capabilities: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    #[default]
    Lexical,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub kind: OracleKind,

    pub endpoint: Option<String>,

    #[serde(default = "default_oracle_timeout")]
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::Lexical,
            endpoint: None,
            timeout_ms: default_oracle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    pub trace_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            snapshot_dir: default_snapshot_dir(),
            trace_file: None,
        }
    }
}

// Serde default helpers
fn default_true() -> bool { true }
fn default_top() -> usize { 12 }
fn default_max_paths() -> usize { 10 }
fn default_threshold() -> f64 { 0.005 }
fn default_budget() -> u64 { 30 * 60 }
fn default_probe() -> u64 { 500 }
fn default_wait() -> u64 { 7000 }
fn default_oracle_timeout() -> u64 { 10_000 }
fn default_endpoint() -> String { "http://localhost:4723".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from("generated") }
fn default_snapshot_dir() -> PathBuf { PathBuf::from("session") }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. A missing file yields defaults; a malformed
/// one is an error.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, TransferError> {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content)
            .map_err(|e| TransferError::Config(format!("{}: {}", config_path, e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(TransferError::io(config_path, e)),
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(content)
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

impl TransferConfig {
    pub fn settings(&self) -> TransferSettings {
        TransferSettings {
            use_stopwords: self.use_stopwords,
            top_candidates: self.top_candidates,
            max_paths: self.max_paths,
            fitness_threshold: self.fitness_threshold,
            time_budget: Duration::from_secs(self.time_budget_secs),
            probe_wait: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

impl AppConfig {
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            default_wait: Duration::from_millis(self.transfer.default_wait_ms),
            delays: self.delays.clone(),
        }
    }

    /// Oracle endpoint after CLI override; `Some` only for an http oracle.
    pub fn oracle_endpoint<'a>(&'a self, cli_endpoint: Option<&'a str>) -> Option<&'a str> {
        match cli_endpoint {
            Some(endpoint) => Some(endpoint),
            None if self.oracle.kind == OracleKind::Http => self.oracle.endpoint.as_deref(),
            None => None,
        }
    }
}

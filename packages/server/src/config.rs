use crate::state::DEFAULT_TRACE_AUDIT_EVERY;
use clap::Parser;
use dve_publish::{DEFAULT_RUNTIME_SRC, DEFAULT_SNAPSHOT_RETENTION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "dve.config.json";

/// Overlay editor API server
#[derive(Parser, Debug, Default)]
#[command(name = "dve-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ./dve.config.json when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the uploads folder
    #[arg(long)]
    pub web_root: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:5080
    #[arg(long)]
    pub bind: Option<String>,

    /// JSON store file; omitted means an in-memory store
    #[arg(long)]
    pub store: Option<PathBuf>,
}

/// Server configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DveConfig {
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,

    /// Uploads folder under the web root; one directory per project id
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,

    /// Runtime script tag attached to published pages
    #[serde(default = "default_runtime_src")]
    pub runtime_script_src: String,

    /// Emit `debug: true` in runtime config blocks
    #[serde(default)]
    pub runtime_debug: bool,

    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Snapshot the project on publish
    #[serde(default = "default_true")]
    pub snapshots: bool,

    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention: usize,

    /// Audit one ingested runtime trace in every N; 0 disables
    #[serde(default = "default_trace_audit_every")]
    pub trace_audit_every: u64,
}

fn default_web_root() -> PathBuf {
    PathBuf::from("wwwroot")
}

fn default_uploads_dir() -> String {
    "Uploads".to_string()
}

fn default_runtime_src() -> String {
    DEFAULT_RUNTIME_SRC.to_string()
}

fn default_bind() -> String {
    "127.0.0.1:5080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_snapshot_retention() -> usize {
    DEFAULT_SNAPSHOT_RETENTION
}

fn default_trace_audit_every() -> u64 {
    DEFAULT_TRACE_AUDIT_EVERY
}

impl Default for DveConfig {
    fn default() -> Self {
        Self {
            web_root: default_web_root(),
            uploads_dir: default_uploads_dir(),
            runtime_script_src: default_runtime_src(),
            runtime_debug: false,
            store_path: None,
            bind: default_bind(),
            snapshots: true,
            snapshot_retention: default_snapshot_retention(),
            trace_audit_every: default_trace_audit_every(),
        }
    }
}

impl DveConfig {
    /// Load config from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Config file named by the CLI, else `dve.config.json`, with the CLI
    /// flags applied on top
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME));
        if cli.config.is_some() && !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let mut config = Self::load(&path)?;

        if let Some(web_root) = &cli.web_root {
            config.web_root = web_root.clone();
        }
        if let Some(bind) = &cli.bind {
            config.bind = bind.clone();
        }
        if let Some(store) = &cli.store {
            config.store_path = Some(store.clone());
        }
        Ok(config)
    }
}

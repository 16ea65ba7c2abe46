use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Top-level server configuration.
///
/// Loaded from an optional YAML file (path in the `CONFIG` environment
/// variable) with individual environment-variable overrides on top. Every
/// field has a default, so a bare process start serves the current
/// directory on `[::]:8888`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to, e.g. "[::]:8888".
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticFilesConfig {
    /// Directory files are served from. Must exist at startup.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Single-page-application mode: rewrite HTML-like or missing targets
    /// to the root index.html.
    #[serde(default)]
    pub spa: bool,

    /// Log errors only.
    #[serde(default)]
    pub silent: bool,
}

fn default_listen_addr() -> String {
    "[::]:8888".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            spa: false,
            silent: false,
        }
    }
}

impl Config {
    /// Load configuration from the YAML file named by `CONFIG` (if set),
    /// then apply environment overrides: `LISTEN`, `SERVER_ROOT`, `SPA`,
    /// `SILENT`.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            Err(_) => Self {
                server: ServerConfig::default(),
                static_files: StaticFilesConfig::default(),
            },
        };

        if let Ok(listen) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen;
        }
        if let Ok(root) = std::env::var("SERVER_ROOT") {
            cfg.static_files.root = PathBuf::from(root);
        }
        if let Ok(spa) = std::env::var("SPA") {
            cfg.static_files.spa = is_truthy(&spa);
        }
        if let Ok(silent) = std::env::var("SILENT") {
            cfg.static_files.silent = is_truthy(&silent);
        }

        Ok(cfg)
    }

    /// Startup validation. The server must never run against a broken
    /// configuration, so a missing root directory is fatal before any
    /// connection is accepted.
    pub fn validate(&self) -> anyhow::Result<()> {
        let root: &Path = &self.static_files.root;
        let meta = std::fs::metadata(root)
            .with_context(|| format!("server root {} does not exist", root.display()))?;
        anyhow::ensure!(
            meta.is_dir(),
            "server root {} is not a directory",
            root.display()
        );
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes" | "on")
}

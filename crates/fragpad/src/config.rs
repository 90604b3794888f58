//! On-disk configuration and platform paths.
//!
//! `config.toml` lives in the platform config directory and carries the same
//! knobs as the CLI; flags win over the file, the file wins over defaults.
//! The file also pins the installation's sketch namespace so stored sketches
//! survive restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cli::Cli;

/// Resolved locations for this installation.
pub struct AppPaths {
    pub config_file: PathBuf,
    pub sketch_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "fragpad")
            .ok_or_else(|| anyhow!("could not resolve a home directory for config and sketches"))?;
        Ok(Self {
            config_file: dirs.config_dir().join("config.toml"),
            sketch_dir: dirs.data_dir().join("sketches"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Quiescence window before an edited source is recompiled.
    pub debounce_ms: u64,
    /// Resolution scale applied to the drawable.
    pub render_scale: f32,
    /// Redraw rate cap; unlimited when absent.
    pub fps_cap: Option<u32>,
    /// Initial window size in logical pixels.
    pub window_size: (u32, u32),
    /// Sketch names never removed by startup cleanup.
    pub keep: Vec<String>,
    /// Store namespace; generated and written back on first run.
    pub namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            render_scale: 1.0,
            fps_cap: None,
            window_size: (1280, 720),
            keep: Vec::new(),
            namespace: None,
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it is missing or
    /// unreadable. A malformed file is reported and ignored rather than
    /// aborting startup.
    pub fn load_or_default(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read config; using defaults");
                return Self::default();
            }
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "malformed config; using defaults");
                Self::default()
            }
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serialising config")?;
        fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
    }

    /// Returns the pinned namespace, generating and persisting one on first
    /// run. If the config cannot be written the generated namespace is still
    /// used for this session.
    pub fn ensure_namespace(&mut self, path: &Path) -> String {
        if let Some(namespace) = &self.namespace {
            return namespace.clone();
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or(0);
        let namespace = format!("pad-{nanos:x}");
        self.namespace = Some(namespace.clone());
        if let Err(err) = self.save(path) {
            warn!(%err, "could not persist namespace; sketches will not survive restart");
        }
        namespace
    }
}

/// Effective settings after layering CLI flags over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub debounce: Duration,
    pub render_scale: f32,
    pub fps_cap: Option<u32>,
    pub window_size: (u32, u32),
}

impl Settings {
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            debounce: Duration::from_millis(cli.debounce_ms.unwrap_or(config.debounce_ms)),
            render_scale: cli.scale.unwrap_or(config.render_scale).clamp(0.1, 1.0),
            fps_cap: cli.fps.or(config.fps_cap),
            window_size: cli.size.unwrap_or(config.window_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_contract() {
        let config = Config::default();
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.render_scale, 1.0);
        assert!(config.namespace.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.debounce_ms, 1000);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "debounce_ms = \"soon\"").unwrap();
        let config = Config::load_or_default(&path);
        assert_eq!(config.debounce_ms, 1000);
    }

    #[test]
    fn cli_overrides_config_overrides_defaults() {
        let config = Config {
            debounce_ms: 250,
            render_scale: 0.5,
            ..Config::default()
        };
        let cli = Cli::parse_from(["fragpad", "--debounce-ms", "100"]);
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.debounce, Duration::from_millis(100));
        // Untouched knobs come from the file.
        assert_eq!(settings.render_scale, 0.5);
        assert_eq!(settings.window_size, (1280, 720));
    }

    #[test]
    fn namespace_is_generated_once_and_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        let namespace = config.ensure_namespace(&path);
        assert!(namespace.starts_with("pad-"));

        let reloaded = Config::load_or_default(&path);
        assert_eq!(reloaded.namespace.as_deref(), Some(namespace.as_str()));

        let mut again = reloaded;
        assert_eq!(again.ensure_namespace(&path), namespace);
    }

    #[test]
    fn scale_is_clamped() {
        let cli = Cli::parse_from(["fragpad", "--scale", "9.0"]);
        let settings = Settings::resolve(&cli, &Config::default());
        assert_eq!(settings.render_scale, 1.0);
    }
}

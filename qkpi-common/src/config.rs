//! Configuration loading and root folder resolution

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::non_quality_cost::DEFAULT_NQC_THRESHOLD;
use crate::{Error, Result};

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "qkpi.db";

/// Contents of `config.toml`
///
/// Every field is optional; a missing or partial file falls back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub kpi: KpiConfig,
}

/// Business defaults for KPI reporting
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KpiConfig {
    /// Non-quality-cost threshold used when none has been recorded
    pub nqc_default_threshold: f64,
    /// Reject workshop names outside the canonical eight
    pub strict_scopes: bool,
    /// Seed default per-workshop thresholds on startup
    pub seed_default_thresholds: bool,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            nqc_default_threshold: DEFAULT_NQC_THRESHOLD,
            strict_scopes: false,
            seed_default_thresholds: true,
        }
    }
}

/// Load the TOML configuration
///
/// With an explicit path the file must exist and parse. Without one, the
/// platform config locations are probed and a missing file yields defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => {
                warn!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config = parse_toml_config(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig =
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

    if !config.kpi.nqc_default_threshold.is_finite() || config.kpi.nqc_default_threshold < 0.0 {
        return Err(Error::Config(format!(
            "kpi.nqc_default_threshold must be a non-negative number, got {}",
            config.kpi.nqc_default_threshold
        )));
    }

    Ok(config)
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Probe `~/.config/qkpi/config.toml`, then `/etc/qkpi/config.toml`
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("qkpi").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/qkpi/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/qkpi (or /var/lib/qkpi for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("qkpi"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/qkpi"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("qkpi"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/qkpi"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("qkpi"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\qkpi"))
    } else {
        PathBuf::from("./qkpi_data")
    }
}

/// Rig configuration
///
/// Single source of truth: impressio.yaml next to Cargo.toml, one block per
/// hostname. Anything missing falls back to the bench defaults; CLI flags
/// override both (applied by the binary, not here).

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// Serial port the rig microcontroller usually shows up on.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
/// Baud rate the rig firmware is flashed with.
pub const DEFAULT_BAUDRATE: u32 = 9600;

#[allow(non_snake_case)]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HostConfig {
    pub PORT: Option<String>,
    pub BAUDRATE: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RigSettings {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUDRATE,
        }
    }
}

fn config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("impressio.yaml")
}

/// Resolve settings for one hostname from YAML text.
pub fn settings_from_yaml(yaml_str: &str, hostname: &str) -> Result<RigSettings> {
    let hosts: BTreeMap<String, HostConfig> =
        serde_yaml::from_str(yaml_str).context("Invalid impressio.yaml structure")?;

    let host = hosts
        .get(hostname)
        .cloned()
        .ok_or_else(|| anyhow!("No host entry for '{}' in impressio.yaml", hostname))?;

    let defaults = RigSettings::default();
    Ok(RigSettings {
        port: host.PORT.unwrap_or(defaults.port),
        baud_rate: host.BAUDRATE.unwrap_or(defaults.baud_rate),
    })
}

/// Load settings for the current hostname.
///
/// A missing impressio.yaml or an absent host entry is not an error (the
/// bench defaults apply); a present-but-malformed file is.
pub fn load_rig_settings(hostname: &str) -> Result<RigSettings> {
    let path = config_path();
    if !path.exists() {
        warn!(
            target: "config_loader",
            "No impressio.yaml at {:?}; using defaults ({} @ {} baud)",
            path,
            DEFAULT_PORT,
            DEFAULT_BAUDRATE
        );
        return Ok(RigSettings::default());
    }

    let yaml_str =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    // Structure errors are fatal so a typo'd config does not silently run
    // against the wrong port; an unlisted hostname just means defaults.
    let _: BTreeMap<String, HostConfig> =
        serde_yaml::from_str(&yaml_str).context("Invalid impressio.yaml structure")?;

    match settings_from_yaml(&yaml_str, hostname) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            warn!(target: "config_loader", "{:#}; using defaults", e);
            Ok(RigSettings::default())
        }
    }
}

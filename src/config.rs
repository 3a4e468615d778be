use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const PID_FILENAME: &str = "taglet-daemon.pid";
pub const CONFIG_FILENAME: &str = "config.json";

/// Default delimiter bounding a typed tag, as in `/fire/`.
pub const DEFAULT_DELIMITER: &str = "/";

/// Suggestions are suppressed below this many typed characters
/// (exact matches are still surfaced).
pub const MIN_SUGGESTION_PREFIX: usize = 2;

/// Upper bound on the merged suggestion list.
pub const SUGGESTION_LIMIT: usize = 25;

/// Hard cap on the repeat multiplier. Keeps a typed digit run from
/// requesting a multi-gigabyte insertion.
pub const MAX_REPEAT: u32 = 100;

/// Runtime capture configuration, persisted as `config.json` in the
/// taglet config directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureConfig {
    pub start_delimiter: String,
    pub end_delimiter: String,
    /// Enter finishes a capture without being counted as a typed character.
    pub trigger_enter: bool,
    /// Tab finishes a capture without being counted as a typed character.
    pub trigger_tab: bool,
    /// Whether the live suggestion popup is enabled at all.
    pub suggestions_enabled: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            start_delimiter: DEFAULT_DELIMITER.to_string(),
            end_delimiter: DEFAULT_DELIMITER.to_string(),
            trigger_enter: true,
            trigger_tab: true,
            suggestions_enabled: true,
        }
    }
}

impl CaptureConfig {
    /// Load the capture configuration, falling back to defaults if the
    /// file is missing or unreadable. A malformed file is logged and
    /// ignored; it never aborts startup.
    pub fn load() -> Self {
        let path = get_config_file_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        ensure_config_dir()?;
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(get_config_file_path(), serialized)?;
        Ok(())
    }
}

/// Get the taglet configuration directory
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = env::var("TAGLET_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".taglet"))
        .unwrap_or_else(|_| PathBuf::from(".taglet"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir();
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }
    Ok(config_dir)
}

/// Get the path to the PID file
pub fn get_pid_file_path() -> PathBuf {
    get_config_dir().join(PID_FILENAME)
}

/// Get the path to the capture configuration file
pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILENAME)
}

/// Path of the tag→payload map document for one namespace.
pub fn get_map_file_path(namespace: &str) -> PathBuf {
    get_config_dir().join(format!("{}-map.json", namespace))
}

/// Path of the insertion-order document for one namespace.
pub fn get_order_file_path(namespace: &str) -> PathBuf {
    get_config_dir().join(format!("{}-order.json", namespace))
}

/// PID of the running daemon, if any. A pid file that is unreadable,
/// holds garbage, or names a process that is no longer alive counts as
/// not running and is cleaned up, so a crashed daemon never blocks the
/// next `start`.
pub fn is_daemon_running() -> Result<Option<u32>> {
    check_pid_file(&get_pid_file_path())
}

fn check_pid_file(pid_file: &Path) -> Result<Option<u32>> {
    if !pid_file.exists() {
        return Ok(None);
    }

    let pid = fs::read_to_string(pid_file)
        .ok()
        .and_then(|contents| contents.trim().parse::<u32>().ok());

    match pid {
        Some(pid) if process_alive(pid) => Ok(Some(pid)),
        _ => {
            let _ = fs::remove_file(pid_file);
            Ok(None)
        }
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Signal 0 probes for existence without delivering anything.
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    // No portable probe; trust the pid file.
    true
}

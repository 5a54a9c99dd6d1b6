// Numcro Settings Module
// User-configurable engine, network and hook settings loaded from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event::{DEFAULT_CAPTURE_TIMEOUT, DEFAULT_QUEUE_CAPACITY};
use crate::key::{normalize_key_name, ABORT_KEY};

pub const DEFAULT_PORT: u16 = 5006;
pub const DEFAULT_DISCOVERY_PORT: u16 = 5005;

/// Dispatch engine settings (`[engine]`)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub device_filtering: bool,
    pub capture_timeout: Duration,
    pub queue_capacity: usize,
    pub abort_key: String,
    /// Re-emit unmapped keys from grabbed local devices
    pub passthrough: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            device_filtering: false,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            abort_key: ABORT_KEY.to_string(),
            passthrough: true,
        }
    }
}

/// Network source settings (`[network]`)
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub discovery_port: u16,
    /// Name reported in discovery responses
    pub host_id: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            host_id: default_host_id(),
        }
    }
}

impl NetworkSettings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn discovery_addr(&self) -> String {
        format!("{}:{}", self.bind, self.discovery_port)
    }
}

/// Local hook settings (`[hook]`)
#[derive(Debug, Clone, PartialEq)]
pub struct HookSettings {
    pub enabled: bool,
    /// Grab devices so their keys only reach the engine
    pub grab: bool,
    /// Device names or paths; empty means every real keyboard
    pub devices: Vec<String>,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            grab: false,
            devices: Vec::new(),
        }
    }
}

/// All settings for numcro
///
/// Loaded from a TOML file (default: ~/.config/numcro/settings.toml).
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub network: NetworkSettings,
    pub hook: HookSettings,

    /// Path to the settings file (for reload)
    source_path: Option<PathBuf>,
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, serde::Deserialize, Default)]
struct SettingsToml {
    #[serde(default)]
    engine: Option<EngineToml>,

    #[serde(default)]
    network: Option<NetworkToml>,

    #[serde(default)]
    hook: Option<HookToml>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct EngineToml {
    #[serde(default)]
    device_filtering: Option<toml::Value>,
    #[serde(default)]
    capture_timeout_ms: Option<i64>,
    #[serde(default)]
    queue_capacity: Option<i64>,
    #[serde(default)]
    abort_key: Option<String>,
    #[serde(default)]
    passthrough: Option<toml::Value>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct NetworkToml {
    #[serde(default)]
    enabled: Option<toml::Value>,
    #[serde(default)]
    bind: Option<String>,
    #[serde(default)]
    port: Option<i64>,
    #[serde(default)]
    discovery_port: Option<i64>,
    #[serde(default)]
    host_id: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct HookToml {
    #[serde(default)]
    enabled: Option<toml::Value>,
    #[serde(default)]
    grab: Option<toml::Value>,
    #[serde(default)]
    devices: Option<Vec<String>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let toml_settings: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();

        if let Some(engine) = toml_settings.engine {
            let target = &mut settings.engine;
            if let Some(value) = engine.device_filtering {
                target.device_filtering = parse_bool_value(&value)?;
            }
            if let Some(ms) = engine.capture_timeout_ms {
                if ms <= 0 {
                    return Err(SettingsError::InvalidValue(format!(
                        "capture_timeout_ms must be positive, got {}",
                        ms
                    )));
                }
                target.capture_timeout = Duration::from_millis(ms as u64);
            }
            if let Some(capacity) = engine.queue_capacity {
                // Clamped rather than rejected
                target.queue_capacity = capacity.clamp(1, 1 << 20) as usize;
            }
            if let Some(key) = engine.abort_key {
                let key = normalize_key_name(&key);
                if key.is_empty() {
                    return Err(SettingsError::InvalidValue("abort_key is empty".to_string()));
                }
                target.abort_key = key;
            }
            if let Some(value) = engine.passthrough {
                target.passthrough = parse_bool_value(&value)?;
            }
        }

        if let Some(network) = toml_settings.network {
            let target = &mut settings.network;
            if let Some(value) = network.enabled {
                target.enabled = parse_bool_value(&value)?;
            }
            if let Some(bind) = network.bind {
                target.bind = bind;
            }
            if let Some(port) = network.port {
                target.port = parse_port("port", port)?;
            }
            if let Some(port) = network.discovery_port {
                target.discovery_port = parse_port("discovery_port", port)?;
            }
            if let Some(host_id) = network.host_id.filter(|h| !h.trim().is_empty()) {
                target.host_id = host_id;
            }
        }

        if let Some(hook) = toml_settings.hook {
            let target = &mut settings.hook;
            if let Some(value) = hook.enabled {
                target.enabled = parse_bool_value(&value)?;
            }
            if let Some(value) = hook.grab {
                target.grab = parse_bool_value(&value)?;
            }
            if let Some(devices) = hook.devices {
                target.devices = devices;
            }
        }

        Ok(settings)
    }

    /// Directory holding settings, layout and macros
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("numcro"))
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    pub fn default_layout_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("layout.json"))
    }

    pub fn default_macros_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("macros.json"))
    }

    /// Load from default location (~/.config/numcro/settings.toml)
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        // Return default settings if file doesn't exist
        Ok(Self::new())
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Reload settings from the original file
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        if let Some(ref path) = self.source_path {
            let new_settings = Self::from_file(path)?;
            *self = new_settings;
            Ok(())
        } else {
            Err(SettingsError::InvalidValue("No source path set".to_string()))
        }
    }
}

fn parse_port(name: &str, value: i64) -> Result<u16, SettingsError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| SettingsError::InvalidValue(format!("{} out of range: {}", name, value)))
}

/// Parse a TOML value as a boolean
fn parse_bool_value(value: &toml::Value) -> Result<bool, SettingsError> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::Integer(1) => Ok(true),
        toml::Value::Integer(0) => Ok(false),
        toml::Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(SettingsError::InvalidValue(format!(
                "Cannot convert '{}' to boolean",
                s
            ))),
        },
        _ => Err(SettingsError::InvalidValue(format!(
            "Cannot convert {:?} to boolean",
            value
        ))),
    }
}

/// Host name reported to broadcasters when none is configured
pub fn default_host_id() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "numcro".to_string())
}

/// Create default settings content for a new installation
pub fn default_settings_content() -> &'static str {
    r#"# Numcro Settings
# Place this file at: ~/.config/numcro/settings.toml

[engine]
# Match buttons by source device as well as key name
device_filtering = false
# How long "press a key to map" waits
capture_timeout_ms = 3000
queue_capacity = 1024
# Ends a macro recording
abort_key = "esc"
# Re-emit unmapped keys from grabbed devices
passthrough = true

[network]
enabled = true
bind = "0.0.0.0"
port = 5006
discovery_port = 5005
# host_id = "my-desktop"

[hook]
enabled = true
grab = false
# Device names or /dev/input paths; empty = all keyboards
devices = []
"#
}

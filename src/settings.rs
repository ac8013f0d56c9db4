use std::path::{Path, PathBuf};
use std::time::Duration;

use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cloud::RetryPolicy;
use crate::lab::Pacing;

const CONFIG_DIR_ENV: &str = "LAB_OPERATOR_CONFIG_DIR";

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct OperatorSettings {
    #[serde(default)]
    pub oci: OciSettings,
    #[serde(default)]
    pub pacing: PacingSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OciSettings {
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    #[serde(default)]
    pub agent_endpoint: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OciSettings {
    fn default() -> Self {
        Self {
            config_file: None,
            profile: None,
            region: None,
            identity_endpoint: None,
            agent_endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacingSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_deletion_timeout_secs")]
    pub deletion_timeout_secs: u64,
    #[serde(default = "default_throttle_millis")]
    pub throttle_millis: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            deletion_timeout_secs: default_deletion_timeout_secs(),
            throttle_millis: default_throttle_millis(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_millis")]
    pub base_delay_millis: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_millis: default_base_delay_millis(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_deletion_timeout_secs() -> u64 {
    3600
}

fn default_throttle_millis() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_millis() -> u64 {
    500
}

impl PacingSettings {
    pub fn to_pacing(&self) -> Pacing {
        Pacing {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            deletion_timeout: Duration::from_secs(self.deletion_timeout_secs),
            throttle: Duration::from_millis(self.throttle_millis),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_millis),
            ..RetryPolicy::default()
        }
    }
}

pub fn load_settings() -> anyhow::Result<OperatorSettings> {
    let path = settings_path()?;
    if !path.exists() {
        return Ok(OperatorSettings::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    let settings: OperatorSettings = serde_yaml_bw::from_str(&contents)?;
    Ok(settings)
}

pub fn save_settings(settings: &OperatorSettings) -> anyhow::Result<()> {
    let path = settings_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_yaml_bw::to_string(settings)?;
    std::fs::write(&path, contents)?;
    Ok(())
}

pub fn settings_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(Path::new(&value).join("settings.yaml"));
    }
    let dirs = ProjectDirs::from("", "lab-operator", "lab-operator")
        .ok_or_else(|| anyhow::anyhow!("unable to determine config directory"))?;
    Ok(dirs.config_dir().join("settings.yaml"))
}

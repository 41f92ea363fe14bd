use crate::error::{GraphError, Result};
use crate::image::Platform;
use crate::target::{DeploymentTarget, DEFAULT_REGION};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "stack.toml";

static CLUSTER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-]{1,255}$").expect("Failed to init regexp"));

/// Subnets are carved out of a /16, one public and one private block per zone
pub const MAX_AZS_LIMIT: u32 = 16;

/// Options of the whole stack, the structure of stack.toml
///
/// Every section is optional, missing values fall back to the reference deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// [target]
    /// region = "us-east-1"
    pub target: TargetSection,

    /// [network]
    /// max_azs = 2
    pub network: NetworkOptions,

    /// [cluster]
    /// name = "testapp-cluster"
    pub cluster: ClusterOptions,

    /// [service]
    /// cpu = 256
    pub service: ServiceOptions,

    /// [image]
    /// context = "TestApp/TestApp"
    pub image: ImageOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    pub region: Option<String>,
    pub account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkOptions {
    /// Number of availability zones to span
    pub max_azs: u32,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        NetworkOptions { max_azs: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterOptions {
    pub name: String,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        ClusterOptions {
            name: "testapp-cluster".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceOptions {
    /// CPU units of a task
    pub cpu: u32,

    /// Memory limit of a task in MiB
    pub memory: u32,

    /// Number of replicas
    pub desired_count: u32,

    /// Inbound port of the container
    pub container_port: u16,

    pub public_load_balancer: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        ServiceOptions {
            cpu: 256,
            memory: 512,
            desired_count: 1,
            container_port: 8000,
            public_load_balancer: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageOptions {
    /// Directory with a Dockerfile, relative paths are resolved against the project dir
    pub context: PathBuf,
    pub platform: Platform,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions {
            context: PathBuf::from("TestApp/TestApp"),
            platform: Platform::LinuxAmd64,
        }
    }
}

impl StackConfig {
    /// Reads stack.toml from the given project directory
    ///
    /// Returns the defaults if the file does not exist. A relative image context is resolved
    /// against the directory in both cases.
    pub fn from_path(path: &Path) -> Result<Self> {
        let config_path = path.join(CONFIG_FILENAME);

        let mut config = match fs::read_to_string(&config_path) {
            Ok(toml_string) => Self::from_toml(&toml_string)?,

            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No {CONFIG_FILENAME} in {path:?}, using defaults");
                StackConfig::default()
            }

            Err(e) => return Err(e.into()),
        };

        if config.image.context.is_relative() {
            config.image.context = path.join(&config.image.context);
        }

        Ok(config)
    }

    pub fn from_toml(toml_string: &str) -> Result<Self> {
        toml::from_str(toml_string).map_err(|e| {
            GraphError::configuration(format!("Failed to parse {CONFIG_FILENAME}: {e}"))
        })
    }

    /// Deployment target with explicit values taking precedence over stack.toml
    pub fn target(&self, account: Option<&str>, region: Option<&str>) -> DeploymentTarget {
        let region = region
            .or(self.target.region.as_deref())
            .unwrap_or(DEFAULT_REGION);

        let account = account.or(self.target.account.as_deref());
        DeploymentTarget::new(account, region)
    }

    /// Check the options against what the provider accepts
    pub fn validate(&self) -> Result<()> {
        let max_azs = self.network.max_azs;

        if !(1..=MAX_AZS_LIMIT).contains(&max_azs) {
            return Err(GraphError::configuration(format!(
                "max_azs must be between 1 and {MAX_AZS_LIMIT}, got {max_azs}"
            )));
        }

        if !CLUSTER_NAME_REGEX.is_match(&self.cluster.name) {
            return Err(GraphError::configuration(format!(
                "Invalid cluster name \"{}\". Must be 1-255 characters long and contain only letters, numbers, hyphens and underscores.",
                self.cluster.name
            )));
        }

        let ServiceOptions {
            cpu,
            memory,
            container_port,
            ..
        } = self.service;

        if !is_fargate_size(cpu, memory) {
            return Err(GraphError::configuration(format!(
                "Fargate does not support {cpu} CPU units with {memory} MiB of memory"
            )));
        }

        if container_port == 0 {
            return Err(GraphError::configuration("Container port must not be 0"));
        }

        Ok(())
    }
}

/// CPU and memory pairs a Fargate task can be sized with
fn is_fargate_size(cpu: u32, memory: u32) -> bool {
    let in_steps = |min: u32, max: u32, step: u32| {
        (min..=max).contains(&memory) && (memory - min) % step == 0
    };

    match cpu {
        256 => matches!(memory, 512 | 1024 | 2048),
        512 => in_steps(1024, 4096, 1024),
        1024 => in_steps(2048, 8192, 1024),
        2048 => in_steps(4096, 16384, 1024),
        4096 => in_steps(8192, 30720, 1024),
        8192 => in_steps(16384, 61440, 4096),
        16384 => in_steps(32768, 122880, 8192),
        _ => false,
    }
}

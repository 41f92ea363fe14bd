use crate::asset;
use crate::error::{GraphError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static FROM_PLATFORM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*FROM\s+--platform=(\S+)").expect("Failed to init regexp")
});

pub const DOCKERFILE: &str = "Dockerfile";

/// Target platform of the container image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "linux/amd64")]
    LinuxAmd64,

    #[serde(rename = "linux/arm64")]
    LinuxArm64,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "linux/amd64",
            Platform::LinuxArm64 => "linux/arm64",
        }
    }

    /// CPU architecture as named in an ECS task's runtime platform
    pub fn cpu_architecture(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "X86_64",
            Platform::LinuxArm64 => "ARM64",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "linux/amd64" | "linux/x86_64" => Ok(Platform::LinuxAmd64),
            "linux/arm64" | "linux/aarch64" => Ok(Platform::LinuxArm64),
            other => Err(GraphError::configuration(format!(
                "Unsupported image platform \"{other}\""
            ))),
        }
    }
}

/// Container image to be built from a local directory
///
/// The fingerprint identifies the content of the build context. The image build step pushes the
/// image under this tag, and the task definition refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub context: PathBuf,
    pub platform: Platform,
    pub fingerprint: String,
}

impl ImageReference {
    /// Inspect the build context and fingerprint it
    ///
    /// Fails if the directory does not exist, has no Dockerfile, or the Dockerfile pins a base
    /// image to a platform other than the requested one.
    pub fn from_context(context: &Path, platform: Platform) -> Result<Self> {
        if !context.exists() {
            return Err(GraphError::build_context(context, "Path does not exist"));
        }

        if !context.is_dir() {
            return Err(GraphError::build_context(context, "Path is not a directory"));
        }

        let dockerfile_path = context.join(DOCKERFILE);

        let dockerfile = fs::read_to_string(&dockerfile_path).map_err(|e| {
            GraphError::build_context(context, format!("Failed to read {DOCKERFILE}: {e}"))
        })?;

        check_platform(context, &dockerfile, platform)?;

        let fingerprint = asset::fingerprint(context, platform.as_str())?;
        log::debug!("Build context {context:?} fingerprinted as {fingerprint}");

        Ok(ImageReference {
            context: context.to_path_buf(),
            platform,
            fingerprint,
        })
    }
}

/// Stages pinned with `FROM --platform=<literal>` must match the requested platform
///
/// Build args like `$BUILDPLATFORM` are resolved by the builder and accepted as is.
fn check_platform(context: &Path, dockerfile: &str, platform: Platform) -> Result<()> {
    for captures in FROM_PLATFORM_REGEX.captures_iter(dockerfile) {
        let pinned = &captures[1];

        if pinned.starts_with('$') {
            continue;
        }

        match Platform::from_str(pinned) {
            Ok(pinned) if pinned == platform => {}
            _ => {
                return Err(GraphError::build_context(
                    context,
                    format!("{DOCKERFILE} pins platform {pinned}, but {platform} was requested"),
                ))
            }
        }
    }

    Ok(())
}

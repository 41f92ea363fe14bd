use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Region used when neither the caller nor stack.toml names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Account and region a resource graph is built for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Left to the provisioning engine's ambient resolution when absent
    pub account: Option<String>,
    pub region: String,
}

impl DeploymentTarget {
    pub fn new(account: Option<&str>, region: &str) -> Self {
        DeploymentTarget {
            account: account
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from),
            region: region.trim().to_string(),
        }
    }

    /// Reject targets the provisioning engine could never resolve
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(GraphError::configuration("Region must not be empty"));
        }

        Ok(())
    }
}

impl Default for DeploymentTarget {
    fn default() -> Self {
        DeploymentTarget::new(None, DEFAULT_REGION)
    }
}

impl Display for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.account {
            Some(account) => write!(f, "{account}/{}", self.region),
            None => write!(f, "<ambient>/{}", self.region),
        }
    }
}

//! Configuration for the command line client.

use crate::errors::CliError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use txf_core::TrustBase;
use txf_network::{PollPolicy, RetryPolicy};

/// Configuration for the command line client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// The aggregator endpoint
    pub aggregator_url: String,
    /// Name of the network tokens are sent on
    pub network: String,
    /// Trust base of the network's root nodes
    pub trust_base_path: Option<PathBuf>,
    /// Timeout of a single aggregator request, in seconds
    pub request_timeout_secs: u64,
    /// How long to wait for an inclusion proof, in seconds
    pub poll_timeout_secs: u64,
    /// Delay between proof requests, in milliseconds
    pub poll_interval_ms: u64,
    /// Submission attempts before giving up
    pub max_attempts: u32,
    /// Delay between submission attempts, in milliseconds
    pub backoff_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            aggregator_url: "http://localhost:3000".to_string(),
            network: "testnet".to_string(),
            trust_base_path: None,
            request_timeout_secs: 10,
            poll_timeout_secs: 60,
            poll_interval_ms: 1000,
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl CliConfig {
    /// Loads configuration from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CliError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config dir>/txf/config.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut dir| {
            dir.push("txf");
            dir.push("config.json");
            dir
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_secs(self.poll_timeout_secs),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Reads the trust base and checks that its root nodes signed it.
    pub fn load_trust_base(&self) -> Result<TrustBase, CliError> {
        let path = self.trust_base_path.as_ref().ok_or_else(|| {
            CliError::Config("no trust base configured; pass --trust-base".to_string())
        })?;
        let text = std::fs::read_to_string(path)?;
        let trust_base: TrustBase = serde_json::from_str(&text)?;
        trust_base.verify_self_signed()?;
        debug!(
            "loaded trust base for network {} epoch {} from {}",
            trust_base.network_id,
            trust_base.epoch,
            path.display()
        );
        Ok(trust_base)
    }
}

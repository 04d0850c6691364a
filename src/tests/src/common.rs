//! Shared fixtures: an in-process aggregator, a scratch directory and a client config
//! pointing at both.

use std::path::PathBuf;
use tempfile::TempDir;
use txf_cli::commands::mint::{self, MintRequest};
use txf_cli::{CliConfig, Wallet};
use txf_core::{Token, TrustBase};
use txf_network::LocalAggregator;

pub const GIFT_DATA: &[u8] = br#"{"name":"gift"}"#;
pub const TOKEN_TYPE: &str = "gift-card";

pub struct Fixture {
    pub dir: TempDir,
    /// Certifies only when asked.
    pub aggregator: LocalAggregator,
    /// Same aggregator, certifying after every submission.
    pub auto: LocalAggregator,
    pub config: CliConfig,
    pub trust_base: TrustBase,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = LocalAggregator::new(3, 4).unwrap();
        let auto = aggregator.clone().with_auto_certify(true);

        let trust_base_path = dir.path().join("trust-base.json");
        std::fs::write(
            &trust_base_path,
            serde_json::to_string_pretty(aggregator.trust_base()).unwrap(),
        )
        .unwrap();

        let config = CliConfig {
            trust_base_path: Some(trust_base_path),
            poll_timeout_secs: 1,
            poll_interval_ms: 20,
            backoff_ms: 1,
            max_attempts: 3,
            ..CliConfig::default()
        };
        let trust_base = config.load_trust_base().unwrap();

        Self {
            dir,
            aggregator,
            auto,
            config,
            trust_base,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Mints a gift token to `owner` and writes it to `file`.
    pub async fn mint_gift(&self, owner: &Wallet, token_id: &str, file: &str) -> Token {
        let request = MintRequest {
            token_id: Some(token_id.to_string()),
            token_type: TOKEN_TYPE.to_string(),
            token_data: b"gift card".to_vec(),
            data: Some(GIFT_DATA.to_vec()),
            nonce: None,
        };
        mint::run(
            &self.config,
            &self.auto,
            &self.trust_base,
            owner,
            request,
            self.path(file),
        )
        .await
        .unwrap()
    }
}

pub fn wallet(secret: &str) -> Wallet {
    Wallet::from_secret(secret).unwrap()
}

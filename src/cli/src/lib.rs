//! Command line client for offchain token transfers.

pub mod commands;
pub mod config;
pub mod errors;
pub mod txf;
pub mod wallet;

// Re-export commonly used types and functions
pub use commands::{gen_address, mint, receive, send, verify};
pub use config::CliConfig;
pub use errors::CliError;
pub use wallet::Wallet;

//! Aggregator boundary for offchain token transfers.
//!
//! This crate provides the async client interface to an aggregator, a JSON-RPC
//! implementation of it, an in-process aggregator for local use and tests, and
//! bounded submission and polling on top of them.

pub mod client;
pub mod errors;
pub mod local;
pub mod rpc;
pub mod submit;
pub mod types;

// Re-export commonly used types and functions
pub use client::AggregatorClient;
pub use errors::NetworkError;
pub use local::LocalAggregator;
pub use rpc::JsonRpcAggregatorClient;
pub use submit::{submit_with_retry, wait_for_inclusion, PollPolicy, RetryPolicy, Submission};
pub use types::{SubmitCommitmentRequest, SubmitStatus};

//! Integration tests for offchain token transfers.

pub mod common;
pub mod network_tests;
pub mod proof_tests;
pub mod transfer_tests;

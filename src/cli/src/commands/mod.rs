//! Commands for the command line client.

pub mod gen_address;
pub mod mint;
pub mod receive;
pub mod send;
pub mod verify;

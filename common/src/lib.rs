//! Shared building blocks for the doorlink crates.
//!
//! Holds the configuration model, the error type, and the small amount of
//! network plumbing (subnets, LAN interface detection) the other crates need.

pub mod config;
pub mod error;
pub mod network;

pub use error::{Error, Result};

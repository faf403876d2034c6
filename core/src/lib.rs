//! Device discovery and remote command execution for the doorbell.
//!
//! The [`resolver::HostResolver`] finds which host on the LAN answers to a
//! role's credentials, the [`session::SessionManager`] keeps one shell
//! session per role, and the [`controller::DoorbellController`] ties them
//! to door actions and app lifecycle events.

pub mod actions;
pub mod cache;
pub mod controller;
pub mod executor;
pub mod network;
pub mod prober;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod validator;

pub use doorlink_common::{Error, Result};

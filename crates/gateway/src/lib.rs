//! Vmfish Redfish gateway
//!
//! Presents a single vSphere VM as a Redfish BMC: power, virtual CD media
//! and boot override, with credentials passed through to vSphere on every
//! request.

pub mod auth;
pub mod boot;
pub mod error;
pub mod media;
pub mod power;
pub mod questions;
pub mod redfish;
pub mod server;

#[cfg(test)]
mod test_helpers;

pub use error::ApiError;
pub use questions::{DismissOutcome, PromptDismisser};
pub use server::GatewayServer;

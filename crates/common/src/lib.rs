//! Vmfish Common Library
//!
//! Shared types, the platform capability interface, and the vSphere clients
//! used by the Vmfish gateway.

pub mod error;
pub mod platform;
pub mod types;
pub mod vsphere;

// Re-export commonly used types
pub use error::{Error, Result};
pub use platform::{ManagementSession, SessionFactory, Surface};
pub use types::*;
pub use vsphere::VsphereConnector;

/// Vmfish version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

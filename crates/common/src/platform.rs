//! Platform capability interface
//!
//! Controllers talk to the virtualization platform only through
//! [`ManagementSession`]. Each access surface implements the capabilities it
//! has and leaves the rest at the default, which reports
//! [`Error::Unsupported`].

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::*;

/// Access surface of the management API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Lightweight REST surface: power and virtual media
    Automation,
    /// Session-oriented surface: inventory, questions, reconfiguration tasks
    Vim,
}

impl Surface {
    pub fn name(&self) -> &'static str {
        match self {
            Surface::Automation => "automation",
            Surface::Vim => "vim",
        }
    }
}

/// A logged-in, request-scoped session against the platform.
#[async_trait]
pub trait ManagementSession: Send + Sync {
    fn surface(&self) -> Surface;

    // Power

    async fn power_state(&self, _vm_id: &str) -> Result<PlatformPowerState> {
        Err(Error::unsupported(self.surface().name(), "power_state"))
    }

    async fn power_action(&self, _vm_id: &str, _action: ResetAction) -> Result<()> {
        Err(Error::unsupported(self.surface().name(), "power_action"))
    }

    // Virtual media

    /// CD-ROM device ids in platform order
    async fn list_cdroms(&self, _vm_id: &str) -> Result<Vec<String>> {
        Err(Error::unsupported(self.surface().name(), "list_cdroms"))
    }

    async fn cdrom(&self, _vm_id: &str, _cdrom_id: &str) -> Result<CdromInfo> {
        Err(Error::unsupported(self.surface().name(), "cdrom"))
    }

    async fn update_cdrom(&self, _vm_id: &str, _cdrom_id: &str, _update: &CdromUpdate) -> Result<()> {
        Err(Error::unsupported(self.surface().name(), "update_cdrom"))
    }

    async fn connect_cdrom(&self, _vm_id: &str, _cdrom_id: &str) -> Result<()> {
        Err(Error::unsupported(self.surface().name(), "connect_cdrom"))
    }

    // Identity resolution

    /// Find the VM by managed-object id, `None` if no datacenter holds it
    async fn resolve_vm(&self, _vm_id: &str) -> Result<Option<VmRef>> {
        Err(Error::unsupported(self.surface().name(), "resolve_vm"))
    }

    // Questions

    async fn pending_question(&self, _vm: &VmRef) -> Result<Option<VmQuestion>> {
        Err(Error::unsupported(self.surface().name(), "pending_question"))
    }

    async fn answer_question(&self, _vm: &VmRef, _question_id: &str, _choice_key: &str) -> Result<()> {
        Err(Error::unsupported(self.surface().name(), "answer_question"))
    }

    // Reconfiguration

    /// Hardware devices in platform enumeration order
    async fn devices(&self, _vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        Err(Error::unsupported(self.surface().name(), "devices"))
    }

    async fn reconfigure_boot_order(&self, _vm: &VmRef, _order: &[BootableDevice]) -> Result<TaskRef> {
        Err(Error::unsupported(self.surface().name(), "reconfigure_boot_order"))
    }

    async fn task_info(&self, _task: &TaskRef) -> Result<TaskInfo> {
        Err(Error::unsupported(self.surface().name(), "task_info"))
    }

    /// Invalidate the session on the platform
    async fn logout(&self) -> Result<()>;
}

/// Opens fresh sessions. Nothing is cached between calls.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, surface: Surface, credential: &Credential) -> Result<Box<dyn ManagementSession>>;
}

/// Log out and drop the session. Logout failures are only logged.
pub async fn release(session: Box<dyn ManagementSession>) {
    if let Err(e) = session.logout().await {
        warn!("Failed to log out of {} session: {}", session.surface().name(), e);
    }
}

//! Daemon configuration

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vmfish_common::{
    BootTuning, Credential, GatewayInstance, GatewayTuning, QuestionCredentials, QuestionTuning,
    VsphereConnector,
};

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmfishConfig {
    /// Address every gateway binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// vCenter connection
    pub platform: PlatformConfig,

    /// HTTPS termination; plain HTTP when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    #[serde(default)]
    pub question: QuestionConfig,

    #[serde(default)]
    pub boot: BootConfig,

    /// One gateway per entry
    #[serde(default)]
    pub vms: Vec<VmBinding>,
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

/// vCenter connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// vCenter host name, address or base URL
    pub host: String,

    /// Verify the vCenter certificate
    #[serde(default)]
    pub verify_tls: bool,

    /// VI/JSON release segment
    #[serde(default = "default_vim_release")]
    pub vim_release: String,

    /// Service account for the prompt dismissal worker
    #[serde(default)]
    pub service_username: Option<String>,

    #[serde(default)]
    pub service_password: Option<String>,
}

fn default_vim_release() -> String {
    vmfish_common::vsphere::DEFAULT_VIM_RELEASE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Prompt dismissal worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionConfig {
    pub grace_period_ms: u64,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub max_concurrent: usize,
    pub credentials: QuestionCredentials,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        let tuning = QuestionTuning::default();
        Self {
            grace_period_ms: tuning.grace_period.as_millis() as u64,
            poll_interval_ms: tuning.poll_interval.as_millis() as u64,
            max_polls: tuning.max_polls,
            max_concurrent: tuning.max_concurrent,
            credentials: tuning.credentials,
        }
    }
}

/// Boot override task wait
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for BootConfig {
    fn default() -> Self {
        let tuning = BootTuning::default();
        Self {
            poll_interval_ms: tuning.poll_interval.as_millis() as u64,
            timeout_secs: tuning.timeout.as_secs(),
        }
    }
}

/// VM to gateway port binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmBinding {
    /// vSphere managed-object id (e.g. `vm-1001`)
    pub vm_id: String,
    pub port: u16,
}

impl VmfishConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Reject configurations that cannot start
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.platform.host.trim().is_empty() {
            bail!("platform.host must not be empty");
        }
        self.listen_ip()?;
        if self.vms.is_empty() {
            bail!("no [[vms]] configured");
        }
        if self.question.max_polls == 0 {
            bail!("question.max_polls must be at least 1");
        }
        if self.question.max_concurrent == 0 {
            bail!("question.max_concurrent must be at least 1");
        }
        if self.boot.timeout_secs == 0 {
            bail!("boot.timeout_secs must be at least 1");
        }

        let mut ports = HashSet::new();
        let mut vm_ids = HashSet::new();
        for vm in &self.vms {
            if vm.vm_id.trim().is_empty() {
                bail!("vm_id must not be empty");
            }
            if vm.port == 0 {
                bail!("VM {} has port 0", vm.vm_id);
            }
            if !ports.insert(vm.port) {
                bail!("port {} is assigned to more than one VM", vm.port);
            }
            if !vm_ids.insert(vm.vm_id.as_str()) {
                bail!("VM {} is listed more than once", vm.vm_id);
            }
        }
        Ok(())
    }

    fn listen_ip(&self) -> anyhow::Result<IpAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen_addr {}", self.listen_addr))
    }

    /// Socket address for one gateway
    pub fn gateway_addr(&self, port: u16) -> anyhow::Result<SocketAddr> {
        Ok(SocketAddr::new(self.listen_ip()?, port))
    }

    pub fn tuning(&self) -> GatewayTuning {
        GatewayTuning {
            question: QuestionTuning {
                grace_period: Duration::from_millis(self.question.grace_period_ms),
                poll_interval: Duration::from_millis(self.question.poll_interval_ms),
                max_polls: self.question.max_polls,
                max_concurrent: self.question.max_concurrent,
                credentials: self.question.credentials,
            },
            boot: BootTuning {
                poll_interval: Duration::from_millis(self.boot.poll_interval_ms),
                timeout: Duration::from_secs(self.boot.timeout_secs),
            },
        }
    }

    pub fn instances(&self) -> Vec<GatewayInstance> {
        let tuning = self.tuning();
        self.vms
            .iter()
            .map(|vm| {
                GatewayInstance::new(vm.vm_id.clone(), self.platform.host.clone(), vm.port)
                    .with_tuning(tuning.clone())
            })
            .collect()
    }

    /// Worker credential, if both halves are configured
    pub fn service_credential(&self) -> Option<Credential> {
        match (&self.platform.service_username, &self.platform.service_password) {
            (Some(user), Some(pass)) => Some(Credential::new(user.clone(), pass.clone())),
            _ => None,
        }
    }

    pub fn connector(&self) -> VsphereConnector {
        VsphereConnector::new(&self.platform.host)
            .with_verify_tls(self.platform.verify_tls)
            .with_vim_release(&self.platform.vim_release)
    }
}

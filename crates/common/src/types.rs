//! Core types for Vmfish

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Gateway binding
// ============================================================================

/// One gateway's binding to a VM. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct GatewayInstance {
    /// vSphere managed-object id of the VM (e.g. `vm-1001`)
    pub vm_id: String,
    /// vCenter host name or address
    pub platform_host: String,
    pub port: u16,
    pub tuning: GatewayTuning,
}

impl GatewayInstance {
    pub fn new(vm_id: impl Into<String>, platform_host: impl Into<String>, port: u16) -> Self {
        Self {
            vm_id: vm_id.into(),
            platform_host: platform_host.into(),
            port,
            tuning: GatewayTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: GatewayTuning) -> Self {
        self.tuning = tuning;
        self
    }
}

/// Poll intervals, budgets and bounds for the background and blocking flows
#[derive(Debug, Clone, Default)]
pub struct GatewayTuning {
    pub question: QuestionTuning,
    pub boot: BootTuning,
}

/// Which credentials the question worker logs in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCredentials {
    /// Statically configured service account
    Service,
    /// The credential of the request that triggered the eject
    Caller,
}

impl Default for QuestionCredentials {
    fn default() -> Self {
        Self::Service
    }
}

#[derive(Debug, Clone)]
pub struct QuestionTuning {
    pub grace_period: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub max_concurrent: usize,
    pub credentials: QuestionCredentials,
}

impl Default for QuestionTuning {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            max_polls: 10,
            max_concurrent: 4,
            credentials: QuestionCredentials::Service,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootTuning {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for BootTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Username/password pair. Lives for one request (or one worker run).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Power
// ============================================================================

/// Redfish-side power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "On"),
            PowerState::Off => write!(f, "Off"),
        }
    }
}

/// vSphere-side power state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    Other(String),
}

impl PlatformPowerState {
    pub fn from_api(value: &str) -> Self {
        match value {
            "POWERED_ON" => Self::PoweredOn,
            "POWERED_OFF" => Self::PoweredOff,
            "SUSPENDED" => Self::Suspended,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&PlatformPowerState> for PowerState {
    fn from(state: &PlatformPowerState) -> Self {
        match state {
            PlatformPowerState::PoweredOn => PowerState::On,
            PlatformPowerState::PoweredOff | PlatformPowerState::Suspended => PowerState::Off,
            PlatformPowerState::Other(_) => PowerState::Off,
        }
    }
}

/// Power operation issued for a Redfish reset request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    Start,
    Stop,
    Reset,
}

impl ResetAction {
    /// Map a Redfish `ResetType` to the power operation it triggers
    pub fn from_reset_type(reset_type: &str) -> Option<Self> {
        match reset_type {
            "On" => Some(Self::Start),
            "ForceOff" | "GracefulShutdown" => Some(Self::Stop),
            "ForceRestart" | "GracefulRestart" | "PowerReboot" => Some(Self::Reset),
            _ => None,
        }
    }

    /// Value of the `action` query parameter on the power endpoint
    pub fn as_api_action(&self) -> &'static str {
        match self {
            ResetAction::Start => "start",
            ResetAction::Stop => "stop",
            ResetAction::Reset => "reset",
        }
    }
}

/// Reset types advertised in `ResetType@Redfish.AllowableValues`
pub const ALLOWABLE_RESET_TYPES: &[&str] = &[
    "On",
    "ForceOff",
    "GracefulShutdown",
    "ForceRestart",
    "GracefulRestart",
];

// ============================================================================
// Virtual media
// ============================================================================

/// What a CD-ROM device is backed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdromBacking {
    IsoFile(String),
    ClientDevice,
    HostDevice,
    Other(String),
}

/// Current configuration of one CD-ROM device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdromInfo {
    pub backing: CdromBacking,
    pub connected: bool,
}

/// Reconfiguration of a CD-ROM device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdromUpdate {
    pub backing: CdromBacking,
    pub start_connected: Option<bool>,
    pub allow_guest_control: Option<bool>,
}

impl CdromUpdate {
    /// File-backed, connected at power on, guest may not eject it
    pub fn iso(path: impl Into<String>) -> Self {
        Self {
            backing: CdromBacking::IsoFile(path.into()),
            start_connected: Some(true),
            allow_guest_control: Some(false),
        }
    }

    /// Empty client-device backing
    pub fn client_device() -> Self {
        Self {
            backing: CdromBacking::ClientDevice,
            start_connected: None,
            allow_guest_control: None,
        }
    }
}

/// Redfish view of the virtual CD drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualMediaState {
    image: Option<String>,
    inserted: bool,
}

impl VirtualMediaState {
    /// Never reports `inserted` without an image
    pub fn new(image: Option<String>, connected: bool) -> Self {
        let inserted = connected && image.is_some();
        Self { image, inserted }
    }

    pub fn ejected() -> Self {
        Self {
            image: None,
            inserted: false,
        }
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn inserted(&self) -> bool {
        self.inserted
    }
}

impl From<&CdromInfo> for VirtualMediaState {
    fn from(info: &CdromInfo) -> Self {
        let image = match &info.backing {
            CdromBacking::IsoFile(path) => Some(path.clone()),
            _ => None,
        };
        Self::new(image, info.connected)
    }
}

// ============================================================================
// Boot override
// ============================================================================

/// Device class a boot override points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootTarget {
    Optical,
    Disk,
}

impl BootTarget {
    /// Parse a `BootSourceOverrideTarget` value (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cd" | "cdrom" => Some(Self::Optical),
            "hdd" => Some(Self::Disk),
            _ => None,
        }
    }
}

impl std::fmt::Display for BootTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootTarget::Optical => write!(f, "Cd"),
            BootTarget::Disk => write!(f, "Hdd"),
        }
    }
}

/// Supported `BootSourceOverrideEnabled` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOverrideEnabled {
    Continuous,
}

impl BootOverrideEnabled {
    pub fn parse(value: &str) -> Option<Self> {
        value
            .eq_ignore_ascii_case("continuous")
            .then_some(Self::Continuous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOverrideRequest {
    pub target: BootTarget,
    pub enabled: BootOverrideEnabled,
}

/// Entry in a VM's boot order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootableDevice {
    Cdrom,
    Disk { device_key: i32 },
}

// ============================================================================
// Inventory, questions, tasks
// ============================================================================

/// Managed-object reference of a resolved VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Disk,
    Cdrom,
    Other,
}

/// One entry of `config.hardware.device`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDevice {
    pub key: i32,
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionChoice {
    pub label: String,
    pub key: String,
}

/// A pending question blocking a guest operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmQuestion {
    pub id: String,
    pub text: String,
    pub choices: Vec<QuestionChoice>,
}

/// Handle to an asynchronous vSphere task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Success,
    Error,
}

impl TaskState {
    pub fn from_api(value: &str) -> Self {
        match value {
            "success" => Self::Success,
            "error" => Self::Error,
            // queued and running both mean "not finished yet"
            _ => Self::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub state: TaskState,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_mapping() {
        assert_eq!(PowerState::from(&PlatformPowerState::PoweredOn), PowerState::On);
        assert_eq!(PowerState::from(&PlatformPowerState::PoweredOff), PowerState::Off);
        assert_eq!(PowerState::from(&PlatformPowerState::Suspended), PowerState::Off);
        assert_eq!(
            PowerState::from(&PlatformPowerState::from_api("SOMETHING_NEW")),
            PowerState::Off
        );
    }

    #[test]
    fn test_reset_type_table() {
        let table = [
            ("On", ResetAction::Start),
            ("ForceOff", ResetAction::Stop),
            ("GracefulShutdown", ResetAction::Stop),
            ("ForceRestart", ResetAction::Reset),
            ("GracefulRestart", ResetAction::Reset),
            ("PowerReboot", ResetAction::Reset),
        ];
        for (reset_type, action) in table {
            assert_eq!(ResetAction::from_reset_type(reset_type), Some(action));
        }
        assert_eq!(ResetAction::from_reset_type("Nmi"), None);
        assert_eq!(ResetAction::from_reset_type("on"), None);
    }

    #[test]
    fn test_media_state_invariant() {
        let state = VirtualMediaState::new(None, true);
        assert!(!state.inserted());

        let info = CdromInfo {
            backing: CdromBacking::IsoFile("[ds1] iso/x.iso".to_string()),
            connected: true,
        };
        let state = VirtualMediaState::from(&info);
        assert_eq!(state.image(), Some("[ds1] iso/x.iso"));
        assert!(state.inserted());
    }

    #[test]
    fn test_boot_target_parse() {
        assert_eq!(BootTarget::parse("Cd"), Some(BootTarget::Optical));
        assert_eq!(BootTarget::parse("CDROM"), Some(BootTarget::Optical));
        assert_eq!(BootTarget::parse("hdd"), Some(BootTarget::Disk));
        assert_eq!(BootTarget::parse("Usb"), None);
        assert_eq!(BootOverrideEnabled::parse("continuous"), Some(BootOverrideEnabled::Continuous));
        assert_eq!(BootOverrideEnabled::parse("Once"), None);
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let cred = Credential::new("root", "s3cret");
        let dbg = format!("{:?}", cred);
        assert!(dbg.contains("root"));
        assert!(!dbg.contains("s3cret"));
    }
}

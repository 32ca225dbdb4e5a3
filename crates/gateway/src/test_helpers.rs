//! In-memory platform for controller and router tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use vmfish_common::{
    BootableDevice, CdromBacking, CdromInfo, CdromUpdate, Credential, DeviceKind, Error,
    ManagementSession, PlatformPowerState, ResetAction, Result, SessionFactory, Surface, TaskInfo,
    TaskRef, TaskState, VirtualDevice, VmQuestion, VmRef,
};

const CDROM_ID: &str = "16000";

struct FakeState {
    reject_logins: bool,
    opens: usize,
    opened_with: Vec<Credential>,
    logouts: usize,

    power: PlatformPowerState,
    power_actions: Vec<ResetAction>,

    cdroms: Vec<String>,
    cdrom: CdromInfo,
    cdrom_updates: Vec<CdromUpdate>,
    fail_connect: bool,

    vm_known: bool,
    devices: Vec<VirtualDevice>,

    question: Option<VmQuestion>,
    question_after: u32,
    question_polls: u32,
    answers: Vec<(String, String)>,

    task_script: Vec<TaskState>,
    task_polls: usize,
    task_error: Option<String>,
    boot_orders: Vec<Vec<BootableDevice>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            reject_logins: false,
            opens: 0,
            opened_with: Vec::new(),
            logouts: 0,
            power: PlatformPowerState::PoweredOff,
            power_actions: Vec::new(),
            cdroms: vec![CDROM_ID.to_string()],
            cdrom: CdromInfo {
                backing: CdromBacking::ClientDevice,
                connected: false,
            },
            cdrom_updates: Vec::new(),
            fail_connect: false,
            vm_known: true,
            devices: vec![
                VirtualDevice { key: 2000, kind: DeviceKind::Disk },
                VirtualDevice { key: 3002, kind: DeviceKind::Cdrom },
            ],
            question: None,
            question_after: 0,
            question_polls: 0,
            answers: Vec::new(),
            task_script: vec![TaskState::Success],
            task_polls: 0,
            task_error: None,
            boot_orders: Vec::new(),
        }
    }
}

/// Records every call and answers from scripted state
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn SessionFactory> {
        Arc::new(self.clone())
    }

    // Scripting

    pub fn reject_logins(&self) {
        self.state.lock().reject_logins = true;
    }

    pub fn set_power(&self, power: PlatformPowerState) {
        self.state.lock().power = power;
    }

    pub fn set_cdrom(&self, backing: CdromBacking, connected: bool) {
        self.state.lock().cdrom = CdromInfo { backing, connected };
    }

    pub fn remove_cdroms(&self) {
        self.state.lock().cdroms.clear();
    }

    pub fn fail_connect(&self) {
        self.state.lock().fail_connect = true;
    }

    pub fn clear_inventory(&self) {
        self.state.lock().vm_known = false;
    }

    pub fn set_devices(&self, devices: Vec<VirtualDevice>) {
        self.state.lock().devices = devices;
    }

    pub fn set_question(&self, question: VmQuestion) {
        self.set_question_after(question, 0);
    }

    /// Question becomes visible after `polls` empty polls
    pub fn set_question_after(&self, question: VmQuestion, polls: u32) {
        let mut state = self.state.lock();
        state.question = Some(question);
        state.question_after = polls;
    }

    /// Task states returned in order; the last one repeats
    pub fn script_task(&self, states: &[TaskState]) {
        self.state.lock().task_script = states.to_vec();
    }

    pub fn set_task_error(&self, message: &str) {
        self.state.lock().task_error = Some(message.to_string());
    }

    // Inspection

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn opened_with(&self) -> Vec<Credential> {
        self.state.lock().opened_with.clone()
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().logouts
    }

    pub fn power_actions(&self) -> Vec<ResetAction> {
        self.state.lock().power_actions.clone()
    }

    pub fn cdrom_updates(&self) -> Vec<CdromUpdate> {
        self.state.lock().cdrom_updates.clone()
    }

    pub fn question_polls(&self) -> u32 {
        self.state.lock().question_polls
    }

    pub fn answers(&self) -> Vec<(String, String)> {
        self.state.lock().answers.clone()
    }

    pub fn boot_orders(&self) -> Vec<Vec<BootableDevice>> {
        self.state.lock().boot_orders.clone()
    }
}

#[async_trait]
impl SessionFactory for FakePlatform {
    async fn open(&self, surface: Surface, credential: &Credential) -> Result<Box<dyn ManagementSession>> {
        let mut state = self.state.lock();
        state.opens += 1;
        state.opened_with.push(credential.clone());
        if state.reject_logins {
            return Err(Error::Authentication("Cannot complete login".to_string()));
        }
        Ok(Box::new(FakeSession {
            surface,
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    surface: Surface,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    /// Mirror the real adapters: each capability lives on one surface
    fn require(&self, surface: Surface, operation: &'static str) -> Result<()> {
        if self.surface == surface {
            Ok(())
        } else {
            Err(Error::Unsupported {
                surface: self.surface.name(),
                operation,
            })
        }
    }
}

#[async_trait]
impl ManagementSession for FakeSession {
    fn surface(&self) -> Surface {
        self.surface
    }

    async fn power_state(&self, _vm_id: &str) -> Result<PlatformPowerState> {
        self.require(Surface::Automation, "power_state")?;
        Ok(self.state.lock().power.clone())
    }

    async fn power_action(&self, _vm_id: &str, action: ResetAction) -> Result<()> {
        self.require(Surface::Automation, "power_action")?;
        self.state.lock().power_actions.push(action);
        Ok(())
    }

    async fn list_cdroms(&self, _vm_id: &str) -> Result<Vec<String>> {
        self.require(Surface::Automation, "list_cdroms")?;
        Ok(self.state.lock().cdroms.clone())
    }

    async fn cdrom(&self, _vm_id: &str, cdrom_id: &str) -> Result<CdromInfo> {
        self.require(Surface::Automation, "cdrom")?;
        let state = self.state.lock();
        if !state.cdroms.iter().any(|id| id == cdrom_id) {
            return Err(Error::Platform {
                status: 404,
                message: format!("CD-ROM {} not found", cdrom_id),
            });
        }
        Ok(state.cdrom.clone())
    }

    async fn update_cdrom(&self, _vm_id: &str, _cdrom_id: &str, update: &CdromUpdate) -> Result<()> {
        self.require(Surface::Automation, "update_cdrom")?;
        let mut state = self.state.lock();
        state.cdrom.backing = update.backing.clone();
        state.cdrom_updates.push(update.clone());
        Ok(())
    }

    async fn connect_cdrom(&self, _vm_id: &str, _cdrom_id: &str) -> Result<()> {
        self.require(Surface::Automation, "connect_cdrom")?;
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(Error::Platform {
                status: 400,
                message: "The operation is not allowed in the current state.".to_string(),
            });
        }
        state.cdrom.connected = true;
        Ok(())
    }

    async fn resolve_vm(&self, vm_id: &str) -> Result<Option<VmRef>> {
        self.require(Surface::Vim, "resolve_vm")?;
        let known = self.state.lock().vm_known;
        Ok(known.then(|| VmRef(vm_id.to_string())))
    }

    async fn pending_question(&self, _vm: &VmRef) -> Result<Option<VmQuestion>> {
        self.require(Surface::Vim, "pending_question")?;
        let mut state = self.state.lock();
        state.question_polls += 1;
        if state.question_polls <= state.question_after {
            return Ok(None);
        }
        Ok(state.question.clone())
    }

    async fn answer_question(&self, _vm: &VmRef, question_id: &str, choice_key: &str) -> Result<()> {
        self.require(Surface::Vim, "answer_question")?;
        let mut state = self.state.lock();
        state.answers.push((question_id.to_string(), choice_key.to_string()));
        state.question = None;
        Ok(())
    }

    async fn devices(&self, _vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        self.require(Surface::Vim, "devices")?;
        Ok(self.state.lock().devices.clone())
    }

    async fn reconfigure_boot_order(&self, _vm: &VmRef, order: &[BootableDevice]) -> Result<TaskRef> {
        self.require(Surface::Vim, "reconfigure_boot_order")?;
        self.state.lock().boot_orders.push(order.to_vec());
        Ok(TaskRef("task-42".to_string()))
    }

    async fn task_info(&self, _task: &TaskRef) -> Result<TaskInfo> {
        self.require(Surface::Vim, "task_info")?;
        let mut state = self.state.lock();
        let index = state.task_polls.min(state.task_script.len().saturating_sub(1));
        state.task_polls += 1;
        let task_state = state.task_script.get(index).copied().unwrap_or(TaskState::Success);
        let error_message = match task_state {
            TaskState::Error => state.task_error.clone(),
            _ => None,
        };
        Ok(TaskInfo {
            state: task_state,
            error_message,
        })
    }

    async fn logout(&self) -> Result<()> {
        self.state.lock().logouts += 1;
        Ok(())
    }
}

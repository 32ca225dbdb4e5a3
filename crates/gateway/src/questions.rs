//! Prompt dismissal worker
//!
//! Ejecting media from a running VM usually leaves a "the guest has locked
//! the CD-ROM door" question on the console, and the VM stays blocked until
//! someone answers it. After an eject the gateway starts a detached worker
//! that polls for that question and acknowledges it.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use vmfish_common::platform::release;
use vmfish_common::{
    Credential, ManagementSession, QuestionCredentials, QuestionTuning, SessionFactory, Surface,
    VmQuestion,
};

/// Choice labels that acknowledge a question
pub const AFFIRMATIVE_LABELS: &[&str] = &["button.yes", "button.sí", "button.si"];

/// First choice whose label is affirmative
pub fn affirmative_choice(question: &VmQuestion) -> Option<&vmfish_common::QuestionChoice> {
    question
        .choices
        .iter()
        .find(|c| AFFIRMATIVE_LABELS.contains(&c.label.to_lowercase().as_str()))
}

/// How a worker run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissOutcome {
    Answered { question_id: String, choice: String },
    /// Poll budget exhausted without an answerable question
    Unanswered,
    VmNotFound,
    Failed(String),
}

/// Launches prompt dismissal workers for one gateway
#[derive(Clone)]
pub struct PromptDismisser {
    platform: Arc<dyn SessionFactory>,
    vm_id: String,
    tuning: QuestionTuning,
    service_credential: Option<Credential>,
    permits: Arc<Semaphore>,
}

impl PromptDismisser {
    pub fn new(
        platform: Arc<dyn SessionFactory>,
        vm_id: impl Into<String>,
        tuning: QuestionTuning,
        service_credential: Option<Credential>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(tuning.max_concurrent));
        Self {
            platform,
            vm_id: vm_id.into(),
            tuning,
            service_credential,
            permits,
        }
    }

    /// Start a worker in the background.
    ///
    /// Returns `None` when the pool is full. The handle is only useful to
    /// tests; callers in the request path drop it.
    pub fn launch(&self, caller: &Credential) -> Option<JoinHandle<DismissOutcome>> {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Prompt dismissal pool full for VM {}, skipping worker",
                    self.vm_id
                );
                return None;
            }
        };

        let credential = self.worker_credential(caller);
        let platform = self.platform.clone();
        let vm_id = self.vm_id.clone();
        let tuning = self.tuning.clone();

        Some(tokio::spawn(async move {
            let _permit = permit;
            let outcome = run(platform, &vm_id, &tuning, &credential).await;
            match &outcome {
                DismissOutcome::Answered { question_id, choice } => {
                    info!("Answered question {} on VM {} with {}", question_id, vm_id, choice)
                }
                DismissOutcome::Unanswered => {
                    debug!("No answerable question appeared on VM {}", vm_id)
                }
                DismissOutcome::VmNotFound => {
                    warn!("Prompt dismissal: VM {} not found in inventory", vm_id)
                }
                DismissOutcome::Failed(e) => warn!("Prompt dismissal for VM {} failed: {}", vm_id, e),
            }
            outcome
        }))
    }

    fn worker_credential(&self, caller: &Credential) -> Credential {
        match (self.tuning.credentials, &self.service_credential) {
            (QuestionCredentials::Service, Some(service)) => service.clone(),
            (QuestionCredentials::Service, None) => {
                debug!("No service credential configured, worker uses caller credential");
                caller.clone()
            }
            (QuestionCredentials::Caller, _) => caller.clone(),
        }
    }
}

async fn run(
    platform: Arc<dyn SessionFactory>,
    vm_id: &str,
    tuning: &QuestionTuning,
    credential: &Credential,
) -> DismissOutcome {
    sleep(tuning.grace_period).await;

    let session = match platform.open(Surface::Vim, credential).await {
        Ok(session) => session,
        Err(e) => return DismissOutcome::Failed(e.to_string()),
    };
    let outcome = poll(session.as_ref(), vm_id, tuning).await;
    release(session).await;
    outcome
}

async fn poll(session: &dyn ManagementSession, vm_id: &str, tuning: &QuestionTuning) -> DismissOutcome {
    let vm = match session.resolve_vm(vm_id).await {
        Ok(Some(vm)) => vm,
        Ok(None) => return DismissOutcome::VmNotFound,
        Err(e) => return DismissOutcome::Failed(e.to_string()),
    };

    for attempt in 1..=tuning.max_polls {
        let question = match session.pending_question(&vm).await {
            Ok(question) => question,
            Err(e) => return DismissOutcome::Failed(e.to_string()),
        };

        if let Some(question) = question {
            match affirmative_choice(&question) {
                Some(choice) => {
                    return match session.answer_question(&vm, &question.id, &choice.key).await {
                        Ok(()) => DismissOutcome::Answered {
                            question_id: question.id.clone(),
                            choice: choice.label.clone(),
                        },
                        Err(e) => DismissOutcome::Failed(e.to_string()),
                    };
                }
                None => debug!(
                    "Question {} on VM {} has no affirmative choice",
                    question.id, vm_id
                ),
            }
        }

        debug!("No question on VM {} (poll {}/{})", vm_id, attempt, tuning.max_polls);
        sleep(tuning.poll_interval).await;
    }

    DismissOutcome::Unanswered
}

//! VI/JSON session (vim25 over JSON)
//!
//! Property reads are `GET {base}/{Type}/{moId}/{property}` and method calls
//! are `POST {base}/{Type}/{moId}/{Method}`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use tracing::{debug, trace};

use super::{check, SESSION_HEADER};
use crate::error::{Error, Result};
use crate::platform::{ManagementSession, Surface};
use crate::types::*;

/// Session against `/sdk/vim25/{release}`
pub struct VimSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
    session_manager: MoRef,
    root_folder: MoRef,
}

/// `ManagedObjectReference`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MoRef {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceContent {
    root_folder: MoRef,
    session_manager: MoRef,
}

#[derive(Debug, Deserialize)]
struct VmRuntime {
    #[serde(default)]
    question: Option<QuestionInfo>,
}

#[derive(Debug, Deserialize)]
struct QuestionInfo {
    id: String,
    #[serde(default)]
    text: String,
    choice: ChoiceOption,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceOption {
    #[serde(default)]
    choice_info: Vec<ElementDescription>,
}

#[derive(Debug, Deserialize)]
struct ElementDescription {
    key: String,
    label: String,
}

#[derive(Debug, Deserialize)]
struct VmConfigInfo {
    hardware: VirtualHardware,
}

#[derive(Debug, Deserialize)]
struct VirtualHardware {
    #[serde(default)]
    device: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VimTaskInfo {
    state: String,
    #[serde(default)]
    error: Option<LocalizedFault>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalizedFault {
    #[serde(default)]
    localized_message: Option<String>,
}

impl VimSession {
    /// Fetch the service content and log in
    pub async fn login(http: reqwest::Client, base_url: &str, credential: &Credential) -> Result<Self> {
        let response = http
            .get(format!("{}/ServiceInstance/ServiceInstance/content", base_url))
            .send()
            .await?;
        let content: ServiceContent = check(response).await?.json().await?;

        let response = http
            .post(format!(
                "{}/SessionManager/{}/Login",
                base_url, content.session_manager.value
            ))
            .json(&json!({
                "userName": credential.username,
                "password": credential.password,
            }))
            .send()
            .await?;
        let response = check(response).await?;
        let token = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Authentication("login response carried no session id".to_string()))?;
        debug!("VI/JSON session established with {}", base_url);

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token,
            session_manager: content.session_manager,
            root_folder: content.root_folder,
        })
    }

    async fn property<T: DeserializeOwned>(&self, object: &MoRef, property: &str) -> Result<T> {
        let url = format!("{}/{}/{}/{}", self.base_url, object.kind, object.value, property);
        trace!("GET {}", url);
        let response = self.http.get(url).header(SESSION_HEADER, &self.token).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn invoke(&self, object: &MoRef, method: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/{}/{}/{}", self.base_url, object.kind, object.value, method);
        trace!("POST {}", url);
        let response = self
            .http
            .post(url)
            .header(SESSION_HEADER, &self.token)
            .json(&body)
            .send()
            .await?;
        check(response).await
    }

    fn vm_object(vm: &VmRef) -> MoRef {
        MoRef {
            kind: "VirtualMachine".to_string(),
            value: vm.0.clone(),
        }
    }
}

fn bootable_device_json(device: &BootableDevice) -> serde_json::Value {
    match device {
        BootableDevice::Cdrom => json!({
            "_typeName": "VirtualMachineBootOptionsBootableCdromDevice"
        }),
        BootableDevice::Disk { device_key } => json!({
            "_typeName": "VirtualMachineBootOptionsBootableDiskDevice",
            "deviceKey": device_key
        }),
    }
}

fn device_from_json(value: &serde_json::Value) -> Option<VirtualDevice> {
    let key = value.get("key")?.as_i64()? as i32;
    let kind = match value.get("_typeName").and_then(|t| t.as_str()) {
        Some("VirtualDisk") => DeviceKind::Disk,
        Some("VirtualCdrom") => DeviceKind::Cdrom,
        _ => DeviceKind::Other,
    };
    Some(VirtualDevice { key, kind })
}

#[async_trait]
impl ManagementSession for VimSession {
    fn surface(&self) -> Surface {
        Surface::Vim
    }

    async fn resolve_vm(&self, vm_id: &str) -> Result<Option<VmRef>> {
        // Walk root folder -> datacenters -> vm folders (and nested folders)
        let mut pending = VecDeque::from([self.root_folder.clone()]);
        while let Some(folder) = pending.pop_front() {
            let children: Vec<MoRef> = self.property(&folder, "childEntity").await?;
            for child in children {
                match child.kind.as_str() {
                    "VirtualMachine" if child.value == vm_id => {
                        return Ok(Some(VmRef(child.value)));
                    }
                    "Datacenter" => {
                        let vm_folder: MoRef = self.property(&child, "vmFolder").await?;
                        pending.push_back(vm_folder);
                    }
                    "Folder" => pending.push_back(child),
                    _ => {}
                }
            }
        }
        Ok(None)
    }

    async fn pending_question(&self, vm: &VmRef) -> Result<Option<VmQuestion>> {
        let runtime: VmRuntime = self.property(&Self::vm_object(vm), "runtime").await?;
        Ok(runtime.question.map(|q| VmQuestion {
            id: q.id,
            text: q.text,
            choices: q
                .choice
                .choice_info
                .into_iter()
                .map(|c| QuestionChoice {
                    label: c.label,
                    key: c.key,
                })
                .collect(),
        }))
    }

    async fn answer_question(&self, vm: &VmRef, question_id: &str, choice_key: &str) -> Result<()> {
        self.invoke(
            &Self::vm_object(vm),
            "AnswerVM",
            json!({
                "questionId": question_id,
                "answerChoice": choice_key,
            }),
        )
        .await?;
        Ok(())
    }

    async fn devices(&self, vm: &VmRef) -> Result<Vec<VirtualDevice>> {
        let config: VmConfigInfo = self.property(&Self::vm_object(vm), "config").await?;
        Ok(config.hardware.device.iter().filter_map(device_from_json).collect())
    }

    async fn reconfigure_boot_order(&self, vm: &VmRef, order: &[BootableDevice]) -> Result<TaskRef> {
        let boot_order: Vec<serde_json::Value> = order.iter().map(bootable_device_json).collect();
        let spec = json!({
            "spec": {
                "_typeName": "VirtualMachineConfigSpec",
                "bootOptions": {
                    "_typeName": "VirtualMachineBootOptions",
                    "bootOrder": boot_order,
                    "enterBIOSSetup": false
                }
            }
        });
        let task: MoRef = self
            .invoke(&Self::vm_object(vm), "ReconfigVM_Task", spec)
            .await?
            .json()
            .await?;
        Ok(TaskRef(task.value))
    }

    async fn task_info(&self, task: &TaskRef) -> Result<TaskInfo> {
        let object = MoRef {
            kind: "Task".to_string(),
            value: task.0.clone(),
        };
        let info: VimTaskInfo = self.property(&object, "info").await?;
        Ok(TaskInfo {
            state: TaskState::from_api(&info.state),
            error_message: info.error.and_then(|e| e.localized_message),
        })
    }

    async fn logout(&self) -> Result<()> {
        self.invoke(&self.session_manager, "Logout", json!({})).await?;
        Ok(())
    }
}

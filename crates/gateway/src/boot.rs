//! Boot override controller
//!
//! A boot override rewrites the VM's boot order through a reconfiguration
//! task and blocks the request until that task finishes.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info};
use vmfish_common::platform::release;
use vmfish_common::{
    BootOverrideEnabled, BootOverrideRequest, BootTarget, BootTuning, BootableDevice, Credential,
    DeviceKind, GatewayInstance, ManagementSession, SessionFactory, Surface, TaskRef, TaskState,
};

use crate::error::ApiError;
use crate::redfish::SystemPatch;

/// Check a `PATCH /Systems/1` body before any credential or platform work
pub fn validate(patch: &SystemPatch) -> Result<BootOverrideRequest, ApiError> {
    let boot = patch.boot.as_ref();

    let target = boot
        .and_then(|b| b.target.as_deref())
        .and_then(BootTarget::parse)
        .ok_or_else(|| ApiError::Validation("Unsupported or missing BootSourceOverrideTarget".to_string()))?;

    let enabled = boot
        .and_then(|b| b.enabled.as_deref())
        .and_then(BootOverrideEnabled::parse)
        .ok_or_else(|| {
            ApiError::Validation("Only BootSourceOverrideEnabled=Continuous is supported".to_string())
        })?;

    Ok(BootOverrideRequest { target, enabled })
}

/// Apply a validated override and wait for the reconfiguration task
pub async fn apply(
    platform: &dyn SessionFactory,
    instance: &GatewayInstance,
    credential: &Credential,
    request: BootOverrideRequest,
) -> Result<(), ApiError> {
    let session = platform.open(Surface::Vim, credential).await?;
    let result = reconfigure(session.as_ref(), instance, request.target).await;
    release(session).await;
    result?;

    info!("Boot order of VM {} set to {}", instance.vm_id, request.target);
    Ok(())
}

async fn reconfigure(
    session: &dyn ManagementSession,
    instance: &GatewayInstance,
    target: BootTarget,
) -> Result<(), ApiError> {
    let vm = session
        .resolve_vm(&instance.vm_id)
        .await?
        .ok_or_else(|| ApiError::General("VM not found".to_string()))?;

    let device = match target {
        BootTarget::Optical => BootableDevice::Cdrom,
        BootTarget::Disk => session
            .devices(&vm)
            .await?
            .into_iter()
            .find(|d| d.kind == DeviceKind::Disk)
            .map(|d| BootableDevice::Disk { device_key: d.key })
            .ok_or_else(|| ApiError::General(format!("No {} device found for boot", target)))?,
    };

    let task = session.reconfigure_boot_order(&vm, &[device]).await?;
    debug!("Waiting for boot reconfiguration task {}", task.0);

    let budget = instance.tuning.boot.timeout;
    match timeout(budget, wait_for_task(session, &task, &instance.tuning.boot)).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::General(format!(
            "Boot reconfiguration task did not finish within {}s",
            budget.as_secs()
        ))),
    }
}

async fn wait_for_task(
    session: &dyn ManagementSession,
    task: &TaskRef,
    tuning: &BootTuning,
) -> Result<(), ApiError> {
    let interval = tuning.poll_interval.max(Duration::from_millis(1));
    loop {
        let info = session.task_info(task).await?;
        match info.state {
            TaskState::Success => return Ok(()),
            TaskState::Error => {
                let message = info.error_message.unwrap_or_else(|| "unknown error".to_string());
                return Err(ApiError::General(format!("Error in task: {}", message)));
            }
            TaskState::Running => sleep(interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::{parse_body, BootPatch};
    use crate::test_helpers::FakePlatform;
    use vmfish_common::{GatewayTuning, VirtualDevice};

    fn instance() -> GatewayInstance {
        GatewayInstance::new("vm-1001", "vcenter.lab", 8443)
    }

    fn cred() -> Credential {
        Credential::new("root", "pw")
    }

    fn patch(target: &str, enabled: &str) -> SystemPatch {
        SystemPatch {
            boot: Some(BootPatch {
                target: Some(target.to_string()),
                enabled: Some(enabled.to_string()),
            }),
        }
    }

    #[test]
    fn test_validate() {
        let req = validate(&patch("cdrom", "continuous")).unwrap();
        assert_eq!(req.target, BootTarget::Optical);

        let req = validate(&patch("Hdd", "Continuous")).unwrap();
        assert_eq!(req.target, BootTarget::Disk);

        match validate(&patch("Usb", "Continuous")) {
            Err(ApiError::Validation(msg)) => {
                assert_eq!(msg, "Unsupported or missing BootSourceOverrideTarget")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match validate(&patch("Cd", "Once")) {
            Err(ApiError::Validation(msg)) => {
                assert_eq!(msg, "Only BootSourceOverrideEnabled=Continuous is supported")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let empty: SystemPatch = parse_body(b"{}");
        assert!(validate(&empty).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_optical_boot_order() {
        let fake = FakePlatform::new();
        fake.script_task(&[TaskState::Running, TaskState::Running, TaskState::Success]);

        let req = validate(&patch("Cd", "Continuous")).unwrap();
        apply(&fake, &instance(), &cred(), req).await.unwrap();

        assert_eq!(fake.boot_orders(), vec![vec![BootableDevice::Cdrom]]);
        assert_eq!(fake.logouts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disk_uses_first_disk_key() {
        let fake = FakePlatform::new();
        fake.set_devices(vec![
            VirtualDevice { key: 3002, kind: DeviceKind::Cdrom },
            VirtualDevice { key: 2000, kind: DeviceKind::Disk },
            VirtualDevice { key: 2001, kind: DeviceKind::Disk },
        ]);

        let req = validate(&patch("Hdd", "Continuous")).unwrap();
        apply(&fake, &instance(), &cred(), req).await.unwrap();

        assert_eq!(
            fake.boot_orders(),
            vec![vec![BootableDevice::Disk { device_key: 2000 }]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disk_without_disks() {
        let fake = FakePlatform::new();
        fake.set_devices(vec![VirtualDevice { key: 3002, kind: DeviceKind::Cdrom }]);

        let req = validate(&patch("Hdd", "Continuous")).unwrap();
        let err = apply(&fake, &instance(), &cred(), req).await.unwrap_err();

        assert_eq!(err.to_string(), "No Hdd device found for boot");
        assert!(fake.boot_orders().is_empty());
        assert_eq!(fake.logouts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vm_not_found() {
        let fake = FakePlatform::new();
        fake.clear_inventory();

        let req = validate(&patch("Cd", "Continuous")).unwrap();
        let err = apply(&fake, &instance(), &cred(), req).await.unwrap_err();
        assert_eq!(err.to_string(), "VM not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_error_carries_message() {
        let fake = FakePlatform::new();
        fake.script_task(&[TaskState::Running, TaskState::Error]);
        fake.set_task_error("Invalid configuration for device '0'.");

        let req = validate(&patch("Cd", "Continuous")).unwrap();
        let err = apply(&fake, &instance(), &cred(), req).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error in task: Invalid configuration for device '0'."
        );
        assert_eq!(fake.logouts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_wait_times_out() {
        let fake = FakePlatform::new();
        fake.script_task(&[TaskState::Running]);

        let mut tuning = GatewayTuning::default();
        tuning.boot.timeout = Duration::from_secs(10);
        let instance = instance().with_tuning(tuning);

        let req = validate(&patch("Cd", "Continuous")).unwrap();
        let err = apply(&fake, &instance, &cred(), req).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Boot reconfiguration task did not finish within 10s"
        );
        assert_eq!(fake.logouts(), 1);
    }
}

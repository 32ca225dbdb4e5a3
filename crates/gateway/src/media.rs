//! Virtual media controller
//!
//! Maps the Redfish `VirtualMedia/CD` resource onto the VM's first CD-ROM
//! device.

use tracing::info;
use vmfish_common::platform::release;
use vmfish_common::{
    CdromUpdate, Credential, Error, GatewayInstance, ManagementSession, SessionFactory, Surface,
    VirtualMediaState,
};

use crate::error::ApiError;
use crate::questions::PromptDismisser;

async fn first_cdrom(session: &dyn ManagementSession, vm_id: &str) -> vmfish_common::Result<String> {
    session
        .list_cdroms(vm_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound("No CD-ROM device found".to_string()))
}

/// Read the current virtual media state
pub async fn get(
    platform: &dyn SessionFactory,
    instance: &GatewayInstance,
    credential: &Credential,
) -> Result<VirtualMediaState, ApiError> {
    let session = platform.open(Surface::Automation, credential).await?;
    let result = async {
        let cdrom = first_cdrom(session.as_ref(), &instance.vm_id).await?;
        session.cdrom(&instance.vm_id, &cdrom).await
    }
    .await;
    release(session).await;

    Ok(VirtualMediaState::from(&result?))
}

/// Back the CD-ROM with an ISO and connect it.
///
/// The backing change is not rolled back if the connect fails.
pub async fn insert(
    platform: &dyn SessionFactory,
    instance: &GatewayInstance,
    credential: &Credential,
    image: Option<&str>,
) -> Result<VirtualMediaState, ApiError> {
    let image = image
        .filter(|i| !i.is_empty())
        .ok_or_else(|| ApiError::PropertyMissing("Missing Image field".to_string()))?;

    let session = platform.open(Surface::Automation, credential).await?;
    let result = async {
        let cdrom = first_cdrom(session.as_ref(), &instance.vm_id).await?;
        session
            .update_cdrom(&instance.vm_id, &cdrom, &CdromUpdate::iso(image))
            .await?;
        session.connect_cdrom(&instance.vm_id, &cdrom).await
    }
    .await;
    release(session).await;
    result?;

    info!("Inserted {} into VM {}", image, instance.vm_id);
    Ok(VirtualMediaState::new(Some(image.to_string()), true))
}

/// Swap the CD-ROM back to an empty client device.
///
/// A prompt dismissal worker is launched before the backing change and is
/// not waited for.
pub async fn eject(
    platform: &dyn SessionFactory,
    instance: &GatewayInstance,
    credential: &Credential,
    dismisser: &PromptDismisser,
) -> Result<VirtualMediaState, ApiError> {
    let session = platform.open(Surface::Automation, credential).await?;
    let result = async {
        let cdrom = first_cdrom(session.as_ref(), &instance.vm_id).await?;
        // Detached; the handle is only kept by tests
        let _ = dismisser.launch(credential);
        session
            .update_cdrom(&instance.vm_id, &cdrom, &CdromUpdate::client_device())
            .await
    }
    .await;
    release(session).await;
    result?;

    info!("Ejected media from VM {}", instance.vm_id);
    Ok(VirtualMediaState::ejected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakePlatform;
    use std::time::Duration;
    use vmfish_common::{CdromBacking, QuestionTuning};

    fn instance() -> GatewayInstance {
        GatewayInstance::new("vm-1001", "vcenter.lab", 8443)
    }

    fn cred() -> Credential {
        Credential::new("root", "pw")
    }

    #[tokio::test]
    async fn test_get_reports_iso() {
        let fake = FakePlatform::new();
        fake.set_cdrom(CdromBacking::IsoFile("[ds1] iso/install.iso".to_string()), true);

        let state = get(&fake, &instance(), &cred()).await.unwrap();
        assert_eq!(state.image(), Some("[ds1] iso/install.iso"));
        assert!(state.inserted());
        assert_eq!(fake.logouts(), 1);
    }

    #[tokio::test]
    async fn test_get_without_cdrom() {
        let fake = FakePlatform::new();
        fake.remove_cdroms();

        let err = get(&fake, &instance(), &cred()).await.unwrap_err();
        assert_eq!(err.to_string(), "No CD-ROM device found");
        assert_eq!(err.code(), "Base.1.0.GeneralError");
        assert_eq!(fake.logouts(), 1);
    }

    #[tokio::test]
    async fn test_insert_requires_image() {
        let fake = FakePlatform::new();

        for image in [None, Some("")] {
            match insert(&fake, &instance(), &cred(), image).await {
                Err(ApiError::PropertyMissing(msg)) => assert_eq!(msg, "Missing Image field"),
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(fake.opens(), 0);
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let fake = FakePlatform::new();
        let path = "[datastore1] iso/ubuntu.iso";

        let state = insert(&fake, &instance(), &cred(), Some(path)).await.unwrap();
        assert!(state.inserted());

        let state = get(&fake, &instance(), &cred()).await.unwrap();
        assert_eq!(state.image(), Some(path));
        assert!(state.inserted());
        assert_eq!(fake.cdrom_updates(), vec![CdromUpdate::iso(path)]);
    }

    #[tokio::test]
    async fn test_insert_connect_failure_keeps_backing() {
        let fake = FakePlatform::new();
        fake.fail_connect();
        let path = "[datastore1] iso/ubuntu.iso";

        assert!(insert(&fake, &instance(), &cred(), Some(path)).await.is_err());
        assert_eq!(fake.cdrom_updates(), vec![CdromUpdate::iso(path)]);
    }

    #[tokio::test]
    async fn test_eject_does_not_wait_for_worker() {
        let fake = FakePlatform::new();
        fake.set_cdrom(CdromBacking::IsoFile("[ds1] iso/x.iso".to_string()), true);
        let tuning = QuestionTuning {
            grace_period: Duration::from_secs(30),
            ..QuestionTuning::default()
        };
        let dismisser = PromptDismisser::new(fake.factory(), "vm-1001", tuning, None);

        let started = std::time::Instant::now();
        let state = eject(&fake, &instance(), &cred(), &dismisser).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!state.inserted());
        assert_eq!(state.image(), None);

        let state = get(&fake, &instance(), &cred()).await.unwrap();
        assert!(!state.inserted());
        assert_eq!(state.image(), None);
        assert_eq!(fake.cdrom_updates(), vec![CdromUpdate::client_device()]);
    }
}

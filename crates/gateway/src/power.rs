//! Power controller

use tracing::{info, warn};
use vmfish_common::platform::release;
use vmfish_common::{
    Credential, GatewayInstance, PowerState, ResetAction, SessionFactory, Surface,
};

use crate::error::ApiError;

/// Current power state of the VM.
///
/// Any failure, including rejected credentials, reads as `Off`.
pub async fn get_power_state(
    platform: &dyn SessionFactory,
    instance: &GatewayInstance,
    credential: &Credential,
) -> PowerState {
    let session = match platform.open(Surface::Automation, credential).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Could not read power state of VM {}: {}", instance.vm_id, e);
            return PowerState::Off;
        }
    };

    let state = session.power_state(&instance.vm_id).await;
    release(session).await;

    match state {
        Ok(state) => PowerState::from(&state),
        Err(e) => {
            warn!("Could not read power state of VM {}: {}", instance.vm_id, e);
            PowerState::Off
        }
    }
}

/// Validate a `ResetType` before anything touches the platform
pub fn parse_reset_type(reset_type: Option<&str>) -> Result<ResetAction, ApiError> {
    reset_type
        .and_then(ResetAction::from_reset_type)
        .ok_or_else(|| ApiError::Validation("Invalid ResetType".to_string()))
}

/// Issue a power operation. Returns once the platform acknowledges it.
pub async fn reset(
    platform: &dyn SessionFactory,
    instance: &GatewayInstance,
    credential: &Credential,
    action: ResetAction,
) -> Result<(), ApiError> {
    let session = platform.open(Surface::Automation, credential).await?;
    let result = session.power_action(&instance.vm_id, action).await;
    release(session).await;
    result?;

    info!("Issued power {} on VM {}", action.as_api_action(), instance.vm_id);
    Ok(())
}

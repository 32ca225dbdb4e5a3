//! Redfish resource documents served by the gateway

use serde::Deserialize;
use serde_json::{json, Value};
use vmfish_common::{PowerState, VirtualMediaState, ALLOWABLE_RESET_TYPES};

pub const SERVICE_ROOT: &str = "/redfish/v1";
pub const SYSTEMS: &str = "/redfish/v1/Systems";
pub const SYSTEM: &str = "/redfish/v1/Systems/1";
pub const SYSTEM_RESET: &str = "/redfish/v1/Systems/1/Actions/ComputerSystem.Reset";
pub const MANAGERS: &str = "/redfish/v1/Managers";
pub const MANAGER: &str = "/redfish/v1/Managers/1";
pub const VIRTUAL_MEDIA: &str = "/redfish/v1/Managers/1/VirtualMedia";
pub const VIRTUAL_CD: &str = "/redfish/v1/Managers/1/VirtualMedia/CD";
pub const INSERT_MEDIA: &str = "/redfish/v1/Managers/1/VirtualMedia/CD/Actions/VirtualMedia.InsertMedia";
pub const EJECT_MEDIA: &str = "/redfish/v1/Managers/1/VirtualMedia/CD/Actions/VirtualMedia.EjectMedia";

// ============================================================================
// Request bodies
// ============================================================================

/// Parse a JSON body, treating anything unparseable as an empty object
pub fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "ResetType", default)]
    pub reset_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InsertMediaRequest {
    #[serde(rename = "Image", default)]
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SystemPatch {
    #[serde(rename = "Boot", default)]
    pub boot: Option<BootPatch>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BootPatch {
    #[serde(rename = "BootSourceOverrideTarget", default)]
    pub target: Option<String>,
    #[serde(rename = "BootSourceOverrideEnabled", default)]
    pub enabled: Option<String>,
}

// ============================================================================
// Documents
// ============================================================================

pub fn service_root() -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#ServiceRoot",
        "@odata.id": SERVICE_ROOT,
        "@odata.type": "#ServiceRoot.v1_5_0.ServiceRoot",
        "Id": "RootService",
        "Name": "Root Service",
        "Systems": { "@odata.id": SYSTEMS },
        "Chassis": { "@odata.id": "/redfish/v1/Chassis" },
        "Managers": { "@odata.id": MANAGERS }
    })
}

pub fn systems_collection() -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#ComputerSystemCollection",
        "@odata.id": SYSTEMS,
        "@odata.type": "#ComputerSystemCollection.ComputerSystemCollection",
        "Name": "Computer System Collection",
        "Members@odata.count": 1,
        "Members": [{ "@odata.id": SYSTEM }]
    })
}

pub fn system(power_state: PowerState) -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#ComputerSystem.ComputerSystem",
        "@odata.id": SYSTEM,
        "@odata.type": "#ComputerSystem.v1_4_0.ComputerSystem",
        "Id": "1",
        "Name": "System",
        "SystemType": "Physical",
        "PowerState": power_state.to_string(),
        "Boot": {
            "BootSourceOverrideTarget": "None",
            "BootSourceOverrideEnabled": "Continuous",
            "BootSourceOverrideMode": "Legacy",
            "BootSourceOverrideSupported": ["Hdd", "Cd"]
        },
        "Actions": {
            "#ComputerSystem.Reset": {
                "target": SYSTEM_RESET,
                "ResetType@Redfish.AllowableValues": ALLOWABLE_RESET_TYPES
            }
        }
    })
}

pub fn reset_accepted(reset_type: &str) -> Value {
    json!({
        "@odata.id": SYSTEM_RESET,
        "ResetType": reset_type
    })
}

pub fn managers_collection() -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#ManagerCollection.ManagerCollection",
        "@odata.id": MANAGERS,
        "@odata.type": "#ManagerCollection.v1_0_0.ManagerCollection",
        "Name": "Manager Collection",
        "Members@odata.count": 1,
        "Members": [{ "@odata.id": MANAGER }]
    })
}

pub fn manager() -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#Manager.Manager",
        "@odata.id": MANAGER,
        "@odata.type": "#Manager.v1_3_0.Manager",
        "Id": "1",
        "Name": "Vmfish Manager",
        "ManagerType": "Service",
        "FirmwareVersion": vmfish_common::VERSION,
        "VirtualMedia": { "@odata.id": VIRTUAL_MEDIA }
    })
}

pub fn virtual_media_collection() -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#VirtualMediaCollection.VirtualMediaCollection",
        "@odata.id": VIRTUAL_MEDIA,
        "@odata.type": "#VirtualMediaCollection.VirtualMediaCollection",
        "Name": "Virtual Media Collection",
        "Members@odata.count": 1,
        "Members": [{ "@odata.id": VIRTUAL_CD, "MediaTypes": ["CD"] }]
    })
}

pub fn virtual_media(state: &VirtualMediaState) -> Value {
    json!({
        "@odata.context": "/redfish/v1/$metadata#VirtualMedia.VirtualMedia",
        "@odata.id": VIRTUAL_CD,
        "@odata.type": "#VirtualMedia.v1_2_0.VirtualMedia",
        "Id": "CD",
        "Name": "CD Drive",
        "MediaTypes": ["CD"],
        "Image": state.image(),
        "Inserted": state.inserted(),
        "WriteProtected": true,
        "Actions": {
            "#VirtualMedia.InsertMedia": { "target": INSERT_MEDIA },
            "#VirtualMedia.EjectMedia": { "target": EJECT_MEDIA }
        }
    })
}

/// Short body returned by the insert/eject actions
pub fn media_action_result(state: &VirtualMediaState) -> Value {
    json!({
        "Inserted": state.inserted(),
        "Image": state.image()
    })
}

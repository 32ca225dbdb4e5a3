//! vSphere Automation REST API session

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{check, SESSION_HEADER};
use crate::error::Result;
use crate::platform::{ManagementSession, Surface};
use crate::types::*;

/// Session against `/api` (power and virtual media)
pub struct AutomationSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl AutomationSession {
    /// Create a session with Basic credentials
    pub async fn login(http: reqwest::Client, base_url: &str, credential: &Credential) -> Result<Self> {
        let response = http
            .post(format!("{}/api/session", base_url))
            .basic_auth(&credential.username, Some(&credential.password))
            .send()
            .await?;
        let token: String = check(response).await?.json().await?;
        debug!("Automation session established with {}", base_url);

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/api{}", self.base_url, path);
        trace!("{} {}", method, url);
        self.http.request(method, url).header(SESSION_HEADER, &self.token)
    }

    fn cdrom_path(vm_id: &str, cdrom_id: &str) -> String {
        format!("/vcenter/vm/{}/hardware/cdrom/{}", vm_id, cdrom_id)
    }
}

// Automation API wire types

#[derive(Debug, Deserialize)]
struct PowerInfo {
    state: String,
}

#[derive(Debug, Deserialize)]
struct CdromSummary {
    cdrom: String,
}

#[derive(Debug, Deserialize)]
struct CdromDetail {
    backing: BackingInfo,
    state: String,
}

#[derive(Debug, Deserialize)]
struct BackingInfo {
    #[serde(rename = "type")]
    backing_type: String,
    #[serde(default)]
    iso_file: Option<String>,
}

#[derive(Debug, Serialize)]
struct BackingSpec<'a> {
    #[serde(rename = "type")]
    backing_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    iso_file: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CdromUpdateSpec<'a> {
    backing: BackingSpec<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_guest_control: Option<bool>,
}

impl<'a> From<&'a CdromUpdate> for CdromUpdateSpec<'a> {
    fn from(update: &'a CdromUpdate) -> Self {
        let backing = match &update.backing {
            CdromBacking::IsoFile(path) => BackingSpec {
                backing_type: "ISO_FILE",
                iso_file: Some(path.as_str()),
            },
            CdromBacking::ClientDevice => BackingSpec {
                backing_type: "CLIENT_DEVICE",
                iso_file: None,
            },
            CdromBacking::HostDevice => BackingSpec {
                backing_type: "HOST_DEVICE",
                iso_file: None,
            },
            CdromBacking::Other(kind) => BackingSpec {
                backing_type: kind.as_str(),
                iso_file: None,
            },
        };
        Self {
            backing,
            start_connected: update.start_connected,
            allow_guest_control: update.allow_guest_control,
        }
    }
}

impl From<CdromDetail> for CdromInfo {
    fn from(detail: CdromDetail) -> Self {
        let backing = match detail.backing.backing_type.as_str() {
            "ISO_FILE" => CdromBacking::IsoFile(detail.backing.iso_file.unwrap_or_default()),
            "CLIENT_DEVICE" => CdromBacking::ClientDevice,
            "HOST_DEVICE" => CdromBacking::HostDevice,
            other => CdromBacking::Other(other.to_string()),
        };
        CdromInfo {
            backing,
            connected: detail.state == "CONNECTED",
        }
    }
}

#[async_trait]
impl ManagementSession for AutomationSession {
    fn surface(&self) -> Surface {
        Surface::Automation
    }

    async fn power_state(&self, vm_id: &str) -> Result<PlatformPowerState> {
        let response = self
            .request(reqwest::Method::GET, &format!("/vcenter/vm/{}/power", vm_id))
            .send()
            .await?;
        let info: PowerInfo = check(response).await?.json().await?;
        Ok(PlatformPowerState::from_api(&info.state))
    }

    async fn power_action(&self, vm_id: &str, action: ResetAction) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, &format!("/vcenter/vm/{}/power", vm_id))
            .query(&[("action", action.as_api_action())])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list_cdroms(&self, vm_id: &str) -> Result<Vec<String>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/vcenter/vm/{}/hardware/cdrom", vm_id))
            .send()
            .await?;
        let cdroms: Vec<CdromSummary> = check(response).await?.json().await?;
        Ok(cdroms.into_iter().map(|c| c.cdrom).collect())
    }

    async fn cdrom(&self, vm_id: &str, cdrom_id: &str) -> Result<CdromInfo> {
        let response = self
            .request(reqwest::Method::GET, &Self::cdrom_path(vm_id, cdrom_id))
            .send()
            .await?;
        let detail: CdromDetail = check(response).await?.json().await?;
        Ok(detail.into())
    }

    async fn update_cdrom(&self, vm_id: &str, cdrom_id: &str, update: &CdromUpdate) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH, &Self::cdrom_path(vm_id, cdrom_id))
            .json(&CdromUpdateSpec::from(update))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn connect_cdrom(&self, vm_id: &str, cdrom_id: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, &Self::cdrom_path(vm_id, cdrom_id))
            .query(&[("action", "connect")])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let response = self.request(reqwest::Method::DELETE, "/session").send().await?;
        check(response).await?;
        Ok(())
    }
}

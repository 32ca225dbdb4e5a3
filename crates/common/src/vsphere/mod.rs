//! vSphere clients
//!
//! Two adapters behind [`ManagementSession`]:
//! - [`AutomationSession`]: the vSphere Automation REST API (`/api`)
//! - [`VimSession`]: the VI/JSON binding of the vim25 API (`/sdk/vim25`)
//!
//! Every session gets its own `reqwest::Client`; nothing is pooled between
//! sessions.

mod automation;
mod vim;

pub use automation::AutomationSession;
pub use vim::VimSession;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::platform::{ManagementSession, SessionFactory, Surface};
use crate::types::Credential;

/// Header carrying the session token on both surfaces
pub(crate) const SESSION_HEADER: &str = "vmware-api-session-id";

/// Default vim25 release for the VI/JSON endpoint
pub const DEFAULT_VIM_RELEASE: &str = "8.0.1.0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for one vCenter
#[derive(Debug, Clone)]
pub struct VsphereConnector {
    base_url: String,
    verify_tls: bool,
    vim_release: String,
}

impl VsphereConnector {
    /// `host` may be a bare host name or a full base URL
    pub fn new(host: &str) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host)
        };
        Self {
            base_url,
            verify_tls: false,
            vim_release: DEFAULT_VIM_RELEASE.to_string(),
        }
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_vim_release(mut self, release: impl Into<String>) -> Self {
        self.vim_release = release.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!self.verify_tls)
            .pool_max_idle_per_host(0)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(client)
    }
}

#[async_trait]
impl SessionFactory for VsphereConnector {
    async fn open(&self, surface: Surface, credential: &Credential) -> Result<Box<dyn ManagementSession>> {
        debug!(
            "Opening {} session to {} as {}",
            surface.name(),
            self.base_url,
            credential.username
        );
        let http = self.http_client()?;
        match surface {
            Surface::Automation => {
                let session = AutomationSession::login(http, &self.base_url, credential).await?;
                Ok(Box::new(session))
            }
            Surface::Vim => {
                let base = format!("{}/sdk/vim25/{}", self.base_url, self.vim_release);
                let session = VimSession::login(http, &base, credential).await?;
                Ok(Box::new(session))
            }
        }
    }
}

/// Turn a non-success response into an error carrying the API's message
pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body.trim().to_string()
        }
    });

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication(message));
    }
    Err(Error::Platform {
        status: status.as_u16(),
        message,
    })
}

/// Pull a human-readable message out of an Automation or VI/JSON error body
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    // Automation: {"error_type": "...", "messages": [{"default_message": "..."}]}
    if let Some(msg) = value
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
        .and_then(|m| m.get("default_message"))
        .and_then(|m| m.as_str())
    {
        return Some(msg.to_string());
    }

    // VI/JSON faults carry localizedMessage or a faultMessage list
    if let Some(msg) = value.get("localizedMessage").and_then(|m| m.as_str()) {
        return Some(msg.to_string());
    }
    value
        .get("faultMessage")
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
        .and_then(|m| m.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

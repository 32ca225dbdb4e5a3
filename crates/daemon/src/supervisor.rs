//! Gateway supervisor
//!
//! Runs one gateway task per configured VM. The first gateway to exit, for
//! whatever reason, ends `run`.

use std::sync::Arc;

use anyhow::Context;
use rustls::ServerConfig;
use tokio::task::JoinSet;
use tracing::{error, info};
use vmfish_common::SessionFactory;
use vmfish_gateway::GatewayServer;

use crate::config::VmfishConfig;

pub struct Supervisor {
    gateways: JoinSet<anyhow::Result<()>>,
}

impl Supervisor {
    /// Bind and start every gateway
    pub fn start(
        config: &VmfishConfig,
        platform: Arc<dyn SessionFactory>,
        tls: Option<Arc<ServerConfig>>,
    ) -> anyhow::Result<Self> {
        let mut gateways = JoinSet::new();
        let service_credential = config.service_credential();

        for instance in config.instances() {
            let addr = config.gateway_addr(instance.port)?;
            info!("Starting gateway for VM {} on port {}", instance.vm_id, instance.port);

            let vm_id = instance.vm_id.clone();
            let server = GatewayServer::new(instance, platform.clone(), service_credential.clone());
            let tls = tls.clone();
            gateways.spawn(async move {
                let result = match tls {
                    Some(tls) => server.serve_tls(addr, tls).await,
                    None => server.serve(addr).await,
                };
                result.with_context(|| format!("gateway for VM {} on {} failed", vm_id, addr))
            });
        }

        Ok(Self { gateways })
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    /// Wait for the first gateway to stop
    pub async fn wait_any(&mut self) -> anyhow::Result<()> {
        match self.gateways.join_next().await {
            Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(anyhow::anyhow!("gateway task panicked: {}", e)),
            None => Ok(()),
        }
    }

    /// Stop all gateways. Detached prompt dismissal workers are not tracked.
    pub async fn shutdown(mut self) {
        self.gateways.abort_all();
        while let Some(result) = self.gateways.join_next().await {
            if let Ok(Err(e)) = result {
                error!("{:#}", e);
            }
        }
        info!("All gateways stopped");
    }
}

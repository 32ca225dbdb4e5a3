//! Gateway HTTP server
//!
//! One `GatewayServer` fronts exactly one VM. Static descriptors are served
//! without credentials; everything that reaches vSphere goes through the
//! [`BasicAuth`] extractor first.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_rustls::{rustls::ServerConfig, TlsAcceptor};
use tower::{Layer, ServiceExt};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;
use vmfish_common::{Credential, GatewayInstance, SessionFactory};

use crate::auth::BasicAuth;
use crate::error::ApiError;
use crate::questions::PromptDismisser;
use crate::redfish::{self, InsertMediaRequest, ResetRequest, SystemPatch};
use crate::{boot, media, power};

/// Gateway server state
#[derive(Clone)]
pub struct GatewayServer {
    state: Arc<GatewayState>,
}

struct GatewayState {
    instance: GatewayInstance,
    platform: Arc<dyn SessionFactory>,
    dismisser: PromptDismisser,
}

type AppState = State<Arc<GatewayState>>;

impl GatewayServer {
    /// Create a gateway for one VM.
    ///
    /// `service_credential` is what the prompt dismissal worker logs in
    /// with unless the tuning asks for the caller's credential.
    pub fn new(
        instance: GatewayInstance,
        platform: Arc<dyn SessionFactory>,
        service_credential: Option<Credential>,
    ) -> Self {
        let dismisser = PromptDismisser::new(
            platform.clone(),
            instance.vm_id.clone(),
            instance.tuning.question.clone(),
            service_credential,
        );
        Self {
            state: Arc::new(GatewayState {
                instance,
                platform,
                dismisser,
            }),
        }
    }

    pub fn instance(&self) -> &GatewayInstance {
        &self.state.instance
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route(redfish::SERVICE_ROOT, get(service_root).fallback(not_found_handler))
            .route(redfish::SYSTEMS, get(systems).fallback(not_found_handler))
            .route(
                redfish::SYSTEM,
                get(get_system).patch(patch_system).fallback(not_found_handler),
            )
            .route(redfish::SYSTEM_RESET, post(reset_system).fallback(not_found_handler))
            .route(redfish::MANAGERS, get(managers).fallback(not_found_handler))
            .route(redfish::MANAGER, get(manager).fallback(not_found_handler))
            .route(redfish::VIRTUAL_MEDIA, get(virtual_media_collection).fallback(not_found_handler))
            .route(redfish::VIRTUAL_CD, get(get_virtual_media).fallback(not_found_handler))
            .route(redfish::INSERT_MEDIA, post(insert_media).fallback(not_found_handler))
            .route(redfish::EJECT_MEDIA, post(eject_media).fallback(not_found_handler))
            .fallback(not_found_handler)
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %Uuid::new_v4(),
                    )
                }),
            )
            .with_state(self.state.clone())
    }

    /// Router wrapped so that `/redfish/v1/Systems/` and `/redfish/v1/Systems` match
    pub fn service(&self) -> NormalizePath<Router> {
        NormalizePathLayer::trim_trailing_slash().layer(self.router())
    }

    /// Serve plain HTTP
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!(
            "Redfish gateway for VM {} listening on http://{}",
            self.state.instance.vm_id, addr
        );

        let listener = TcpListener::bind(addr).await?;
        let app = axum::ServiceExt::<Request>::into_make_service(self.service());
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Serve HTTPS with the given rustls configuration
    pub async fn serve_tls(self, addr: SocketAddr, tls: Arc<ServerConfig>) -> anyhow::Result<()> {
        info!(
            "Redfish gateway for VM {} listening on https://{}",
            self.state.instance.vm_id, addr
        );

        let listener = TcpListener::bind(addr).await?;
        let acceptor = TlsAcceptor::from(tls);
        let app = self.service();

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Accept failed on {}: {}", addr, e);
                    continue;
                }
            };
            let acceptor = acceptor.clone();
            let app = app.clone();

            tokio::spawn(async move {
                let stream = match acceptor.accept(stream).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        debug!("TLS handshake with {} failed: {}", peer, e);
                        return;
                    }
                };

                let service = hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
                    app.clone().oneshot(req)
                });

                if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("Connection from {} closed: {}", peer, e);
                }
            });
        }
    }
}

// ============================================================================
// Static descriptors
// ============================================================================

async fn service_root() -> Json<Value> {
    Json(redfish::service_root())
}

async fn systems() -> Json<Value> {
    Json(redfish::systems_collection())
}

async fn managers() -> Json<Value> {
    Json(redfish::managers_collection())
}

async fn manager() -> Json<Value> {
    Json(redfish::manager())
}

async fn virtual_media_collection() -> Json<Value> {
    Json(redfish::virtual_media_collection())
}

// ============================================================================
// System
// ============================================================================

async fn get_system(State(state): AppState, BasicAuth(cred): BasicAuth) -> Json<Value> {
    let power_state =
        power::get_power_state(state.platform.as_ref(), &state.instance, &cred).await;
    Json(redfish::system(power_state))
}

async fn reset_system(
    State(state): AppState,
    BasicAuth(cred): BasicAuth,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: ResetRequest = redfish::parse_body(&body);
    let action = power::parse_reset_type(request.reset_type.as_deref())?;

    power::reset(state.platform.as_ref(), &state.instance, &cred, action).await?;

    let reset_type = request.reset_type.unwrap_or_default();
    Ok(Json(redfish::reset_accepted(&reset_type)))
}

/// Body is validated before credentials so a bad override is always a 400
async fn patch_system(
    State(state): AppState,
    auth: Result<BasicAuth, ApiError>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let patch: SystemPatch = redfish::parse_body(&body);
    let request = boot::validate(&patch)?;
    let BasicAuth(cred) = auth?;

    boot::apply(state.platform.as_ref(), &state.instance, &cred, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Virtual media
// ============================================================================

async fn get_virtual_media(
    State(state): AppState,
    BasicAuth(cred): BasicAuth,
) -> Result<Json<Value>, ApiError> {
    let media_state = media::get(state.platform.as_ref(), &state.instance, &cred).await?;
    Ok(Json(redfish::virtual_media(&media_state)))
}

async fn insert_media(
    State(state): AppState,
    BasicAuth(cred): BasicAuth,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: InsertMediaRequest = redfish::parse_body(&body);
    let media_state = media::insert(
        state.platform.as_ref(),
        &state.instance,
        &cred,
        request.image.as_deref(),
    )
    .await?;
    Ok(Json(redfish::media_action_result(&media_state)))
}

async fn eject_media(
    State(state): AppState,
    BasicAuth(cred): BasicAuth,
) -> Result<Json<Value>, ApiError> {
    let media_state = media::eject(
        state.platform.as_ref(),
        &state.instance,
        &cred,
        &state.dismisser,
    )
    .await?;
    Ok(Json(redfish::media_action_result(&media_state)))
}

async fn not_found_handler(method: Method, uri: Uri) -> Response {
    ApiError::NotFound(format!("Endpoint {} {} not implemented", method, uri.path())).into_response()
}

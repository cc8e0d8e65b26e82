//! HTTP transport server using Axum.
//!
//! Routes share-link API calls to the request handler, runs the share and
//! session guards as route layers, and renders every failure as the same
//! JSON error body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Extension, Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use share_protocol::{
    Admission, ClaimShareLinkRequest, ClaimShareLinkResponse, CreateShareLinkRequest,
    CreateShareLinkResponse, RequestContext, RevokeShareLinkResponse, ShareError, ShareLinkView,
};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

/// Trait implemented by the share server to handle incoming requests.
///
/// The transport calls the `admit_*` methods from route layers and the link
/// methods from route handlers. Guards get a context that may already carry
/// an identity and return the merged one.
pub trait RequestHandler: Send + Sync + 'static {
    /// Decide whether a request may reach a share-gated route.
    fn admit_share(&self, headers: &HeaderMap, ctx: RequestContext) -> Admission;

    /// Decide whether a request may reach a workspace-member route.
    fn admit_session(&self, headers: &HeaderMap, ctx: RequestContext) -> Admission;

    fn create_link(
        &self,
        ctx: &RequestContext,
        req: CreateShareLinkRequest,
    ) -> impl std::future::Future<Output = Result<CreateShareLinkResponse, ShareError>> + Send;

    fn list_links(
        &self,
        ctx: &RequestContext,
    ) -> impl std::future::Future<Output = Result<Vec<ShareLinkView>, ShareError>> + Send;

    fn revoke_link(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> impl std::future::Future<Output = Result<RevokeShareLinkResponse, ShareError>> + Send;

    fn claim_link(
        &self,
        token: &str,
        req: ClaimShareLinkRequest,
    ) -> impl std::future::Future<Output = Result<ClaimShareLinkResponse, ShareError>> + Send;

    /// Number of stored links (for the health check).
    fn link_count(&self) -> usize;
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Enable permissive CORS (browser frontends on another origin)
    pub enable_cors: bool,
    /// Log every request at info instead of debug
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7171,
            hostname: "127.0.0.1".into(),
            enable_cors: false,
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
}

/// The transport server. Owns the listener task.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start the transport server with the given request handler.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with_handler(config, Arc::new(handler)).await
    }

    /// Start the transport server with a shared handler.
    pub async fn start_with_handler<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let app = router(&config, handler);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("Share transport listening on http://{}:{}", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Share transport server stopped");
    }
}

/// Build the application router.
///
/// Member routes sit behind the session guard, `/share/*` behind the share
/// guard; health and claim are public.
pub fn router<H: RequestHandler>(config: &TransportConfig, handler: Arc<H>) -> Router {
    let state = Arc::new(AppState {
        handler,
        config: config.clone(),
    });

    let members = Router::new()
        .route("/share-links", post(create_link_handler::<H>).get(list_links_handler::<H>))
        .route("/share-links/{token}", delete(revoke_link_handler::<H>))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_guard::<H>));

    let shared = Router::new()
        .route("/share/context", get(share_context_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), share_guard::<H>));

    let public = Router::new()
        .route("/health", get(health_handler::<H>))
        .route("/share-links/{token}/claim", post(claim_link_handler::<H>));

    let mut app = public
        .merge(members)
        .merge(shared)
        .layer(middleware::from_fn_with_state(state.clone(), log_request::<H>))
        .with_state(state);

    if config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// A [`ShareError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ShareError);

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Layers
// ─────────────────────────────────────────────────────────────────────────────

async fn share_guard<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    request: Request,
    next: Next,
) -> Response {
    run_guard(request, next, |headers, ctx| state.handler.admit_share(headers, ctx)).await
}

async fn session_guard<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    request: Request,
    next: Next,
) -> Response {
    run_guard(request, next, |headers, ctx| state.handler.admit_session(headers, ctx)).await
}

/// Run one guard and either forward the request with the merged context or
/// answer with the uniform 401.
async fn run_guard(
    mut request: Request,
    next: Next,
    admit: impl FnOnce(&HeaderMap, RequestContext) -> Admission,
) -> Response {
    let ctx = request.extensions().get::<RequestContext>().cloned().unwrap_or_default();
    match admit(request.headers(), ctx) {
        Admission::Admitted(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Admission::Denied => ApiError(ShareError::unauthorized()).into_response(),
    }
}

async fn log_request<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if state.config.verbose_logging {
        info!("[{request_id}] {method} {path} -> {}", response.status());
    } else {
        debug!("[{request_id}] {method} {path} -> {}", response.status());
    }
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "links": state.handler.link_count(),
    }))
}

async fn create_link_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateShareLinkResponse>), ApiError> {
    let req: CreateShareLinkRequest = parse_body(&body)?;
    let created = state.handler.create_link(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_links_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<ShareLinkView>>, ApiError> {
    Ok(Json(state.handler.list_links(&ctx).await?))
}

async fn revoke_link_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(token): Path<String>,
) -> Result<Json<RevokeShareLinkResponse>, ApiError> {
    Ok(Json(state.handler.revoke_link(&ctx, &token).await?))
}

async fn claim_link_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<Json<ClaimShareLinkResponse>, ApiError> {
    // The body is optional: a link without a password can be claimed bare
    let req: ClaimShareLinkRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ClaimShareLinkRequest::default()
    } else {
        parse_body(&body)?
    };
    Ok(Json(state.handler.claim_link(&token, req).await?))
}

/// Downstream share resource: echoes the context the share guard produced.
async fn share_context_handler(Extension(ctx): Extension<RequestContext>) -> Json<RequestContext> {
    Json(ctx)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(ShareError::bad_request(format!("Invalid request body: {e}"))))
}

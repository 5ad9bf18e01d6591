//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatcher
//! - Wire up middleware (tracing, request ID)
//! - Bound each dispatch by the request timeout, answering 500 with CORS
//! - Resolve each request to a canonical redirect, a static asset or an
//!   upstream fetch
//! - Serve and populate the response cache
//! - Swap in recompiled contexts on config reload
//! - Serve over plain TCP or TLS with graceful shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use arc_swap::ArcSwap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use url::Url;

use crate::cache::{policy, CacheWorker, CacheWriter, ResponseCache};
use crate::config::ProxyConfig;
use crate::http::request::{buffer_body, host, outbound_headers, request_id, X_REQUEST_ID};
use crate::http::response::{canonical_redirect, is_preflight, preflight};
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::proxy::{build_client, ContextError, ProxyContext, ProxyError, ProxyRequest};
use crate::routing::Route;

/// Grace period for in-flight requests when shutting down a TLS listener.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ArcSwap<ProxyContext>>,
    pub cache: ResponseCache,
    pub cache_writer: CacheWriter,
}

/// HTTP server for the edge proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
    client: reqwest::Client,
    cache_worker: CacheWorker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ContextError> {
        let client = build_client(&config)?;
        let context = ProxyContext::from_config(&config, client.clone())?;

        let cache = ResponseCache::new(
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_entries,
        );
        let (cache_writer, cache_worker) = CacheWriter::channel(config.cache.queue_capacity);

        let state = AppState {
            context: Arc::new(ArcSwap::from_pointee(context)),
            cache,
            cache_writer,
        };

        let router = Self::build_router(state.clone());
        Ok(Self {
            router,
            config,
            state,
            client,
            cache_worker,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.start_background(config_updates, &shutdown);

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let tls = match &self.config.listener.tls {
            Some(tls) => load_tls_config(tls).await?,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "listener.tls is not configured",
                ))
            }
        };
        tracing::info!(address = %addr, "HTTPS server starting");

        let app = self.start_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Spawn the cache worker and reload loop; return the router to serve.
    fn start_background(
        self,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) -> Router {
        tokio::spawn(
            self.cache_worker
                .run(self.state.cache.clone(), shutdown.resubscribe()),
        );
        tokio::spawn(reload_contexts(
            self.state.context.clone(),
            self.client,
            config_updates,
            shutdown.resubscribe(),
        ));
        self.router
    }
}

/// Recompile and swap the request context whenever a new config arrives.
async fn reload_contexts(
    context: Arc<ArcSwap<ProxyContext>>,
    client: reqwest::Client,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            Some(config) = updates.recv() => {
                match ProxyContext::from_config(&config, client.clone()) {
                    Ok(next) => {
                        context.store(Arc::new(next));
                        tracing::info!(
                            prefix = %config.server.prefix,
                            patterns = config.upstream.patterns.len(),
                            "Configuration reloaded"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded configuration");
                    }
                }
            }
            _ = shutdown.recv() => break,
            else => break,
        }
    }
}

/// Main proxy handler.
/// Resolves the route, then redirects, serves a static asset or proxies.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let context = state.context.load_full();

    let host = host(request.headers());
    let route = context.router.resolve(request.uri(), host.as_deref());

    tracing::debug!(
        request_id = %request_id,
        peer = %peer,
        method = %method,
        uri = %request.uri(),
        route = ?route,
        "Dispatching request"
    );

    let kind = route.kind();
    let dispatch = async {
        match route {
            Route::CanonicalRedirect(location) => Ok(canonical_redirect(&location)),
            Route::Static { path } => serve_static(&context, &path, request).await,
            Route::Upstream { target } => serve_upstream(&state, &context, target, request).await,
        }
    };

    // Covers everything up to the response head; bodies keep streaming.
    let result = match tokio::time::timeout(context.request_timeout, dispatch).await {
        Ok(result) => result,
        Err(_) => Err(ProxyError::RequestTimeout(context.request_timeout)),
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(request_id = %request_id, method = %method, error = %err, "Proxy request failed");
            } else {
                tracing::warn!(request_id = %request_id, method = %method, error = %err, "Request rejected");
            }
            err.into_response()
        }
    };

    metrics::record_request(kind, response.status().as_u16(), start_time);
    response
}

async fn serve_static(
    context: &ProxyContext,
    path: &str,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let proxy_request = into_proxy_request(request, context.max_body_bytes).await?;
    context.assets.fetch(path, proxy_request).await
}

async fn serve_upstream(
    state: &AppState,
    context: &ProxyContext,
    target: String,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    if !context.whitelist.permits(&target) {
        return Err(ProxyError::Forbidden(target));
    }

    if is_preflight(request.method(), request.headers()) {
        return Ok(preflight());
    }

    let url = Url::parse(&target).map_err(|_| ProxyError::InvalidUrl(target.clone()))?;

    let cache_key = (context.cache_enabled
        && policy::request_is_cacheable(request.method(), request.headers()))
    .then(|| request.uri().to_string());
    if let Some(key) = cache_key.as_ref().filter(|_| policy::lookup_allowed(request.headers())) {
        if let Some(hit) = state.cache.get(key) {
            tracing::debug!(key = %key, "Serving cached response");
            metrics::record_cache("hit");
            return Ok(hit.into_response());
        }
        metrics::record_cache("miss");
    }

    tracing::info!(upstream = %url, method = %request.method(), "Fetching upstream");
    let proxy_request = into_proxy_request(request, context.max_body_bytes).await?;
    let response = context.engine.forward(url, &proxy_request).await?;

    Ok(match cache_key {
        Some(key) if policy::response_is_storable(response.status(), response.headers()) => {
            state
                .cache_writer
                .tee(key, response, context.cache_max_entry_bytes)
        }
        _ => response,
    })
}

async fn into_proxy_request(request: Request<Body>, limit: usize) -> Result<ProxyRequest, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = buffer_body(&parts.headers, body, limit).await?;
    Ok(ProxyRequest {
        method: parts.method,
        headers: outbound_headers(&parts.headers),
        body,
    })
}

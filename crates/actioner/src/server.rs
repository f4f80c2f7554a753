//! HTTP ingress: Alertmanager webhook and health endpoints, plus the
//! listener pair that serves them (also used for Prometheus metrics).

use anyhow::{bail, Context};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{HttpConfig, MetricsConfig};
use crate::dispatcher::RuleDispatcher;
use crate::metrics::{self, Metrics};
use crate::models::AlertGroupEvent;

/// Upper bound on draining the metrics listeners.
pub const METRICS_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Webhook path Alertmanager posts to.
pub const WEBHOOK_PATH: &str = "/api/v1/webhooks/alertmanager";

/// Build the service router.
pub fn router(dispatcher: RuleDispatcher, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(alertmanager_webhook))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

async fn health() -> &'static str {
    "OK"
}

async fn alertmanager_webhook(
    State(dispatcher): State<RuleDispatcher>,
    payload: Result<Json<AlertGroupEvent>, JsonRejection>,
) -> Response {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected webhook payload");
            let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            return (status, Json(json!({ "error": rejection.body_text() }))).into_response();
        }
    };

    // Detached so a dropped connection cannot cancel an action mid-flight.
    let outcome = tokio::spawn(async move { dispatcher.dispatch(&event).await }).await;

    match outcome {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "success" }))).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Dispatch task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

struct Running {
    shutdown: CancellationToken,
    listeners: Vec<(SocketAddr, JoinHandle<std::io::Result<()>>)>,
}

/// Owns the IPv4 and IPv6 listeners serving one router.
pub struct HttpServer {
    name: &'static str,
    ipv4_host: String,
    ipv6_host: String,
    port: u16,
    grace: Duration,
    router: Router,
    running: Option<Running>,
}

impl HttpServer {
    /// Create a stopped webhook server.
    pub fn new(config: HttpConfig, dispatcher: RuleDispatcher) -> Self {
        let router = router(dispatcher, config.max_body_bytes);
        let grace = config.shutdown_grace_period();
        Self {
            name: "webhook",
            ipv4_host: config.ipv4_host,
            ipv6_host: config.ipv6_host,
            port: config.port,
            grace,
            router,
            running: None,
        }
    }

    /// Create a stopped Prometheus metrics server.
    pub fn metrics(config: MetricsConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            name: "metrics",
            ipv4_host: config.ipv4_host,
            ipv6_host: config.ipv6_host,
            port: config.port,
            grace: METRICS_SHUTDOWN_TIMEOUT,
            router: metrics::router(metrics),
            running: None,
        }
    }

    /// Bind the configured listeners and start serving.
    ///
    /// Fails if nothing could be bound. An IPv6 bind failure is only
    /// logged when the IPv4 listener is up.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.running.is_some() {
            bail!("{} server already started", self.name);
        }

        let mut bound = Vec::new();
        if !self.ipv4_host.is_empty() {
            let addr = format!("{}:{}", self.ipv4_host, self.port);
            bound.push(bind(&addr).with_context(|| format!("Failed to bind {addr}"))?);
        }
        if !self.ipv6_host.is_empty() {
            let addr = format!("[{}]:{}", self.ipv6_host, self.port);
            match bind(&addr) {
                Ok(listener) => bound.push(listener),
                Err(e) if !bound.is_empty() => {
                    warn!(server = self.name, address = %addr, error = %e, "IPv6 listener unavailable, serving IPv4 only");
                }
                Err(e) => return Err(e.context(format!("Failed to bind {addr}"))),
            }
        }
        if bound.is_empty() {
            bail!("no listen address configured");
        }

        let shutdown = CancellationToken::new();
        let mut listeners = Vec::with_capacity(bound.len());
        for listener in bound {
            let addr = listener.local_addr()?;
            let token = shutdown.clone();
            let app = self.router.clone();
            let handle = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await
            });
            info!(server = self.name, address = %addr, "HTTP server listening");
            listeners.push((addr, handle));
        }

        self.running = Some(Running {
            shutdown,
            listeners,
        });
        Ok(())
    }

    /// Addresses actually bound, in IPv4, IPv6 order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.running
            .as_ref()
            .map(|r| r.listeners.iter().map(|(addr, _)| *addr).collect())
            .unwrap_or_default()
    }

    /// Stop accepting and wait for in-flight requests, bounded by the
    /// configured grace period. Stopping a stopped server is a no-op.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        running.shutdown.cancel();

        let name = self.name;
        let grace = self.grace;
        let drain = async {
            for (addr, handle) in running.listeners {
                match handle.await {
                    Ok(Ok(())) => info!(server = name, address = %addr, "HTTP listener stopped"),
                    Ok(Err(e)) => error!(server = name, address = %addr, error = %e, "HTTP listener failed"),
                    Err(e) => error!(server = name, address = %addr, error = %e, "HTTP listener task failed"),
                }
            }
        };

        tokio::time::timeout(grace, drain).await.with_context(|| {
            format!("{name} server requests did not finish within {}s", grace.as_secs())
        })
    }
}

fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address {addr}"))?;
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(TcpListener::from_std(socket.into())?)
}

// src/server/mod.rs

//! HTTP server replaying mirrored responses.
//!
//! Every request is routed by its `Host` header. The archive apex serves an
//! index of mirrored sites; mirror labels serve stored entries; anything
//! else gets an error page.

pub mod response;

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Uri, header};
use axum::response::Response;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::models::ArchiveConfig;
use crate::router::Router;

/// Shared state for request handlers.
pub struct AppState {
    router: Router,
    link_port: String,
}

impl AppState {
    pub fn new(router: Router, archive: &ArchiveConfig) -> Self {
        Self {
            router,
            link_port: archive.link_port(),
        }
    }
}

/// Build the axum app. All paths go to one handler.
pub fn build_app(state: Arc<AppState>) -> axum::Router {
    axum::Router::new().fallback(handle).with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run_server(archive: &ArchiveConfig, router: Router) -> Result<()> {
    let addr = format!("{}:{}", archive.bind, archive.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!(
        "Serving archive {} on http://{} (links use port '{}')",
        router.suffix(),
        listener.local_addr()?,
        archive.link_port()
    );

    let state = Arc::new(AppState::new(router, archive));
    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}

async fn handle(State(state): State<Arc<AppState>>, headers: HeaderMap, uri: Uri) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default();
    let router = &state.router;

    if router.is_archive_root(host) {
        return match router.sites().await {
            Ok(sites) => {
                let labelled: Vec<_> = sites
                    .into_iter()
                    .map(|site| {
                        let label = router.label_for(&site.root);
                        (site, label)
                    })
                    .collect();
                response::index_page(&labelled, &state.link_port)
            }
            Err(e) => {
                log::error!("Failed to list sites: {e}");
                response::error_response(&e, router.suffix(), &state.link_port)
            }
        };
    }

    match router.route(host, uri.path(), uri.query()).await {
        Ok(entry) => {
            log::debug!("{} {} -> {}", host, uri, entry.metadata.status);
            response::entry_response(entry)
        }
        Err(e) => {
            if response::status_for(&e).is_server_error() {
                log::error!("{host} {uri}: {e}");
            } else {
                log::debug!("{host} {uri}: {e}");
            }
            response::error_response(&e, router.suffix(), &state.link_port)
        }
    }
}

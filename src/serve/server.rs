// src/serve/server.rs

//! Static file server with live reload.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::engine::BuildCompleted;
use crate::errors::Result;
use crate::serve::browser;
use crate::serve::reload::ReloadHub;

pub const LIVERELOAD_PATH: &str = "/__livereload";
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";

const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__livereload");
  source.addEventListener("reload", function () {
    window.location.reload();
  });
})();
"#;

const SCRIPT_TAG: &str = r#"<script src="/__livereload.js"></script>"#;

/// Largest HTML document the server will rewrite.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
    pub live_reload: bool,
    pub open_browser: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            live_reload: true,
            open_browser: false,
        }
    }
}

#[derive(Debug, Clone)]
struct ServerState {
    root: Arc<PathBuf>,
    hub: ReloadHub,
    live_reload: bool,
}

/// Build the router serving `root`.
///
/// With `live_reload`, HTML responses get the reload client injected and
/// the SSE endpoint is mounted.
pub fn router(root: impl Into<PathBuf>, hub: ReloadHub, live_reload: bool) -> Router {
    let state = ServerState {
        root: Arc::new(root.into()),
        hub,
        live_reload,
    };

    let mut router = Router::new();
    if live_reload {
        router = router
            .route(LIVERELOAD_PATH, get(reload_events))
            .route(LIVERELOAD_SCRIPT_PATH, get(client_script));
    }
    router.fallback(static_files).with_state(state)
}

async fn reload_events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    debug!("live-reload client connected");

    // A lagged receiver still means "something was rebuilt".
    let stream = BroadcastStream::new(state.hub.subscribe()).map(|msg| {
        let task = match msg {
            Ok(reload) => reload.task,
            Err(_lagged) => "*".to_string(),
        };
        Ok(Event::default().event("reload").data(task))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

async fn static_files(State(state): State<ServerState>, req: Request) -> Response {
    let inject = state.live_reload && req.method() == Method::GET;

    let response = match ServeDir::new(state.root.as_ref()).oneshot(req).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if !inject || response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to buffer HTML for live-reload injection");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], SCRIPT_TAG, &html[idx..]),
        None => format!("{html}{SCRIPT_TAG}"),
    }
}

/// A running dev server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    hub: ReloadHub,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<std::io::Result<()>>,
    forwarder: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Stop accepting connections. Live-reload streams never end on their
    /// own, so the server is aborted if it has not stopped within a second.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.forwarder.abort();

        match tokio::time::timeout(Duration::from_secs(1), &mut self.server).await {
            Ok(Ok(Ok(()))) => info!("dev server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "dev server stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "dev server task failed"),
            Err(_) => {
                self.server.abort();
                info!("dev server aborted after shutdown timeout");
            }
        }
    }
}

/// Start serving `root` on `options.host:options.port`.
///
/// Every message on `builds` becomes a reload event for connected browsers.
/// The server never triggers builds itself.
pub async fn serve(
    root: impl Into<PathBuf>,
    options: ServeOptions,
    builds: broadcast::Receiver<BuildCompleted>,
) -> Result<ServerHandle> {
    let root = root.into();
    let listener = TcpListener::bind((options.host.as_str(), options.port)).await?;
    let addr = listener.local_addr()?;

    let hub = ReloadHub::default();
    let forwarder = hub.forward(builds);
    let app = router(root.clone(), hub.clone(), options.live_reload);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let url = format!("http://{addr}/");
    info!(%addr, root = ?root, live_reload = options.live_reload, "dev server listening on {url}");

    if options.open_browser {
        if let Err(e) = browser::open(&url) {
            warn!(error = %e, "could not open browser");
        }
    }

    Ok(ServerHandle {
        addr,
        hub,
        shutdown_tx: Some(shutdown_tx),
        server,
        forwarder,
    })
}

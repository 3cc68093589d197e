//! Local range server
//!
//! Serves files from the local filesystem to the in-process player over
//! HTTP, honoring single byte ranges so the player can seek.
//!
//! Route: `GET|HEAD /file?path=<absolute path or file:// URL>`

pub mod range;
mod stream;

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::settings::ServerSettings;

pub use range::{RangeError, RangeRequest};
pub use stream::{
    CHUNK_SIZE, FileChunks, FileStreamResponse, normalize_path, stream_local_file,
};

#[derive(Debug, Deserialize)]
struct FileQuery {
    path: String,
}

async fn file_handler(Query(query): Query<FileQuery>, headers: HeaderMap) -> Response {
    // A Range header that is not valid text can never be satisfied
    let range = headers
        .get(header::RANGE)
        .map(|v| v.to_str().unwrap_or_default());

    let response = match normalize_path(&query.path) {
        Some(path) => stream_local_file(&path, range).await,
        None => FileStreamResponse::not_found(),
    };
    response.into_response()
}

/// Router with the file route, for embedding into another axum app
pub fn router() -> Router {
    Router::new().route("/file", get(file_handler))
}

/// Handle to a running local file server
///
/// Dropping the handle also stops the server.
#[derive(Debug)]
pub struct LocalFileServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl LocalFileServer {
    /// Bind and start serving in the background
    pub async fn start(settings: &ServerSettings) -> Result<Self> {
        let bind = settings.bind_addr();
        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind local file server on {}", bind))?;
        let addr = listener
            .local_addr()
            .context("Failed to read local file server address")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, router())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Local file server error: {}", e);
            }
            info!("Local file server on {} stopped", addr);
        });

        info!("Local file server listening on http://{}", addr);
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Virtual address the player should open for `path`
    pub fn url_for_path(&self, path: &Path) -> String {
        format!(
            "http://{}/file?path={}",
            self.addr,
            urlencoding::encode(&path.to_string_lossy())
        )
    }

    /// Same as `url_for_path`, resolving a relative `path` against the
    /// current directory first
    pub fn url_for_file(&self, path: &Path) -> std::io::Result<String> {
        Ok(self.url_for_path(&std::path::absolute(path)?))
    }

    /// Stop accepting connections; in-flight responses are allowed to finish
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

//! HTTP server for rendered shots.
//!
//! The set of shots is refreshed by rescanning the served directory on a
//! timer. Each scan produces a brand new [`RoutingTable`] which replaces the
//! active one in a single pointer swap; requests hold on to whichever table
//! was active when they started.

pub mod assets;
pub mod shots;
pub mod table;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, Router};
use rand::Rng;
use tower::ServiceExt;

use crate::config::ServeConfig;
use crate::error::{Error, Result};
use crate::wait::Shutdown;

pub use assets::Assets;
pub use shots::{find_shots, MapshotJson, ShotInfo, DESCRIPTOR_FILE};
pub use table::{LatestJson, RoutingTable, ShotsJson, ShotsJsonInfo, ShotsJsonSave};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Initializing = 0,
    Active = 1,
    Rebuilding = 2,
}

/// Serves the shots found under a directory.
#[derive(Debug)]
pub struct Server {
    base_dir: PathBuf,
    config: ServeConfig,
    listing: Assets,
    viewer: Assets,
    state: AtomicU8,
    table: Mutex<Arc<RoutingTable>>,
}

impl Server {
    /// Creates the server and runs the first scan. A failing first scan
    /// still installs an empty table.
    pub fn new(base_dir: impl Into<PathBuf>, config: ServeConfig) -> Self {
        let server = Self {
            base_dir: base_dir.into(),
            config,
            listing: assets::LISTING,
            viewer: assets::VIEWER,
            state: AtomicU8::new(ServerState::Initializing as u8),
            table: Mutex::new(Arc::new(RoutingTable::default())),
        };
        server.update();
        server
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn state(&self) -> ServerState {
        match self.state.load(Ordering::Acquire) {
            0 => ServerState::Initializing,
            2 => ServerState::Rebuilding,
            _ => ServerState::Active,
        }
    }

    /// The active routing table.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Rescans and swaps in a new table. Returns false when the scan failed
    /// and the previous table was kept.
    pub fn update(&self) -> bool {
        let first = self.state() == ServerState::Initializing;
        if !first {
            self.state.store(ServerState::Rebuilding as u8, Ordering::Release);
        }

        let scanned = find_shots(&self.base_dir);
        let swapped = match scanned {
            Ok(shots) => {
                let table = Arc::new(RoutingTable::build(shots));
                tracing::debug!(shots = table.shot_count(), "routing table rebuilt");
                let mut guard = self.table.lock().unwrap_or_else(|e| e.into_inner());
                let old = std::mem::replace(&mut *guard, table);
                drop(guard);
                // The previous table may be freed here, outside the lock.
                drop(old);
                true
            }
            Err(e) => {
                tracing::error!(dir = %self.base_dir.display(), error = %e, "unable to find mapshots");
                false
            }
        };

        self.state.store(ServerState::Active as u8, Ordering::Release);
        swapped
    }

    fn next_delay(&self) -> Duration {
        let jitter = self.config.jitter.as_millis() as u64;
        let extra = if jitter == 0 { 0 } else { rand::thread_rng().gen_range(0..jitter) };
        self.config.refresh + Duration::from_millis(extra)
    }

    /// Rescans regularly until `shutdown` fires.
    pub async fn watch(self: Arc<Self>, mut shutdown: Shutdown) {
        loop {
            let delay = self.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return,
            }
            let server = self.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || server.update()).await {
                tracing::error!(error = %e, "rescan task failed");
            }
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(dispatch).with_state(self)
    }

    /// Serves HTTP on `port` and keeps the shots fresh, until `shutdown`.
    pub async fn run(self: Arc<Self>, shutdown: Shutdown) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::Server)?;
        tracing::info!(%addr, dir = %self.base_dir.display(), "listening");

        tokio::spawn(self.clone().watch(shutdown.clone()));

        let mut stop = shutdown;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
            .map_err(Error::Server)
    }
}

async fn dispatch(State(server): State<Arc<Server>>, req: Request) -> Response {
    let table = server.table();
    let raw: Vec<String> = req.uri().path().split('/').skip(1).map(str::to_string).collect();
    let segments: Vec<String> = raw.iter().map(|s| percent_decode(s)).collect();

    match segments.first().map(String::as_str) {
        Some("shots.json") if segments.len() == 1 => Json(table.listing()).into_response(),
        Some("latest") => match table.latest(&segments[1..].join("/")) {
            Some(latest) => Json(latest).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Some("data") => serve_shot(&table, &segments[1..], &raw[1..], req).await,
        Some("map") => server.viewer.serve(segments.get(1).map_or("", String::as_str)),
        _ => server.listing.serve(segments.first().map_or("", String::as_str)),
    }
}

async fn serve_shot(table: &RoutingTable, segments: &[String], raw: &[String], mut req: Request) -> Response {
    let Some((route, used)) = table.find_shot(segments) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if segments.len() == used {
        return Redirect::permanent(&route.path).into_response();
    }

    let mut rest = format!("/{}", raw[used..].join("/"));
    if let Some(query) = req.uri().query() {
        rest = format!("{}?{}", rest, query);
    }
    match rest.parse::<Uri>() {
        Ok(uri) => *req.uri_mut() = uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    }

    match route.service.clone().oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(never) => match never {},
    }
}

/// Decodes `%XX` escapes of a path segment. Invalid escapes are kept as is.
fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("my%20base"), "my base");
        assert_eq!(percent_decode("plain"), "plain");
        assert_eq!(percent_decode("bad%zzx"), "bad%zzx");
        assert_eq!(percent_decode("end%2"), "end%2");
        assert_eq!(percent_decode("tail%41"), "tailA");
        assert_eq!(percent_decode("%C3%A9t%C3%A9"), "été");
    }

    #[test]
    fn test_failed_first_scan_installs_empty_table() {
        let tmp = tempfile::tempdir().unwrap();
        let server = Server::new(tmp.path().join("missing"), ServeConfig::default());
        assert_eq!(server.state(), ServerState::Active);
        assert_eq!(server.table().shot_count(), 0);
    }

    #[test]
    fn test_swap_releases_previous_table() {
        let tmp = tempfile::tempdir().unwrap();
        let server = Server::new(tmp.path(), ServeConfig::default());
        let before = server.table();
        assert_eq!(Arc::strong_count(&before), 2);

        assert!(server.update());
        assert!(!Arc::ptr_eq(&before, &server.table()));
        // Only this reader still holds the old table.
        assert_eq!(Arc::strong_count(&before), 1);
        assert_eq!(before.shot_count(), 0);
    }

    #[test]
    fn test_next_delay_bounds() {
        let tmp = tempfile::tempdir().unwrap();
        let server = Server::new(tmp.path(), ServeConfig::default());
        for _ in 0..50 {
            let d = server.next_delay();
            assert!(d >= Duration::from_secs(8) && d < Duration::from_secs(10));
        }
    }
}

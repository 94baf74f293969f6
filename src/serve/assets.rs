//! Built-in listing and viewer pages.

use axum::http::header;
use axum::response::{IntoResponse, Response};

/// A set of embedded files. Unknown names fall back to `index.html`.
#[derive(Debug, Clone, Copy)]
pub struct Assets {
    files: &'static [(&'static str, &'static str)],
}

pub const LISTING: Assets = Assets {
    files: &[("index.html", include_str!("../../assets/listing/index.html"))],
};

pub const VIEWER: Assets = Assets {
    files: &[("index.html", include_str!("../../assets/viewer/index.html"))],
};

fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

impl Assets {
    pub fn get(&self, name: &str) -> Option<(&'static str, &'static str)> {
        self.files.iter().find(|(n, _)| *n == name).copied()
    }

    /// Serves `name`, or `index.html` when there is no such file.
    pub fn serve(&self, name: &str) -> Response {
        match self.get(name).or_else(|| self.get("index.html")) {
            Some((name, content)) => ([(header::CONTENT_TYPE, content_type(name))], content).into_response(),
            None => axum::http::StatusCode::NOT_FOUND.into_response(),
        }
    }
}

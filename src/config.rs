//! Configuration built once at startup and handed to each component.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// How to find and drive a Factorio install.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Factorio data dir; default locations are tried when unset.
    pub datadir: Option<PathBuf>,
    /// Script-output dir; `<datadir>/script-output` when unset.
    pub script_output: Option<PathBuf>,
    /// Factorio binary; default locations are tried when unset.
    pub binary: Option<PathBuf>,
    /// Stream Factorio stdout/stderr to the console.
    pub verbose: bool,
    /// On cancellation, wait for Factorio to exit instead of stopping it.
    pub keep_running: bool,
    /// Extra arguments for Factorio, split on spaces.
    pub extra_args: String,
    /// Fixed working directory; a temporary one is created when unset.
    pub work_dir: Option<PathBuf>,
}

impl Settings {
    pub fn extra_args(&self) -> Vec<String> {
        self.extra_args
            .split(' ')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Rendering parameters. `None` lets the mod pick its own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderParams {
    /// `all` for every existing chunk, `entities` for chunks with player builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// In-game size of a tile for the most zoomed layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilemin: Option<i64>,
    /// In-game size of a tile for the least zoomed layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilemax: Option<i64>,
    /// Prefix of all generated filenames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Pixel size of generated tiles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<i64>,
    /// Compression quality for jpg files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpgquality: Option<i64>,
    /// Game surface to render.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    /// Base delay between two rescans.
    pub refresh: Duration,
    /// Upper bound of the random delay added to `refresh`.
    pub jitter: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            refresh: Duration::from_secs(8),
            jitter: Duration::from_secs(2),
        }
    }
}

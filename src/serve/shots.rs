//! Discovering rendered shots on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Descriptor file written by the mod in each shot directory.
pub const DESCRIPTOR_FILE: &str = "mapshot.json";

/// The part of `mapshot.json` used here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapshotJson {
    #[serde(default)]
    pub surface: String,
    #[serde(default)]
    pub ticks_played: i64,
}

/// A shot found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotInfo {
    /// Path relative to the scanned root, `/`-separated.
    pub name: String,
    /// HTTP path where the shot files are served, with trailing slash.
    pub path: String,
    /// Grouping key: the directory above the shot, `/`-separated.
    pub savename: String,
    pub fs_path: PathBuf,
    pub info: MapshotJson,
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walks `base_dir` for shots, in lexical order.
///
/// Failing to read the root is an error. Unreadable subdirectories and bad
/// descriptors are logged and skipped.
pub fn find_shots(base_dir: &Path) -> Result<Vec<ShotInfo>> {
    let root = base_dir.canonicalize().map_err(Error::io("unable to resolve", base_dir))?;
    tracing::debug!(root = %root.display(), "looking for shots");

    let mut shots = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::Io { context: "unable to walk", path: root, source: e.into() });
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path");
                continue;
            }
        };
        if entry.file_name() != DESCRIPTOR_FILE || entry.file_type().is_dir() {
            continue;
        }
        if let Some(shot) = load_shot(&root, entry.path()) {
            shots.push(shot);
        }
    }
    Ok(shots)
}

fn load_shot(root: &Path, descriptor: &Path) -> Option<ShotInfo> {
    tracing::debug!(path = %descriptor.display(), "found descriptor");
    let raw = match std::fs::read(descriptor) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(path = %descriptor.display(), error = %e, "descriptor is not readable");
            return None;
        }
    };
    let info: MapshotJson = match serde_json::from_slice(&raw) {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(path = %descriptor.display(), error = %e, "descriptor does not have valid JSON");
            return None;
        }
    };

    let fs_path = descriptor.parent()?.to_path_buf();
    let rel = fs_path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        tracing::warn!(path = %descriptor.display(), "descriptor at the root of the served dir, ignored");
        return None;
    }

    let name = to_slash(rel);
    let savename = match rel.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => to_slash(parent),
        _ => name.clone(),
    };
    Some(ShotInfo {
        path: format!("/data/{}/", name),
        name,
        savename,
        fs_path,
        info,
    })
}

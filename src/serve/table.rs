//! Immutable routing table built from one scan.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use super::shots::ShotInfo;

/// Listing sent to the UI (`/shots.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotsJson {
    pub all: Vec<ShotsJsonSave>,
}

/// All versions of one save, most advanced first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotsJsonSave {
    pub savename: String,
    pub versions: Vec<ShotsJsonInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotsJsonInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ticks_played: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub surface: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Viewer configuration pointing at a shot (`/latest/<savename>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestJson {
    pub path: String,
}

/// Static file serving for one shot.
#[derive(Debug, Clone)]
pub struct ShotRoute {
    /// Decoded path segments after `/data/`.
    pub segments: Vec<String>,
    /// HTTP path prefix, with trailing slash.
    pub path: String,
    pub fs_path: PathBuf,
    pub service: ServeDir,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// Longest prefix first.
    shots: Vec<ShotRoute>,
    latest: HashMap<String, LatestJson>,
    listing: ShotsJson,
}

impl RoutingTable {
    /// Builds a table from scanned shots, in discovery order.
    pub fn build(mut shots: Vec<ShotInfo>) -> Self {
        // Stable: equal ticks keep discovery order.
        shots.sort_by(|a, b| b.info.ticks_played.cmp(&a.info.ticks_played));

        let mut saves: BTreeMap<&str, Vec<ShotsJsonInfo>> = BTreeMap::new();
        for shot in &shots {
            saves.entry(shot.savename.as_str()).or_default().push(ShotsJsonInfo {
                name: shot.name.clone(),
                path: shot.path.clone(),
                ticks_played: shot.info.ticks_played,
                surface: shot.info.surface.clone(),
            });
        }
        let listing = ShotsJson {
            all: saves
                .into_iter()
                .map(|(savename, versions)| ShotsJsonSave { savename: savename.to_string(), versions })
                .collect(),
        };

        let latest = listing
            .all
            .iter()
            .filter_map(|save| {
                let top = save.versions.first()?;
                Some((save.savename.clone(), LatestJson { path: top.path.clone() }))
            })
            .collect();

        let mut routes: Vec<ShotRoute> = shots
            .iter()
            .map(|shot| ShotRoute {
                segments: shot.name.split('/').map(str::to_string).collect(),
                path: shot.path.clone(),
                fs_path: shot.fs_path.clone(),
                service: ServeDir::new(&shot.fs_path),
            })
            .collect();
        routes.sort_by(|a, b| b.segments.len().cmp(&a.segments.len()));

        Self { shots: routes, latest, listing }
    }

    pub fn listing(&self) -> &ShotsJson {
        &self.listing
    }

    pub fn latest(&self, savename: &str) -> Option<&LatestJson> {
        self.latest.get(savename)
    }

    pub fn shot_count(&self) -> usize {
        self.shots.len()
    }

    /// Finds the shot serving the decoded `segments` (the path after
    /// `/data/`). Returns the route and how many segments it consumed.
    pub fn find_shot(&self, segments: &[String]) -> Option<(&ShotRoute, usize)> {
        self.shots
            .iter()
            .find(|route| segments.len() >= route.segments.len() && segments[..route.segments.len()] == route.segments[..])
            .map(|route| (route, route.segments.len()))
    }
}

//! Guessing where Factorio is installed.
//!
//! Candidate lists are in reverse order of priority: the last existing
//! candidate wins. An explicit path replaces the whole list.

use std::path::{Path, PathBuf};

/// Expands a leading `~` against the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix('~') {
        None => Some(PathBuf::from(path)),
        Some(rest) => {
            let home = dirs::home_dir()?;
            Some(home.join(rest.trim_start_matches(['/', '\\'])))
        }
    }
}

fn data_dir_candidates() -> Vec<String> {
    let mut candidates: Vec<String> = [
        "/opt/factorio",
        "~/.factorio",
        "~/factorio",
        "~/Library/Application Support/factorio",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    if let Ok(appdata) = std::env::var("APPDATA") {
        if !appdata.is_empty() {
            candidates.push(Path::new(&appdata).join("Factorio").to_string_lossy().into_owned());
        }
    }
    candidates
}

fn binary_candidates() -> Vec<String> {
    // Steam installs are hard to start/stop reliably, so they are not listed.
    let mut candidates: Vec<String> = [
        "/opt/factorio/bin/x64/factorio",
        "/usr/bin/factorio",
        "~/factorio/bin/x64/factorio",
        "~/.factorio/bin/x64/factorio",
        "/Applications/factorio.app/Contents/MacOS/factorio",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    if let Ok(programs) = std::env::var("ProgramW6432") {
        if !programs.is_empty() {
            let exe = Path::new(&programs).join("Factorio").join("bin").join("x64").join("factorio.exe");
            candidates.push(exe.to_string_lossy().into_owned());
        }
    }
    candidates
}

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Dir,
    File,
}

fn pick_last(candidates: &[String], kind: Kind) -> Option<PathBuf> {
    let mut found = None;
    for candidate in candidates {
        let Some(path) = expand_home(candidate) else {
            tracing::debug!(candidate = %candidate, "unable to expand home dir");
            continue;
        };
        let Ok(meta) = std::fs::metadata(&path) else {
            tracing::debug!(path = %path.display(), "does not exist, skipped");
            continue;
        };
        if meta.is_dir() != (kind == Kind::Dir) {
            tracing::debug!(path = %path.display(), is_dir = meta.is_dir(), "wrong file type, skipped");
            continue;
        }
        tracing::debug!(path = %path.display(), "candidate found");
        found = Some(path);
    }
    found
}

fn to_candidates(explicit: Option<&Path>, defaults: Vec<String>) -> Vec<String> {
    match explicit {
        Some(p) => vec![p.to_string_lossy().into_owned()],
        None => defaults,
    }
}

/// Locates the Factorio data dir (saves, mods, script-output).
pub fn find_data_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    let found = pick_last(&to_candidates(explicit, data_dir_candidates()), Kind::Dir);
    match &found {
        Some(p) => tracing::info!(datadir = %p.display(), "using factorio data dir"),
        None => tracing::info!("no factorio data dir found"),
    }
    found
}

/// Locates the Factorio binary.
pub fn find_binary(explicit: Option<&Path>) -> Option<PathBuf> {
    let found = pick_last(&to_candidates(explicit, binary_candidates()), Kind::File);
    match &found {
        Some(p) => tracing::info!(binary = %p.display(), "using factorio binary"),
        None => tracing::info!("no factorio binary found"),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/opt/factorio"), Some(PathBuf::from("/opt/factorio")));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.factorio"), Some(home.join(".factorio")));
        }
    }

    #[test]
    fn test_last_existing_candidate_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let file = tmp.path().join("file");
        std::fs::create_dir(&a).unwrap();
        std::fs::create_dir(&b).unwrap();
        std::fs::write(&file, "").unwrap();

        let candidates: Vec<String> = [&a, &b, &file, &tmp.path().join("missing")]
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        assert_eq!(pick_last(&candidates, Kind::Dir), Some(b));
        assert_eq!(pick_last(&candidates, Kind::File), Some(file));
    }

    #[test]
    fn test_explicit_replaces_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(find_data_dir(Some(tmp.path())), Some(tmp.path().to_path_buf()));
        assert_eq!(find_data_dir(Some(&tmp.path().join("nope"))), None);
        assert_eq!(find_binary(Some(tmp.path())), None);
    }
}

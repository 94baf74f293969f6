//! Companion Factorio mod for mapshot.
//!
//! The mod files live under `mod/` and are embedded at compile time. The
//! renderer deploys them into a staged mod directory; `package` bundles them
//! into the zip layout the Factorio mod portal expects.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

/// Name of the mod, as used in `mod-list.json` and as directory name.
pub const NAME: &str = "mapshot";

/// Name of the file the renderer overwrites to pass parameters to the mod.
pub const OVERRIDES_FILE: &str = "overrides.lua";

/// Embedded mod files, as (relative filename, content).
pub const FILES: &[(&str, &str)] = &[
    ("info.json", include_str!("../mod/info.json")),
    ("control.lua", include_str!("../mod/control.lua")),
    ("overrides.lua", include_str!("../mod/overrides.lua")),
    ("changelog.txt", include_str!("../mod/changelog.txt")),
];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to build zip {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("embedded info.json has no version")]
    MissingVersion,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Version of the mod, from the embedded `info.json`.
pub fn version() -> Result<String> {
    let info: serde_json::Value =
        serde_json::from_str(include_str!("../mod/info.json")).map_err(|_| Error::MissingVersion)?;
    info.get("version")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(Error::MissingVersion)
}

/// Writes all mod files into `dir`, creating it if needed.
pub fn install(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.to_path_buf(), source })?;
    for (name, content) in FILES {
        let dst = dir.join(name);
        std::fs::write(&dst, content).map_err(|source| Error::Io { path: dst, source })?;
    }
    tracing::debug!(dir = %dir.display(), files = FILES.len(), "mod files installed");
    Ok(())
}

/// Creates `mapshot_<version>.zip` in `target_dir` and returns its path.
///
/// Files are stored under a `mapshot_<version>/` prefix inside the archive.
pub fn package(target_dir: &Path) -> Result<PathBuf> {
    let name = format!("{}_{}", NAME, version()?);
    let zip_path = target_dir.join(format!("{}.zip", name));

    let file = File::create(&zip_path).map_err(|source| Error::Io { path: zip_path.clone(), source })?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (filename, content) in FILES {
        writer
            .start_file(format!("{}/{}", name, filename), options)
            .map_err(|source| Error::Zip { path: zip_path.clone(), source })?;
        writer
            .write_all(content.as_bytes())
            .map_err(|source| Error::Io { path: zip_path.clone(), source })?;
    }
    writer
        .finish()
        .map_err(|source| Error::Zip { path: zip_path.clone(), source })?;

    tracing::info!(path = %zip_path.display(), "mod package written");
    Ok(zip_path)
}

//! Tooling to interact with a Factorio install: its files and its binary.

pub mod discover;
pub mod modlist;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::wait::Shutdown;

pub use modlist::{enable_mod, ModList, ModListEntry, MOD_LIST_FILE};

/// Data dir subdirectory for mods.
pub const MODS_DIR: &str = "mods";
/// Data dir subdirectory for game saves.
pub const SAVES_DIR: &str = "saves";
/// Data dir subdirectory where mods can write files.
pub const SCRIPT_OUTPUT_DIR: &str = "script-output";

/// A located Factorio install.
#[derive(Debug, Clone)]
pub struct Factorio {
    datadir: PathBuf,
    script_output: PathBuf,
    binary: PathBuf,
    verbose: bool,
    keep_running: bool,
    extra_args: Vec<String>,
}

impl Factorio {
    pub fn new(settings: &Settings) -> Result<Self> {
        let datadir = discover::find_data_dir(settings.datadir.as_deref()).ok_or(Error::NoDataDir)?;
        let script_output = script_output(settings, Some(&datadir))?;
        let binary = discover::find_binary(settings.binary.as_deref()).ok_or(Error::NoBinary)?;

        Ok(Self {
            datadir,
            script_output,
            binary,
            verbose: settings.verbose,
            keep_running: settings.keep_running,
            extra_args: settings.extra_args(),
        })
    }

    /// Where saves, mods and others are located.
    pub fn data_dir(&self) -> &Path {
        &self.datadir
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.datadir.join(MODS_DIR)
    }

    /// Where mods can write data.
    pub fn script_output(&self) -> &Path {
        &self.script_output
    }

    /// Finds a savegame: as given, with `.zip`, then in the saves dir with
    /// and without `.zip`. First existing file wins.
    pub fn find_save_file(&self, name: &str) -> Result<PathBuf> {
        let saves = self.datadir.join(SAVES_DIR);
        let candidates = [
            PathBuf::from(name),
            PathBuf::from(format!("{}.zip", name)),
            saves.join(format!("{}.zip", name)),
            saves.join(name),
        ];
        for candidate in candidates {
            match std::fs::metadata(&candidate) {
                Ok(_) => {
                    tracing::info!(save = name, path = %candidate.display(), "save found");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(save = name, path = %candidate.display(), "save candidate does not exist");
                }
                Err(e) => return Err(Error::io("unable to stat", candidate)(e)),
            }
        }
        Err(Error::SaveNotFound { name: name.to_string() })
    }

    /// Creates a mods directory at `dst` based on the current one, leaving out
    /// the mods named in `exclude` both as files and in `mod-list.json`.
    pub fn copy_mods(&self, dst: &Path, exclude: &[&str]) -> Result<()> {
        let src = self.mods_dir();
        std::fs::create_dir_all(dst).map_err(Error::io("unable to create dir", dst))?;

        let entries = std::fs::read_dir(&src).map_err(Error::io("unable to read directory", &src))?;
        let mut found_mod_list = false;
        for entry in entries {
            let entry = entry.map_err(Error::io("unable to read directory", &src))?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            let from = entry.path();
            let to = dst.join(&filename);

            if filename == MOD_LIST_FILE {
                let mut list = ModList::load(&from)?;
                list.remove(exclude);
                list.write(&to)?;
                found_mod_list = true;
                continue;
            }

            // Mod archives and dirs are named `<name>_<version>`.
            let mod_name = filename.rsplit_once('_').map_or(filename.as_str(), |(name, _)| name);
            if exclude.contains(&mod_name) {
                tracing::info!(path = %from.display(), "ignoring excluded mod");
                continue;
            }
            copy_tree(&from, &to)?;
            tracing::debug!(from = %from.display(), to = %to.display(), "copied mod file");
        }

        if !found_mod_list {
            return Err(Error::ModListMissing { dir: src });
        }
        Ok(())
    }

    /// Runs Factorio with `args`, followed by the configured extra args.
    ///
    /// When `stop` fires Factorio is asked to terminate, unless
    /// `keep_running` is set. Either way this returns once it has exited.
    pub async fn run(&self, args: &[String], mut stop: Shutdown) -> Result<ExitStatus> {
        let mut all_args = args.to_vec();
        all_args.extend(self.extra_args.iter().cloned());
        tracing::info!(binary = %self.binary.display(), args = ?all_args, "running factorio");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&all_args).stdin(Stdio::null()).kill_on_drop(true);
        if !self.verbose {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let mut child = cmd.spawn().map_err(Error::io("unable to start", &self.binary))?;

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = stop.cancelled() => None,
        };
        let status = match exited {
            Some(status) => status,
            None => {
                if self.keep_running {
                    tracing::info!("interrupt requested, but keep_running specified");
                } else {
                    tracing::info!("interrupt requested");
                    interrupt(&mut child);
                }
                child.wait().await
            }
        }
        .map_err(Error::io("unable to wait for", &self.binary))?;

        tracing::info!(%status, "factorio returned");
        Ok(status)
    }
}

/// Script-output dir from the settings. The default location is not required
/// to exist yet; Factorio creates it on demand.
pub fn script_output(settings: &Settings, datadir: Option<&Path>) -> Result<PathBuf> {
    let Some(dir) = &settings.script_output else {
        let datadir = match datadir {
            Some(d) => d.to_path_buf(),
            None => discover::find_data_dir(settings.datadir.as_deref()).ok_or(Error::NoDataDir)?,
        };
        return Ok(datadir.join(SCRIPT_OUTPUT_DIR));
    };
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(dir.clone()),
        Ok(_) => Err(Error::ScriptOutput { path: dir.clone(), reason: "is a file, not a directory" }),
        Err(_) => Err(Error::ScriptOutput { path: dir.clone(), reason: "does not exist" }),
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child) {
    // No pid means it already exited.
    if let Some(pid) = child.id() {
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
        if rc != 0 {
            tracing::warn!(pid, error = %std::io::Error::last_os_error(), "unable to interrupt factorio");
        }
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    // No polite interrupt available here.
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "unable to stop factorio");
    }
}

/// Copies a file or a directory tree, following symlinks.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            Error::Io { context: "unable to walk", path, source: e.into() }
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(Path::new(""));
        let target = if rel.as_os_str().is_empty() { dst.to_path_buf() } else { dst.join(rel) };

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(Error::io("unable to create dir", &target))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(Error::io("unable to copy to", &target))?;
        }
    }
    Ok(())
}

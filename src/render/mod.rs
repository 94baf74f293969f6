//! Rendering a save through Factorio.
//!
//! A run stages its own copy of the save and of the mods directory, with the
//! companion mod injected and told to render on startup. Factorio is then
//! started on the staged files, and the run waits for the mod to write the
//! `mapshot-done-<run id>` marker in script-output. The marker content is the
//! output subdirectory of the shot.

pub mod overrides;
pub mod workdir;

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::RenderParams;
use crate::error::{Error, Result};
use crate::factorio::{enable_mod, Factorio};
use crate::wait::{next_wake, shutdown_channel, Shutdown, ShutdownTrigger, Wake};

pub use overrides::Overrides;
pub use workdir::WorkDir;

/// Prefix of the marker file the mod writes when done.
pub const DONE_PREFIX: &str = "mapshot-done-";

/// How often the marker file is checked for.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub run_id: String,
    /// Shot name, derived from the save name.
    pub name: String,
    /// Save file that was rendered.
    pub save: PathBuf,
    /// Directory holding the generated tiles.
    pub output: PathBuf,
}

/// Name of the shot for a save reference: its file name without extension.
pub fn shot_name(save: &str) -> String {
    Path::new(save)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| save.to_string())
}

/// Location of the completion marker of a run.
pub fn marker_path(script_output: &Path, run_id: &str) -> PathBuf {
    script_output.join(format!("{}{}", DONE_PREFIX, run_id))
}

/// Fixed Factorio arguments to load a staged save with the staged mods.
pub fn factorio_args(save: &Path, mods: &Path) -> Vec<String> {
    vec![
        "--disable-audio".into(),
        "--disable-prototype-history".into(),
        "--load-game".into(),
        save.to_string_lossy().into_owned(),
        "--mod-directory".into(),
        mods.to_string_lossy().into_owned(),
    ]
}

/// Files of a run, inside its working directory.
struct Staged {
    save: PathBuf,
    mods: PathBuf,
}

enum Waited {
    Marker,
    /// The marker was written, then Factorio exited before the next poll.
    MarkerThenExited(Result<ExitStatus>),
    Exited(Result<ExitStatus>),
    Cancelled,
    Failed(Error),
}

/// Stops Factorio when dropped, so that dropping a render future midway
/// still brings the engine down.
struct StopOnDrop(ShutdownTrigger);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.trigger();
    }
}

/// Removes a marker left over from an earlier run with the same id.
pub fn remove_stale_marker(marker: &Path) -> Result<()> {
    match std::fs::remove_file(marker) {
        Ok(()) => {
            tracing::warn!(path = %marker.display(), "removed stale done-file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("unable to remove", marker)(e)),
    }
}

/// Drives Factorio to render saves.
#[derive(Debug, Clone)]
pub struct Renderer {
    fact: Factorio,
    work_dir: Option<PathBuf>,
    poll_interval: Duration,
}

impl Renderer {
    pub fn new(fact: Factorio, work_dir: Option<PathBuf>) -> Self {
        Self { fact, work_dir, poll_interval: POLL_INTERVAL }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn factorio(&self) -> &Factorio {
        &self.fact
    }

    /// Renders `save` (a path, or a name from the saves dir).
    ///
    /// When `shutdown` fires, Factorio is interrupted and this returns
    /// [`Error::Cancelled`]. The working directory is cleaned up on every
    /// path, once Factorio has exited. Dropping the returned future also
    /// stops Factorio; cleanup then completes in the background.
    pub async fn render(&self, save: &str, params: &RenderParams, shutdown: Shutdown) -> Result<RenderOutput> {
        let run_id = Uuid::new_v4().to_string();
        let name = shot_name(save);
        tracing::info!(%run_id, %name, "render started");

        let work = WorkDir::acquire(self.work_dir.as_deref())?;
        let src_save = self.fact.find_save_file(save)?;
        let staged = self.stage(work.path(), &src_save, &name, &run_id, params)?;

        let marker = marker_path(self.fact.script_output(), &run_id);
        remove_stale_marker(&marker)?;

        let args = factorio_args(&staged.save, &staged.mods);
        let (stop_trigger, stop) = shutdown_channel();
        let stop_guard = StopOnDrop(stop_trigger);
        let fact = self.fact.clone();
        // The work dir lives as long as Factorio runs, even if this future is dropped.
        let mut engine = tokio::spawn(async move {
            let status = fact.run(&args, stop).await;
            drop(work);
            status
        });

        let waited = self.wait_for_marker(&marker, &mut engine, shutdown).await;
        // Whatever happened, Factorio is not needed anymore.
        drop(stop_guard);

        let (result, status) = match waited {
            Waited::Exited(res) => return Err(early_exit(res)),
            Waited::MarkerThenExited(status) => (self.read_marker(&marker), status),
            Waited::Cancelled => (Err(Error::Cancelled), join(engine).await),
            Waited::Failed(e) => (Err(e), join(engine).await),
            Waited::Marker => {
                let output = self.read_marker(&marker);
                (output, join(engine).await)
            }
        };
        let output = result?;
        match status {
            Ok(status) if !status.success() => {
                tracing::warn!(%status, "factorio exited with an error after rendering")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "factorio did not stop cleanly"),
        }

        Ok(RenderOutput { run_id, name, save: src_save, output })
    }

    fn stage(
        &self,
        work: &Path,
        src_save: &Path,
        name: &str,
        run_id: &str,
        params: &RenderParams,
    ) -> Result<Staged> {
        let save = work.join(format!("{}.zip", name));
        std::fs::copy(src_save, &save).map_err(Error::io("unable to copy save to", &save))?;
        tracing::info!(from = %src_save.display(), to = %save.display(), "copied save");

        // A stale mapshot install would shadow the one deployed here.
        let mods = work.join(crate::factorio::MODS_DIR);
        self.fact.copy_mods(&mods, &[mapshot_mod::NAME])?;

        let mod_dir = mods.join(mapshot_mod::NAME);
        mapshot_mod::install(&mod_dir)?;
        enable_mod(&mods, mapshot_mod::NAME)?;
        tracing::info!(dir = %mod_dir.display(), "mod created");

        Overrides { onstartup: run_id, shotname: name, params }.write(&mod_dir)?;
        Ok(Staged { save, mods })
    }

    async fn wait_for_marker(
        &self,
        marker: &Path,
        engine: &mut JoinHandle<Result<ExitStatus>>,
        mut shutdown: Shutdown,
    ) -> Waited {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            match marker.try_exists() {
                Ok(true) => {
                    tracing::info!(path = %marker.display(), "done file now exists");
                    return Waited::Marker;
                }
                Ok(false) => {}
                Err(e) => return Waited::Failed(Error::io("unable to stat", marker)(e)),
            }

            match next_wake(&mut ticker, engine, &mut shutdown).await {
                Wake::Tick => {}
                Wake::Event(joined) => {
                    let status = flatten(joined);
                    return match marker.try_exists() {
                        Ok(true) => {
                            tracing::info!(path = %marker.display(), "done file written before factorio exited");
                            Waited::MarkerThenExited(status)
                        }
                        _ => Waited::Exited(status),
                    };
                }
                Wake::Cancelled => {
                    tracing::info!("render cancelled");
                    return Waited::Cancelled;
                }
            }
        }
    }

    fn read_marker(&self, marker: &Path) -> Result<PathBuf> {
        let raw = std::fs::read_to_string(marker).map_err(Error::io("unable to read", marker))?;
        let output = self.fact.script_output().join(raw.trim_end());
        tracing::info!(output = %output.display(), "render output");

        if let Err(e) = std::fs::remove_file(marker) {
            tracing::warn!(path = %marker.display(), error = %e, "unable to remove done-file");
        }
        Ok(output)
    }
}

fn flatten(joined: std::result::Result<Result<ExitStatus>, tokio::task::JoinError>) -> Result<ExitStatus> {
    joined.unwrap_or_else(|e| Err(Error::EngineTask(e.to_string())))
}

async fn join(engine: JoinHandle<Result<ExitStatus>>) -> Result<ExitStatus> {
    flatten(engine.await)
}

fn early_exit(res: Result<ExitStatus>) -> Error {
    match res {
        Ok(status) if status.success() => Error::EngineExitedEarly { status },
        Ok(status) => Error::EngineFailed { status },
        Err(e) => e,
    }
}

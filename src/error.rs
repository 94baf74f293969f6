use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no factorio data dir found; use --factorio_datadir to specify its location")]
    NoDataDir,

    #[error("no factorio binary found; use --factorio_binary to specify its location")]
    NoBinary,

    #[error("script-output dir {path}: {reason}")]
    ScriptOutput { path: PathBuf, reason: &'static str },

    #[error("unable to find savegame {name:?}")]
    SaveNotFound { name: String },

    #[error("unable to find `mod-list.json` in {dir}")]
    ModListMissing { dir: PathBuf },

    #[error("error while running Factorio: {status}")]
    EngineFailed { status: ExitStatus },

    #[error("factorio exited early ({status}) without producing a mapshot")]
    EngineExitedEarly { status: ExitStatus },

    #[error("factorio task failed: {0}")]
    EngineTask(String),

    #[error("render cancelled")]
    Cancelled,

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("companion mod: {0}")]
    Mod(#[from] mapshot_mod::Error),

    #[error("http server: {0}")]
    Server(std::io::Error),
}

impl Error {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { context, path, source }
    }

    /// True for errors caused by a misconfigured install or bad arguments,
    /// detected before any subprocess is launched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::NoDataDir
                | Error::NoBinary
                | Error::ScriptOutput { .. }
                | Error::SaveNotFound { .. }
                | Error::ModListMissing { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

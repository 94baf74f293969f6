use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;

use mapshot::factorio::{self, Factorio};
use mapshot::render::Renderer;
use mapshot::serve::Server;
use mapshot::{shutdown_channel, RenderParams, ServeConfig, Settings, Shutdown};

#[derive(Parser)]
#[command(name = "mapshot")]
#[command(about = "mapshot generates zoomable screenshots for Factorio")]
struct Cli {
    #[command(flatten)]
    factorio: FactorioArgs,

    /// If specified, use this as working directory. Otherwise, create a
    /// temporary one and delete it on exit.
    #[arg(long = "work_dir", global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FactorioArgs {
    /// Path to factorio data dir. Tries default locations if empty.
    #[arg(long = "factorio_datadir", global = true)]
    datadir: Option<PathBuf>,

    /// Path to factorio script-output dir. Uses <datadir>/script-output if unspecified.
    #[arg(long = "factorio_scriptoutput", global = true)]
    script_output: Option<PathBuf>,

    /// Path to factorio binary. Tries default locations if empty.
    #[arg(long = "factorio_binary", global = true)]
    binary: Option<PathBuf>,

    /// Stream Factorio stdout/stderr to the console.
    #[arg(long = "factorio_verbose", global = true)]
    verbose: bool,

    /// Wait for Factorio to exit instead of stopping it.
    #[arg(long = "factorio_keep_running", global = true)]
    keep_running: bool,

    /// Extra args to give to Factorio, e.g. '--force-graphics-preset very-low'. Split on spaces.
    #[arg(long = "factorio_extra_args", global = true, default_value = "")]
    extra_args: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a screenshot from a save.
    Render {
        /// Save name or path.
        save: String,
        #[command(flatten)]
        params: RenderArgs,
    },
    /// Start a HTTP server giving access to the script-output content.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Generate the zip file of the Factorio mod.
    Package {
        /// Directory where to write the zip file.
        #[arg(default_value = ".")]
        target: PathBuf,
    },
    /// Show what mapshot knows about the Factorio install.
    Info,
    /// Show the version of the mod.
    Version,
}

/// Rendering parameters; 0 or empty uses the value from the game.
#[derive(Args)]
struct RenderArgs {
    /// How to pick the area to render: `all` for all existing chunks,
    /// `entities` for chunks with player builds.
    #[arg(long, default_value = "")]
    area: String,
    /// Size in in-game units of a tile for the most zoomed layer.
    #[arg(long, default_value_t = 0)]
    tilemin: i64,
    /// Size in in-game units of a tile for the least zoomed layer.
    #[arg(long, default_value_t = 0)]
    tilemax: i64,
    /// Prefix to add to all generated filenames.
    #[arg(long, default_value = "")]
    prefix: String,
    /// Pixel size of generated tiles.
    #[arg(long, default_value_t = 0)]
    resolution: i64,
    /// Compression quality for jpg files.
    #[arg(long, default_value_t = 0)]
    jpgquality: i64,
    /// Game surface to render.
    #[arg(long, default_value = "")]
    surface: String,
}

impl From<RenderArgs> for RenderParams {
    fn from(a: RenderArgs) -> Self {
        let text = |s: String| Some(s).filter(|s| !s.is_empty());
        let num = |v: i64| Some(v).filter(|v| *v != 0);
        RenderParams {
            area: text(a.area),
            tilemin: num(a.tilemin),
            tilemax: num(a.tilemax),
            prefix: text(a.prefix),
            resolution: num(a.resolution),
            jpgquality: num(a.jpgquality),
            surface: text(a.surface),
        }
    }
}

fn settings(cli: &Cli) -> Settings {
    Settings {
        datadir: cli.factorio.datadir.clone(),
        script_output: cli.factorio.script_output.clone(),
        binary: cli.factorio.binary.clone(),
        verbose: cli.factorio.verbose,
        keep_running: cli.factorio.keep_running,
        extra_args: cli.factorio.extra_args.clone(),
        work_dir: cli.work_dir.clone(),
    }
}

async fn run(cli: Cli, shutdown: Shutdown) -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings(&cli);
    match cli.command {
        Commands::Render { save, params } => {
            let fact = Factorio::new(&settings)?;
            let renderer = Renderer::new(fact, settings.work_dir.clone());
            println!("Generating mapshot {:?}, starting Factorio...", mapshot::render::shot_name(&save));
            let out = renderer.render(&save, &params.into(), shutdown).await?;
            println!("Rendered {}", out.save.display());
            println!("Output: {}", out.output.display());
        }
        Commands::Serve { port } => {
            let base_dir = factorio::script_output(&settings, None)?;
            println!("Serving data from {}", base_dir.display());
            let config = ServeConfig { port, ..Default::default() };
            let server = Arc::new(Server::new(base_dir, config));
            println!("Listening on :{} ...", port);
            server.run(shutdown).await?;
        }
        Commands::Package { target } => {
            let path = mapshot_mod::package(&target)?;
            println!("Mod package written to {}", path.display());
        }
        Commands::Info => {
            let fact = Factorio::new(&settings)?;
            println!("datadir: {}", fact.data_dir().display());
            println!("binary: {}", fact.binary().display());
            println!("script-output: {}", fact.script_output().display());
        }
        Commands::Version => {
            println!("{}", mapshot_mod::version()?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping...");
            trigger.trigger();
        }
    });

    if let Err(e) = run(cli, shutdown).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

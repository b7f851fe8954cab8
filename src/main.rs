use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exthost_bridge::{
    config::BridgeArgs,
    exthost,
    host::{self, WorkspaceSpec},
    Result,
};
use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    EnvFilter,
};

#[derive(Parser)]
#[command(name = "exthost-bridge")]
#[command(about = "Bridge between an IDE host process and an extension host")]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host side and wait for an extension host to connect
    Serve {
        #[command(flatten)]
        bridge: BridgeArgs,
        /// Workspace folder (repeatable, defaults to the current directory)
        #[arg(long = "workspace")]
        folders: Vec<PathBuf>,
        /// Workspace identifier
        #[arg(long, default_value = "default")]
        id: String,
        /// Workspace display name (defaults to the first folder's name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Run a minimal extension host that connects to the host
    Exthost {
        #[command(flatten)]
        bridge: BridgeArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_file.as_deref()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Serve {
            bridge,
            folders,
            id,
            name,
        } => match workspace_spec(folders, id, name) {
            Ok(workspace) => host::run(bridge.into(), workspace).await,
            Err(e) => Err(e),
        },
        Commands::Exthost { bridge } => exthost::run(bridge.into()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(log_file: Option<&std::path::Path>) -> Result<()> {
    let directive: Directive = "exthost_bridge=info"
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let filter = EnvFilter::from_default_env().add_directive(directive);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            builder.with_writer(file).with_ansi(false).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn workspace_spec(folders: Vec<PathBuf>, id: String, name: Option<String>) -> Result<WorkspaceSpec> {
    let folders = if folders.is_empty() {
        vec![std::env::current_dir()?]
    } else {
        folders
    };
    let folders = folders
        .into_iter()
        .map(std::fs::canonicalize)
        .collect::<std::io::Result<Vec<_>>>()?;
    let name = name.unwrap_or_else(|| {
        folders
            .first()
            .and_then(|path| path.file_name())
            .map_or_else(|| id.clone(), |name| name.to_string_lossy().into_owned())
    });
    Ok(WorkspaceSpec { id, name, folders })
}

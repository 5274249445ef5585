use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codedrop::common::config::{apply_overrides, load_config, ConfigOverrides};
use codedrop::common::config_commands::{run_config_init, run_config_path, run_config_show};
use codedrop::pipeline::run_loopback_drop;
use codedrop::rendezvous::{generate_share_code, DEFAULT_CODE_LENGTH};
use codedrop::server::run_rendezvous;
use codedrop::signaling::{HttpSignalingClient, SignalingClient};
use codedrop::transfer::OutgoingFile;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codedrop")]
#[command(about = "Peer-to-peer file drop with share codes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rendezvous service until Ctrl+C
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a fresh share code
    Code {
        #[arg(long, default_value_t = DEFAULT_CODE_LENGTH)]
        length: usize,
    },
    /// Show what a rendezvous service knows about a code
    Status {
        code: String,
        /// Service root URL (defaults to the configured local port)
        #[arg(long)]
        server: Option<String>,
    },
    /// Drop files through an in-process sender and receiver
    Loopback {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "received")]
        out: PathBuf,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Path,
    Show,
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = apply_overrides(load_config()?, &ConfigOverrides { host, port });
            run_rendezvous(config).await
        }
        Commands::Code { length } => {
            println!("{}", generate_share_code(length));
            Ok(())
        }
        Commands::Status { code, server } => {
            let config = load_config()?;
            let base_url =
                server.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.server.port));
            let status = HttpSignalingClient::new(&base_url)
                .check_room(&code)
                .await
                .with_context(|| format!("Failed to query {base_url}"))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Loopback { files, out } => {
            let config = load_config()?;
            let mut outgoing = Vec::with_capacity(files.len());
            for path in &files {
                let file = OutgoingFile::from_path(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                outgoing.push(file);
            }

            let summary = run_loopback_drop(&config, outgoing, &out).await?;
            println!("Code {}", summary.code);
            for transfer in &summary.report.transfers {
                println!("  {} ({} bytes): {:?}", transfer.file_name, transfer.file_size, transfer.status);
            }
            for path in &summary.saved {
                println!("Saved {}", path.display());
            }
            for (name, reason) in &summary.rejected {
                eprintln!("Rejected {name}: {reason}");
            }
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => run_config_path(),
            ConfigAction::Show => run_config_show(),
            ConfigAction::Init { force } => run_config_init(force).map(|_| ()),
        },
    }
}

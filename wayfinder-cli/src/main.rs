use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use wayfinder::{WayfinderBuilder, WayfinderFacade};
use wayfinder_core::FacadeOptions;

#[derive(Parser, Debug)]
#[command(name = "wayfinder", version, about = "Resolve, retrieve, and verify an ar:// identifier")]
struct Cli {
    /// ar:// identifier, ArNS name, or tx id to resolve
    url: String,

    /// Path to a FacadeOptions YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the retrieved body to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only resolve to a canonical ar:// URL, skip retrieval
    #[arg(long)]
    resolve_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    let options = match &cli.config {
        Some(path) if path.exists() => {
            info!(path = %path.display(), "loading facade config");
            FacadeOptions::from_yaml_file(path.to_string_lossy().as_ref())?
        }
        Some(path) => {
            info!(path = %path.display(), "config file not found, using defaults");
            FacadeOptions::default()
        }
        None => FacadeOptions::default(),
    };

    let facade: WayfinderFacade = WayfinderBuilder::new(options).build()?;

    if cli.resolve_only {
        let resolved = facade.resolve_url(wayfinder_core::ResolveInput::WayfinderUrl(cli.url.clone()))?;
        println!("{resolved}");
        return Ok(());
    }

    let response = facade.request(&cli.url).await?;

    info!(
        gateway = %response.gateway,
        verified = response.verified,
        content_type = response.content_type.as_deref().unwrap_or("unknown"),
        bytes = response.bytes.len(),
        "retrieved content"
    );

    match cli.output {
        Some(path) => {
            std::fs::write(&path, &response.bytes)?;
            info!(path = %path.display(), "wrote body to file");
        }
        None => {
            std::io::stdout().write_all(&response.bytes)?;
        }
    }

    Ok(())
}

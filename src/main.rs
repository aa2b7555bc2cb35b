//! Main entry point for the gispack CLI app

use gispack::cli::{self, Commands};
use gispack::engine::{Engine, EngineConfig};
use gispack::ManifestEntry;
use std::fs::File;

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_app() {
        if e.downcast_ref::<clap::Error>().is_none() {
            eprintln!("Error: {}", e);
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

#[tokio::main]
async fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::run()?;
    let mut config = EngineConfig::rooted_at(&args.root);

    match args.command {
        Commands::Pack {
            source,
            output,
            progress,
        } => {
            let source = source.unwrap_or_else(|| EngineConfig::session_dir(&args.root));
            if let Some(output) = output {
                config.export_dir = output;
            }
            let engine = with_optional_progress(Engine::new(config), progress);
            let result = engine.pack_folder(source).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::PackManifest {
            manifest,
            output,
            progress,
        } => {
            let entries: Vec<ManifestEntry> = serde_json::from_reader(File::open(&manifest)?)?;
            if let Some(output) = output {
                config.export_dir = output;
            }
            let engine = with_optional_progress(Engine::new(config), progress);
            let result = engine.pack_manifest(entries).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Extract {
            archive,
            output,
            max_depth,
        } => {
            config.max_depth = max_depth;
            let engine = Engine::new(config);
            let files = engine.extract(archive, output).await?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
    }

    Ok(())
}

fn with_optional_progress(engine: Engine, enabled: bool) -> Engine {
    if enabled {
        engine.with_progress(|p| eprintln!("{} / {} bytes", p.bytes_written, p.total_bytes))
    } else {
        engine
    }
}

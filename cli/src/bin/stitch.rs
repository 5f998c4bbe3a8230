use clap::{Parser, Subcommand};
use cli::{JobError, StitchJob};
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use stitching::StitchCommand;
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate tile origins and write them as JSON
    Coordinates {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides the job's coordinates output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the job's command, saving the montage when one is produced
    Stitch {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the JSON schema of a job file
    Schema {
        /// Print only the schema of the command section
        #[arg(long)]
        command_only: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Coordinates { config, output } => {
            let mut job = load_job(config)?;
            if let Some(output) = output {
                job.output.coordinates = Some(output.clone());
            }
            job.output.montage = None;
            let command = job.coordinates_command();
            report(job.run_command(&command))?;
        }
        Commands::Stitch { config } => {
            let job = load_job(config)?;
            report(job.run())?;
        }
        Commands::Schema { command_only } => {
            let schema = if *command_only {
                serde_json::to_string_pretty(&StitchCommand::schema())?
            } else {
                serde_json::to_string_pretty(&StitchJob::schema())?
            };
            println!("{}", schema);
        }
    }

    Ok(())
}

fn load_job(config: &Path) -> Result<StitchJob> {
    info!("Loading job from {}", config.display());
    let job = StitchJob::from_file(config)?;
    info!(
        tiles = job.tiles.len(),
        x_tile_dim = job.grid.x_tile_dim,
        y_tile_dim = job.grid.y_tile_dim,
        "Job loaded"
    );
    Ok(job)
}

fn report(result: std::result::Result<stitching::StitchedCoordinates, JobError>) -> Result<()> {
    match result {
        Ok(coordinates) => {
            for (name, origin) in coordinates.iter() {
                info!("{}: ({:.1}, {:.1})", name, origin.x, origin.y);
            }
            info!("✅ Placed {} tiles", coordinates.len());
            Ok(())
        }
        Err(e) => {
            error!(code = e.code(), "❌ Stitching failed: {}", e);
            Err(e.into())
        }
    }
}

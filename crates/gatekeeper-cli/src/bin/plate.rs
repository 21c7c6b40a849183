use anyhow::Result;
use clap::Parser;
use gatekeeper_cli::{init_tracing, run_plate, Config};
use std::path::PathBuf;

/// Read the licence plate in an image and print it as a JSON string.
#[derive(Parser)]
#[command(name = "gatekeeper-plate", version)]
struct Cli {
    /// Image containing a licence plate
    image: PathBuf,
    /// Directory for the raw and enhanced plate crops (overrides GATEKEEPER_PLATE_DEBUG_DIR)
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.debug_dir {
        config.plate_debug_dir = Some(dir);
    }

    println!("{}", run_plate(&cli.image, &config));
    Ok(())
}

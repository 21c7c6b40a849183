use anyhow::Result;
use clap::Parser;
use gatekeeper_cli::{init_tracing, run_face, Config};
use std::io::Read;
use std::path::PathBuf;

/// Match the faces in an image against a roster of known users.
///
/// The roster is read from stdin as a JSON array of
/// `{"id", "firstname", "lastname", "encodedimagedata"}` records. The
/// `{"<id>": "<name>"}` mapping of recognised users is printed on stdout.
#[derive(Parser)]
#[command(name = "gatekeeper-face", version)]
struct Cli {
    /// Image to scan for faces
    image: PathBuf,
    /// Where to write the annotated image (overrides GATEKEEPER_OUTPUT_IMAGE)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Cosine similarity a face must exceed (overrides GATEKEEPER_SIMILARITY_THRESHOLD)
    #[arg(short, long)]
    threshold: Option<f32>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(output) = cli.output {
        config.output_image = output;
    }
    if let Some(threshold) = cli.threshold {
        config.similarity_threshold = threshold;
    }

    let mut roster_json = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut roster_json) {
        tracing::warn!(error = %err, "cannot read roster from stdin");
    }

    println!("{}", run_face(&cli.image, &roster_json, &config));
    Ok(())
}

//! framecloak: scramble and recover image files from the command line.
//!
//! Wraps [`framecloak_pipeline`] with file decoding and encoding:
//!
//! - `scramble` fits a pipeline to an image and writes the carrier
//! - `unscramble` restores an image from a carrier, using either the
//!   embedded payload or a saved descriptor
//! - `inspect` reports whether a carrier holds a payload and prints it
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin framecloak -- scramble in.png out.png --descriptor out.json
//! cargo run --release --bin framecloak -- unscramble out.png restored.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use framecloak_pipeline::{
    EmbedStatus, Frame, Pipeline, PipelineDescriptor, PipelineSpec, ScrambleError,
};
use tracing::{Level, debug, info, warn};

/// Reversible, self-describing pixel scrambling for images.
#[derive(Parser)]
#[command(name = "framecloak", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log pipeline internals.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scramble an image into a carrier with an embedded descriptor.
    Scramble {
        /// Image to scramble (PNG, JPEG, BMP, WebP).
        input: PathBuf,

        /// Where to write the carrier. Use a lossless format for exact recovery.
        output: PathBuf,

        /// Pipeline description file (JSON).
        #[arg(long, conflicts_with = "config_json")]
        config: Option<PathBuf>,

        /// Pipeline description as a JSON string.
        #[arg(long)]
        config_json: Option<String>,

        /// Also write the fitted descriptor to this file. It keeps the
        /// configured embed interval; the carrier itself always embeds.
        #[arg(long)]
        descriptor: Option<PathBuf>,

        /// Also write a debug image of the payload embedded in the carrier.
        #[arg(long)]
        json_image: Option<PathBuf>,
    },

    /// Restore an image from a carrier.
    Unscramble {
        /// Carrier image.
        input: PathBuf,

        /// Where to write the restored image.
        output: PathBuf,

        /// Descriptor file to use instead of the embedded payload.
        #[arg(long)]
        descriptor: Option<PathBuf>,
    },

    /// Report whether a carrier holds a readable payload.
    Inspect {
        /// Carrier image.
        input: PathBuf,

        /// Print a JSON report instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Scramble {
            input,
            output,
            config,
            config_json,
            descriptor,
            json_image,
        } => scramble(
            &input,
            &output,
            config.as_deref(),
            config_json.as_deref(),
            descriptor.as_deref(),
            json_image.as_deref(),
        ),
        Command::Unscramble {
            input,
            output,
            descriptor,
        } => unscramble(&input, &output, descriptor.as_deref()),
        Command::Inspect { input, json } => inspect(&input, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// Load the pipeline description from `--config`, `--config-json`, or
/// fall back to the reference pipeline.
fn spec_from_cli(config: Option<&Path>, config_json: Option<&str>) -> Result<PipelineSpec, String> {
    if let Some(json) = config_json {
        return PipelineSpec::from_json(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    if let Some(path) = config {
        let text = read_text(path)?;
        return PipelineSpec::from_json(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()));
    }
    Ok(PipelineSpec::reference())
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn load_frame(path: &Path) -> Result<Frame, String> {
    let image = image::open(path).map_err(|e| format!("Error decoding {}: {e}", path.display()))?;
    let frame = Frame::from_dynamic(&image);
    debug!(path = %path.display(), shape = %frame.shape(), "decoded image");
    Ok(frame)
}

fn save_frame(frame: &Frame, path: &Path) -> Result<(), String> {
    let image = frame
        .to_rgb_image()
        .map_err(|e| format!("Error converting frame: {e}"))?;
    image
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    info!(path = %path.display(), shape = %frame.shape(), "wrote image");
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<(), String> {
    std::fs::write(path, text).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    info!(path = %path.display(), bytes = text.len(), "wrote descriptor");
    Ok(())
}

/// Fit `spec` to a still image.
///
/// Returns the pipeline, overridden to embed on its first frame, and the
/// descriptor as configured before the override.
fn fit_still(spec: PipelineSpec, frame: &Frame) -> Result<(Pipeline, String), String> {
    let mut pipeline = Pipeline::new(spec);
    pipeline
        .fit(frame)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    let descriptor = pipeline
        .to_json()
        .map_err(|e| format!("Error serializing descriptor: {e}"))?;
    // A single still only carries its payload if the first frame embeds.
    pipeline
        .set_embed_interval(1)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    Ok((pipeline, descriptor))
}

fn scramble(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    config_json: Option<&str>,
    descriptor: Option<&Path>,
    json_image: Option<&Path>,
) -> Result<(), String> {
    let spec = spec_from_cli(config, config_json)?;
    let frame = load_frame(input)?;
    let (mut pipeline, descriptor_json) = fit_still(spec, &frame)?;

    let carrier = pipeline
        .transform(&frame)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    save_frame(&carrier, output)?;

    if let Some(path) = descriptor {
        write_text(path, &descriptor_json)?;
    }
    if let Some(path) = json_image {
        let image = pipeline
            .to_json_image()
            .map_err(|e| format!("Error rendering descriptor image: {e}"))?;
        save_frame(&image, path)?;
    }
    Ok(())
}

fn unscramble(input: &Path, output: &Path, descriptor: Option<&Path>) -> Result<(), String> {
    let carrier = load_frame(input)?;

    let pipeline = match descriptor {
        Some(path) => {
            let text = read_text(path)?;
            Pipeline::from_json(&text)
                .map_err(|e| format!("Error loading {}: {e}", path.display()))?
        }
        None => Pipeline::recover(&carrier)
            .map_err(|e| format!("Error recovering pipeline from {}: {e}", input.display()))?,
    };

    let normalized = pipeline
        .normalize_carrier(&carrier)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    if normalized.shape() != carrier.shape() {
        warn!(
            from = %carrier.shape(),
            to = %normalized.shape(),
            "carrier was rescaled; output is approximate"
        );
    }

    let restored = pipeline
        .inverse_transform(&normalized)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    save_frame(&restored, output)
}

fn inspect(input: &Path, json: bool) -> Result<(), String> {
    let carrier = load_frame(input)?;
    let (status, descriptor) = match framecloak_pipeline::extract(&carrier) {
        Ok(payload) => {
            let d = PipelineDescriptor::from_payload(&payload)
                .map_err(|e| format!("Payload error: {e}"))?;
            (EmbedStatus::Found, Some(d))
        }
        Err(ScrambleError::PayloadNotFound) => (EmbedStatus::Absent, None),
        Err(e) => {
            warn!("{e}");
            (EmbedStatus::Corrupted, None)
        }
    };

    if json {
        let report = serde_json::json!({
            "path": input.display().to_string(),
            "shape": carrier.shape(),
            "status": format!("{status:?}"),
            "descriptor": descriptor,
        });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Error serializing report: {e}"))?;
        println!("{text}");
        return Ok(());
    }

    println!("{}: {} ({status:?})", input.display(), carrier.shape());
    if let Some(d) = descriptor {
        println!(
            "fitted for {} -> carrier {}, {} steps, interval {}",
            d.state.input_shape,
            d.state.carrier_shape,
            d.spec.steps.len(),
            d.spec.embed.interval,
        );
        for (i, step) in d.spec.steps.iter().enumerate() {
            println!("  {i}: {}", step.name());
        }
    }
    Ok(())
}

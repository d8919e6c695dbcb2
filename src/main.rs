//! cts-density - exploration bonuses for a stream of raw frames.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cts_density::scorer::{score_file, FrameLayout, PixelFormat};
use cts_density::{CheckpointFormat, DensityModel, ModelConfig, Result};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pixel {
    U8,
    F32,
}

impl From<Pixel> for PixelFormat {
    fn from(pixel: Pixel) -> Self {
        match pixel {
            Pixel::U8 => PixelFormat::U8,
            Pixel::F32 => PixelFormat::F32,
        }
    }
}

/// Score raw frames with a Context Tree Switching density model
#[derive(Parser, Debug)]
#[command(name = "cts-density")]
#[command(version)]
#[command(about = "Pseudocount exploration bonus for a stream of raw frames", long_about = None)]
struct Args {
    /// Raw frame file, frames stored back to back
    frames: PathBuf,

    /// Frame height in pixels
    #[arg(long)]
    height: usize,

    /// Frame width in pixels
    #[arg(long)]
    width: usize,

    /// Values per pixel (1 gray, 3 RGB, 4 RGBA)
    #[arg(long, default_value_t = 1)]
    channels: usize,

    /// Pixel encoding
    #[arg(long, value_enum, default_value = "u8")]
    pixel: Pixel,

    /// JSON model config for a fresh model
    #[arg(short, long, conflicts_with = "resume")]
    config: Option<PathBuf>,

    /// Checkpoint to resume from
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Where to write a checkpoint after scoring
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print every score as a JSON line instead of the bare bonus
    #[arg(long)]
    json: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "cts_density=info",
        1 => "cts_density=debug",
        _ => "cts_density=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut model = match &args.resume {
        Some(path) => DensityModel::load_from_file(path, CheckpointFormat::from_path(path))?,
        None => {
            let config = match &args.config {
                Some(path) => ModelConfig::from_json_file(path)?,
                None => ModelConfig::default(),
            };
            DensityModel::new(config)?
        }
    };

    let layout = FrameLayout {
        height: args.height,
        width: args.width,
        channels: args.channels,
        pixel: args.pixel.into(),
    };
    let scores = score_file(&args.frames, layout, &mut model)?;

    let mut out = BufWriter::new(io::stdout().lock());
    for score in &scores {
        if args.json {
            serde_json::to_writer(&mut out, score)
                .map_err(|e| cts_density::Error::Serialization(e.to_string()))?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", score.bonus)?;
        }
    }
    out.flush()?;

    if let Some(path) = &args.save {
        model.save_to_file(path, CheckpointFormat::from_path(path))?;
        info!(path = %path.display(), frames = model.frames_seen(), "checkpoint written");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_conflicts_with_resume() {
        let result = Args::try_parse_from([
            "cts-density",
            "frames.raw",
            "--height",
            "2",
            "--width",
            "2",
            "--config",
            "model.json",
            "--resume",
            "model.bin",
        ]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ArgumentConflict
        );
    }

    #[test]
    fn test_resume_alone_parses() {
        let args = Args::try_parse_from([
            "cts-density",
            "frames.raw",
            "--height",
            "2",
            "--width",
            "2",
            "--resume",
            "model.bin",
        ])
        .unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.resume, Some(PathBuf::from("model.bin")));
    }
}

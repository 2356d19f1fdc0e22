//! quilt2native - Quilt to native image conversion for lenticular displays
//!
//! Takes a multi-view quilt (tiled, linear, or a numbered frame sequence)
//! together with the panel calibration and writes the interleaved image the
//! panel shows at its native resolution.

mod assemble;
mod calibration;
mod config;
mod eeprom;
mod error;
mod pixels;
mod quilt;
mod reproject;
mod source;
mod view;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::calibration::{CalibrationParameters, CalibrationRecord};
use crate::config::Config;
use crate::eeprom::DumpPageSource;
use crate::quilt::{FrameAddressing, QuiltLayout};
use crate::reproject::{RenderOptions, SamplingOrigin};
use crate::source::QuiltSource;

/// quilt2native - render quilts for lenticular light field panels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Options file (TOML); missing files fall back to defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Where each output pixel is sampled
    #[arg(long, global = true, value_enum)]
    sampling_origin: Option<SamplingOrigin>,

    /// Column selection inside frame-set views
    #[arg(long, global = true, value_enum)]
    frame_addressing: Option<FrameAddressing>,

    /// Worker threads (defaults to one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Accept quilts whose size is not a multiple of the tile grid
    #[arg(long, global = true)]
    allow_uneven_tiles: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a tiled quilt (views fill rows from the bottom-left)
    Tiled {
        /// Panel calibration JSON (visual.json)
        calibration: PathBuf,
        /// Quilt image
        quilt: PathBuf,
        /// Native image to write
        output: PathBuf,
        /// Tile grid, columns then rows
        #[arg(long, num_args = 2, value_names = ["H", "V"])]
        tiles: Option<Vec<u32>>,
    },

    /// Convert a single-row quilt
    Linear {
        calibration: PathBuf,
        quilt: PathBuf,
        output: PathBuf,
        /// Number of views in the row
        #[arg(long)]
        tiles: Option<u32>,
    },

    /// Convert a numbered sequence of view images
    Frames {
        calibration: PathBuf,
        /// printf-style file pattern, e.g. `frames/view_%03d.png`
        pattern: String,
        first: u32,
        last: u32,
        output: PathBuf,
    },

    /// Pack a numbered sequence of view images into a quilt
    Assemble {
        pattern: String,
        first: u32,
        last: u32,
        output: PathBuf,
        /// Tile grid, columns then rows
        #[arg(long, num_args = 2, value_names = ["H", "V"], conflicts_with = "linear")]
        tiles: Option<Vec<u32>>,
        /// Pack all frames into one row
        #[arg(long)]
        linear: bool,
    },

    /// Validate a calibration and print it with its derived optics
    Calibration {
        /// Calibration JSON file
        #[arg(required_unless_present = "eeprom_dump")]
        calibration: Option<PathBuf>,
        /// Read the calibration from a raw EEPROM page dump instead
        #[arg(long, conflicts_with = "calibration")]
        eeprom_dump: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout is reserved for the printed calibration
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("quilt2native v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::default(),
    };

    // CLI args override the options file
    if let Some(origin) = args.sampling_origin {
        config.render.sampling_origin = origin;
    }
    if let Some(addressing) = args.frame_addressing {
        config.render.frame_addressing = addressing;
    }
    if let Some(threads) = args.threads {
        config.render.threads = Some(threads);
    }
    if args.allow_uneven_tiles {
        config.layout.allow_uneven_tiles = true;
    }

    match config.render.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .context("Failed to build worker pool")?;
            debug!("Using {} worker threads", threads);
            pool.install(|| run(args.command, &config))
        }
        None => run(args.command, &config),
    }
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Tiled {
            calibration,
            quilt,
            output,
            tiles,
        } => {
            let (h, v) = tile_grid(tiles.as_deref(), config)?;
            let layout = QuiltLayout::tiled(h, v)?;
            let calib = load_calibration(&calibration)?;
            let source = QuiltSource::load_quilt(&quilt)?;
            convert(&calib, layout, &source, &output, config)
        }

        Command::Linear {
            calibration,
            quilt,
            output,
            tiles,
        } => {
            let layout = QuiltLayout::linear(tiles.unwrap_or(config.layout.linear_tiles))?;
            let calib = load_calibration(&calibration)?;
            let source = QuiltSource::load_quilt(&quilt)?;
            convert(&calib, layout, &source, &output, config)
        }

        Command::Frames {
            calibration,
            pattern,
            first,
            last,
            output,
        } => {
            let calib = load_calibration(&calibration)?;
            let source = QuiltSource::load_frames(&pattern, first, last)?;
            // Every frame must match the first one
            let (frame_w, frame_h) = source.dimensions()[0];
            let layout = QuiltLayout::frame_set(
                frame_w,
                frame_h,
                source.images().len() as u32,
                config.render.frame_addressing,
            )?;
            convert(&calib, layout, &source, &output, config)
        }

        Command::Assemble {
            pattern,
            first,
            last,
            output,
            tiles,
            linear,
        } => {
            let source = QuiltSource::load_frames(&pattern, first, last)?;
            let layout = if linear {
                QuiltLayout::linear(source.images().len() as u32)?
            } else {
                let (h, v) = tile_grid(tiles.as_deref(), config)?;
                QuiltLayout::tiled(h, v)?
            };
            let quilt = assemble::assemble_quilt(layout, source.images())?;
            source::save_atomic(quilt, &output)
                .with_context(|| format!("Failed to write quilt {:?}", output))?;
            Ok(())
        }

        Command::Calibration {
            calibration,
            eeprom_dump,
        } => print_calibration(calibration.as_deref(), eeprom_dump.as_deref()),
    }
}

fn tile_grid(tiles: Option<&[u32]>, config: &Config) -> Result<(u32, u32)> {
    match tiles {
        None => Ok((config.layout.tiles_horizontal, config.layout.tiles_vertical)),
        Some(&[h, v]) => Ok((h, v)),
        Some(other) => bail!("--tiles takes two values, got {:?}", other),
    }
}

fn load_calibration(path: &Path) -> Result<CalibrationParameters> {
    let calib = CalibrationParameters::load(path)
        .with_context(|| format!("Failed to load calibration {:?}", path))?;
    info!(
        "Panel: {}x{} px, {:.3} in wide",
        calib.screen_width(),
        calib.screen_height(),
        calib.screen_inches()
    );
    debug!(
        "Optics: pitch {:.6}, tilt {:.6}, center {:.6}, subpixel {:.9}",
        calib.pitch(),
        calib.tilt(),
        calib.center(),
        calib.subpixel_offset()
    );
    Ok(calib)
}

fn convert(
    calib: &CalibrationParameters,
    layout: QuiltLayout,
    source: &QuiltSource,
    output: &Path,
    config: &Config,
) -> Result<()> {
    info!("Layout: {}", layout.describe());
    let options = RenderOptions {
        sampling_origin: config.render.sampling_origin,
        allow_uneven_tiles: config.layout.allow_uneven_tiles,
    };
    let native = reproject::render(
        calib,
        layout,
        source,
        options,
        calib.screen_width(),
        calib.screen_height(),
    )
    .context("Conversion failed")?;
    source::save_atomic(native, output)
        .with_context(|| format!("Failed to write native image {:?}", output))?;
    Ok(())
}

/// Print the calibration document and log the optics derived from it
fn print_calibration(file: Option<&Path>, dump: Option<&Path>) -> Result<()> {
    let json = match (file, dump) {
        (_, Some(dump)) => {
            let mut pages = DumpPageSource::open(dump)?;
            eeprom::read_calibration_json(&mut pages)
                .with_context(|| format!("Failed to read EEPROM dump {:?}", dump))?
        }
        (Some(file), None) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read calibration {:?}", file))?,
        (None, None) => bail!("either a calibration file or --eeprom-dump is required"),
    };

    let doc: Value = serde_json::from_str(&json).context("Calibration is not valid JSON")?;
    let calib = CalibrationParameters::from_record(CalibrationRecord::from_value(&doc)?)?;
    let record = calib.record();

    println!("{}", serde_json::to_string_pretty(&doc)?);
    info!(
        "Panel {}x{} px @ {} dpi, {:.6} in wide",
        record.screen_width_px,
        record.screen_height_px,
        record.dpi,
        calib.screen_inches()
    );
    info!(
        "Optics: pitch {:.9}, tilt {:.9}, center {:.9}, subpixel {:.12}",
        calib.pitch(),
        calib.tilt(),
        calib.center(),
        calib.subpixel_offset()
    );
    Ok(())
}

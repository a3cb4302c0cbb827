use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use frameseek::{
    ParsedBundle, PixelLayout, VideoReader, load_bundles, load_merged, merge_serialized,
    probe_stream_info, save_bundle,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  frameseek-cli probe input.mp4 --json\n  frameseek-cli index input.mp4\n  frameseek-cli extract input.mp4 --frames 42,1000 --out frames.gop\n  frameseek-cli merge a.gop b.gop --out merged.gop\n  frameseek-cli decode input.mp4 --frames 42 --out frames";

#[derive(Debug, Parser)]
#[command(
    name = "frameseek",
    version,
    about = "Index, extract, and decode video frames by Group of Pictures",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print stream properties for one or more video files.
    #[command(
        about = "Probe video stream properties",
        visible_alias = "info",
        after_help = "Examples:\n  frameseek-cli probe input.mp4\n  frameseek-cli probe a.mp4 b.mp4 --json"
    )]
    Probe {
        /// Input video paths.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Scan a file and print its Group of Pictures layout.
    #[command(
        about = "Print GOP boundaries and frame count",
        after_help = "Examples:\n  frameseek-cli index input.mp4\n  frameseek-cli index input.mp4 --json"
    )]
    Index {
        /// Input video path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract the GOPs enclosing the given frames into a bundle file.
    #[command(
        about = "Extract GOP packets to a bundle",
        after_help = "Examples:\n  frameseek-cli extract input.mp4 --frames 42,1000 --out frames.gop"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,

        /// Comma-separated frame ids.
        #[arg(long)]
        frames: String,

        /// Output bundle path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Print the records of a serialized bundle.
    #[command(
        about = "Inspect a bundle file",
        after_help = "Examples:\n  frameseek-cli bundle-info frames.gop --json"
    )]
    BundleInfo {
        /// Bundle path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Merge several bundle files into one.
    #[command(
        about = "Merge bundle files",
        after_help = "Examples:\n  frameseek-cli merge a.gop b.gop --out merged.gop"
    )]
    Merge {
        /// Input bundle paths, in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output bundle path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Decode frames to image files.
    #[command(
        about = "Decode frames to images",
        after_help = "Examples:\n  frameseek-cli decode input.mp4 --frames 42,1000 --out frames\n  frameseek-cli decode frames.gop --bundle --frames 42 --out frames"
    )]
    Decode {
        /// Input video path, or bundle path with --bundle.
        input: PathBuf,

        /// Comma-separated frame ids.
        #[arg(long)]
        frames: String,

        /// Output directory for decoded frame images.
        #[arg(long)]
        out: PathBuf,

        /// Treat the input as a serialized bundle instead of a video file.
        #[arg(long)]
        bundle: bool,

        /// Output image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
    },
}

fn parse_frame_list(value: &str) -> Result<Vec<u64>, Box<dyn std::error::Error>> {
    let frames: Result<Vec<u64>, _> = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<u64>)
        .collect();
    let frames = frames.map_err(|_| format!("invalid --frames list: {value}"))?;
    if frames.is_empty() {
        return Err("--frames must name at least one frame id".into());
    }
    Ok(frames)
}

/// GOP start frames, without the end-of-stream sentinel that
/// [`GopIndex::boundaries`](frameseek::GopIndex::boundaries) appends.
fn gop_starts(index: &frameseek::GopIndex) -> &[u64] {
    let boundaries = index.boundaries();
    &boundaries[..boundaries.len() - 1]
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { inputs, json } => {
            let infos = probe_stream_info(&inputs)?;
            if json {
                let payload: Vec<_> = inputs
                    .iter()
                    .zip(&infos)
                    .map(|(path, info)| {
                        json!({
                            "path": path.display().to_string(),
                            "codec": info.codec_name,
                            "width": info.width,
                            "height": info.height,
                            "fps": info.frames_per_second(),
                            "vfr": info.is_vfr(),
                            "frame_count_estimate": info.frame_count_estimate,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (path, info) in inputs.iter().zip(&infos) {
                    println!(
                        "{}: {}x{} @ {:.2} fps [{}]{}",
                        path.display(),
                        info.width,
                        info.height,
                        info.frames_per_second(),
                        info.codec_name,
                        if info.is_vfr() { " (VFR)" } else { "" },
                    );
                }
            }
        }
        Commands::Index { input, json } => {
            let mut reader = VideoReader::open(&input)?;
            let index = reader.index()?;
            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "frame_count": index.frame_count(),
                    "gop_count": gop_starts(&index).len(),
                    "boundaries": index.boundaries(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} frames in {} GOPs",
                    index.frame_count(),
                    gop_starts(&index).len(),
                );
                if cli.global.verbose {
                    for (i, boundary) in gop_starts(&index).iter().enumerate() {
                        println!("  GOP {i} starts at frame {boundary}");
                    }
                }
            }
        }
        Commands::Extract { input, frames, out } => {
            let frame_ids = parse_frame_list(&frames)?;
            ensure_writable_path(&out, cli.global.overwrite)?;

            let mut reader = VideoReader::open(&input)?;
            let bundle = reader.extract_gops(&frame_ids)?;
            let serialized = bundle.serialize();
            save_bundle(&out, &serialized.data)?;

            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Extracted {} GOP(s), {} bytes, to {}",
                    serialized.first_frame_ids.len(),
                    serialized.data.len(),
                    out.display(),
                )
                .green()
            );
        }
        Commands::BundleInfo { input, json } => {
            let data = fs::read(&input)?;
            let parsed = ParsedBundle::parse(&data)?;
            if json {
                let records: Vec<_> = parsed
                    .frames
                    .iter()
                    .map(|view| {
                        json!({
                            "frame_id": view.frame_id,
                            "first_frame_id": view.first_frame_id,
                            "gop_len": view.gop_len(),
                            "width": view.width,
                            "height": view.height,
                            "payload_bytes": view.payload.len(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("{} record(s)", parsed.frames.len());
                for view in &parsed.frames {
                    println!(
                        "  frame {} in GOP [{}..{}), {}x{}, {} bytes",
                        view.frame_id,
                        view.first_frame_id,
                        view.first_frame_id + view.gop_len(),
                        view.width,
                        view.height,
                        view.payload.len(),
                    );
                }
            }
        }
        Commands::Merge { inputs, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let buffers = load_bundles(&inputs)?;
            let merged = merge_serialized(&buffers)?;
            save_bundle(&out, &merged)?;
            println!("{} {}", "saved".green().bold(), out.display());
        }
        Commands::Decode {
            input,
            frames,
            out,
            bundle,
            ext,
        } => {
            let frame_ids = parse_frame_list(&frames)?;

            if out.exists() {
                if !cli.global.overwrite {
                    return Err(format!(
                        "output directory already exists: {} (use --overwrite)",
                        out.display()
                    )
                    .into());
                }
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("writing into existing directory {}", out.display()).yellow()
                );
            }
            fs::create_dir_all(&out)?;

            let decoded = if bundle {
                let data = load_merged(&[&input])?;
                let decoder = frameseek::GopDecoder::new(frameseek::DecoderOptions::new());
                decoder.decode_from_bundle(&data, &frame_ids, PixelLayout::Rgb)?
            } else {
                let mut reader = VideoReader::open(&input)?;
                reader.decode_frames(&frame_ids, PixelLayout::Rgb)?
            };

            let ext_clean = ext.trim_start_matches('.').to_ascii_lowercase();
            for frame in decoded {
                let output_path = out.join(format!("frame_{:06}.{ext_clean}", frame.frame_id));
                if output_path.exists() && !cli.global.overwrite {
                    return Err(format!(
                        "output file already exists: {} (use --overwrite)",
                        output_path.display()
                    )
                    .into());
                }

                let frame_id = frame.frame_id;
                frame.into_image()?.save(&output_path)?;

                if cli.global.verbose {
                    eprintln!("saved frame {} -> {}", frame_id, output_path.display());
                }
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Decoded {} frame(s) to {}", frame_ids.len(), out.display()).green()
            );
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

//! Scanned Document Crop CLI
//!
//! `scancrop crop` applies one operator-chosen rectangle to every page of a scanned PDF.
//! `scancrop split` cuts a PDF into chunks that each end with the source's last page.

mod config;
mod prompt;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use config::Config;
use prompt::TerminalPrompt;
use scancrop_core::{
    drag_gesture, parse_corners, ConfirmationPrompt, CropPipeline, Decision, DocumentSplitter,
    FixedDecision, PdfCompositor, PipelineOptions, PipelineOutcome, PipelinePaths, ScaleFactor,
    ScanImageRasterizer, SplitOptions,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "scancrop")]
#[command(version, about = "Crop and split scanned PDF documents")]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crop every page with one rectangle selected on the first page
    Crop(CropArgs),
    /// Split a document into chunks, each ending with the last page
    Split(SplitArgs),
}

#[derive(Args, Debug)]
struct CropArgs {
    /// Scanned source PDF
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for intermediate page images
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Cropped output PDF
    #[arg(short, long)]
    output: PathBuf,

    /// Preview-space selection corners: X0,Y0,X1,Y1
    #[arg(long)]
    select: Option<String>,

    /// Preview scale, e.g. 1/2 or 0.5
    #[arg(long)]
    scale: Option<ScaleFactor>,

    /// Rasterization resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// Accept the selection without asking
    #[arg(short, long)]
    yes: bool,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// Source PDF
    #[arg(short, long)]
    input: PathBuf,

    /// Directory receiving the chunk files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Source pages per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Chunk file name prefix
    #[arg(long)]
    prefix: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Crop(args) => crop(args, &config),
        Command::Split(args) => split(args, &config),
    }
}

fn crop(args: CropArgs, config: &Config) -> anyhow::Result<()> {
    let corners = match args.select.as_deref().or(config.selection.corners.as_deref()) {
        Some(corners) => corners,
        None => bail!("No selection given; pass --select X0,Y0,X1,Y1 or set [selection] corners"),
    };
    let (from, to) = parse_corners(corners).context("Invalid --select value")?;

    let work_dir = args
        .work_dir
        .or_else(|| config.crop.work_dir.clone())
        .unwrap_or_else(|| PathBuf::from("scancrop-work"));
    let paths = PipelinePaths::with_work_dir(&args.input, &work_dir, &args.output);
    let options = PipelineOptions {
        dpi: args.dpi.unwrap_or(config.crop.dpi),
        scale: args.scale.unwrap_or(config.crop.scale),
    };
    tracing::info!(
        input = %args.input.display(),
        dpi = options.dpi,
        scale = %options.scale,
        "Starting crop"
    );

    let pipeline = CropPipeline::new(paths, options, ScanImageRasterizer, PdfCompositor);
    let mut prompt: Box<dyn ConfirmationPrompt> = if args.yes {
        Box::new(FixedDecision(Decision::Accept))
    } else {
        let stdin = std::io::stdin();
        Box::new(TerminalPrompt::new(
            stdin.lock(),
            std::io::stdout(),
            work_dir.join("review.png"),
        ))
    };

    let outcome = pipeline
        .run(&drag_gesture(from, to), prompt.as_mut())
        .with_context(|| format!("Failed to crop {}", args.input.display()))?;

    match outcome {
        PipelineOutcome::Completed {
            rect,
            pages,
            output,
        } => {
            tracing::info!(%rect, pages, output = %output.display(), "Cropped document written");
            Ok(())
        }
        PipelineOutcome::Cancelled => {
            tracing::info!("Crop cancelled; no output written");
            Ok(())
        }
        PipelineOutcome::NoSelection => {
            bail!("Selection {} has zero width or height", corners)
        }
    }
}

fn split(args: SplitArgs, config: &Config) -> anyhow::Result<()> {
    let options = SplitOptions {
        chunk_size: args.chunk_size.unwrap_or(config.split.chunk_size),
        output_dir: args
            .output_dir
            .or_else(|| config.split.output_dir.clone())
            .unwrap_or_else(|| SplitOptions::default().output_dir),
        file_prefix: args.prefix.unwrap_or_else(|| config.split.prefix.clone()),
    };
    let splitter = DocumentSplitter::new(options)?;

    let report = splitter
        .split_file(&args.input)
        .with_context(|| format!("Failed to split {}", args.input.display()))?;

    for chunk in &report.chunks {
        println!("{}", chunk.path.display());
    }
    Ok(())
}

//! catrack CLI
//!
//! Command-line front end for cellular-automaton track finding on hit files.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use catrack_algorithms::{FinderConfig, SectorConnector, TrackFinder};
use catrack_core::{GeometryConfig, Hit, SectorSystem};
use catrack_io::{
    config, CoordColumns, DiagnosticFileWriter, Event, HitFileReader, TrackFileWriter,
};
use clap::{ArgAction, Parser, Subcommand};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    CatrackIo(#[from] catrack_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] catrack_core::Error),
}

/// Cellular-automaton track finder for layered tracking detectors.
#[derive(Parser)]
#[command(name = "catrack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find tracks in hit CSV files
    Process {
        /// Input hit CSV file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output track CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Run configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write criterion diagnostics (JSON) to this path
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Override the largest number of skipped layers
        #[arg(long)]
        max_skipped_layers: Option<u32>,

        /// Override the minimum number of hits per track
        #[arg(long)]
        min_track_hits: Option<usize>,
    },

    /// Show information about a hit file
    Info {
        /// Input hit CSV file
        input: PathBuf,

        /// Run configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Benchmark serial and parallel track finding
    Benchmark {
        /// Input hit CSV file
        input: PathBuf,

        /// Run configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> Result<FinderConfig> {
    Ok(match path {
        Some(path) => config::from_file(path)?,
        None => FinderConfig::default(),
    })
}

#[derive(Debug, Default)]
struct Totals {
    events: usize,
    hits: usize,
    tracks: usize,
    conflicting_pairs: usize,
    unconverged: usize,
}

fn process<S, C>(
    finder: &TrackFinder<S, C>,
    input: &[PathBuf],
    tracks: &mut TrackFileWriter,
    mut diagnostics: Option<&mut DiagnosticFileWriter>,
) -> Result<Totals>
where
    S: SectorSystem,
    S::Coord: CoordColumns,
    C: SectorConnector,
{
    let mut totals = Totals::default();
    for path in input {
        log::info!("reading {}", path.display());
        let events: Vec<Event<S::Coord>> = HitFileReader::open(path)?.read_events()?;

        let results = events
            .par_iter()
            .map(|event| finder.find(&event.hits).map(|result| (event.id, result)))
            .collect::<catrack_core::Result<Vec<_>>>()?;

        for (event, result) in &results {
            tracks.write_event(*event, result)?;
            if let Some(writer) = diagnostics.as_deref_mut() {
                writer.write_event(*event, &result.diagnostics)?;
            }
            totals.hits += result.statistics.hits;
            totals.tracks += result.candidates.len();
            totals.conflicting_pairs += result.conflicts.num_conflicting_pairs();
            totals.unconverged += result.reports.iter().filter(|r| !r.converged).count();
        }
        totals.events += results.len();
    }
    tracks.flush()?;
    Ok(totals)
}

fn info<S, C>(finder: &TrackFinder<S, C>, input: &Path) -> Result<()>
where
    S: SectorSystem,
    S::Coord: CoordColumns,
    C: SectorConnector,
{
    let reader = HitFileReader::open(input)?;
    let file_size = reader.file().len();
    let events: Vec<Event<S::Coord>> = reader.read_events()?;
    let hits: usize = events.iter().map(|e| e.hits.len()).sum();

    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        file_size,
        file_size as f64 / 1_000_000.0
    );
    println!("Events: {}", events.len());
    println!("Hits: {}", hits);

    if let (Some(first), Some(last)) = (events.first(), events.last()) {
        println!("Event range: {} - {}", first.id, last.id);
        let sizes = events.iter().map(|e| e.hits.len());
        let min_hits = sizes.clone().min().unwrap_or(0);
        let max_hits = sizes.max().unwrap_or(0);
        println!("Hits per event: {} - {}", min_hits, max_hits);
    }

    let sectors = finder.sectors();
    let mut occupied = BTreeSet::new();
    let mut layer_hits = vec![0usize; sectors.num_layers() as usize];
    for hit in events.iter().flat_map(|e| e.hits.iter()) {
        let sector = sectors.encode(hit.coord())?;
        layer_hits[sectors.layer(sector)? as usize] += 1;
        occupied.insert(sector);
    }
    println!(
        "Occupied sectors: {} of {}",
        occupied.len(),
        sectors.num_sectors()
    );
    for (layer, count) in layer_hits.iter().enumerate() {
        println!("  layer {:>3}: {} hits", layer, count);
    }
    Ok(())
}

fn benchmark<S, C>(
    config: &FinderConfig,
    build: impl Fn(&FinderConfig) -> catrack_core::Result<TrackFinder<S, C>>,
    input: &Path,
    iterations: usize,
) -> Result<()>
where
    S: SectorSystem,
    S::Coord: CoordColumns,
    C: SectorConnector,
{
    let events: Vec<Event<S::Coord>> = HitFileReader::open(input)?.read_events()?;
    let hits: usize = events.iter().map(|e| e.hits.len()).sum();
    println!(
        "Benchmarking with {} events, {} hits, {} iterations",
        events.len(),
        hits,
        iterations
    );
    println!(
        "{:<10} | {:<15} | {:<15} | {:<15} | {:<8}",
        "Mode", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)", "Tracks"
    );
    println!("{:-<75}", "");

    for (parallel, name) in [(false, "Serial"), (true, "Parallel")] {
        let mut mode = config.clone();
        mode.diagnostics = false;
        mode.automaton.parallel = parallel;
        let finder = build(&mode)?;

        let run = |finder: &TrackFinder<S, C>| -> catrack_core::Result<usize> {
            let mut tracks = 0;
            for event in &events {
                tracks += finder.find(&event.hits)?.candidates.len();
            }
            Ok(tracks)
        };

        // Warmup
        let tracks = run(&finder)?;

        let mut times = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let start = Instant::now();
            run(&finder)?;
            times.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mean_time = times.iter().sum::<f64>() / times.len().max(1) as f64;

        println!(
            "{:<10} | {:<15.2} | {:<15.2} | {:<15.2} | {:<8}",
            name, mean_time, min_time, max_time, tracks
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            input,
            output,
            config,
            diagnostics,
            max_skipped_layers,
            min_track_hits,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(layers) = max_skipped_layers {
                config.automaton.max_skipped_layers = layers;
            }
            if let Some(hits) = min_track_hits {
                config.automaton.min_track_hits = hits;
            }
            config.diagnostics = diagnostics.is_some();

            log::info!("processing {} file(s)", input.len());
            log::info!("geometry: {:?}", config.geometry);
            log::info!(
                "max skipped layers: {}, min track hits: {}",
                config.automaton.max_skipped_layers,
                config.automaton.min_track_hits
            );

            let start = Instant::now();
            let mut tracks = TrackFileWriter::create(&output)?;
            log::info!("writing tracks to {}", output.display());
            let mut diagnostic_writer = diagnostics
                .as_ref()
                .map(DiagnosticFileWriter::create)
                .transpose()?;

            let totals = match config.geometry {
                GeometryConfig::Planar { .. } => process(
                    &config.planar_finder()?,
                    &input,
                    &mut tracks,
                    diagnostic_writer.as_mut(),
                )?,
                GeometryConfig::Angular { .. } => process(
                    &config.angular_finder()?,
                    &input,
                    &mut tracks,
                    diagnostic_writer.as_mut(),
                )?,
            };

            if let Some(writer) = diagnostic_writer {
                let records = writer.finish()?;
                log::info!("wrote {} diagnostic records", records);
            }
            if totals.unconverged > 0 {
                log::warn!(
                    "{} propagation passes hit the round cap",
                    totals.unconverged
                );
            }

            let elapsed = start.elapsed();
            println!(
                "Processed {} files in {:.2}s",
                input.len(),
                elapsed.as_secs_f64()
            );
            println!("Total events: {}", totals.events);
            println!("Total hits: {}", totals.hits);
            println!("Total tracks: {}", totals.tracks);
            println!("Conflicting pairs: {}", totals.conflicting_pairs);
        }

        Commands::Info { input, config } => {
            let config = load_config(config.as_deref())?;
            match config.geometry {
                GeometryConfig::Planar { .. } => info(&config.planar_finder()?, &input)?,
                GeometryConfig::Angular { .. } => info(&config.angular_finder()?, &input)?,
            }
        }

        Commands::Benchmark {
            input,
            config,
            iterations,
        } => {
            let config = load_config(config.as_deref())?;
            match config.geometry {
                GeometryConfig::Planar { .. } => {
                    benchmark(&config, FinderConfig::planar_finder, &input, iterations)?;
                }
                GeometryConfig::Angular { .. } => {
                    benchmark(&config, FinderConfig::angular_finder, &input, iterations)?;
                }
            }
        }
    }

    Ok(())
}

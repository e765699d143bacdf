//! geocluster command-line interface.
//!
//! Ingests a GeoJSON, CSV, Arrow or KML file, clusters its points with DBSCAN
//! and optionally writes the labelled features back out.
#![allow(clippy::uninlined_format_args, clippy::too_many_lines)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::channel;
use std::thread;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use geocluster_algorithms::{DbscanConfig, MetricKind, NeighborSearch};
use geocluster_core::ClusterParams;
use geocluster_io::{
    read_with_progress, AcquireEvent, AcquiredBuffer, ClusterWorker, IngestOutcome, IngestRequest,
    LabeledWriter, LatestGeneration, OutputFormat, Pipeline, PipelineConfig, WorkerMessage,
    DEFAULT_CHUNK_SIZE,
};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Ingest(#[from] geocluster_io::Error),

    #[error("Invalid parameters: {0}")]
    Core(#[from] geocluster_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file reader thread panicked")]
    ReaderPanicked,

    #[error("input path has no usable file name: {0}")]
    BadPath(PathBuf),
}

/// Distance metric selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Metric {
    /// Planar distance on raw coordinates (epsilon in degrees)
    Euclidean,
    /// Great-circle distance (epsilon in metres)
    Haversine,
}

impl From<Metric> for MetricKind {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Euclidean => MetricKind::Euclidean,
            Metric::Haversine => MetricKind::Haversine,
        }
    }
}

/// Neighbor search selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Search {
    /// Grid index for large inputs, linear scan otherwise
    Auto,
    /// Linear scan
    Linear,
    /// Grid index
    Grid,
}

impl From<Search> for NeighborSearch {
    fn from(search: Search) -> Self {
        match search {
            Search::Auto => NeighborSearch::Auto,
            Search::Linear => NeighborSearch::Linear,
            Search::Grid => NeighborSearch::Grid,
        }
    }
}

/// Output format selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Geojson,
    Csv,
    Kml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Geojson => OutputFormat::GeoJson,
            Format::Csv => OutputFormat::Csv,
            Format::Kml => OutputFormat::Kml,
        }
    }
}

/// Multi-format geospatial point clustering.
#[derive(Parser)]
#[command(name = "geocluster")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file, cluster its points and report the result
    Run {
        /// Input file (.json, .geojson, .csv, .arrow, .kml)
        input: PathBuf,

        /// Neighborhood radius (coordinate units, or metres for haversine)
        #[arg(short, long, default_value = "0.05")]
        epsilon: f64,

        /// Minimum neighborhood size, the point itself included
        #[arg(short, long, default_value = "2")]
        min_points: usize,

        /// Distance metric
        #[arg(long, value_enum, default_value = "euclidean")]
        metric: Metric,

        /// Neighbor search strategy
        #[arg(long, value_enum, default_value = "auto")]
        search: Search,

        /// Write labelled features to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to the output extension, then GeoJSON)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Ingest a file and describe it without clustering
    Inspect {
        /// Input file
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| CliError::BadPath(path.to_path_buf()))
}

/// Reads `path` on a scoped thread while rendering progress on stderr.
fn acquire(path: &Path, quiet: bool) -> Result<AcquiredBuffer> {
    let (tx, rx) = channel();

    thread::scope(|scope| {
        let reader = scope.spawn(move || {
            let cancel = AtomicBool::new(false);
            read_with_progress(path, DEFAULT_CHUNK_SIZE, &tx, &cancel)
        });
        // Ends when the reader thread drops its sender.
        for AcquireEvent::Progress { percent } in &rx {
            if !quiet {
                eprint!("\rReading {}: {:>3}%", path.display(), percent);
                if percent == 100 {
                    eprintln!();
                }
            }
        }
        let bytes = reader.join().map_err(|_| CliError::ReaderPanicked)??;
        Ok(bytes)
    })
}

/// Runs the pipeline on the background worker and waits for the current
/// generation's reply.
fn cluster_in_background(
    config: PipelineConfig,
    buffer: AcquiredBuffer,
    hint: String,
) -> Result<IngestOutcome> {
    let (tx, rx) = channel();
    let worker = ClusterWorker::spawn(config, tx)?;
    let latest = LatestGeneration::new();
    worker.submit(IngestRequest {
        generation: latest.next(),
        buffer,
        filename_hint: hint,
    })?;

    loop {
        let message = rx.recv().map_err(|_| geocluster_io::Error::WorkerDisconnected)?;
        if !latest.accepts(message.generation()) {
            log::debug!("discarding stale result for generation {}", message.generation());
            continue;
        }
        return match message {
            WorkerMessage::Completed { outcome, .. } => Ok(*outcome),
            WorkerMessage::Failed { error, .. } => Err(error.into()),
        };
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            epsilon,
            min_points,
            metric,
            search,
            output,
            format,
            json,
            verbose,
            quiet,
        } => {
            init_logging(verbose);
            let config = PipelineConfig {
                dbscan: DbscanConfig {
                    params: ClusterParams::new(epsilon, min_points)?,
                    search: search.into(),
                },
                metric: metric.into(),
            };
            if verbose {
                eprintln!("Input: {}", input.display());
                eprintln!("Metric: {}", config.metric);
                eprintln!("Epsilon: {}", epsilon);
                eprintln!("Min points: {}", min_points);
            }

            let hint = file_name(&input)?;
            let buffer = acquire(&input, quiet)?;
            let start = Instant::now();
            let outcome = cluster_in_background(config.clone(), buffer, hint)?;
            let elapsed = start.elapsed();
            let stats = outcome.assignment.statistics();

            if json {
                let summary = serde_json::json!({
                    "input": input.display().to_string(),
                    "format": outcome.format.to_string(),
                    "config": config,
                    "features": outcome.collection.len(),
                    "statistics": stats,
                    "warnings": outcome.warnings,
                });
                let mut stdout = std::io::stdout().lock();
                serde_json::to_writer_pretty(&mut stdout, &summary)?;
                writeln!(stdout)?;
            } else {
                println!("Format: {}", outcome.format);
                println!("Features: {}", outcome.collection.len());
                println!("Dropped records: {}", outcome.warnings.len());
                println!("Clusters: {}", stats.clusters);
                println!("Noise: {}", stats.noise);
                println!("Largest cluster: {}", stats.largest_cluster);
                println!("Elapsed: {:.3}s", elapsed.as_secs_f64());
            }
            if verbose {
                for warning in &outcome.warnings {
                    eprintln!("  dropped {}", warning);
                }
            }

            if let Some(path) = output {
                let format = format
                    .map(OutputFormat::from)
                    .or_else(|| OutputFormat::from_path(&path))
                    .unwrap_or_default();
                let mut writer = LabeledWriter::create(&path)?;
                writer.write(format, &outcome.collection, &outcome.assignment)?;
                log::info!("wrote {:?} output to {}", format, path.display());
                if !quiet {
                    eprintln!("Wrote {}", path.display());
                }
            }
        }

        Commands::Inspect {
            input,
            verbose,
            quiet,
        } => {
            init_logging(verbose);
            let hint = file_name(&input)?;
            let buffer = acquire(&input, quiet)?;
            let (format, normalized) = Pipeline::default().ingest(&buffer, &hint)?;

            println!("File: {}", input.display());
            println!("Size: {} bytes", buffer.len());
            println!("Format: {}", format);
            println!("Features: {}", normalized.collection.len());
            if let Some(b) = normalized.collection.bounds() {
                println!(
                    "Bounds: lon [{}, {}], lat [{}, {}]",
                    b.min_lon, b.max_lon, b.min_lat, b.max_lat
                );
            }
            println!("Dropped records: {}", normalized.warnings.len());
            for warning in &normalized.warnings {
                println!("  {}", warning);
            }
        }
    }

    Ok(())
}

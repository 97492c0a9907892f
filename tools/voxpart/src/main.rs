//! # voxpart CLI
//!
//! Command-line interface for the voxpart library.
//! Splits the foreground of a label image into balanced regions.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use log::{error, info};
use voxpart::{CutPlane, SegmentOptions};

mod cli;

/// Command-line interface for voxpart
#[derive(Parser, Debug)]
#[command(name = "voxpart")]
#[command(about = "Partition a labeled 3D image into balanced contiguous regions")]
#[command(long_about = "Partitions the foreground of a NIfTI label image with METIS:
  voxpart in.nii.gz out.nii.gz 8                  # 8 parts, uniform weights
  voxpart in.nii.gz out.nii.gz 3 -w 0 0.5         # part 0 gets half of the volume
  voxpart in.nii.gz out.nii.gz 4 -o --seed 1      # search weights, reproducibly
  voxpart in.nii.gz out.nii.gz 6 -c 2 0.1         # two largest components, drop < 10%

Output labels run from 1 to the number of parts; background stays 0.")]
#[command(version)]
struct Cli {
    /// Input label image (.nii or .nii.gz)
    input: PathBuf,

    /// Output label image
    output: PathBuf,

    /// Number of parts
    num_parts: usize,

    /// Relative weight of one part; repeatable, the others stay at 1/num_parts
    #[arg(short = 'w', num_args = 2, value_names = ["INDEX", "WEIGHT"], action = ArgAction::Append)]
    weight: Vec<String>,

    /// Cut plane hint: cuts between SLICE and SLICE+1 along DIM are STRENGTH times cheaper
    #[arg(short = 'p', num_args = 3, value_names = ["DIM", "SLICE", "STRENGTH"], allow_negative_numbers = true)]
    plane: Option<Vec<i64>>,

    /// Search for the part weights with the smallest edge cut (slow)
    #[arg(short = 'o', long)]
    optimize: bool,

    /// Seed for every random draw; `-seed` is accepted too
    #[arg(long)]
    seed: Option<u64>,

    /// Load imbalance tolerance, at least 1.0
    #[arg(short = 'u', default_value_t = 1.001)]
    tolerance: f32,

    /// Partitionings tried per partitioner call
    #[arg(short = 'n', default_value_t = 1)]
    iterations: usize,

    /// Largest components to consider and the minimum fraction to keep one
    #[arg(short = 'c', num_args = 2, value_names = ["N", "FRACTION"])]
    components: Option<Vec<String>>,

    /// Hint file with vertex and edge weight rules
    #[arg(long)]
    hints: Option<PathBuf>,

    /// Check every graph for consistency
    #[arg(long)]
    verify: bool,

    /// Use recursive bisection for the final partitioning
    #[arg(long)]
    recursive: bool,

    /// Components processed in parallel
    #[arg(short = 't', long, default_value_t = 1)]
    threads: usize,

    /// Write a JSON run summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Show a progress bar over components
    #[arg(long)]
    progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Accept the single-dash `-seed` spelling
fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .map(|a| if a == "-seed" { OsString::from("--seed") } else { a })
        .collect()
}

fn usage_error(message: String) -> ! {
    Cli::command().error(ErrorKind::ValueValidation, message).exit()
}

impl Cli {
    /// Turn the flags into library options, exiting with usage on bad values
    fn options(&self) -> SegmentOptions {
        let mut options = SegmentOptions {
            optimize: self.optimize,
            tolerance: self.tolerance,
            partitioner_iterations: self.iterations,
            seed: self.seed,
            hints: self.hints.clone(),
            verify_graph: self.verify,
            recursive: self.recursive,
            threads: self.threads,
            ..Default::default()
        };

        if !self.weight.is_empty() {
            if self.num_parts == 0 {
                usage_error("num_parts must be at least 1".to_string());
            }
            let mut weights = vec![1.0 / self.num_parts as f64; self.num_parts];
            for pair in self.weight.chunks(2) {
                let index: usize = pair[0]
                    .parse()
                    .unwrap_or_else(|_| usage_error(format!("invalid weight index '{}'", pair[0])));
                let weight: f64 = pair[1]
                    .parse()
                    .unwrap_or_else(|_| usage_error(format!("invalid weight '{}'", pair[1])));
                if index >= self.num_parts {
                    usage_error(format!(
                        "weight index {index} is out of range for {} parts",
                        self.num_parts
                    ));
                }
                weights[index] = weight;
            }
            options.weights = weights;
        }

        if let Some(plane) = &self.plane {
            let (dim, slice, strength) = (plane[0], plane[1], plane[2]);
            if !(0..=2).contains(&dim) || slice < 0 {
                usage_error(format!("invalid cut plane {dim} {slice} {strength}"));
            }
            let strength = i32::try_from(strength)
                .unwrap_or_else(|_| usage_error(format!("invalid cut plane strength {strength}")));
            options.cut_plane = Some(CutPlane {
                dim: dim as usize,
                slice: slice as usize,
                strength,
            });
        }

        if let Some(components) = &self.components {
            options.max_components = components[0]
                .parse()
                .unwrap_or_else(|_| usage_error(format!("invalid component count '{}'", components[0])));
            options.min_component_fraction = components[1]
                .parse()
                .unwrap_or_else(|_| usage_error(format!("invalid component fraction '{}'", components[1])));
        }

        if let Err(e) = options.validate(self.num_parts) {
            usage_error(e.to_string());
        }
        options
    }
}

fn main() {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    // Initialize logging to stderr
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(&cli) {
        error!("Error: {e:#}");
        let code = match e.downcast_ref::<voxpart::Error>() {
            Some(err) if err.is_argument_error() => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut options = cli.options();
    let start = Instant::now();

    let progress = cli
        .progress
        .then(|| cli::ProgressManager::new(&format!("Partitioning {}", cli.input.display())));
    options.progress = progress.as_ref().map(|p| p.callback());

    let summary = voxpart::segment_image(&cli.input, &cli.output, cli.num_parts, &options)?;

    if let Some(path) = &cli.summary {
        let file = File::create(path)
            .with_context(|| format!("Failed to create summary file {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .context("Failed to write summary")?;
        info!("Summary written to {}", path.display());
    }

    info!(
        "Done: {} labels in {:.2}s",
        summary.n_labels(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

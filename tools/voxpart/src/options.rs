//! Run configuration

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use voxpart_common::{Error, Result};

use crate::graph::{CutPlane, Idx, MAX_WEIGHT};
use crate::partition::{PartitionSettings, Strategy};

/// Progress callback, called with (components done, components total)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Options for a segmentation run
#[derive(Clone)]
pub struct SegmentOptions {
    /// Relative part weights; empty means uniform
    pub weights: Vec<f64>,

    /// Search for the weights that minimise the edge cut (slow)
    pub optimize: bool,

    /// Load imbalance tolerance, at least 1.0
    pub tolerance: f32,

    /// Partitionings tried by the partitioner per call
    pub partitioner_iterations: usize,

    /// Largest components taken into account
    pub max_components: usize,

    /// Components below this share of the counted foreground are dropped
    pub min_component_fraction: f64,

    /// Seed for every random draw of the run; OS entropy when `None`
    pub seed: Option<u64>,

    pub cut_plane: Option<CutPlane>,

    /// Hint file with vertex and edge weight rules
    pub hints: Option<PathBuf>,

    /// Check every graph for consistency and log what is wrong
    pub verify_graph: bool,

    /// Use recursive bisection for the final partitioning
    pub recursive: bool,

    /// Components processed in parallel
    pub threads: usize,

    /// Optional progress callback
    pub progress: Option<ProgressCallback>,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            weights: Vec::new(),
            optimize: false,
            tolerance: 1.001,
            partitioner_iterations: 1,
            max_components: 1,
            min_component_fraction: 0.0,
            seed: None,
            cut_plane: None,
            hints: None,
            verify_graph: false,
            recursive: false,
            threads: 1,
            progress: None,
        }
    }
}

impl fmt::Debug for SegmentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentOptions")
            .field("weights", &self.weights)
            .field("optimize", &self.optimize)
            .field("tolerance", &self.tolerance)
            .field("partitioner_iterations", &self.partitioner_iterations)
            .field("max_components", &self.max_components)
            .field("min_component_fraction", &self.min_component_fraction)
            .field("seed", &self.seed)
            .field("cut_plane", &self.cut_plane)
            .field("hints", &self.hints)
            .field("verify_graph", &self.verify_graph)
            .field("recursive", &self.recursive)
            .field("threads", &self.threads)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl SegmentOptions {
    /// Check the options for a run into `n_parts` parts
    pub fn validate(&self, n_parts: usize) -> Result<()> {
        if n_parts == 0 {
            return Err(Error::invalid("number of parts must be at least 1"));
        }
        if !self.weights.is_empty() && self.weights.len() != n_parts {
            return Err(Error::invalid(format!(
                "Incorrect number of weights: got {}, expected {}",
                self.weights.len(),
                n_parts
            )));
        }
        if let Some(w) = self.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::invalid(format!(
                "weights must be finite and non-negative, got {w}"
            )));
        }
        if self.tolerance.is_nan() || self.tolerance < 1.0 {
            return Err(Error::invalid(format!(
                "tolerance must be at least 1.0, got {}",
                self.tolerance
            )));
        }
        if self.partitioner_iterations == 0 {
            return Err(Error::invalid("partitioner iterations must be at least 1"));
        }
        if Idx::try_from(self.partitioner_iterations).is_err() {
            return Err(Error::invalid(format!(
                "{} partitioner iterations is too many",
                self.partitioner_iterations
            )));
        }
        if self.max_components == 0 {
            return Err(Error::invalid("at least one component must be kept"));
        }
        if !(0.0..=1.0).contains(&self.min_component_fraction) {
            return Err(Error::invalid(format!(
                "minimum component fraction must lie in [0, 1], got {}",
                self.min_component_fraction
            )));
        }
        if let Some(plane) = &self.cut_plane {
            if plane.dim > 2 {
                return Err(Error::invalid(format!(
                    "cut plane dimension must be 0, 1 or 2, got {}",
                    plane.dim
                )));
            }
            if !(1..=MAX_WEIGHT).contains(&plane.strength) {
                return Err(Error::invalid(format!(
                    "cut plane strength must lie in [1, {MAX_WEIGHT}], got {}",
                    plane.strength
                )));
            }
        }
        if self.threads == 0 {
            return Err(Error::invalid("thread count must be at least 1"));
        }
        Ok(())
    }

    /// Partitioner settings for the final partitioning of a component
    pub fn partition_settings(&self) -> PartitionSettings {
        PartitionSettings {
            tolerance: self.tolerance,
            n_cuts: Idx::try_from(self.partitioner_iterations).unwrap_or(Idx::MAX),
            strategy: if self.recursive {
                Strategy::Recursive
            } else {
                Strategy::KWay
            },
            // METIS seeds are C ints
            seed: self.seed.map(|s| (s & 0x7fff_ffff) as Idx),
        }
    }
}

//! Graph partitioning backend
//!
//! [`Partitioner`] is the narrow seam between the segmentation code and the
//! combinatorial partitioner; [`MetisPartitioner`] fills it with METIS.

use log::debug;
use metis::{option, Real};
use serde::{Deserialize, Serialize};
use voxpart_common::{Error, Result};

use crate::graph::{Idx, ImageGraph};

/// Smallest target weight handed to the partitioner
///
/// METIS rejects non-positive part weights, so weight vectors are clamped to
/// this floor and renormalised before a call.
pub const MIN_TARGET_WEIGHT: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Direct k-way partitioning
    #[default]
    KWay,
    /// Recursive bisection
    Recursive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Load imbalance tolerance (`ubvec`), at least 1.0
    pub tolerance: f32,
    /// Number of partitionings tried internally, best one kept
    pub n_cuts: Idx,
    pub strategy: Strategy,
    /// Partitioner seed; `None` keeps the partitioner's default
    pub seed: Option<Idx>,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            tolerance: 1.001,
            n_cuts: 1,
            strategy: Strategy::KWay,
            seed: None,
        }
    }
}

/// Something that splits a graph into `targets.len()` parts
pub trait Partitioner {
    /// Fill `part` with one part id per vertex and return the edge cut
    ///
    /// `targets` are the relative part weights. `part` must hold exactly
    /// `graph.n_vertices()` entries.
    fn partition(
        &self,
        graph: &ImageGraph,
        targets: &[f64],
        settings: &PartitionSettings,
        part: &mut [Idx],
    ) -> Result<u64>;
}

/// Clamp target weights to [`MIN_TARGET_WEIGHT`] and renormalise them
pub fn sanitize_targets(targets: &[f64]) -> Vec<f64> {
    let clipped: Vec<f64> = targets
        .iter()
        .map(|&w| if w.is_finite() { w.max(MIN_TARGET_WEIGHT) } else { MIN_TARGET_WEIGHT })
        .collect();
    let sum: f64 = clipped.iter().sum();
    clipped.iter().map(|&w| w / sum).collect()
}

/// METIS through the `metis` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct MetisPartitioner;

impl Partitioner for MetisPartitioner {
    fn partition(
        &self,
        graph: &ImageGraph,
        targets: &[f64],
        settings: &PartitionSettings,
        part: &mut [Idx],
    ) -> Result<u64> {
        let n = graph.n_vertices();
        if part.len() != n {
            return Err(Error::invalid(format!(
                "partition buffer holds {} entries for {} vertices",
                part.len(),
                n
            )));
        }
        if targets.is_empty() {
            return Err(Error::invalid("at least one part is required"));
        }
        if n == 0 {
            return Ok(0);
        }
        if targets.len() == 1 {
            part.fill(0);
            return Ok(0);
        }

        let nparts = Idx::try_from(targets.len())
            .map_err(|_| Error::invalid(format!("{} parts is too many", targets.len())))?;
        let tpwgts: Vec<Real> = sanitize_targets(targets).iter().map(|&w| w as Real).collect();
        let ubvec = [Real::from(settings.tolerance)];

        let mut problem = metis::Graph::new(1, nparts, graph.xadj(), graph.adjncy())
            .map_err(|e| Error::Partition(format!("invalid graph: {e:?}")))?
            .set_vwgt(graph.vertex_weights())
            .set_adjwgt(graph.edge_weights())
            .set_tpwgts(&tpwgts)
            .set_ubvec(&ubvec)
            .set_option(option::NCuts(settings.n_cuts))
            .set_option(option::CCOrder(true));
        if let Some(seed) = settings.seed {
            problem = problem.set_option(option::Seed(seed));
        }

        let cut = match settings.strategy {
            Strategy::KWay => {
                debug!("Using k-way algorithm");
                problem = problem.set_option(option::MinConn(true));
                // METIS refuses the contiguity option on disconnected input
                if graph.is_connected() {
                    problem = problem.set_option(option::Contig(true));
                }
                problem.part_kway(part)
            }
            Strategy::Recursive => {
                debug!("Using recursive bisection");
                problem.part_recursive(part)
            }
        }
        .map_err(|e| Error::Partition(format!("METIS returned {e:?}")))?;

        Ok(cut.max(0) as u64)
    }
}

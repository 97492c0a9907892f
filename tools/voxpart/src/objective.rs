//! Edge cut as a function of the relative part weights
//!
//! The free parameters are the first `k - 1` part weights; the last one is
//! whatever is left of 1. Each evaluation runs the partitioner once with a
//! direct k-way split and returns the cut it reports. There is no
//! derivative to offer: the partitioner is a combinatorial black box.

use log::warn;

use crate::graph::{Idx, ImageGraph};
use crate::partition::{PartitionSettings, Partitioner, Strategy};

/// Expand `k - 1` free weights into the full `k`-vector
///
/// The last entry is `1 - sum(free)` and may be negative.
pub fn full_weights(free: &[f64]) -> Vec<f64> {
    let mut full = free.to_vec();
    full.push(1.0 - free.iter().sum::<f64>());
    full
}

pub struct EdgeCutObjective<'a, P: Partitioner + ?Sized> {
    graph: &'a ImageGraph,
    partitioner: &'a P,
    n_parts: usize,
    settings: PartitionSettings,
    last_partition: Option<Vec<Idx>>,
    evaluations: usize,
}

impl<'a, P: Partitioner + ?Sized> EdgeCutObjective<'a, P> {
    /// The strategy in `settings` is ignored: evaluations always run k-way
    pub fn new(
        graph: &'a ImageGraph,
        partitioner: &'a P,
        n_parts: usize,
        settings: &PartitionSettings,
    ) -> Self {
        Self {
            graph,
            partitioner,
            n_parts,
            settings: PartitionSettings {
                strategy: Strategy::KWay,
                ..*settings
            },
            last_partition: None,
            evaluations: 0,
        }
    }

    /// Number of free parameters, `k - 1`
    pub fn n_parameters(&self) -> usize {
        self.n_parts.saturating_sub(1)
    }

    /// Edge cut for the weights `free ++ [1 - sum(free)]`
    ///
    /// Never fails: a partitioner error is logged and scored as the total
    /// edge weight plus one, which no real cut can reach.
    pub fn evaluate(&mut self, free: &[f64]) -> f64 {
        self.evaluations += 1;
        let full = full_weights(free);
        debug_assert_eq!(full.len(), self.n_parts);

        let mut part: Vec<Idx> = vec![0; self.graph.n_vertices()];
        match self
            .partitioner
            .partition(self.graph, &full, &self.settings, &mut part)
        {
            Ok(cut) => {
                self.last_partition = Some(part);
                cut as f64
            }
            Err(e) => {
                warn!("Partitioner failed for weights {full:?}: {e}");
                self.graph.total_edge_weight() as f64 + 1.0
            }
        }
    }

    /// Partition produced by the most recent successful evaluation
    pub fn last_partition(&self) -> Option<&[Idx]> {
        self.last_partition.as_deref()
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::WeightRules;
    use crate::partition::testing::SlicingPartitioner;
    use crate::partition::MetisPartitioner;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use voxpart_common::{Error, Result};

    fn line_graph(n: usize) -> ImageGraph {
        let volume = Array3::<i16>::from_elem((n, 1, 1), 1);
        let voxels: Vec<_> = (0..n).map(|x| [x, 0, 0]).collect();
        let mut rng = StdRng::seed_from_u64(0);
        ImageGraph::build(&voxels, &volume, &WeightRules::default(), None, &mut rng).unwrap()
    }

    struct FailingPartitioner;

    impl Partitioner for FailingPartitioner {
        fn partition(
            &self,
            _: &ImageGraph,
            _: &[f64],
            _: &PartitionSettings,
            _: &mut [Idx],
        ) -> Result<u64> {
            Err(Error::Partition("boom".to_string()))
        }
    }

    #[test]
    fn test_full_weights_appends_deficit() {
        assert_eq!(full_weights(&[0.25, 0.25]), vec![0.25, 0.25, 0.5]);
        assert_eq!(full_weights(&[]), vec![1.0]);
        let w = full_weights(&[0.7, 0.6]);
        assert!(w[2] < 0.0);
    }

    #[test]
    fn test_evaluate_returns_cut_and_keeps_partition() {
        let graph = line_graph(10);
        let partitioner = SlicingPartitioner::default();
        let mut objective =
            EdgeCutObjective::new(&graph, &partitioner, 2, &PartitionSettings::default());

        assert!(objective.last_partition().is_none());
        let cut = objective.evaluate(&[0.5]);
        assert_eq!(cut, 1.0);
        assert_eq!(objective.last_partition().unwrap().len(), 10);
        assert_eq!(partitioner.calls.get(), 1);
        assert_eq!(objective.evaluations(), 1);
        assert_eq!(objective.n_parameters(), 1);
    }

    #[test]
    fn test_evaluate_tolerates_negative_deficit() {
        let graph = line_graph(10);
        let partitioner = SlicingPartitioner::default();
        let mut objective =
            EdgeCutObjective::new(&graph, &partitioner, 3, &PartitionSettings::default());
        let cut = objective.evaluate(&[0.9, 0.6]);
        assert!(cut.is_finite() && cut >= 0.0);
    }

    #[test]
    fn test_partitioner_failure_scores_penalty() {
        let graph = line_graph(5);
        let mut objective =
            EdgeCutObjective::new(&graph, &FailingPartitioner, 2, &PartitionSettings::default());
        let value = objective.evaluate(&[0.5]);
        assert_eq!(value, graph.total_edge_weight() as f64 + 1.0);
        assert!(objective.last_partition().is_none());
    }

    #[test]
    fn test_evaluate_on_simplex_is_finite_and_repeatable() {
        let graph = line_graph(30);
        let partitioner = MetisPartitioner;
        let settings = PartitionSettings {
            seed: Some(3),
            ..Default::default()
        };
        let mut objective = EdgeCutObjective::new(&graph, &partitioner, 3, &settings);

        for free in [[0.2, 0.3], [1.0 / 3.0, 1.0 / 3.0], [0.5, 0.0], [0.0, 0.0]] {
            let a = objective.evaluate(&free);
            let b = objective.evaluate(&free);
            assert!(a.is_finite() && a >= 0.0);
            assert_eq!(a, b);
        }
    }
}

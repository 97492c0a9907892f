//! Search over relative part weights
//!
//! [`OnePlusOne`] is a (1+1) evolution strategy: one parent, one Gaussian
//! mutation per iteration, the child replaces the parent when it is no
//! worse. The step radius grows on success and shrinks on failure with
//! factors that balance at a 1/5 success rate. It only ever looks at
//! function values.
//!
//! [`WeightSearch`] drives it over the edge-cut objective. Every iteration
//! costs one partitioner run, so this is slow on large graphs.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;
use voxpart_common::{Error, Result};

use crate::graph::ImageGraph;
use crate::objective::{full_weights, EdgeCutObjective};
use crate::partition::{PartitionSettings, Partitioner};

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_INITIAL_RADIUS: f64 = 0.005;
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.05;

/// (1+1) evolution strategy with a scalar step radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnePlusOne {
    /// Iterations run, always to completion
    pub max_iterations: usize,
    pub initial_radius: f64,
    /// Radius multiplier after an accepted mutation
    pub growth_factor: f64,
    /// Radius multiplier after a rejected mutation
    pub shrink_factor: f64,
}

impl Default for OnePlusOne {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_radius: DEFAULT_INITIAL_RADIUS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            shrink_factor: DEFAULT_GROWTH_FACTOR.powf(-0.25),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub position: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub accepted: usize,
    /// Step radius when the run ended
    pub radius: f64,
}

impl OnePlusOne {
    /// Minimise `f` starting at `initial`
    ///
    /// Mutated coordinates are clipped to `[0, 1]`.
    pub fn minimize<F, R>(&self, mut f: F, initial: &[f64], rng: &mut R) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
        R: Rng + ?Sized,
    {
        let mut parent = initial.to_vec();
        let mut parent_value = f(&parent);
        let mut child = vec![0.0; parent.len()];
        let mut radius = self.initial_radius;
        let mut evaluations = 1;
        let mut accepted = 0;

        for iteration in 0..self.max_iterations {
            for (c, &p) in child.iter_mut().zip(&parent) {
                let step: f64 = rng.sample(StandardNormal);
                *c = (p + radius * step).clamp(0.0, 1.0);
            }

            let value = f(&child);
            evaluations += 1;

            if value <= parent_value {
                std::mem::swap(&mut parent, &mut child);
                parent_value = value;
                radius *= self.growth_factor;
                accepted += 1;
            } else {
                radius *= self.shrink_factor;
            }

            debug!(
                "iteration {iteration}: value {value} best {parent_value} radius {radius:.6}"
            );
        }

        Minimum {
            position: parent,
            value: parent_value,
            evaluations,
            accepted,
            radius,
        }
    }
}

/// Result of a weight search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Full weight vector; the last entry is `1 - sum(others)` and is not
    /// clipped, so it can be negative
    pub weights: Vec<f64>,
    /// Best cut seen, `None` when the search was skipped
    pub cut: Option<f64>,
    pub evaluations: usize,
    pub accepted: usize,
}

/// Finds part weights that minimise the edge cut of one graph
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightSearch {
    pub optimizer: OnePlusOne,
    /// Seed of the search's generator; OS entropy when `None`
    pub seed: Option<u64>,
}

impl WeightSearch {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            optimizer: OnePlusOne::default(),
            seed,
        }
    }

    /// Search with a generator owned by this call
    pub fn search<P: Partitioner + ?Sized>(
        &self,
        graph: &ImageGraph,
        partitioner: &P,
        settings: &PartitionSettings,
        initial: &[f64],
    ) -> Result<SearchOutcome> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.search_with_rng(graph, partitioner, settings, initial, &mut rng)
    }

    /// Search drawing mutations from `rng`
    ///
    /// A single part needs no search and yields `[1.0]` without touching
    /// the partitioner.
    pub fn search_with_rng<P, R>(
        &self,
        graph: &ImageGraph,
        partitioner: &P,
        settings: &PartitionSettings,
        initial: &[f64],
        rng: &mut R,
    ) -> Result<SearchOutcome>
    where
        P: Partitioner + ?Sized,
        R: Rng + ?Sized,
    {
        let k = initial.len();
        if k == 0 {
            return Err(Error::invalid("weight search needs at least one part"));
        }
        if k == 1 {
            return Ok(SearchOutcome {
                weights: vec![1.0],
                cut: None,
                evaluations: 0,
                accepted: 0,
            });
        }
        if graph.n_vertices() == 0 {
            return Err(Error::invalid("weight search on an empty graph"));
        }

        let mut objective = EdgeCutObjective::new(graph, partitioner, k, settings);
        let minimum = self
            .optimizer
            .minimize(|x| objective.evaluate(x), &initial[..k - 1], rng);

        let weights = full_weights(&minimum.position);
        info!(
            "      Weight search: cut {} after {} evaluations ({} accepted)",
            minimum.value, minimum.evaluations, minimum.accepted
        );

        Ok(SearchOutcome {
            weights,
            cut: Some(minimum.value),
            evaluations: minimum.evaluations,
            accepted: minimum.accepted,
        })
    }
}

//! Segmentation of a label volume into balanced parts
//!
//! The foreground is split into connected components. The kept components
//! share the requested number of parts in proportion to their size; each
//! one becomes a voxel graph that is partitioned on its own. Part ids are
//! then stamped into the output with globally unique, contiguous labels
//! starting at 1.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use voxpart_common::{Error, Result};

use crate::components::{label_components, plan_components, ComponentPlan};
use crate::graph::{Idx, ImageGraph};
use crate::hints::WeightRules;
use crate::optimize::WeightSearch;
use crate::options::SegmentOptions;
use crate::partition::{MetisPartitioner, PartitionSettings, Partitioner};
use crate::verify::verify_graph;
use crate::volume::{Coord, LabelVolume};

/// What happened to one component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSummary {
    /// Component label, 1 for the largest
    pub label: u32,
    pub voxels: usize,
    pub fraction: f64,
    /// Parts assigned to this component, at most one per vertex
    pub n_parts: usize,
    pub vertices: usize,
    pub edges: usize,
    /// First output label of the component, 0 when nothing was written
    pub first_label: i16,
    /// Output labels actually used
    pub labels_used: usize,
    /// Weights of the final partitioning
    pub weights: Vec<f64>,
    pub cut: u64,
    /// Partitioner calls spent on the weight search
    pub search_evaluations: usize,
    /// Findings of the graph check, when it ran
    pub graph_findings: Option<usize>,
}

/// Run report, written by `--summary`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub dimensions: [usize; 3],
    pub voxels: usize,
    pub foreground_voxels: usize,
    pub n_components: usize,
    pub n_parts: usize,
    pub components: Vec<ComponentSummary>,
}

impl SegmentSummary {
    /// Number of distinct labels written to the output
    pub fn n_labels(&self) -> usize {
        self.components.iter().map(|c| c.labels_used).sum()
    }
}

/// Partition assignment of one component, not yet stamped
struct ComponentResult {
    coords: Vec<Coord>,
    part: Vec<Idx>,
    summary: ComponentSummary,
}

/// Segment the image at `input` and write the labels to `output`
///
/// All options are checked before the input is opened.
pub fn segment_image(
    input: &Path,
    output: &Path,
    n_parts: usize,
    options: &SegmentOptions,
) -> Result<SegmentSummary> {
    options.validate(n_parts)?;
    let rules = load_rules(options)?;

    info!("Reading {}", input.display());
    let volume = LabelVolume::read(input)?;

    let (labels, summary) = run(&volume, n_parts, options, &rules, &MetisPartitioner)?;

    labels.write(output)?;
    info!(
        "Wrote {} labels to {}",
        summary.n_labels(),
        output.display()
    );
    Ok(summary)
}

/// Segment an in-memory volume
pub fn segment_volume<P: Partitioner + Sync + ?Sized>(
    volume: &LabelVolume,
    n_parts: usize,
    options: &SegmentOptions,
    partitioner: &P,
) -> Result<(LabelVolume, SegmentSummary)> {
    options.validate(n_parts)?;
    let rules = load_rules(options)?;
    run(volume, n_parts, options, &rules, partitioner)
}

fn load_rules(options: &SegmentOptions) -> Result<WeightRules> {
    match &options.hints {
        Some(path) => {
            info!("Reading hints from {}", path.display());
            let rules = WeightRules::from_file(path)?;
            if rules.is_empty() {
                warn!("Hint file {} holds no rules, using defaults", path.display());
            }
            Ok(rules)
        }
        None => Ok(WeightRules::default()),
    }
}

fn run<P: Partitioner + Sync + ?Sized>(
    volume: &LabelVolume,
    n_parts: usize,
    options: &SegmentOptions,
    rules: &WeightRules,
    partitioner: &P,
) -> Result<(LabelVolume, SegmentSummary)> {
    if options.weights.is_empty() {
        info!("Partitioning into {n_parts} parts with uniform weights");
    } else {
        info!(
            "Partitioning into {n_parts} parts with weights {:?}",
            options.weights
        );
    }

    let (nx, ny, nz) = volume.dim();
    info!("Image dimensions: {nx} x {ny} x {nz}");

    let components = label_components(volume.data());
    let foreground_voxels: usize = components.sizes().iter().sum();
    info!(
        "Found {} components covering {} voxels",
        components.n_components(),
        foreground_voxels
    );

    let plans = plan_components(
        components.sizes(),
        n_parts,
        options.max_components,
        options.min_component_fraction,
    );
    let labels: Vec<u32> = plans.iter().map(|p| p.label).collect();
    let jobs: Vec<(ComponentPlan, Vec<Coord>)> =
        plans.into_iter().zip(components.voxels_of(&labels)).collect();

    let settings = options.partition_settings();
    let total = jobs.len() as u64;
    let done = AtomicU64::new(0);
    let process = |(plan, voxels): &(ComponentPlan, Vec<Coord>)| {
        let result = process_component(plan, voxels, volume, rules, options, &settings, partitioner);
        if let Some(progress) = &options.progress {
            progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
        }
        result
    };

    let results: Vec<ComponentResult> = if options.threads > 1 && jobs.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .build()
            .map_err(|e| Error::invalid(format!("failed to start {} threads: {e}", options.threads)))?;
        pool.install(|| jobs.par_iter().map(process).collect::<Result<Vec<_>>>())?
    } else {
        jobs.iter().map(process).collect::<Result<Vec<_>>>()?
    };

    let mut output = volume.zeros_like();
    let mut next_label: i32 = 1;
    let mut summaries = Vec::with_capacity(results.len());
    for mut result in results {
        let used = compact_parts(&mut result.part);
        let last = next_label as i64 + used as i64 - 1;
        if last > i64::from(i16::MAX) {
            return Err(Error::invalid(format!(
                "output label {last} does not fit the 16-bit label range"
            )));
        }

        for (&c, &p) in result.coords.iter().zip(&result.part) {
            output.set(c, (next_label + p) as i16);
        }
        if used > 0 {
            result.summary.first_label = next_label as i16;
        }
        result.summary.labels_used = used;
        next_label += used as i32;
        summaries.push(result.summary);
    }

    let summary = SegmentSummary {
        dimensions: [nx, ny, nz],
        voxels: volume.n_voxels(),
        foreground_voxels,
        n_components: components.n_components(),
        n_parts,
        components: summaries,
    };
    Ok((output, summary))
}

/// Renumber part ids to `0..n` keeping their order, returning `n`
///
/// The partitioner may leave a part empty; labels must stay contiguous.
fn compact_parts(part: &mut [Idx]) -> usize {
    let mut ids: Vec<Idx> = part.to_vec();
    ids.sort_unstable();
    ids.dedup();
    for p in part.iter_mut() {
        if let Ok(rank) = ids.binary_search(p) {
            *p = rank as Idx;
        }
    }
    ids.len()
}

fn process_component<P: Partitioner + ?Sized>(
    plan: &ComponentPlan,
    voxels: &[Coord],
    volume: &LabelVolume,
    rules: &WeightRules,
    options: &SegmentOptions,
    settings: &PartitionSettings,
    partitioner: &P,
) -> Result<ComponentResult> {
    // Per-component generator keeps parallel runs identical to sequential ones
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(plan.label))),
        None => StdRng::from_entropy(),
    };

    let graph = ImageGraph::build(
        voxels,
        volume.data(),
        rules,
        options.cut_plane.as_ref(),
        &mut rng,
    )?;
    info!(
        "Component {}: {} vertices, {} edges",
        plan.label,
        graph.n_vertices(),
        graph.n_edges()
    );

    let graph_findings = options.verify_graph.then(|| {
        let report = verify_graph(&graph);
        if !report.is_clean() {
            warn!(
                "Component {}: {} graph findings ({} mismatches)",
                plan.label,
                report.findings.len(),
                report.mismatches()
            );
            report.log_warnings();
        }
        report.findings.len()
    });

    // No more parts than vertices, otherwise some would stay empty
    let n_parts = match graph.n_vertices() {
        0 => plan.n_parts,
        n => plan.n_parts.min(n),
    };
    if n_parts < plan.n_parts {
        warn!(
            "Component {}: {} parts requested for {} vertices, using {}",
            plan.label,
            plan.n_parts,
            graph.n_vertices(),
            n_parts
        );
    }

    let mut weights = if options.weights.len() == n_parts {
        options.weights.clone()
    } else {
        vec![1.0 / n_parts as f64; n_parts]
    };

    let mut summary = ComponentSummary {
        label: plan.label,
        voxels: plan.voxels,
        fraction: plan.fraction,
        n_parts,
        vertices: graph.n_vertices(),
        edges: graph.n_edges(),
        first_label: 0,
        labels_used: 0,
        weights: Vec::new(),
        cut: 0,
        search_evaluations: 0,
        graph_findings,
    };

    if graph.n_vertices() == 0 {
        warn!(
            "Component {} has no voxel with a positive weight, skipping",
            plan.label
        );
        summary.weights = weights;
        return Ok(ComponentResult {
            coords: Vec::new(),
            part: Vec::new(),
            summary,
        });
    }

    if options.optimize && n_parts > 1 {
        let outcome =
            WeightSearch::default().search_with_rng(&graph, partitioner, settings, &weights, &mut rng)?;
        info!(
            "Component {}: optimised weights {:?}",
            plan.label, outcome.weights
        );
        summary.search_evaluations = outcome.evaluations;
        weights = outcome.weights;
    } else {
        info!("Component {}: weights {:?}", plan.label, weights);
    }

    let mut part: Vec<Idx> = vec![0; graph.n_vertices()];
    let cut = partitioner.partition(&graph, &weights, settings, &mut part)?;
    info!("Component {}: cut {}", plan.label, cut);

    summary.weights = weights;
    summary.cut = cut;
    Ok(ComponentResult {
        coords: graph.coords().to_vec(),
        part,
        summary,
    })
}

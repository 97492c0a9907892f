//! Connected components of the foreground
//!
//! Every non-zero voxel is foreground, whatever its label. Components are
//! grown over the 6-neighbourhood (shared faces) and renumbered so that
//! label 1 is the largest component.

use std::collections::VecDeque;

use log::info;
use ndarray::Array3;
use serde::Serialize;

use crate::volume::Coord;

/// Component label per voxel (0 = background) and the size of each label
#[derive(Debug, Clone)]
pub struct ComponentMap {
    labels: Array3<u32>,
    /// `sizes[i]` is the voxel count of label `i + 1`, non-increasing
    sizes: Vec<usize>,
}

/// One row of the component table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentPlan {
    pub label: u32,
    pub voxels: usize,
    /// Share of the counted foreground
    pub fraction: f64,
    pub n_parts: usize,
}

/// The six face neighbours of `c` that lie inside a volume of shape `dim`
pub(crate) fn face_neighbors(c: Coord, dim: (usize, usize, usize)) -> impl Iterator<Item = Coord> {
    let extent = [dim.0, dim.1, dim.2];
    (0..3).flat_map(move |axis| {
        let lower = (c[axis] > 0).then(|| {
            let mut n = c;
            n[axis] -= 1;
            n
        });
        let upper = (c[axis] + 1 < extent[axis]).then(|| {
            let mut n = c;
            n[axis] += 1;
            n
        });
        lower.into_iter().chain(upper)
    })
}

/// Label face-connected components of the non-zero voxels of `volume`
pub fn label_components(volume: &Array3<i16>) -> ComponentMap {
    let dim = volume.dim();
    let mut labels = Array3::<u32>::zeros(dim);
    let mut sizes: Vec<usize> = Vec::new();
    let mut queue: VecDeque<Coord> = VecDeque::new();

    for ((x, y, z), &value) in volume.indexed_iter() {
        if value == 0 || labels[[x, y, z]] != 0 {
            continue;
        }

        let label = sizes.len() as u32 + 1;
        let mut size = 0usize;
        labels[[x, y, z]] = label;
        queue.push_back([x, y, z]);

        while let Some(c) = queue.pop_front() {
            size += 1;
            for n in face_neighbors(c, dim) {
                if volume[n] != 0 && labels[n] == 0 {
                    labels[n] = label;
                    queue.push_back(n);
                }
            }
        }
        sizes.push(size);
    }

    // Relabel by decreasing size; ties keep discovery order
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));
    let mut remap = vec![0u32; sizes.len() + 1];
    for (rank, &old) in order.iter().enumerate() {
        remap[old + 1] = rank as u32 + 1;
    }
    labels.mapv_inplace(|l| remap[l as usize]);
    let sizes = order.iter().map(|&old| sizes[old]).collect();

    ComponentMap { labels, sizes }
}

impl ComponentMap {
    pub fn n_components(&self) -> usize {
        self.sizes.len()
    }

    /// Voxel counts, largest first
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn label_at(&self, c: Coord) -> u32 {
        self.labels[c]
    }

    /// Collect the voxels of each requested label, in raster order
    pub fn voxels_of(&self, wanted: &[u32]) -> Vec<Vec<Coord>> {
        let mut slot = vec![usize::MAX; self.sizes.len() + 1];
        let mut out: Vec<Vec<Coord>> = Vec::with_capacity(wanted.len());
        for (i, &label) in wanted.iter().enumerate() {
            if let Some(s) = slot.get_mut(label as usize) {
                *s = i;
            }
            let cap = (label as usize)
                .checked_sub(1)
                .and_then(|idx| self.sizes.get(idx))
                .copied()
                .unwrap_or(0);
            out.push(Vec::with_capacity(cap));
        }

        for ((x, y, z), &label) in self.labels.indexed_iter() {
            if label == 0 {
                continue;
            }
            let s = slot[label as usize];
            if s != usize::MAX {
                out[s].push([x, y, z]);
            }
        }
        out
    }
}

/// Decide which components are kept and how many parts each receives
///
/// Only the `max_components` largest components are counted. A component
/// whose share of the counted foreground is below `min_fraction` is dropped;
/// the others get `round(n_parts * fraction)` parts, at least one.
pub fn plan_components(
    sizes: &[usize],
    n_parts: usize,
    max_components: usize,
    min_fraction: f64,
) -> Vec<ComponentPlan> {
    let counted = &sizes[..sizes.len().min(max_components)];
    let n_total: usize = counted.iter().sum();
    if n_total == 0 {
        return Vec::new();
    }

    let mut plans = Vec::new();
    for (i, &voxels) in counted.iter().enumerate() {
        let fraction = voxels as f64 / n_total as f64;
        if fraction < min_fraction {
            continue;
        }
        let parts = ((0.5 + n_parts as f64 * fraction) as usize).max(1);
        info!(
            "Keeping component {} fraction {:.4} parts {}",
            i + 1,
            fraction,
            parts
        );
        plans.push(ComponentPlan {
            label: i as u32 + 1,
            voxels,
            fraction,
            n_parts: parts,
        });
    }
    plans
}

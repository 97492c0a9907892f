//! Voxel adjacency graphs in CSR form
//!
//! One vertex per included voxel of a component, one undirected edge per
//! pair of face neighbours. The arrays follow the METIS layout: neighbours
//! of vertex `i` are `adjncy[xadj[i]..xadj[i + 1]]`, with `adjwgt` aligned
//! to `adjncy`.

use std::collections::VecDeque;

use ndarray::Array3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use voxpart_common::{Error, Result};

use crate::hints::WeightRules;
use crate::volume::Coord;

/// Index type shared with the partitioner
pub type Idx = metis::Idx;

/// Largest vertex or edge weight a graph may carry
pub const MAX_WEIGHT: i32 = 1000;

/// A plane along which cuts are encouraged
///
/// Edges joining slice `slice` to slice `slice + 1` along axis `dim` keep
/// their weight; every other edge is `strength` times heavier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutPlane {
    pub dim: usize,
    pub slice: usize,
    pub strength: i32,
}

impl CutPlane {
    fn crosses(&self, a: Coord, b: Coord) -> bool {
        a[self.dim] != b[self.dim] && a[self.dim].min(b[self.dim]) == self.slice
    }

    fn apply(&self, a: Coord, b: Coord, weight: i32) -> i32 {
        if self.crosses(a, b) {
            weight
        } else {
            weight.saturating_mul(self.strength).min(MAX_WEIGHT)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageGraph {
    xadj: Vec<Idx>,
    adjncy: Vec<Idx>,
    vwgt: Vec<Idx>,
    adjwgt: Vec<Idx>,
    coords: Vec<Coord>,
}

impl ImageGraph {
    /// Wrap raw CSR arrays
    ///
    /// Only the array shapes are checked here; symmetry and weight ranges
    /// are the business of [`crate::verify::verify_graph`].
    pub fn from_csr(
        xadj: Vec<Idx>,
        adjncy: Vec<Idx>,
        vwgt: Vec<Idx>,
        adjwgt: Vec<Idx>,
        coords: Vec<Coord>,
    ) -> Result<Self> {
        let n = vwgt.len();
        if xadj.len() != n + 1 {
            return Err(Error::invalid(format!(
                "xadj has {} entries, expected {}",
                xadj.len(),
                n + 1
            )));
        }
        if xadj[0] != 0 || xadj.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::invalid("xadj must start at 0 and be non-decreasing"));
        }
        if xadj[n] as usize != adjncy.len() {
            return Err(Error::invalid(format!(
                "xadj ends at {} but adjncy has {} entries",
                xadj[n],
                adjncy.len()
            )));
        }
        if adjwgt.len() != adjncy.len() {
            return Err(Error::invalid("adjwgt must be aligned with adjncy"));
        }
        if coords.len() != n {
            return Err(Error::invalid("one coordinate per vertex is required"));
        }
        Ok(Self {
            xadj,
            adjncy,
            vwgt,
            adjwgt,
            coords,
        })
    }

    /// Build the graph of one component
    ///
    /// `voxels` lists the component's voxels; `intensities` is the input
    /// volume the weight rules are evaluated on. Each undirected edge gets
    /// its weight drawn once, so the result is symmetric by construction.
    pub fn build<R: Rng + ?Sized>(
        voxels: &[Coord],
        intensities: &Array3<i16>,
        rules: &WeightRules,
        plane: Option<&CutPlane>,
        rng: &mut R,
    ) -> Result<Self> {
        if voxels.len() > Idx::MAX as usize {
            return Err(Error::invalid(format!(
                "component of {} voxels exceeds the partitioner index range",
                voxels.len()
            )));
        }
        if voxels.is_empty() {
            return Self::from_csr(vec![0], Vec::new(), Vec::new(), Vec::new(), Vec::new());
        }

        // Local vertex index over the component's bounding box. The box never
        // exceeds the input volume, so a sparse diagonal component costs at
        // most one Idx per input voxel.
        let mut lo = voxels[0];
        let mut hi = voxels[0];
        for c in voxels {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(c[axis]);
                hi[axis] = hi[axis].max(c[axis]);
            }
        }
        let shape = (hi[0] - lo[0] + 1, hi[1] - lo[1] + 1, hi[2] - lo[2] + 1);
        let mut local = Array3::<Idx>::from_elem(shape, -1);
        let rel = |c: Coord| [c[0] - lo[0], c[1] - lo[1], c[2] - lo[2]];

        let mut vwgt: Vec<Idx> = Vec::with_capacity(voxels.len());
        let mut coords: Vec<Coord> = Vec::with_capacity(voxels.len());
        for &c in voxels {
            let w = rules.vertex_weight(intensities[c], rng);
            if w > 0 {
                local[rel(c)] = coords.len() as Idx;
                vwgt.push(Idx::from(w));
                coords.push(c);
            }
        }

        // Forward neighbours only; each edge is seen once
        let mut edges: Vec<(usize, usize, Idx)> = Vec::new();
        let mut degree = vec![0usize; coords.len()];
        for (v, &c) in coords.iter().enumerate() {
            for axis in 0..3 {
                if c[axis] >= hi[axis] {
                    continue;
                }
                let mut n = c;
                n[axis] += 1;
                let u = local[rel(n)];
                if u < 0 {
                    continue;
                }

                let mut w = rules.edge_weight(intensities[c], intensities[n], rng);
                if let Some(plane) = plane {
                    w = plane.apply(c, n, w);
                }
                if w > 0 {
                    let u = u as usize;
                    degree[v] += 1;
                    degree[u] += 1;
                    edges.push((v, u, Idx::from(w)));
                }
            }
        }

        let mut xadj: Vec<Idx> = Vec::with_capacity(coords.len() + 1);
        xadj.push(0);
        let mut total = 0usize;
        for d in &degree {
            total += d;
            xadj.push(total as Idx);
        }

        let mut cursor: Vec<usize> = xadj[..coords.len()].iter().map(|&o| o as usize).collect();
        let mut adjncy: Vec<Idx> = vec![0; total];
        let mut adjwgt: Vec<Idx> = vec![0; total];
        for &(v, u, w) in &edges {
            adjncy[cursor[v]] = u as Idx;
            adjwgt[cursor[v]] = w;
            cursor[v] += 1;
            adjncy[cursor[u]] = v as Idx;
            adjwgt[cursor[u]] = w;
            cursor[u] += 1;
        }

        Ok(Self {
            xadj,
            adjncy,
            vwgt,
            adjwgt,
            coords,
        })
    }

    pub fn n_vertices(&self) -> usize {
        self.vwgt.len()
    }

    /// Number of undirected edges
    pub fn n_edges(&self) -> usize {
        self.adjncy.len() / 2
    }

    pub fn xadj(&self) -> &[Idx] {
        &self.xadj
    }

    pub fn adjncy(&self) -> &[Idx] {
        &self.adjncy
    }

    pub fn vertex_weights(&self) -> &[Idx] {
        &self.vwgt
    }

    pub fn edge_weights(&self) -> &[Idx] {
        &self.adjwgt
    }

    /// Image coordinate of vertex `v`
    pub fn coordinate(&self, v: usize) -> Coord {
        self.coords[v]
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    /// `(neighbour, weight)` pairs of vertex `v`
    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = (usize, Idx)> + '_ {
        let start = self.xadj[v] as usize;
        let end = self.xadj[v + 1] as usize;
        self.adjncy[start..end]
            .iter()
            .zip(&self.adjwgt[start..end])
            .map(|(&u, &w)| (u as usize, w))
    }

    /// Sum of the undirected edge weights, an upper bound of any cut
    pub fn total_edge_weight(&self) -> u64 {
        self.adjwgt.iter().map(|&w| w.max(0) as u64).sum::<u64>() / 2
    }

    pub fn is_connected(&self) -> bool {
        let n = self.n_vertices();
        if n <= 1 {
            return true;
        }

        let mut visited = vec![false; n];
        let mut queue = VecDeque::new();
        visited[0] = true;
        queue.push_back(0usize);
        let mut reached = 1;

        while let Some(v) = queue.pop_front() {
            for (u, _) in self.neighbors(v) {
                if u < n && !visited[u] {
                    visited[u] = true;
                    reached += 1;
                    queue.push_back(u);
                }
            }
        }
        reached == n
    }

    /// Total weight of edges whose endpoints lie in different parts
    pub fn edge_cut(&self, part: &[Idx]) -> u64 {
        let mut cut = 0u64;
        for v in 0..self.n_vertices() {
            for (u, w) in self.neighbors(v) {
                if v < u && part[v] != part[u] {
                    cut += w.max(0) as u64;
                }
            }
        }
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn block(dim: (usize, usize, usize)) -> (Array3<i16>, Vec<Coord>) {
        let volume = Array3::<i16>::from_elem(dim, 1);
        let voxels = volume.indexed_iter().map(|((x, y, z), _)| [x, y, z]).collect();
        (volume, voxels)
    }

    #[test]
    fn test_build_block_counts() {
        let (volume, voxels) = block((2, 2, 2));
        let mut rng = StdRng::seed_from_u64(0);
        let graph =
            ImageGraph::build(&voxels, &volume, &WeightRules::default(), None, &mut rng).unwrap();

        assert_eq!(graph.n_vertices(), 8);
        // a cube has 12 edges
        assert_eq!(graph.n_edges(), 12);
        assert_eq!(graph.xadj().len(), 9);
        assert!(graph.neighbors(0).all(|(_, w)| w == 1));
        assert!(graph.is_connected());
        assert_eq!(graph.total_edge_weight(), 12);
    }

    #[test]
    fn test_build_is_symmetric() {
        let (volume, voxels) = block((3, 2, 2));
        let rules: WeightRules = "E * * U 1 50\n".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let graph = ImageGraph::build(&voxels, &volume, &rules, None, &mut rng).unwrap();

        for v in 0..graph.n_vertices() {
            for (u, w) in graph.neighbors(v) {
                assert!(graph.neighbors(u).any(|(back, bw)| back == v && bw == w));
            }
        }
    }

    #[test]
    fn test_zero_vertex_weight_excludes_voxels() {
        let mut volume = Array3::<i16>::from_elem((3, 1, 1), 1);
        volume[[1, 0, 0]] = 2;
        let voxels = vec![[0, 0, 0], [1, 0, 0], [2, 0, 0]];
        let rules: WeightRules = "V 2 0\n".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let graph = ImageGraph::build(&voxels, &volume, &rules, None, &mut rng).unwrap();

        assert_eq!(graph.n_vertices(), 2);
        assert_eq!(graph.n_edges(), 0);
        assert!(!graph.is_connected());
        assert_eq!(graph.coordinate(1), [2, 0, 0]);
    }

    #[test]
    fn test_cut_plane_weights() {
        let (volume, voxels) = block((4, 1, 1));
        let plane = CutPlane {
            dim: 0,
            slice: 1,
            strength: 10,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let graph =
            ImageGraph::build(&voxels, &volume, &WeightRules::default(), Some(&plane), &mut rng)
                .unwrap();

        // edges 0-1, 1-2, 2-3; only 1-2 crosses the plane
        let w01 = graph.neighbors(0).find(|&(u, _)| u == 1).unwrap().1;
        let w12 = graph.neighbors(1).find(|&(u, _)| u == 2).unwrap().1;
        let w23 = graph.neighbors(2).find(|&(u, _)| u == 3).unwrap().1;
        assert_eq!((w01, w12, w23), (10, 1, 10));
    }

    #[test]
    fn test_edge_cut() {
        let (volume, voxels) = block((4, 1, 1));
        let mut rng = StdRng::seed_from_u64(0);
        let graph =
            ImageGraph::build(&voxels, &volume, &WeightRules::default(), None, &mut rng).unwrap();
        assert_eq!(graph.edge_cut(&[0, 0, 1, 1]), 1);
        assert_eq!(graph.edge_cut(&[0, 1, 0, 1]), 3);
        assert_eq!(graph.edge_cut(&[0, 0, 0, 0]), 0);
    }

    #[test]
    fn test_from_csr_rejects_bad_shapes() {
        let coords = vec![[0, 0, 0]; 2];
        assert!(ImageGraph::from_csr(vec![0, 1], vec![1], vec![1, 1], vec![1], coords.clone()).is_err());
        assert!(ImageGraph::from_csr(vec![0, 1, 2], vec![1, 0], vec![1, 1], vec![1], coords.clone()).is_err());
        assert!(ImageGraph::from_csr(vec![0, 1, 2], vec![1, 0], vec![1, 1], vec![1, 1], coords).is_ok());
    }
}

//! Graph consistency check
//!
//! A debugging aid: walks the CSR arrays and reports every edge without a
//! matching reverse edge and every weight outside `(0, MAX_WEIGHT]`.
//! Findings are logged as warnings and never stop a run.

use std::fmt;

use log::warn;

use crate::graph::{Idx, ImageGraph, MAX_WEIGHT};

/// Findings printed before the rest is summarised
const MAX_LOGGED: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// `vertex -> neighbor` with `weight` has no `neighbor -> vertex` twin
    Mismatch {
        vertex: usize,
        neighbor: usize,
        weight: Idx,
    },
    /// Neighbour index outside the vertex range
    DanglingEdge { vertex: usize, neighbor: Idx },
    SelfLoop { vertex: usize },
    BadVertexWeight { vertex: usize, weight: Idx },
    BadEdgeWeight {
        vertex: usize,
        neighbor: usize,
        weight: Idx,
    },
    /// Adjacency range of `vertex` falls outside the neighbour array
    BrokenIndex { vertex: usize },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Mismatch {
                vertex,
                neighbor,
                weight,
            } => write!(f, "Mismatch at node {vertex} edge to {neighbor} weight {weight}"),
            Finding::DanglingEdge { vertex, neighbor } => {
                write!(f, "Node {vertex} has edge to missing node {neighbor}")
            }
            Finding::SelfLoop { vertex } => write!(f, "Self loop at node {vertex}"),
            Finding::BadVertexWeight { vertex, weight } => {
                write!(f, "Bad weight {weight} at node {vertex}")
            }
            Finding::BadEdgeWeight {
                vertex,
                neighbor,
                weight,
            } => write!(f, "Bad weight {weight} on edge {vertex} -> {neighbor}"),
            Finding::BrokenIndex { vertex } => {
                write!(f, "Adjacency index of node {vertex} is out of range")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of edges lacking a symmetric twin
    pub fn mismatches(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| matches!(f, Finding::Mismatch { .. }))
            .count()
    }

    /// Findings involving `vertex` as the source
    pub fn at_vertex(&self, vertex: usize) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| match f {
            Finding::Mismatch { vertex: v, .. }
            | Finding::DanglingEdge { vertex: v, .. }
            | Finding::SelfLoop { vertex: v }
            | Finding::BadVertexWeight { vertex: v, .. }
            | Finding::BadEdgeWeight { vertex: v, .. }
            | Finding::BrokenIndex { vertex: v } => *v == vertex,
        })
    }

    pub fn log_warnings(&self) {
        for finding in self.findings.iter().take(MAX_LOGGED) {
            warn!("{finding}");
        }
        if self.findings.len() > MAX_LOGGED {
            warn!(
                "... and {} more graph findings",
                self.findings.len() - MAX_LOGGED
            );
        }
    }
}

fn weight_in_range(w: Idx) -> bool {
    w > 0 && w <= Idx::from(MAX_WEIGHT)
}

/// Check raw CSR arrays
pub fn verify_csr(xadj: &[Idx], adjncy: &[Idx], vwgt: &[Idx], adjwgt: &[Idx]) -> VerifyReport {
    let n = xadj.len().saturating_sub(1);
    let mut findings = Vec::new();

    let range = |v: usize| -> Option<(usize, usize)> {
        let start = usize::try_from(*xadj.get(v)?).ok()?;
        let end = usize::try_from(*xadj.get(v + 1)?).ok()?;
        (start <= end && end <= adjncy.len() && end <= adjwgt.len()).then_some((start, end))
    };

    for i in 0..n {
        match vwgt.get(i) {
            Some(&w) if weight_in_range(w) => {}
            Some(&w) => findings.push(Finding::BadVertexWeight { vertex: i, weight: w }),
            None => findings.push(Finding::BadVertexWeight { vertex: i, weight: 0 }),
        }

        let Some((start, end)) = range(i) else {
            findings.push(Finding::BrokenIndex { vertex: i });
            continue;
        };

        for k in start..end {
            let m = adjncy[k];
            let w = adjwgt[k];

            let m_idx = match usize::try_from(m) {
                Ok(m_idx) if m_idx < n => m_idx,
                _ => {
                    findings.push(Finding::DanglingEdge { vertex: i, neighbor: m });
                    continue;
                }
            };
            if m_idx == i {
                findings.push(Finding::SelfLoop { vertex: i });
            }
            if !weight_in_range(w) {
                findings.push(Finding::BadEdgeWeight {
                    vertex: i,
                    neighbor: m_idx,
                    weight: w,
                });
            }

            let matched = range(m_idx).is_some_and(|(ms, me)| {
                (ms..me).any(|p| adjncy[p] as usize == i && adjwgt[p] == w)
            });
            if !matched {
                findings.push(Finding::Mismatch {
                    vertex: i,
                    neighbor: m_idx,
                    weight: w,
                });
            }
        }
    }

    VerifyReport { findings }
}

/// Check a built graph
pub fn verify_graph(graph: &ImageGraph) -> VerifyReport {
    verify_csr(
        graph.xadj(),
        graph.adjncy(),
        graph.vertex_weights(),
        graph.edge_weights(),
    )
}

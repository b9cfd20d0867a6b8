//! Interaction topologies.
//!
//! Three shapes are supported:
//! - **Well-mixed**: an implicit complete graph. No adjacency is stored; the
//!   payoff engine works on aggregate counts.
//! - **Hierarchical demes**: `count` contiguous slices of `size` agents, each
//!   well-mixed internally. Boundaries never move.
//! - **Graph**: explicit neighbour lists stored in offset-array form
//!   (`offsets[i]..offsets[i+1]` indexes into `neighbours`).
//!
//! Interaction and reproduction may use different topologies through
//! [`Structure`].

mod generators;

pub use generators::build_graph;

use crate::error::{CoreError, Result};
use ludus_data::{DemeLayout, Geometry};
use petgraph::graph::UnGraph;
use rand::Rng;

/// Undirected graph in offset-array form.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub geometry: Geometry,
    offsets: Vec<usize>,
    neighbours: Vec<usize>,
}

impl Graph {
    /// Builds a graph from adjacency lists, dropping self-loops and duplicate
    /// links and adding missing reverse links.
    #[must_use]
    pub fn from_adjacency(geometry: Geometry, mut adjacency: Vec<Vec<usize>>) -> Self {
        let n = adjacency.len();
        let mut reverse = Vec::new();
        for (i, list) in adjacency.iter().enumerate() {
            for &j in list {
                if j != i && j < n {
                    reverse.push((j, i));
                }
            }
        }
        for (j, i) in reverse {
            adjacency[j].push(i);
        }
        let mut offsets = Vec::with_capacity(n + 1);
        let mut neighbours = Vec::new();
        offsets.push(0);
        for (i, list) in adjacency.iter_mut().enumerate() {
            list.retain(|&j| j != i && j < n);
            list.sort_unstable();
            list.dedup();
            neighbours.extend_from_slice(list);
            offsets.push(neighbours.len());
        }
        Self {
            geometry,
            offsets,
            neighbours,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.offsets.len() - 1
    }

    #[must_use]
    pub fn neighbours(&self, agent: usize) -> &[usize] {
        &self.neighbours[self.offsets[agent]..self.offsets[agent + 1]]
    }

    #[must_use]
    pub fn degree(&self, agent: usize) -> usize {
        self.offsets[agent + 1] - self.offsets[agent]
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.neighbours.len() / 2
    }

    #[must_use]
    pub fn average_degree(&self) -> f64 {
        if self.size() == 0 {
            0.0
        } else {
            self.neighbours.len() as f64 / self.size() as f64
        }
    }

    /// Side length of square and hexagonal lattices.
    #[must_use]
    pub fn lattice_side(&self) -> Option<usize> {
        if self.geometry.is_lattice() {
            let side = (self.size() as f64).sqrt().round() as usize;
            (side * side == self.size()).then_some(side)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        if self.size() <= 1 {
            return true;
        }
        let mut graph = UnGraph::<(), ()>::with_capacity(self.size(), self.edge_count());
        let nodes: Vec<_> = (0..self.size()).map(|_| graph.add_node(())).collect();
        for i in 0..self.size() {
            for &j in self.neighbours(i) {
                if i < j {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }
        petgraph::algo::connected_components(&graph) == 1
    }
}

/// Population structure used for one role (interaction or reproduction).
#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
    WellMixed { size: usize },
    Demes(DemeLayout),
    Graph(Graph),
}

/// Neighbourhood of an agent.
#[derive(Debug, Clone)]
pub enum Neighbours<'a> {
    /// Contiguous range with the focal removed.
    Range {
        range: std::ops::Range<usize>,
        skip: usize,
    },
    Slice(std::slice::Iter<'a, usize>),
}

impl Iterator for Neighbours<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Range { range, skip } => {
                let next = range.next()?;
                if next == *skip {
                    range.next()
                } else {
                    Some(next)
                }
            }
            Self::Slice(iter) => iter.next().copied(),
        }
    }
}

impl Topology {
    /// Builds the topology for `size` agents. Random graphs draw from `rng`.
    pub fn build<R: Rng>(
        geometry: Geometry,
        size: usize,
        demes: Option<DemeLayout>,
        rng: &mut R,
    ) -> Result<Self> {
        if let Some(layout) = demes {
            if layout.population_size() != size {
                return Err(CoreError::config(format!(
                    "deme layout {layout} does not cover {size} agents"
                )));
            }
            return Ok(Self::Demes(layout));
        }
        match geometry {
            Geometry::WellMixed => Ok(Self::WellMixed { size }),
            _ => Ok(Self::Graph(build_graph(geometry, size, rng)?)),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::WellMixed { size } => *size,
            Self::Demes(layout) => layout.population_size(),
            Self::Graph(graph) => graph.size(),
        }
    }

    #[must_use]
    pub fn is_well_mixed(&self) -> bool {
        matches!(self, Self::WellMixed { .. })
    }

    #[must_use]
    pub fn demes(&self) -> Option<DemeLayout> {
        match self {
            Self::Demes(layout) => Some(*layout),
            _ => None,
        }
    }

    #[must_use]
    pub fn graph(&self) -> Option<&Graph> {
        match self {
            Self::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    /// Number of potential partners of `agent`.
    #[must_use]
    pub fn degree(&self, agent: usize) -> usize {
        match self {
            Self::WellMixed { size } => size.saturating_sub(1),
            Self::Demes(layout) => layout.size - 1,
            Self::Graph(graph) => graph.degree(agent),
        }
    }

    #[must_use]
    pub fn neighbours(&self, agent: usize) -> Neighbours<'_> {
        match self {
            Self::WellMixed { size } => Neighbours::Range {
                range: 0..*size,
                skip: agent,
            },
            Self::Demes(layout) => Neighbours::Range {
                range: layout.members(layout.deme_of(agent)),
                skip: agent,
            },
            Self::Graph(graph) => Neighbours::Slice(graph.neighbours(agent).iter()),
        }
    }

    /// Uniformly random partner of `agent`; draws exactly one integer when a
    /// partner exists and nothing otherwise.
    pub fn random_neighbour<R: Rng>(&self, agent: usize, rng: &mut R) -> Option<usize> {
        match self {
            Self::WellMixed { size } => random_other(0, *size, agent, rng),
            Self::Demes(layout) => {
                let members = layout.members(layout.deme_of(agent));
                random_other(members.start, members.end, agent, rng)
            }
            Self::Graph(graph) => {
                let list = graph.neighbours(agent);
                if list.is_empty() {
                    None
                } else {
                    Some(list[rng.gen_range(0..list.len())])
                }
            }
        }
    }
}

/// Uniform index in `start..end` other than `skip`.
fn random_other<R: Rng>(start: usize, end: usize, skip: usize, rng: &mut R) -> Option<usize> {
    if end - start < 2 {
        return None;
    }
    let pick = start + rng.gen_range(0..end - start - 1);
    Some(if pick >= skip { pick + 1 } else { pick })
}

/// Interaction and reproduction topologies of a population.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub interaction: Topology,
    reproduction: Option<Topology>,
}

impl Structure {
    #[must_use]
    pub fn new(interaction: Topology, reproduction: Option<Topology>) -> Self {
        Self {
            interaction,
            reproduction,
        }
    }

    /// Topology used to pick references and offspring sites.
    #[must_use]
    pub fn reproduction(&self) -> &Topology {
        self.reproduction.as_ref().unwrap_or(&self.interaction)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.interaction.size()
    }

    #[must_use]
    pub fn demes(&self) -> Option<DemeLayout> {
        self.interaction.demes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_from_adjacency_symmetrises() {
        let graph = Graph::from_adjacency(
            Geometry::Complete,
            vec![vec![1, 1, 0], vec![], vec![0]],
        );
        assert_eq!(graph.neighbours(0), &[1, 2]);
        assert_eq!(graph.neighbours(1), &[0]);
        assert_eq!(graph.neighbours(2), &[0]);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.is_connected());
    }

    #[test]
    fn test_random_neighbour_never_self() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mixed = Topology::WellMixed { size: 5 };
        let demes = Topology::Demes(DemeLayout { count: 3, size: 4 });
        for _ in 0..500 {
            let a = rng.gen_range(0..5);
            let b = mixed.random_neighbour(a, &mut rng).unwrap();
            assert_ne!(a, b);
            assert!(b < 5);
            let c = rng.gen_range(0..12);
            let d = demes.random_neighbour(c, &mut rng).unwrap();
            assert_ne!(c, d);
            assert_eq!(c / 4, d / 4);
        }
    }

    #[test]
    fn test_singleton_deme_has_no_neighbour() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let demes = Topology::Demes(DemeLayout { count: 4, size: 1 });
        assert_eq!(demes.random_neighbour(2, &mut rng), None);
        assert_eq!(demes.neighbours(2).count(), 0);
    }

    #[test]
    fn test_neighbour_iteration_skips_focal() {
        let demes = Topology::Demes(DemeLayout { count: 2, size: 3 });
        let members: Vec<usize> = demes.neighbours(4).collect();
        assert_eq!(members, vec![3, 5]);
        let mixed = Topology::WellMixed { size: 3 };
        assert_eq!(mixed.neighbours(2).collect::<Vec<_>>(), vec![0, 1]);
    }
}

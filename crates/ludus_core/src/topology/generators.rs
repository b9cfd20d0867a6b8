use super::Graph;
use crate::error::{CoreError, Result};
use ludus_data::Geometry;
use rand::seq::SliceRandom;
use rand::Rng;

const MAX_GRAPH_ATTEMPTS: usize = 100;

/// Builds an explicit graph for `size` agents.
///
/// Deterministic geometries draw nothing; random geometries draw from `rng`
/// in a fixed order so that identical seeds give identical graphs.
pub fn build_graph<R: Rng>(geometry: Geometry, size: usize, rng: &mut R) -> Result<Graph> {
    if size < 2 {
        return Err(CoreError::config(format!(
            "geometry {geometry} needs at least 2 agents, got {size}"
        )));
    }
    let adjacency = match geometry {
        Geometry::WellMixed | Geometry::Complete => complete(size),
        Geometry::Linear { k } => linear(size, k)?,
        Geometry::VonNeumann => lattice(size, &[(1, 0), (0, 1)])?,
        Geometry::Moore => lattice(size, &[(1, 0), (0, 1), (1, 1), (1, -1)])?,
        Geometry::Hexagonal => lattice(size, &[(1, 0), (0, 1), (1, -1)])?,
        Geometry::Star => star(size),
        Geometry::Wheel => wheel(size)?,
        Geometry::RandomRegular { k } => random_regular(size, k, rng)?,
        Geometry::Random { k } => random_connected(size, k, rng)?,
    };
    let graph = Graph::from_adjacency(geometry, adjacency);
    if !graph.is_connected() {
        return Err(CoreError::config(format!(
            "geometry {geometry} with {size} agents is not connected"
        )));
    }
    tracing::debug!(
        geometry = %geometry,
        size,
        edges = graph.edge_count(),
        "Built interaction graph"
    );
    Ok(graph)
}

fn complete(n: usize) -> Vec<Vec<usize>> {
    (0..n)
        .map(|i| (0..n).filter(|&j| j != i).collect())
        .collect()
}

fn linear(n: usize, k: usize) -> Result<Vec<Vec<usize>>> {
    let half = (k / 2).max(1);
    if 2 * half >= n {
        return Err(CoreError::config(format!(
            "linear geometry with degree {k} needs more than {} agents",
            2 * half
        )));
    }
    Ok((0..n)
        .map(|i| {
            (1..=half)
                .flat_map(|d| [(i + d) % n, (i + n - d) % n])
                .collect()
        })
        .collect())
}

/// Periodic lattice on a `side x side` torus; `offsets` lists one direction
/// per neighbour pair, the reverse links come from symmetrisation.
fn lattice(n: usize, offsets: &[(isize, isize)]) -> Result<Vec<Vec<usize>>> {
    let side = (n as f64).sqrt().round() as usize;
    if side * side != n || side < 3 {
        return Err(CoreError::config(format!(
            "lattice geometries need a square size of at least 9, got {n}"
        )));
    }
    let s = side as isize;
    let mut adjacency = vec![Vec::with_capacity(2 * offsets.len()); n];
    for y in 0..s {
        for x in 0..s {
            let i = (y * s + x) as usize;
            for &(dx, dy) in offsets {
                let nx = (x + dx).rem_euclid(s);
                let ny = (y + dy).rem_euclid(s);
                adjacency[i].push((ny * s + nx) as usize);
            }
        }
    }
    Ok(adjacency)
}

fn star(n: usize) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    adjacency[0] = (1..n).collect();
    adjacency
}

fn wheel(n: usize) -> Result<Vec<Vec<usize>>> {
    if n < 4 {
        return Err(CoreError::config(format!(
            "wheel geometry needs at least 4 agents, got {n}"
        )));
    }
    let rim = n - 1;
    let mut adjacency = star(n);
    for i in 0..rim {
        adjacency[1 + i].push(1 + (i + 1) % rim);
    }
    Ok(adjacency)
}

/// Configuration model with rejection of self-loops and double links.
fn random_regular<R: Rng>(n: usize, k: usize, rng: &mut R) -> Result<Vec<Vec<usize>>> {
    if k == 0 || k >= n || (n * k) % 2 != 0 {
        return Err(CoreError::config(format!(
            "no random regular graph with {n} agents of degree {k}"
        )));
    }
    let mut stubs: Vec<usize> = (0..n).flat_map(|i| std::iter::repeat(i).take(k)).collect();
    for attempt in 0..MAX_GRAPH_ATTEMPTS {
        stubs.shuffle(rng);
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::with_capacity(k); n];
        let valid = stubs.chunks_exact(2).all(|pair| {
            let (a, b) = (pair[0], pair[1]);
            if a == b || adjacency[a].contains(&b) {
                return false;
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
            true
        });
        if valid
            && Graph::from_adjacency(Geometry::RandomRegular { k }, adjacency.clone())
                .is_connected()
        {
            tracing::debug!(attempt, "Random regular graph accepted");
            return Ok(adjacency);
        }
    }
    Err(CoreError::config(format!(
        "failed to draw a connected random regular graph ({n} agents, degree {k})"
    )))
}

/// Random spanning tree plus uniformly added links up to an average degree of `k`.
fn random_connected<R: Rng>(n: usize, k: usize, rng: &mut R) -> Result<Vec<Vec<usize>>> {
    let max_links = n * (n - 1) / 2;
    let target = (n * k / 2).clamp(n - 1, max_links);
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 1..n {
        let j = rng.gen_range(0..i);
        adjacency[i].push(j);
        adjacency[j].push(i);
    }
    let mut links = n - 1;
    let mut attempts = 0usize;
    while links < target {
        attempts += 1;
        if attempts > 100 * max_links {
            return Err(CoreError::config(format!(
                "failed to place {target} links among {n} agents"
            )));
        }
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        if a == b || adjacency[a].contains(&b) {
            continue;
        }
        adjacency[a].push(b);
        adjacency[b].push(a);
        links += 1;
    }
    Ok(adjacency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_lattice_degrees() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for (geometry, degree) in [
            (Geometry::VonNeumann, 4),
            (Geometry::Moore, 8),
            (Geometry::Hexagonal, 6),
        ] {
            let graph = build_graph(geometry, 25, &mut rng).unwrap();
            assert!((0..25).all(|i| graph.degree(i) == degree), "{geometry}");
            assert_eq!(graph.lattice_side(), Some(5));
        }
    }

    #[test]
    fn test_lattice_requires_square_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(build_graph(Geometry::VonNeumann, 24, &mut rng).is_err());
    }

    #[test]
    fn test_linear_ring() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let graph = build_graph(Geometry::Linear { k: 4 }, 10, &mut rng).unwrap();
        assert_eq!(graph.neighbours(0), &[1, 2, 8, 9]);
    }

    #[test]
    fn test_star_and_wheel() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let star = build_graph(Geometry::Star, 6, &mut rng).unwrap();
        assert_eq!(star.degree(0), 5);
        assert_eq!(star.degree(3), 1);
        let wheel = build_graph(Geometry::Wheel, 6, &mut rng).unwrap();
        assert_eq!(wheel.degree(0), 5);
        assert!((1..6).all(|i| wheel.degree(i) == 3));
    }

    #[test]
    fn test_random_regular_is_regular_and_reproducible() {
        let mut a = ChaCha8Rng::seed_from_u64(11);
        let mut b = ChaCha8Rng::seed_from_u64(11);
        let g1 = build_graph(Geometry::RandomRegular { k: 3 }, 20, &mut a).unwrap();
        let g2 = build_graph(Geometry::RandomRegular { k: 3 }, 20, &mut b).unwrap();
        assert_eq!(g1, g2);
        assert!((0..20).all(|i| g1.degree(i) == 3));
    }

    #[test]
    fn test_random_graph_average_degree() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let graph = build_graph(Geometry::Random { k: 4 }, 50, &mut rng).unwrap();
        assert_eq!(graph.edge_count(), 100);
        assert!(graph.is_connected());
    }
}

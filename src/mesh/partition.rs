//! Level-aware weighted repartitioning.
//!
//! An element's work per coarse step is 2^(L-1-l) Np(N): it advances
//! 2^(L-1-l) times at level l. Elements of the finer levels are clustered
//! with their face neighbours so a fine element and the halo it needs end
//! up on the same rank. Clusters are ordered along a Morton curve and cut
//! into contiguous chunks of equal weight.
//!
//! Clustering proceeds level by level; a clustering is accepted only while
//! the load ratio min/max stays above the tolerance, otherwise the last
//! accepted partition is kept.

use super::levels::MrabLevels;
use super::simplex::SimplexMesh;
use crate::error::{MrabError, Result};
use crate::types::{ElementIndex, LevelIndex};

/// Repartition parameters.
#[derive(Clone, Debug)]
pub struct PartitionConfig {
    /// Number of ranks to split across
    pub n_ranks: usize,
    /// Minimum accepted load ratio min/max
    pub tolerance: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            n_ranks: 1,
            tolerance: 0.8,
        }
    }
}

impl PartitionConfig {
    /// Create config for `n_ranks` with the default tolerance.
    pub fn new(n_ranks: usize) -> Self {
        Self {
            n_ranks,
            ..Default::default()
        }
    }

    /// Set the acceptance tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Result of a repartition.
#[derive(Clone, Debug, PartialEq)]
pub struct Partition {
    /// Rank of every local element
    pub rank: Vec<usize>,
    /// Load ratio min/max of the accepted partition
    pub quality: f64,
    /// Finest level clustered into the accepted partition (`None` for the
    /// unclustered baseline)
    pub clustered_level: Option<usize>,
}

impl Partition {
    /// Total weight per rank.
    pub fn rank_weights(&self, weights: &[f64], n_ranks: usize) -> Vec<f64> {
        let mut w = vec![0.0; n_ranks];
        for (&r, &we) in self.rank.iter().zip(weights) {
            w[r] += we;
        }
        w
    }
}

/// Per-element work weight 2^(L-1-l) Np(N).
pub fn element_weights(mesh: &SimplexMesh, degrees: &[usize], levels: &MrabLevels) -> Vec<f64> {
    let top = levels.n_levels() - 1;
    ElementIndex::iter(mesh.n_elements())
        .map(|e| {
            let l = levels.level(e).get();
            LevelIndex::new(top - l.min(top)).step_factor() * mesh.dim().np(degrees[e.get()]) as f64
        })
        .collect()
}

/// Repartition the local elements of `mesh` across `config.n_ranks`.
pub fn repartition(
    mesh: &SimplexMesh,
    degrees: &[usize],
    levels: &MrabLevels,
    config: &PartitionConfig,
) -> Result<Partition> {
    if config.n_ranks == 0 {
        return Err(MrabError::InvalidConfig("n_ranks must be >= 1".into()));
    }
    if degrees.len() < mesh.n_elements() {
        return Err(MrabError::dimension_mismatch(
            format!(">= {} degrees", mesh.n_elements()),
            degrees.len().to_string(),
        ));
    }

    let weights = element_weights(mesh, degrees, levels);
    let keys = morton_keys(mesh);

    let singletons: Vec<usize> = (0..mesh.n_elements()).collect();
    let (rank, quality) = split_clusters(&singletons, &weights, &keys, config.n_ranks);
    log::info!("Repartition: unclustered quality = {:.3}", quality);

    let mut best = Partition {
        rank,
        quality,
        clustered_level: None,
    };

    for lev in 0..levels.n_levels() {
        let clusters = cluster_up_to_level(mesh, levels, lev);
        let (rank, quality) = split_clusters(&clusters, &weights, &keys, config.n_ranks);

        if quality > config.tolerance {
            log::info!("Repartition: level {} clustered, quality = {:.3}", lev, quality);
            best = Partition {
                rank,
                quality,
                clustered_level: Some(lev),
            };
        } else {
            log::warn!(
                "Repartition: level {} rejected, quality {:.3} <= {:.3}; keeping previous partition",
                lev,
                quality,
                config.tolerance
            );
            break;
        }
    }

    Ok(best)
}

/// Cluster id per element: every element of level <= `lev` is joined with
/// its face neighbours.
fn cluster_up_to_level(mesh: &SimplexMesh, levels: &MrabLevels, lev: usize) -> Vec<usize> {
    let n = mesh.n_elements();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for e in ElementIndex::iter(n) {
        if levels.level(e).get() > lev {
            continue;
        }
        for f in 0..mesh.dim().n_faces() {
            let Some(ep) = mesh.neighbor(e, f) else {
                continue;
            };
            if ep.get() >= n {
                continue;
            }
            let (a, b) = (find(&mut parent, e.get()), find(&mut parent, ep.get()));
            if a != b {
                parent[a.max(b)] = a.min(b);
            }
        }
    }

    (0..n).map(|e| find(&mut parent, e)).collect()
}

/// Order clusters along the curve and cut into equal-weight chunks.
fn split_clusters(
    cluster_of: &[usize],
    weights: &[f64],
    keys: &[u64],
    n_ranks: usize,
) -> (Vec<usize>, f64) {
    let n = cluster_of.len();
    let mut cluster_weight = vec![0.0; n];
    let mut cluster_key = vec![u64::MAX; n];
    for e in 0..n {
        let c = cluster_of[e];
        cluster_weight[c] += weights[e];
        cluster_key[c] = cluster_key[c].min(keys[e]);
    }

    let mut order: Vec<usize> = (0..n).filter(|&c| cluster_weight[c] > 0.0).collect();
    order.sort_by_key(|&c| (cluster_key[c], c));

    let total: f64 = cluster_weight.iter().sum();
    let mut cluster_rank = vec![0; n];
    let mut cumulative = 0.0;
    for &c in &order {
        let mid = cumulative + 0.5 * cluster_weight[c];
        cluster_rank[c] = ((mid / total * n_ranks as f64) as usize).min(n_ranks - 1);
        cumulative += cluster_weight[c];
    }

    let rank: Vec<usize> = cluster_of.iter().map(|&c| cluster_rank[c]).collect();
    let mut load = vec![0.0; n_ranks];
    for (&r, &w) in rank.iter().zip(weights) {
        load[r] += w;
    }
    let max = load.iter().copied().fold(0.0, f64::max);
    let min = load.iter().copied().fold(f64::INFINITY, f64::min);
    let quality = if max > 0.0 { min / max } else { 0.0 };

    (rank, quality)
}

/// Morton key of every local element centroid.
fn morton_keys(mesh: &SimplexMesh) -> Vec<u64> {
    let centroids: Vec<[f64; 3]> = ElementIndex::iter(mesh.n_elements())
        .map(|e| mesh.centroid(e))
        .collect();

    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for c in &centroids {
        for k in 0..3 {
            lo[k] = lo[k].min(c[k]);
            hi[k] = hi[k].max(c[k]);
        }
    }

    const BITS: u32 = 21;
    let scale = ((1u64 << BITS) - 1) as f64;
    centroids
        .iter()
        .map(|c| {
            let mut key = 0u64;
            let q: Vec<u64> = (0..3)
                .map(|k| {
                    let span = hi[k] - lo[k];
                    if span > 0.0 {
                        ((c[k] - lo[k]) / span * scale) as u64
                    } else {
                        0
                    }
                })
                .collect();
            for bit in 0..BITS {
                for (k, qk) in q.iter().enumerate() {
                    key |= ((qk >> bit) & 1) << (3 * bit + k as u32);
                }
            }
            key
        })
        .collect()
}

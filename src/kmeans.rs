//! Seeded k-means clustering over row-major vector buffers.
//!
//! Used by the IVF index to learn its coarse partitioning. k-means++
//! initialization followed by a fixed number of Lloyd iterations; all
//! randomness comes from one seeded generator, so identical seed and
//! input always produce identical centroids.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kernels;

/// Default number of Lloyd refinement rounds.
pub const DEFAULT_MAX_ITERS: usize = 25;

/// k-means over `n x dim` row-major `f32` buffers.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    dim: usize,
    max_iters: usize,
    seed: u32,
}

impl KMeans {
    pub fn new(k: usize, dim: usize, seed: u32) -> Self {
        Self {
            k,
            dim,
            max_iters: DEFAULT_MAX_ITERS,
            seed,
        }
    }

    #[must_use]
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Trains on `vectors` and returns row-major `k * dim` centroids.
    ///
    /// With fewer rows than `k` the input is returned padded with zero
    /// rows; callers wanting meaningful clusters must supply `n >= k`.
    pub fn fit(&self, vectors: &[f32]) -> Vec<f32> {
        let n = vectors.len() / self.dim;
        if n < self.k {
            let mut centroids = vectors.to_vec();
            centroids.resize(self.k * self.dim, 0.0);
            return centroids;
        }

        let mut rng = StdRng::seed_from_u64(u64::from(self.seed));
        let mut centroids = self.seed_centroids(vectors, n, &mut rng);

        for _ in 0..self.max_iters {
            let assignments = self.predict(vectors, &centroids);

            let mut sums = vec![0.0f32; self.k * self.dim];
            let mut counts = vec![0usize; self.k];
            for (i, &cluster) in assignments.iter().enumerate() {
                counts[cluster] += 1;
                let row = self.row(vectors, i);
                let acc = &mut sums[cluster * self.dim..(cluster + 1) * self.dim];
                for (a, &x) in acc.iter_mut().zip(row) {
                    *a += x;
                }
            }

            for c in 0..self.k {
                let centroid = &mut sums[c * self.dim..(c + 1) * self.dim];
                if counts[c] > 0 {
                    for x in centroid.iter_mut() {
                        *x /= counts[c] as f32;
                    }
                } else {
                    // empty cluster: reseed to a random input row
                    let idx = rng.random_range(0..n);
                    centroid.copy_from_slice(self.row(vectors, idx));
                }
            }

            centroids = sums;
        }

        centroids
    }

    /// k-means++ seeding: first centroid uniform, each subsequent one
    /// sampled proportionally to its min squared distance from the chosen
    /// prefix, excluding already-chosen rows.
    fn seed_centroids(&self, vectors: &[f32], n: usize, rng: &mut StdRng) -> Vec<f32> {
        let mut centroids = vec![0.0f32; self.k * self.dim];
        let mut chosen = vec![false; n];

        let first = rng.random_range(0..n);
        centroids[..self.dim].copy_from_slice(self.row(vectors, first));
        chosen[first] = true;

        for c in 1..self.k {
            let mut min_dist = vec![f32::MAX; n];
            let mut total = 0.0f32;
            for i in 0..n {
                if chosen[i] {
                    continue;
                }
                let row = self.row(vectors, i);
                for j in 0..c {
                    let d = kernels::l2_squared(row, &centroids[j * self.dim..(j + 1) * self.dim]);
                    if d < min_dist[i] {
                        min_dist[i] = d;
                    }
                }
                total += min_dist[i];
            }

            // inverse-CDF sample over the cumulative min distances
            let threshold = rng.random::<f32>() * total;
            let mut cumsum = 0.0f32;
            let mut pick = first;
            for i in 0..n {
                if chosen[i] {
                    continue;
                }
                // rounding can leave cumsum short of the threshold at the
                // end of the walk; the last unchosen row then wins
                pick = i;
                cumsum += min_dist[i];
                if cumsum >= threshold {
                    break;
                }
            }

            centroids[c * self.dim..(c + 1) * self.dim].copy_from_slice(self.row(vectors, pick));
            chosen[pick] = true;
        }

        centroids
    }

    /// Nearest-centroid index for each row under squared L2.
    pub fn predict(&self, vectors: &[f32], centroids: &[f32]) -> Vec<usize> {
        let n = vectors.len() / self.dim;
        let mut assignments = Vec::with_capacity(n);

        for i in 0..n {
            let row = self.row(vectors, i);
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for c in 0..self.k {
                let dist =
                    kernels::l2_squared(row, &centroids[c * self.dim..(c + 1) * self.dim]);
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            assignments.push(best);
        }

        assignments
    }

    fn row<'a>(&self, vectors: &'a [f32], idx: usize) -> &'a [f32] {
        &vectors[idx * self.dim..(idx + 1) * self.dim]
    }
}

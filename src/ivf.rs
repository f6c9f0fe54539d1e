//! Inverted-file index.
//!
//! Rows accumulate in a staging buffer until [`IvfIndex::train`] clusters
//! them with k-means; after that, inserts route straight to the nearest
//! partition and queries probe only the `nprobe` partitions whose
//! centroids are closest to the query.

use std::io::{Read, Write};

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::kernels;
use crate::kmeans::KMeans;
use crate::snapshot;
use crate::spec::{IndexSpec, SearchHit, SearchParams};
use crate::store::{score_f32, VectorStore};
use crate::topk::TopK;

/// One partition: a row arena plus its parallel id list.
#[derive(Debug)]
struct Partition {
    store: VectorStore,
    ids: Vec<i64>,
}

impl Partition {
    fn new(spec: &IndexSpec) -> Self {
        Self {
            store: VectorStore::new(spec.storage),
            ids: Vec::new(),
        }
    }
}

/// The two phases of an IVF index. Training is one-way: there is no
/// transition back to `Untrained`.
#[derive(Debug)]
enum IvfState {
    /// Staging: rows and ids buffered verbatim, negative sentinels
    /// included, so buffer positions stay aligned.
    Untrained { vectors: Vec<f32>, ids: Vec<i64> },
    /// Partitioned: learned centroids plus `nlist` partitions.
    Trained {
        centroids: Vec<f32>,
        partitions: Vec<Partition>,
    },
}

#[derive(Debug)]
pub(crate) struct IvfIndex {
    spec: IndexSpec,
    total_vectors: i64,
    state: IvfState,
}

impl IvfIndex {
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            total_vectors: 0,
            state: IvfState::Untrained {
                vectors: Vec::new(),
                ids: Vec::new(),
            },
        }
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    pub fn size(&self) -> i64 {
        self.total_vectors
    }

    #[cfg(test)]
    fn is_trained(&self) -> bool {
        matches!(self.state, IvfState::Trained { .. })
    }

    /// Clusters the staging buffer and routes its rows into partitions.
    ///
    /// One-shot: fails once trained, on an empty buffer, or with fewer
    /// buffered rows than `nlist`.
    pub fn train(&mut self) -> Result<()> {
        let (vectors, ids) = match &self.state {
            IvfState::Trained { .. } => {
                return Err(Error::Usage("index is already trained".into()));
            }
            IvfState::Untrained { vectors, ids } => (vectors, ids),
        };
        if vectors.is_empty() {
            return Err(Error::Usage("no buffered vectors to train on".into()));
        }
        let rows = vectors.len() / self.spec.dim;
        if rows < self.spec.nlist {
            return Err(Error::Usage(format!(
                "training needs at least nlist = {} rows, buffer has {rows}",
                self.spec.nlist
            )));
        }

        let kmeans = KMeans::new(self.spec.nlist, self.spec.dim, self.spec.seed);
        let centroids = kmeans.fit(vectors);
        let assignments = kmeans.predict(vectors, &centroids);

        let mut partitions: Vec<Partition> =
            (0..self.spec.nlist).map(|_| Partition::new(&self.spec)).collect();

        let mut scratch = Vec::new();
        for (i, row) in vectors.chunks_exact(self.spec.dim).enumerate() {
            if ids[i] < 0 {
                continue;
            }
            let part = &mut partitions[assignments[i]];
            if self.spec.normalizes() {
                scratch.clear();
                scratch.extend_from_slice(row);
                kernels::normalize(&mut scratch);
                part.store.push_row(&scratch);
            } else {
                part.store.push_row(row);
            }
            part.ids.push(ids[i]);
        }

        tracing::debug!(nlist = self.spec.nlist, rows, "ivf training complete");
        self.state = IvfState::Trained {
            centroids,
            partitions,
        };
        Ok(())
    }

    pub fn add(&mut self, ids: &[i64], vectors: &[f32]) -> Result<()> {
        self.spec.batch_rows(ids, vectors)?;
        let nonneg = ids.iter().filter(|&&id| id >= 0).count() as i64;

        match &mut self.state {
            IvfState::Untrained {
                vectors: buffer,
                ids: buffered_ids,
            } => {
                buffer.extend_from_slice(vectors);
                buffered_ids.extend_from_slice(ids);
            }
            IvfState::Trained {
                centroids,
                partitions,
            } => {
                let mut scratch = Vec::new();
                for (i, row) in vectors.chunks_exact(self.spec.dim).enumerate() {
                    if ids[i] < 0 {
                        continue;
                    }
                    let row = if self.spec.normalizes() {
                        scratch.clear();
                        scratch.extend_from_slice(row);
                        kernels::normalize(&mut scratch);
                        &scratch[..]
                    } else {
                        row
                    };
                    let cluster = nearest_centroid(centroids, row, self.spec.dim);
                    partitions[cluster].store.push_row(row);
                    partitions[cluster].ids.push(ids[i]);
                }
            }
        }

        self.total_vectors += nonneg;
        Ok(())
    }

    /// Before training this scans the staging buffer exhaustively, so
    /// queries are answered (flat semantics) rather than refused.
    pub fn search(&self, query: &[f32], params: &SearchParams) -> Result<Vec<SearchHit>> {
        self.spec.check_query(query)?;
        params.validate()?;

        let mut owned;
        let query = if self.spec.normalizes() {
            owned = query.to_vec();
            kernels::normalize(&mut owned);
            &owned[..]
        } else {
            query
        };

        match &self.state {
            IvfState::Untrained { vectors, ids } => {
                let mut topk = TopK::new(params.k);
                for (i, row) in vectors.chunks_exact(self.spec.dim).enumerate() {
                    if ids[i] < 0 {
                        continue;
                    }
                    topk.push(ids[i], score_f32(self.spec.metric, query, row));
                }
                Ok(topk.sorted_hits())
            }
            IvfState::Trained {
                centroids,
                partitions,
            } => self.search_trained(query, params, centroids, partitions),
        }
    }

    fn search_trained(
        &self,
        query: &[f32],
        params: &SearchParams,
        centroids: &[f32],
        partitions: &[Partition],
    ) -> Result<Vec<SearchHit>> {
        let dim = self.spec.dim;
        let nprobe = params.nprobe.min(self.spec.nlist);

        // squared distance from the query to every centroid; each entry is
        // independent, so this parallelizes trivially
        let mut ranked: Vec<(f32, usize)> = centroids
            .par_chunks_exact(dim)
            .enumerate()
            .map(|(c, centroid)| (kernels::l2_squared(query, centroid), c))
            .collect();

        // partial sort: only the nprobe closest centroids need ordering,
        // ties broken by partition index
        let by_dist =
            |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if nprobe < ranked.len() {
            ranked.select_nth_unstable_by(nprobe - 1, by_dist);
            ranked.truncate(nprobe);
        }
        ranked.sort_unstable_by(by_dist);

        // one selector per probed partition, merged afterwards
        let topk = ranked
            .par_iter()
            .map(|&(_, cluster)| -> Result<TopK> {
                let part = &partitions[cluster];
                let mut local = TopK::new(params.k);
                part.store.scan(self.spec.metric, query, dim, |i, score| {
                    local.push(part.ids[i], score);
                })?;
                Ok(local)
            })
            .try_reduce(
                || TopK::new(params.k),
                |mut acc, local| {
                    acc.merge(local);
                    Ok(acc)
                },
            )?;

        Ok(topk.sorted_hits())
    }

    pub fn save_state<W: Write>(&self, w: &mut W) -> Result<()> {
        match &self.state {
            IvfState::Untrained { vectors, ids } => {
                if vectors.len() % self.spec.dim != 0
                    || vectors.len() / self.spec.dim != ids.len()
                {
                    return Err(Error::Internal(
                        "staging buffer rows do not match buffered ids".into(),
                    ));
                }

                snapshot::write_bool(w, false)?;
                snapshot::write_i64(w, self.total_vectors)?;
                snapshot::write_f32_seq(w, &[])?;
                snapshot::write_u64(w, self.spec.nlist as u64)?;
                let empty = Partition::new(&self.spec);
                for _ in 0..self.spec.nlist {
                    empty.store.write_to(w)?;
                    snapshot::write_i64_seq(w, &empty.ids)?;
                }
                snapshot::write_f32_seq(w, vectors)?;
                snapshot::write_i64_seq(w, ids)?;
            }
            IvfState::Trained {
                centroids,
                partitions,
            } => {
                if centroids.len() != self.spec.nlist * self.spec.dim {
                    return Err(Error::Internal("centroid buffer size mismatch".into()));
                }
                if partitions.len() != self.spec.nlist {
                    return Err(Error::Internal("partition count mismatch".into()));
                }

                snapshot::write_bool(w, true)?;
                snapshot::write_i64(w, self.total_vectors)?;
                snapshot::write_f32_seq(w, centroids)?;
                snapshot::write_u64(w, partitions.len() as u64)?;
                for part in partitions {
                    part.store
                        .check_lengths(self.spec.dim, part.ids.len())
                        .map_err(Error::Internal)?;
                    part.store.write_to(w)?;
                    snapshot::write_i64_seq(w, &part.ids)?;
                }
                snapshot::write_f32_seq(w, &[])?;
                snapshot::write_i64_seq(w, &[])?;
            }
        }
        Ok(())
    }

    pub fn load_state<R: Read>(spec: IndexSpec, r: &mut R) -> Result<Self> {
        let is_trained = snapshot::read_bool(r)?;
        let total_vectors = snapshot::read_i64(r)?;
        let centroids = snapshot::read_f32_seq(r)?;

        let cluster_count = snapshot::read_u64(r)?;
        if cluster_count != spec.nlist as u64 {
            return Err(Error::Format(format!(
                "snapshot has {cluster_count} partitions, spec says {}",
                spec.nlist
            )));
        }

        let mut partitions = Vec::with_capacity(spec.nlist);
        for _ in 0..spec.nlist {
            let store = VectorStore::read_from(r, spec.storage)?;
            let ids = snapshot::read_i64_seq(r)?;
            store.check_lengths(spec.dim, ids.len()).map_err(Error::Format)?;
            partitions.push(Partition { store, ids });
        }

        let untrained_vectors = snapshot::read_f32_seq(r)?;
        let untrained_ids = snapshot::read_i64_seq(r)?;
        if untrained_vectors.len() % spec.dim != 0
            || untrained_vectors.len() / spec.dim != untrained_ids.len()
        {
            return Err(Error::Format(
                "staging buffer rows do not match buffered ids".into(),
            ));
        }

        if is_trained {
            if centroids.len() != spec.nlist * spec.dim {
                return Err(Error::Format("centroid buffer size mismatch".into()));
            }
            if !untrained_ids.is_empty() {
                return Err(Error::Format("staging buffer present after training".into()));
            }
        } else {
            if !centroids.is_empty() {
                return Err(Error::Format("centroids present before training".into()));
            }
            if partitions.iter().any(|p| !p.ids.is_empty() || p.store.rows(spec.dim) != 0) {
                return Err(Error::Format("partitions populated before training".into()));
            }
        }

        let mut nonneg = untrained_ids.iter().filter(|&&id| id >= 0).count() as i64;
        for part in &partitions {
            nonneg += part.ids.iter().filter(|&&id| id >= 0).count() as i64;
        }
        if nonneg != total_vectors {
            return Err(Error::Format(format!(
                "snapshot counts {nonneg} scoreable rows but records {total_vectors}"
            )));
        }

        let state = if is_trained {
            IvfState::Trained {
                centroids,
                partitions,
            }
        } else {
            IvfState::Untrained {
                vectors: untrained_vectors,
                ids: untrained_ids,
            }
        };
        Ok(Self {
            spec,
            total_vectors,
            state,
        })
    }
}

/// Index of the centroid nearest to `row` under squared L2.
fn nearest_centroid(centroids: &[f32], row: &[f32], dim: usize) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (c, centroid) in centroids.chunks_exact(dim).enumerate() {
        let dist = kernels::l2_squared(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

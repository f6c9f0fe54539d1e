//! Exhaustive-scan index.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::kernels;
use crate::snapshot;
use crate::spec::{IndexSpec, SearchHit, SearchParams};
use crate::store::VectorStore;
use crate::topk::TopK;

/// Append-only store scanned in full at query time.
///
/// Rows with a negative id are stored at their positional slot (so row
/// indices stay aligned with the id array) but never scored.
#[derive(Debug)]
pub(crate) struct FlatIndex {
    spec: IndexSpec,
    store: VectorStore,
    ids: Vec<i64>,
    nonneg: i64,
}

impl FlatIndex {
    pub fn new(spec: IndexSpec) -> Self {
        let store = VectorStore::new(spec.storage);
        Self {
            spec,
            store,
            ids: Vec::new(),
            nonneg: 0,
        }
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    pub fn size(&self) -> i64 {
        self.nonneg
    }

    pub fn add(&mut self, ids: &[i64], vectors: &[f32]) -> Result<()> {
        self.spec.batch_rows(ids, vectors)?;

        let mut scratch = Vec::new();
        for row in vectors.chunks_exact(self.spec.dim) {
            if self.spec.normalizes() {
                scratch.clear();
                scratch.extend_from_slice(row);
                kernels::normalize(&mut scratch);
                self.store.push_row(&scratch);
            } else {
                self.store.push_row(row);
            }
        }

        self.ids.extend_from_slice(ids);
        self.nonneg += ids.iter().filter(|&&id| id >= 0).count() as i64;
        Ok(())
    }

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

        let mut topk = TopK::new(params.k);
        self.store.scan(self.spec.metric, query, self.spec.dim, |i, score| {
            let id = self.ids[i];
            if id >= 0 {
                topk.push(id, score);
            }
        })?;
        Ok(topk.sorted_hits())
    }

    pub fn save_state<W: Write>(&self, w: &mut W) -> Result<()> {
        self.store
            .check_lengths(self.spec.dim, self.ids.len())
            .map_err(Error::Internal)?;
        self.store.write_to(w)?;
        snapshot::write_i64_seq(w, &self.ids)
    }

    pub fn load_state<R: Read>(spec: IndexSpec, r: &mut R) -> Result<Self> {
        let store = VectorStore::read_from(r, spec.storage)?;
        let ids = snapshot::read_i64_seq(r)?;
        store
            .check_lengths(spec.dim, ids.len())
            .map_err(Error::Format)?;
        let nonneg = ids.iter().filter(|&&id| id >= 0).count() as i64;
        Ok(Self {
            spec,
            store,
            ids,
            nonneg,
        })
    }
}

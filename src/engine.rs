//! Engine facade: id allocation, index dispatch, batch search, snapshots.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::flat::FlatIndex;
use crate::ivf::IvfIndex;
use crate::snapshot;
use crate::spec::{IndexKind, IndexSpec, Metric, SearchHit, SearchParams, Storage};

/// The two index strategies an [`Engine`] can hold.
///
/// A closed set on purpose: the snapshot format, the factory, and the
/// engine all dispatch over exactly these variants.
enum IndexVariant {
    Flat(FlatIndex),
    Ivf(IvfIndex),
}

impl IndexVariant {
    fn from_spec(spec: IndexSpec) -> Result<Self> {
        spec.validate()?;
        Ok(match spec.kind {
            IndexKind::Flat => IndexVariant::Flat(FlatIndex::new(spec)),
            IndexKind::Ivf => IndexVariant::Ivf(IvfIndex::new(spec)),
        })
    }

    fn spec(&self) -> &IndexSpec {
        match self {
            IndexVariant::Flat(index) => index.spec(),
            IndexVariant::Ivf(index) => index.spec(),
        }
    }

    fn add(&mut self, ids: &[i64], vectors: &[f32]) -> Result<()> {
        match self {
            IndexVariant::Flat(index) => index.add(ids, vectors),
            IndexVariant::Ivf(index) => index.add(ids, vectors),
        }
    }

    fn search(&self, query: &[f32], params: &SearchParams) -> Result<Vec<SearchHit>> {
        match self {
            IndexVariant::Flat(index) => index.search(query, params),
            IndexVariant::Ivf(index) => index.search(query, params),
        }
    }

    fn size(&self) -> i64 {
        match self {
            IndexVariant::Flat(index) => index.size(),
            IndexVariant::Ivf(index) => index.size(),
        }
    }
}

/// Owns an index and hands out identifiers.
///
/// `next_id` only moves forward: auto-allocated ids never collide with
/// anything the caller supplied earlier.
pub struct Engine {
    index: IndexVariant,
    next_id: i64,
}

impl Engine {
    /// Validates `spec` and constructs the matching index, empty.
    pub fn new(spec: IndexSpec) -> Result<Self> {
        Ok(Self {
            index: IndexVariant::from_spec(spec)?,
            next_id: 0,
        })
    }

    /// Inserts `vectors` (row-major, `n * dim` values) under freshly
    /// allocated contiguous ids `[next_id, next_id + n)`.
    pub fn add(&mut self, vectors: &[f32]) -> Result<()> {
        let dim = self.dim();
        if vectors.len() % dim != 0 {
            return Err(Error::Usage(format!(
                "vector buffer length {} is not a multiple of dim {dim}",
                vectors.len()
            )));
        }
        let rows = (vectors.len() / dim) as i64;
        let ids: Vec<i64> = (self.next_id..self.next_id + rows).collect();
        self.index.add(&ids, vectors)?;
        self.next_id += rows;
        Ok(())
    }

    /// Inserts `vectors` under caller-supplied ids, forwarded verbatim.
    ///
    /// Negative ids mark rows to ignore; duplicates are accepted and will
    /// all be returned by matching searches. `next_id` jumps past the
    /// largest id seen so later auto-allocation cannot reuse one.
    pub fn add_with_ids(&mut self, ids: &[i64], vectors: &[f32]) -> Result<()> {
        self.index.add(ids, vectors)?;
        if let Some(&max) = ids.iter().max() {
            if max >= self.next_id {
                self.next_id = max + 1;
            }
        }
        Ok(())
    }

    /// Trains the IVF index on its staging buffer. Fails on Flat.
    pub fn train(&mut self) -> Result<()> {
        match &mut self.index {
            IndexVariant::Ivf(index) => index.train(),
            IndexVariant::Flat(_) => {
                Err(Error::Usage("only the IVF index supports training".into()))
            }
        }
    }

    /// Top-`k` search with default parameters (`nprobe = 1` for IVF).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.search_with(query, SearchParams::new(k))
    }

    pub fn search_with(&self, query: &[f32], params: SearchParams) -> Result<Vec<SearchHit>> {
        self.index.search(query, &params)
    }

    /// Searches each row of `queries` (row-major, `n * dim` values) with
    /// default parameters. Output order matches input row order.
    pub fn search_batch(&self, queries: &[f32], k: usize) -> Result<Vec<Vec<SearchHit>>> {
        self.search_batch_with(queries, SearchParams::new(k))
    }

    /// Batch variant of [`search_with`]. Rows are scored in parallel;
    /// the output still preserves input row order.
    ///
    /// [`search_with`]: Engine::search_with
    pub fn search_batch_with(
        &self,
        queries: &[f32],
        params: SearchParams,
    ) -> Result<Vec<Vec<SearchHit>>> {
        let dim = self.dim();
        if queries.len() % dim != 0 {
            return Err(Error::Usage(format!(
                "query buffer length {} is not a multiple of dim {dim}",
                queries.len()
            )));
        }
        queries
            .par_chunks(dim)
            .map(|query| self.index.search(query, &params))
            .collect()
    }

    /// Number of scoreable (non-negative-id) rows in the index.
    pub fn size(&self) -> i64 {
        self.index.size()
    }

    /// Vector dimension this index was built for.
    pub fn dim(&self) -> usize {
        self.index.spec().dim
    }

    /// Writes the whole index state to `path` as a binary snapshot.
    ///
    /// The layout is host-endian and not portable across machines of
    /// differing byte order.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        let spec = self.index.spec();
        snapshot::write_i32(&mut w, spec.dim as i32)?;
        snapshot::write_i32(&mut w, spec.metric.code())?;
        snapshot::write_i32(&mut w, spec.kind.code())?;
        snapshot::write_i32(&mut w, spec.storage.code())?;
        snapshot::write_bool(&mut w, spec.normalize)?;
        snapshot::write_i32(&mut w, spec.nlist as i32)?;
        snapshot::write_i64(&mut w, self.next_id)?;

        match &self.index {
            IndexVariant::Flat(index) => index.save_state(&mut w)?,
            IndexVariant::Ivf(index) => index.save_state(&mut w)?,
        }

        w.flush()?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Reconstructs an engine from a snapshot written by [`Engine::save`].
    ///
    /// The header and both body layouts are validated in full; any
    /// mismatch fails the load rather than producing a corrupt index.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut r = BufReader::new(file);

        let dim = snapshot::read_i32(&mut r)?;
        let metric = Metric::from_code(snapshot::read_i32(&mut r)?)?;
        let kind = IndexKind::from_code(snapshot::read_i32(&mut r)?)?;
        let storage = Storage::from_code(snapshot::read_i32(&mut r)?)?;
        let normalize = snapshot::read_bool(&mut r)?;
        let nlist = snapshot::read_i32(&mut r)?;
        let next_id = snapshot::read_i64(&mut r)?;

        if dim <= 0 {
            return Err(Error::Format(format!("invalid dimension {dim}")));
        }
        if kind == IndexKind::Ivf && nlist <= 0 {
            return Err(Error::Format(format!("invalid IVF nlist {nlist}")));
        }

        // the snapshot format carries no k-means seed; a reloaded index is
        // either already trained or gets a seed via a fresh spec
        let spec = IndexSpec {
            dim: dim as usize,
            metric,
            kind,
            storage,
            normalize,
            nlist: nlist.max(0) as usize,
            seed: 0,
        };
        spec.validate().map_err(|e| Error::Format(e.to_string()))?;

        let index = match kind {
            IndexKind::Flat => IndexVariant::Flat(FlatIndex::load_state(spec, &mut r)?),
            IndexKind::Ivf => IndexVariant::Ivf(IvfIndex::load_state(spec, &mut r)?),
        };

        tracing::debug!(path = %path.display(), "snapshot loaded");
        Ok(Self { index, next_id })
    }
}

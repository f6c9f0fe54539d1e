//! Row storage shared by the flat index and IVF partitions.
//!
//! A `VectorStore` is a growable arena of fixed-width rows under one of
//! the two storage modes. Rows are appended, never removed; scans walk
//! contiguous memory.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::kernels;
use crate::quantize;
use crate::snapshot;
use crate::spec::{Metric, Storage};

/// Metric score of an `f32` query row against an `f32` stored row.
pub(crate) fn score_f32(metric: Metric, query: &[f32], row: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => kernels::dot(query, row),
        Metric::L2 => -kernels::l2_squared(query, row),
        Metric::Haversine => -kernels::haversine(query, row),
    }
}

/// Contiguous row storage under one of the two storage modes.
#[derive(Debug, Clone)]
pub(crate) enum VectorStore {
    F32 { vectors: Vec<f32> },
    Int8 { codes: Vec<i8>, scales: Vec<f32> },
}

impl VectorStore {
    pub fn new(storage: Storage) -> Self {
        match storage {
            Storage::F32 => VectorStore::F32 { vectors: Vec::new() },
            Storage::Int8 => VectorStore::Int8 {
                codes: Vec::new(),
                scales: Vec::new(),
            },
        }
    }

    pub fn rows(&self, dim: usize) -> usize {
        match self {
            VectorStore::F32 { vectors } => vectors.len() / dim,
            VectorStore::Int8 { codes, .. } => codes.len() / dim,
        }
    }

    /// Appends one row, quantizing under Int8.
    pub fn push_row(&mut self, row: &[f32]) {
        match self {
            VectorStore::F32 { vectors } => vectors.extend_from_slice(row),
            VectorStore::Int8 { codes, scales } => quantize::quantize_into(row, codes, scales),
        }
    }

    /// Scores every stored row against `query`, invoking `visit(row, score)`
    /// in storage order.
    ///
    /// Haversine is only reachable under F32 storage; the spec validation
    /// rejects the Int8 combination before an index exists.
    pub fn scan<F>(&self, metric: Metric, query: &[f32], dim: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, f32),
    {
        match self {
            VectorStore::F32 { vectors } => {
                for (i, row) in vectors.chunks_exact(dim).enumerate() {
                    visit(i, score_f32(metric, query, row));
                }
            }
            VectorStore::Int8 { codes, scales } => match metric {
                Metric::Cosine => {
                    for (i, row) in codes.chunks_exact(dim).enumerate() {
                        visit(i, quantize::dot_i8(query, row, scales[i]));
                    }
                }
                Metric::L2 => {
                    for (i, row) in codes.chunks_exact(dim).enumerate() {
                        visit(i, quantize::neg_l2_squared_i8(query, row, scales[i]));
                    }
                }
                Metric::Haversine => {
                    return Err(Error::Internal(
                        "haversine scoring over int8 storage".into(),
                    ));
                }
            },
        }
        Ok(())
    }

    /// Checks the row/id/scale length invariants, returning a message on
    /// violation. Callers decide whether that is an internal bug (save
    /// path) or a malformed snapshot (load path).
    pub fn check_lengths(&self, dim: usize, ids: usize) -> std::result::Result<(), String> {
        match self {
            VectorStore::F32 { vectors } => {
                if vectors.len() % dim != 0 {
                    return Err("vector buffer length is not a multiple of dim".into());
                }
                if vectors.len() / dim != ids {
                    return Err("vector row count does not match id count".into());
                }
            }
            VectorStore::Int8 { codes, scales } => {
                if codes.len() % dim != 0 {
                    return Err("code buffer length is not a multiple of dim".into());
                }
                if codes.len() / dim != ids {
                    return Err("code row count does not match id count".into());
                }
                if scales.len() != ids {
                    return Err("scale count does not match id count".into());
                }
            }
        }
        Ok(())
    }

    /// Writes this store's storage-dependent sequences.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            VectorStore::F32 { vectors } => snapshot::write_f32_seq(w, vectors),
            VectorStore::Int8 { codes, scales } => {
                snapshot::write_i8_seq(w, codes)?;
                snapshot::write_f32_seq(w, scales)
            }
        }
    }

    /// Reads the storage-dependent sequences written by [`write_to`].
    ///
    /// [`write_to`]: VectorStore::write_to
    pub fn read_from<R: Read>(r: &mut R, storage: Storage) -> Result<Self> {
        Ok(match storage {
            Storage::F32 => VectorStore::F32 {
                vectors: snapshot::read_f32_seq(r)?,
            },
            Storage::Int8 => VectorStore::Int8 {
                codes: snapshot::read_i8_seq(r)?,
                scales: snapshot::read_f32_seq(r)?,
            },
        })
    }
}

//! Index configuration and search types.

use crate::error::{Error, Result};

/// Scoring metric. Higher returned score always means more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Dot product; combine with [`IndexSpec::with_normalize`] for true
    /// cosine similarity.
    Cosine,
    /// Negated squared Euclidean distance.
    L2,
    /// Negated great-circle distance in km over `[lat°, lon°]` pairs.
    Haversine,
}

impl Metric {
    pub(crate) fn code(self) -> i32 {
        match self {
            Metric::Cosine => 0,
            Metric::L2 => 1,
            Metric::Haversine => 2,
        }
    }

    pub(crate) fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Metric::Cosine),
            1 => Ok(Metric::L2),
            2 => Ok(Metric::Haversine),
            _ => Err(Error::Format(format!("invalid metric code {code}"))),
        }
    }
}

/// Index strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Exhaustive scan over every stored vector.
    Flat,
    /// Inverted-file index: cluster the data, probe a few partitions.
    Ivf,
}

impl IndexKind {
    pub(crate) fn code(self) -> i32 {
        match self {
            IndexKind::Flat => 0,
            IndexKind::Ivf => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(IndexKind::Flat),
            1 => Ok(IndexKind::Ivf),
            _ => Err(Error::Format(format!("invalid index kind code {code}"))),
        }
    }
}

/// At-rest representation of stored vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Raw 32-bit floats.
    F32,
    /// Per-vector symmetric 8-bit quantization with an `f32` scale.
    Int8,
}

impl Storage {
    pub(crate) fn code(self) -> i32 {
        match self {
            Storage::F32 => 0,
            Storage::Int8 => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Storage::F32),
            1 => Ok(Storage::Int8),
            _ => Err(Error::Format(format!("invalid storage code {code}"))),
        }
    }
}

/// Immutable configuration of an index.
///
/// Built with [`IndexSpec::new`] plus the `with_*` setters, then validated
/// once when the [`Engine`](crate::Engine) is constructed.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Vector dimension. Fixed for the index's lifetime.
    pub dim: usize,
    pub metric: Metric,
    pub kind: IndexKind,
    pub storage: Storage,
    /// L2-normalize vectors and queries at rest. Only meaningful under
    /// [`Metric::Cosine`]; ignored otherwise.
    pub normalize: bool,
    /// Number of IVF partitions. Required (≥ 1) for [`IndexKind::Ivf`],
    /// ignored by Flat.
    pub nlist: usize,
    /// Seed for the k-means RNG used at training time.
    pub seed: u32,
}

impl IndexSpec {
    pub fn new(dim: usize, metric: Metric, kind: IndexKind) -> Self {
        Self {
            dim,
            metric,
            kind,
            storage: Storage::F32,
            normalize: false,
            nlist: 0,
            seed: 0,
        }
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    #[must_use]
    pub fn with_nlist(mut self, nlist: usize) -> Self {
        self.nlist = nlist;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Compatibility rules, enforced before any index is constructed.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::Config("dimension must be at least 1".into()));
        }
        if self.metric == Metric::Haversine {
            if self.dim != 2 {
                return Err(Error::Config(
                    "haversine requires dim = 2 ([lat, lon] pairs)".into(),
                ));
            }
            if self.kind == IndexKind::Ivf {
                return Err(Error::Config("haversine does not support the IVF index".into()));
            }
            if self.storage == Storage::Int8 {
                return Err(Error::Config("haversine does not support int8 storage".into()));
            }
            if self.normalize {
                return Err(Error::Config("haversine does not support normalization".into()));
            }
        }
        if self.kind == IndexKind::Ivf && self.nlist == 0 {
            return Err(Error::Config("IVF requires nlist >= 1".into()));
        }
        Ok(())
    }

    /// Whether stored vectors and queries are normalized at this index's
    /// boundaries. `normalize` only means something under Cosine.
    pub(crate) fn normalizes(&self) -> bool {
        self.normalize && self.metric == Metric::Cosine
    }

    /// Row count of an `(ids, vectors)` batch, after shape checks.
    pub(crate) fn batch_rows(&self, ids: &[i64], vectors: &[f32]) -> Result<usize> {
        if vectors.len() % self.dim != 0 {
            return Err(Error::Usage(format!(
                "vector buffer length {} is not a multiple of dim {}",
                vectors.len(),
                self.dim
            )));
        }
        let rows = vectors.len() / self.dim;
        if ids.len() != rows {
            return Err(Error::Usage(format!(
                "got {} ids for {} vector rows",
                ids.len(),
                rows
            )));
        }
        Ok(rows)
    }

    pub(crate) fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dim {
            return Err(Error::Usage(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }
        Ok(())
    }
}

/// Per-query knobs.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Number of results to return. Must be ≥ 1.
    pub k: usize,
    /// Number of IVF partitions to probe, clamped to `nlist` at query time.
    /// Ignored by Flat. Must be ≥ 1.
    pub nprobe: usize,
}

impl SearchParams {
    pub fn new(k: usize) -> Self {
        Self { k, nprobe: 1 }
    }

    #[must_use]
    pub fn with_nprobe(mut self, nprobe: usize) -> Self {
        self.nprobe = nprobe;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::Usage("k must be at least 1".into()));
        }
        if self.nprobe == 0 {
            return Err(Error::Usage("nprobe must be at least 1".into()));
        }
        Ok(())
    }
}

/// One search result. Score semantics are metric-dependent but always
/// "higher is better".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_l2_spec_is_valid() {
        let spec = IndexSpec::new(8, Metric::L2, IndexKind::Flat);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn zero_dim_rejected() {
        let spec = IndexSpec::new(0, Metric::L2, IndexKind::Flat);
        assert!(matches!(spec.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn ivf_requires_nlist() {
        let spec = IndexSpec::new(8, Metric::L2, IndexKind::Ivf);
        assert!(matches!(spec.validate(), Err(Error::Config(_))));
        let spec = spec.with_nlist(4);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn haversine_constraints() {
        let ok = IndexSpec::new(2, Metric::Haversine, IndexKind::Flat);
        assert!(ok.validate().is_ok());

        let bad_dim = IndexSpec::new(3, Metric::Haversine, IndexKind::Flat);
        assert!(matches!(bad_dim.validate(), Err(Error::Config(_))));

        let bad_kind = IndexSpec::new(2, Metric::Haversine, IndexKind::Ivf).with_nlist(4);
        assert!(matches!(bad_kind.validate(), Err(Error::Config(_))));

        let bad_storage =
            IndexSpec::new(2, Metric::Haversine, IndexKind::Flat).with_storage(Storage::Int8);
        assert!(matches!(bad_storage.validate(), Err(Error::Config(_))));

        let bad_norm = IndexSpec::new(2, Metric::Haversine, IndexKind::Flat).with_normalize(true);
        assert!(matches!(bad_norm.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn normalize_ignored_outside_cosine() {
        let spec = IndexSpec::new(4, Metric::L2, IndexKind::Flat).with_normalize(true);
        assert!(spec.validate().is_ok());
        assert!(!spec.normalizes());
    }

    #[test]
    fn enum_codes_round_trip() {
        for metric in [Metric::Cosine, Metric::L2, Metric::Haversine] {
            assert_eq!(Metric::from_code(metric.code()).unwrap(), metric);
        }
        assert!(Metric::from_code(3).is_err());
        assert!(IndexKind::from_code(-1).is_err());
        assert!(Storage::from_code(2).is_err());
    }

    #[test]
    fn batch_shape_checks() {
        let spec = IndexSpec::new(2, Metric::L2, IndexKind::Flat);
        assert_eq!(spec.batch_rows(&[0, 1], &[0.0; 4]).unwrap(), 2);
        assert!(spec.batch_rows(&[0], &[0.0; 3]).is_err());
        assert!(spec.batch_rows(&[0], &[0.0; 4]).is_err());
    }
}

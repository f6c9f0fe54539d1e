//! nabor: embeddable nearest-neighbor search over dense vectors.
//!
//! Callers insert batches of `f32` vectors keyed by `i64` identifiers and
//! ask for the top-k most similar rows under a chosen metric. Two index
//! strategies are provided behind one [`Engine`] facade:
//!
//! - **Flat** — exhaustive scan; exact, and fast enough for small data.
//! - **IVF** — k-means coarse partitioning; queries probe only the
//!   `nprobe` partitions nearest the query. Approximate, with recall
//!   controlled by `nprobe` (`nprobe = nlist` is exact).
//!
//! Vectors can be stored as raw `f32` or as per-vector symmetric int8
//! ([`Storage::Int8`]), trading ~4x memory for a small scoring error.
//! An index snapshots to a single binary file and loads back with
//! [`Engine::load`].
//!
//! # Example
//!
//! ```
//! use nabor::{Engine, IndexKind, IndexSpec, Metric};
//!
//! let spec = IndexSpec::new(2, Metric::L2, IndexKind::Flat);
//! let mut engine = Engine::new(spec)?;
//! engine.add(&[1.0, 0.0, 0.0, 1.0])?; // two rows, ids 0 and 1
//!
//! let hits = engine.search(&[0.9, 0.1], 1)?;
//! assert_eq!(hits[0].id, 0);
//! # Ok::<(), nabor::Error>(())
//! ```
//!
//! # Concurrency
//!
//! `add` and `train` take `&mut self`; `search` takes `&self`. Concurrent
//! searches against one engine are safe; interleaving a mutation with
//! anything else is prevented by the borrow checker in-process and is the
//! caller's responsibility across processes. Internally, IVF probing and
//! batch search fan out over rayon with no shared mutable state.

pub mod engine;
pub mod error;
pub mod kernels;
pub mod kmeans;
pub mod quantize;
pub mod spec;
pub mod topk;

mod flat;
mod ivf;
mod snapshot;
mod store;

pub use engine::Engine;
pub use error::{Error, Result};
pub use spec::{IndexKind, IndexSpec, Metric, SearchHit, SearchParams, Storage};

//! docrag-index
//!
//! Change tracking, the vector store and everything that keeps it in step with
//! the chunk cache on disk. The positional contract runs through all of it:
//! vector `i` belongs to chunk `i` of the flattened cache.

pub mod cache;
pub mod flat;
pub mod indexer;
pub mod lance;
pub mod snapshot;
pub mod store;
pub mod tracker;

pub use cache::{CacheEntry, ChunkCache};
pub use flat::FlatIndex;
pub use indexer::{IndexReport, Indexer};
pub use snapshot::{IndexSnapshot, SnapshotStore, WriteMode};
pub use store::VectorStore;
pub use tracker::{ChangeTracker, PlanKind, Reconciliation};

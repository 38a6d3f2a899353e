//! docrag-core
//!
//! Domain records, error taxonomy, configuration and the two pure indexing
//! stages: turning a document's block stream into sections (`parser`) and
//! sections into bounded chunks (`chunker`).

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod parser;
pub mod source;
pub mod traits;
pub mod types;

pub use error::{Error, Result};

// src/lib.rs

//! chunkpipe: a training-data pipeline for self-play game records.
//!
//! Turns directories of compressed chunk files into shuffled, fixed-size
//! batches of training tensors, fast enough to keep a GPU-bound trainer
//! fed. Three record formats are supported transparently (legacy text and
//! two packed binary layouts), decoded by a pool of worker threads and
//! de-correlated through a memory-bounded shuffle buffer. A separate
//! migrator rewrites archived V2 chunks into the V3 layout.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chunkpipe::{DirectorySource, Pipeline, PipelineConfig, PipelineRng};
//!
//! # fn main() -> chunkpipe::Result<()> {
//! let config = PipelineConfig::default().with_env_overrides();
//! let rng = PipelineRng::new(42);
//! let source = DirectorySource::new("data/chunks".as_ref(), rng, true)?;
//! for batch in Pipeline::new(&config, Arc::new(source))?.parse() {
//!     let batch = batch?;
//!     // hand batch.planes / batch.probs / batch.outcomes to the trainer
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod migrate;
pub mod moves;
pub mod pipeline;
pub mod rng;
pub mod source;

pub use config::PipelineConfig;
pub use decoder::ChunkDecoder;
pub use error::{PipelineError, Result};
pub use format::FormatVersion;
pub use migrate::Migrator;
pub use pipeline::{Batch, Pipeline, ShuffleBuffer};
pub use rng::PipelineRng;
pub use source::{ChunkSource, DirectorySource, InMemorySource};

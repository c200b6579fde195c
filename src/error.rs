// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {

    #[error("Chunk source error at '{path}': {message}")]
    Source {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Malformed chunk contents. Fatal for the blob being decoded only;
    /// the worker logs it and moves on to the next chunk.
    #[error("Chunk decode error: {message}")]
    Decode {
        message: String,
    },

    /// A record header carried a version tag we do not understand, or a
    /// record of the wrong version reached a stage that expects a specific
    /// one. Proceeding would risk silently corrupting training data.
    #[error("Unrecognized record version tag {found:#010x}")]
    Version {
        found: u32,
    },

    /// Upstream data-generation defect (bad outcome value, wrong policy
    /// vector length, nonzero probability on a dropped move). Never
    /// coerced; always propagated to the caller.
    #[error("Data invariant violated: {message}")]
    Invariant {
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Worker channel error: {message}")]
    Channel {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// Convenience constructors
impl PipelineError {

    pub fn source(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Source {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn source_with_io(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Source {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn version(found: u32) -> Self {
        Self::Version { found }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// True for errors that abort only the current blob, not the pipeline.
    pub fn is_blob_fatal(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Source { .. })
    }
}

// src/source.rs

//! Where chunk blobs come from.
//!
//! Decode workers share one [`ChunkSource`] and pull from it concurrently;
//! the source's internal lock is the only synchronization point on the
//! ingest side. A blob is handed out exactly once.

use std::collections::VecDeque;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use flate2::read::GzDecoder;

use crate::error::{PipelineError, Result};
use crate::rng::PipelineRng;

/// A shared, thread-safe supply of chunk blobs.
pub trait ChunkSource: Send + Sync {
    /// The next blob, or `None` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// `Source` errors are per-blob: the caller may skip the blob and pull
    /// again.
    fn next_chunk(&self) -> Result<Option<Bytes>>;
}

/// A fixed list of in-memory blobs, served in order. Used in tests and for
/// replaying already-loaded data.
pub struct InMemorySource {
    blobs: Mutex<VecDeque<Bytes>>,
}

impl InMemorySource {
    #[must_use]
    pub fn new(blobs: Vec<Bytes>) -> Self {
        Self {
            blobs: Mutex::new(blobs.into()),
        }
    }
}

impl ChunkSource for InMemorySource {
    fn next_chunk(&self) -> Result<Option<Bytes>> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| PipelineError::channel("chunk source lock poisoned"))?;
        Ok(blobs.pop_front())
    }
}

/// Serves gzip-compressed chunk files (`*.gz`) from a directory.
///
/// The file list is scanned once at construction and shuffled with the
/// supplied RNG. With `cycle` set the source reshuffles and starts over
/// when the list runs out, for training runs that loop over a fixed corpus
/// indefinitely.
pub struct DirectorySource {
    cycle: bool,
    state: Mutex<DirState>,
}

struct DirState {
    files: Vec<PathBuf>,
    next: usize,
    rng: PipelineRng,
}

impl DirectorySource {
    pub fn new(dir: &Path, mut rng: PipelineRng, cycle: bool) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .map_err(|e| PipelineError::source_with_io(dir, "read_dir", e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                PipelineError::source_with_io(dir, "read_dir entry", e)
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "gz") {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(PipelineError::source(
                dir.display().to_string(),
                "no .gz chunk files found",
            ));
        }
        files.sort();
        rng.shuffle(&mut files);
        Ok(Self {
            cycle,
            state: Mutex::new(DirState {
                files,
                next: 0,
                rng,
            }),
        })
    }

    /// Number of chunk files found at construction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map_or(0, |s| s.files.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_blob(path: &Path) -> Result<Bytes> {
        let compressed = fs::read(path)
            .map_err(|e| PipelineError::source_with_io(path, "read", e))?;
        let mut blob = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut blob)
            .map_err(|e| {
                PipelineError::source_with_io(path, "gzip decode", e)
            })?;
        Ok(blob.into())
    }
}

impl ChunkSource for DirectorySource {
    fn next_chunk(&self) -> Result<Option<Bytes>> {
        let path = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| PipelineError::channel("chunk source lock poisoned"))?;
            if state.next >= state.files.len() {
                if !self.cycle {
                    return Ok(None);
                }
                // Re-deal the whole list in a fresh order
                state.next = 0;
                let mut files = std::mem::take(&mut state.files);
                state.rng.shuffle(&mut files);
                state.files = files;
            }
            let idx = state.next;
            state.next += 1;
            state.files[idx].clone()
        };
        Self::read_blob(&path).map(Some)
    }
}

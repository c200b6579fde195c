// src/pipeline/worker.rs

//! Parallel decode workers.
//!
//! Each worker owns a forked RNG stream and a bounded channel sender.
//! Workers pull blobs from the shared source (its internal lock is the
//! only cross-worker synchronization), decode records, and push them
//! downstream; a full channel blocks the worker, which is the pipeline's
//! backpressure. Blob-fatal problems are logged and skipped. Fatal errors
//! are forwarded down the channel so the consumer surfaces them, then the
//! worker stops.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::decoder::ChunkDecoder;
use crate::error::{PipelineError, Result};
use crate::rng::PipelineRng;
use crate::source::ChunkSource;

/// Handles to a set of spawned decode workers.
pub(crate) struct WorkerPool {
    pub(crate) receivers: Vec<Receiver<Result<Bytes>>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` decode threads over the shared source.
    pub(crate) fn spawn(
        workers: usize,
        channel_capacity: usize,
        sample: u32,
        rng: &mut PipelineRng,
        source: &Arc<dyn ChunkSource>,
    ) -> Result<Self> {
        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = bounded(channel_capacity);
            let decoder = ChunkDecoder::new(sample, rng.fork());
            let source = Arc::clone(source);
            let handle = thread::Builder::new()
                .name(format!("decode-worker-{id}"))
                .spawn(move || run_worker(id, decoder, &*source, &tx))
                .map_err(|e| {
                    PipelineError::channel(format!("failed to spawn decode worker {id}: {e}"))
                })?;
            receivers.push(rx);
            handles.push(handle);
        }
        Ok(Self { receivers, handles })
    }

    /// Wait for every worker to finish. Receivers must be dropped (or
    /// drained to disconnect) first or this blocks on backpressure.
    pub(crate) fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("decode worker panicked");
            }
        }
    }
}

fn run_worker(
    id: usize,
    mut decoder: ChunkDecoder,
    source: &dyn ChunkSource,
    tx: &Sender<Result<Bytes>>,
) {
    loop {
        let blob = match source.next_chunk() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(worker = id, "chunk source exhausted");
                return;
            }
            Err(e) if e.is_blob_fatal() => {
                warn!(worker = id, error = %e, "skipping unreadable chunk");
                continue;
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        };

        let records = match decoder.records(&blob) {
            Ok(records) => records,
            Err(e) if e.is_blob_fatal() => {
                warn!(worker = id, error = %e, "skipping undecodable chunk");
                continue;
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        };
        for item in records {
            match item {
                Ok(record) => {
                    // Consumer hung up; nothing left to do
                    if tx.send(Ok(record)).is_err() {
                        return;
                    }
                }
                Err(e) if e.is_blob_fatal() => {
                    warn!(worker = id, error = %e, "abandoning malformed chunk");
                    break;
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }
    }
}

// src/pipeline/mod.rs

//! The assembled training-data pipeline.
//!
//! Construction wires the stages together: decode workers pulling from a
//! shared chunk source, one bounded channel per worker, a shuffle buffer,
//! and a batcher. [`Pipeline::parse`] hands back a blocking iterator of
//! batches; the consumer's pace propagates backwards through channel
//! backpressure all the way to the source.

mod batch;
mod shuffle;
mod worker;

pub use batch::{Batch, Batcher, INPUT_PLANES, PLANES_TENSOR_BYTES};
pub use shuffle::ShuffleBuffer;

use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel::Receiver;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::rng::PipelineRng;
use crate::source::ChunkSource;
use worker::WorkerPool;

/// A running pipeline: decode workers are live once this exists.
pub struct Pipeline {
    pool: WorkerPool,
    shuffle: ShuffleBuffer,
    batcher: Batcher,
}

impl Pipeline {
    /// Validate the configuration and spawn the decode workers.
    ///
    /// With `seed` unset, the run is seeded from the OS; set it to make the
    /// record stream reproducible.
    pub fn new(config: &PipelineConfig, source: Arc<dyn ChunkSource>) -> Result<Self> {
        config.validate()?;
        let mut rng = config
            .seed
            .map_or_else(PipelineRng::from_entropy, PipelineRng::new);
        let pool = WorkerPool::spawn(
            config.workers,
            config.channel_capacity,
            config.sample,
            &mut rng,
            &source,
        )?;
        debug!(
            workers = config.workers,
            shuffle_size = config.shuffle_size,
            sample = config.sample,
            "pipeline started"
        );
        Ok(Self {
            pool,
            shuffle: ShuffleBuffer::new(config.shuffle_size, rng.fork()),
            batcher: Batcher::new(config.batch_size),
        })
    }

    /// Consume the pipeline as an iterator of training batches.
    ///
    /// Blob-level problems were already skipped upstream; an `Err` item
    /// here is fatal (invariant violation or version mismatch) and ends
    /// the iteration.
    #[must_use]
    pub fn parse(mut self) -> Batches {
        // The iterator takes sole ownership of the receivers; keeping a
        // second set alive would stop workers from observing a hang-up
        let receivers = std::mem::take(&mut self.pool.receivers);
        Batches {
            pool: Some(self.pool),
            receivers,
            cursor: 0,
            shuffle: self.shuffle,
            batcher: self.batcher,
            finished: false,
        }
    }
}

/// Blocking batch iterator. See [`Pipeline::parse`].
pub struct Batches {
    pool: Option<WorkerPool>,
    receivers: Vec<Receiver<Result<Bytes>>>,
    cursor: usize,
    shuffle: ShuffleBuffer,
    batcher: Batcher,
    finished: bool,
}

impl Batches {
    /// Pull the next record, round-robin over the live worker channels.
    /// `None` once every worker has disconnected.
    fn next_record(&mut self) -> Option<Result<Bytes>> {
        while !self.receivers.is_empty() {
            self.cursor %= self.receivers.len();
            match self.receivers[self.cursor].recv() {
                Ok(item) => {
                    self.cursor += 1;
                    return Some(item);
                }
                // Worker finished; shrink the poll set
                Err(_) => {
                    self.receivers.remove(self.cursor);
                }
            }
        }
        None
    }

    fn finish(&mut self) {
        self.finished = true;
        // Disconnect the channels so blocked workers can exit
        self.receivers.clear();
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
    }
}

impl Iterator for Batches {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        // Live phase: feed the shuffle buffer, batch what it evicts
        while let Some(item) = self.next_record() {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            };
            if let Some(evicted) = self.shuffle.insert_or_replace(record) {
                match self.batcher.push(evicted) {
                    Ok(Some(batch)) => return Some(Ok(batch)),
                    Ok(None) => {}
                    Err(e) => {
                        self.finish();
                        return Some(Err(e));
                    }
                }
            }
        }
        // Drain phase: upstream is done, empty the buffer
        while let Some(record) = self.shuffle.extract() {
            match self.batcher.push(record) {
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => {}
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
        // A trailing partial batch is dropped here with the batcher
        self.finish();
        None
    }
}

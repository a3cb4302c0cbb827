//! Batch sampling across many files, synchronous or pipelined.
//!
//! [`SampleReader`] decodes one frame from each of several files at once.
//! Every file gets its own scoped thread for the duration of a batch, and
//! open readers persist between batches in per-slot caches. The
//! asynchronous path runs the whole batch on the pipeline worker, so
//! callers can overlap decoding with their own work and pick the frames up
//! later with [`retrieve`](SampleReader::retrieve).
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use frameseek::{DecoderOptions, FrameSeekError, PixelLayout, SampleReader};
//!
//! let reader = SampleReader::new(DecoderOptions::new().with_max_files(2));
//! let paths = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
//!
//! reader.submit(paths.clone(), vec![10, 250], PixelLayout::Rgb);
//! // ... other work ...
//! let frames = reader.retrieve(&paths, &[10, 250], PixelLayout::Rgb)?;
//! assert_eq!(frames.len(), 2);
//! # Ok::<(), FrameSeekError>(())
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::cache::ReaderCache;
use crate::configuration::DecoderOptions;
use crate::decode::{DecodedFrame, PixelLayout};
use crate::decoder::{acquire_reader, lock};
use crate::error::FrameSeekError;
use crate::pipeline::{AsyncDecodePipeline, DecodeRequest};
use crate::reader::VideoReader;

type ReaderPool = Arc<Mutex<ReaderCache<VideoReader>>>;

/// Multi-file frame sampler with cached readers and an async pipeline.
pub struct SampleReader {
    options: DecoderOptions,
    pools: Vec<ReaderPool>,
    pipeline: AsyncDecodePipeline,
}

impl std::fmt::Debug for SampleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleReader")
            .field("pools", &self.pools.len())
            .finish_non_exhaustive()
    }
}

impl SampleReader {
    /// Create a sampler with one reader pool per allowed file.
    pub fn new(options: DecoderOptions) -> Self {
        let pools = (0..options.max_files)
            .map(|_| Arc::new(Mutex::new(ReaderCache::new(options.readers_per_slot))))
            .collect();
        Self {
            options,
            pools,
            pipeline: AsyncDecodePipeline::new(),
        }
    }

    /// The options this sampler was built with.
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Decode one frame per file, synchronously.
    ///
    /// Any buffered asynchronous result is discarded first, so a later
    /// [`retrieve`](SampleReader::retrieve) cannot observe frames from
    /// before this call.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::Configuration`] for malformed requests, or the
    /// first per-file failure.
    pub fn decode(
        &self,
        paths: &[PathBuf],
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        self.validate_request(paths.len(), frame_ids.len())?;
        self.pipeline.discard_pending();
        decode_all(&self.pools, paths, frame_ids, layout)
    }

    /// Submit a batch to the pipeline worker and return immediately.
    ///
    /// If an earlier batch is still running, this blocks until it finishes
    /// and discards its unretrieved result. Request validation errors are
    /// captured in the result slot and surface on retrieval.
    pub fn submit(&self, paths: Vec<PathBuf>, frame_ids: Vec<u64>, layout: PixelLayout) {
        let request = DecodeRequest {
            paths: paths.clone(),
            frame_ids: frame_ids.clone(),
            layout,
        };
        log::debug!("Submitting batch {}", request.key());

        let pools = self.pools.clone();
        let path_count = paths.len();
        let id_count = frame_ids.len();
        let validation = self.validate_request(path_count, id_count);
        self.pipeline.submit(request, move || {
            validation?;
            decode_all(&pools, &paths, &frame_ids, layout)
        });
    }

    /// Retrieve the frames of the submitted batch, blocking until the
    /// worker has finished.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NoPendingRequest`] if nothing was submitted.
    /// - The batch's captured failure, re-raised.
    /// - [`FrameSeekError::RequestMismatch`] if `paths`, `frame_ids`, or
    ///   `layout` differ from the submitted batch.
    pub fn retrieve(
        &self,
        paths: &[PathBuf],
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        let request = DecodeRequest {
            paths: paths.to_vec(),
            frame_ids: frame_ids.to_vec(),
            layout,
        };
        self.pipeline.retrieve(&request)
    }

    /// Close every cached reader and drop any buffered result.
    pub fn clear_all_readers(&self) {
        self.pipeline.discard_pending();
        for pool in &self.pools {
            lock(pool).clear_all();
        }
    }

    fn validate_request(&self, path_count: usize, id_count: usize) -> Result<(), FrameSeekError> {
        if path_count == 0 {
            return Err(FrameSeekError::Configuration(
                "request addresses no files".to_string(),
            ));
        }
        if path_count != id_count {
            return Err(FrameSeekError::Configuration(format!(
                "request has {path_count} files but {id_count} frame ids"
            )));
        }
        if path_count > self.pools.len() {
            return Err(FrameSeekError::Configuration(format!(
                "request addresses {path_count} files but the sampler allows {}",
                self.pools.len(),
            )));
        }
        Ok(())
    }
}

/// Decode one frame per file, each on its own scoped thread.
fn decode_all(
    pools: &[ReaderPool],
    paths: &[PathBuf],
    frame_ids: &[u64],
    layout: PixelLayout,
) -> Result<Vec<DecodedFrame>, FrameSeekError> {
    let outcomes: Vec<Result<DecodedFrame, FrameSeekError>> = thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .zip(frame_ids)
            .zip(pools)
            .map(|((path, &frame_id), pool)| {
                scope.spawn(move || {
                    let mut cache = lock(pool);
                    let reader = acquire_reader(&mut cache, path)?;
                    reader.decode_frame(frame_id, layout)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|payload| {
                    Err(FrameSeekError::TaskFailed(panic_message(payload)))
                })
            })
            .collect()
    });

    outcomes.into_iter().collect()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker thread panicked".to_string()
    }
}

//! Asynchronous decode pipeline with a single result slot.
//!
//! [`AsyncDecodePipeline`] decouples submitting a decode request from
//! retrieving its frames. At most one result is buffered: submitting while
//! a previous result sits unretrieved waits for the in-flight work, then
//! discards the old result. That discard is deliberate data loss, not an
//! error — the caller has expressed that only the newest request matters.
//!
//! Retrieval verifies the caller's request against the one that produced
//! the buffered result ([`DecodeRequest`] equality covers file paths,
//! frame ids, and pixel layout) and fails on any mismatch.

use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

use crate::decode::{DecodedFrame, PixelLayout};
use crate::error::FrameSeekError;
use crate::runner::TaskRunner;

/// The identity of one decode request: which files, which frames, which
/// channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    /// Files to decode from, in caller order.
    pub paths: Vec<PathBuf>,
    /// Requested frame id per file, parallel to `paths`.
    pub frame_ids: Vec<u64>,
    /// Output channel order.
    pub layout: PixelLayout,
}

impl DecodeRequest {
    /// Render the request as a compact key, for logs and mismatch errors.
    pub fn key(&self) -> String {
        let layout = match self.layout {
            PixelLayout::Rgb => "rgb",
            PixelLayout::Bgr => "bgr",
        };
        let pairs: Vec<String> = self
            .paths
            .iter()
            .zip(&self.frame_ids)
            .map(|(path, frame_id)| format!("{}:{}", path.display(), frame_id))
            .collect();
        format!("{layout}:{}", pairs.join(","))
    }
}

struct Slot {
    /// A submitted task has not yet stored its result.
    pending: bool,
    /// The buffered outcome, tagged with the request that produced it.
    result: Option<(DecodeRequest, Result<Vec<DecodedFrame>, FrameSeekError>)>,
}

/// Single-slot handoff between a submitting thread and one decode worker.
pub struct AsyncDecodePipeline {
    runner: TaskRunner,
    slot: Arc<(Mutex<Slot>, Condvar)>,
}

impl std::fmt::Debug for AsyncDecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDecodePipeline").finish_non_exhaustive()
    }
}

impl Default for AsyncDecodePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncDecodePipeline {
    /// Create a pipeline with its own worker thread.
    pub fn new() -> Self {
        Self {
            runner: TaskRunner::spawn("decode-pipeline"),
            slot: Arc::new((
                Mutex::new(Slot {
                    pending: false,
                    result: None,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Submit a decode request.
    ///
    /// If an earlier request is still running, this blocks until it
    /// finishes, then discards its unretrieved result before enqueuing
    /// `work`. The work closure's outcome (frames or error) is captured in
    /// the slot for [`retrieve`](AsyncDecodePipeline::retrieve).
    pub fn submit<F>(&self, request: DecodeRequest, work: F)
    where
        F: FnOnce() -> Result<Vec<DecodedFrame>, FrameSeekError> + Send + 'static,
    {
        let (lock, condvar) = &*self.slot;
        {
            let mut slot = lock_slot(lock);
            while slot.pending {
                slot = wait_slot(condvar, slot);
            }
            if slot.result.is_some() {
                log::debug!(
                    "Discarding unretrieved decode result in favour of request {}",
                    request.key(),
                );
            }
            slot.result = None;
            slot.pending = true;
        }

        let slot_handle = Arc::clone(&self.slot);
        self.runner.submit(move || {
            let outcome = work();
            let (lock, condvar) = &*slot_handle;
            let mut slot = lock_slot(lock);
            slot.result = Some((request, outcome));
            slot.pending = false;
            drop(slot);
            condvar.notify_all();
            Ok(())
        });
    }

    /// Retrieve the frames for `request`, blocking until the worker has
    /// stored a result.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::NoPendingRequest`] if nothing was submitted and
    ///   the slot is empty.
    /// - The captured decode failure, re-raised, if the work failed.
    /// - [`FrameSeekError::RequestMismatch`] if the buffered result was
    ///   produced for a different request.
    pub fn retrieve(
        &self,
        request: &DecodeRequest,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        let (lock, condvar) = &*self.slot;
        let mut slot = lock_slot(lock);

        if !slot.pending && slot.result.is_none() {
            return Err(FrameSeekError::NoPendingRequest);
        }

        while slot.result.is_none() {
            slot = wait_slot(condvar, slot);
        }

        let (submitted, outcome) = match slot.result.take() {
            Some(entry) => entry,
            None => return Err(FrameSeekError::NoPendingRequest),
        };
        drop(slot);

        let frames = outcome?;
        if submitted != *request {
            return Err(FrameSeekError::RequestMismatch {
                submitted: submitted.key(),
                requested: request.key(),
            });
        }
        Ok(frames)
    }

    /// Wait out any in-flight work and drop its result.
    ///
    /// Synchronous operations call this so a later retrieval cannot
    /// observe frames from before the synchronous call.
    pub fn discard_pending(&self) {
        let (lock, condvar) = &*self.slot;
        let mut slot = lock_slot(lock);
        while slot.pending {
            slot = wait_slot(condvar, slot);
        }
        if slot.result.take().is_some() {
            log::debug!("Discarded buffered decode result");
        }
    }
}

fn lock_slot<'a>(lock: &'a Mutex<Slot>) -> std::sync::MutexGuard<'a, Slot> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn wait_slot<'a>(
    condvar: &Condvar,
    guard: std::sync::MutexGuard<'a, Slot>,
) -> std::sync::MutexGuard<'a, Slot> {
    match condvar.wait(guard) {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

//! Top-level multi-file Group of Pictures decoder.
//!
//! [`GopDecoder`] owns a fixed number of file slots, each with its own
//! background runners and reader cache, and fans one request out across
//! them: one file per slot, joined before results are assembled. All
//! failures surface through the runners' captured-failure protocol.
//!
//! [`CachedGopDecoder`] wraps it with a per-file Group-of-Pictures range
//! cache, so repeated requests inside the same GOP skip extraction
//! entirely.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use frameseek::{DecoderOptions, FrameSeekError, GopDecoder};
//!
//! let decoder = GopDecoder::new(DecoderOptions::new().with_max_files(2));
//! let paths = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
//! let frames = decoder.decode(&paths, &[10, 250])?;
//! assert_eq!(frames.len(), 2);
//! # Ok::<(), FrameSeekError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::bundle::{ParsedBundle, SerializedPacketBundle, merge_serialized};
use crate::cache::ReaderCache;
use crate::configuration::DecoderOptions;
use crate::decode::{ColorRange, DecodedFrame, GopDecodeEngine, PixelLayout, SoftwareEngine};
use crate::error::FrameSeekError;
use crate::reader::VideoReader;
use crate::runner::TaskRunner;

struct DecoderSlot {
    demux_runner: TaskRunner,
    decode_runner: TaskRunner,
    readers: Arc<Mutex<ReaderCache<VideoReader>>>,
}

/// Decodes frames from up to `max_files` video files per request.
pub struct GopDecoder {
    options: DecoderOptions,
    slots: Vec<DecoderSlot>,
    merge_runner: TaskRunner,
}

impl std::fmt::Debug for GopDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GopDecoder")
            .field("slots", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl GopDecoder {
    /// Create a decoder with one slot (reader cache plus demux and decode
    /// runners) per allowed file.
    pub fn new(options: DecoderOptions) -> Self {
        let slots = (0..options.max_files)
            .map(|i| DecoderSlot {
                demux_runner: TaskRunner::spawn(&format!("demux-{i}")),
                decode_runner: TaskRunner::spawn(&format!("decode-{i}")),
                readers: Arc::new(Mutex::new(ReaderCache::new(options.readers_per_slot))),
            })
            .collect();

        Self {
            options,
            slots,
            merge_runner: TaskRunner::spawn("merge"),
        }
    }

    /// The options this decoder was built with.
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Decode one frame per file using the default pixel layout.
    ///
    /// `frame_ids` is parallel to `paths`. Results come back in caller
    /// order.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::Configuration`] for malformed requests, or the
    /// first failure captured by any slot.
    pub fn decode(
        &self,
        paths: &[PathBuf],
        frame_ids: &[u64],
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        self.decode_with_layout(paths, frame_ids, self.options.pixel_layout)
    }

    /// Decode one frame per file with an explicit pixel layout.
    ///
    /// # Errors
    ///
    /// See [`decode`](GopDecoder::decode).
    pub fn decode_with_layout(
        &self,
        paths: &[PathBuf],
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        self.validate_request(paths.len(), frame_ids.len())?;

        let outputs: Vec<Arc<Mutex<Option<DecodedFrame>>>> = (0..paths.len())
            .map(|_| Arc::new(Mutex::new(None)))
            .collect();

        for (i, (path, &frame_id)) in paths.iter().zip(frame_ids).enumerate() {
            let slot = &self.slots[i];
            let readers = Arc::clone(&slot.readers);
            let output = Arc::clone(&outputs[i]);
            let path = path.clone();
            let warn_limited = self.options.warn_limited_color_range;

            slot.decode_runner.submit(move || {
                let mut cache = lock(&readers);
                let reader = acquire_reader(&mut cache, &path)?;
                if warn_limited && reader.stream_info().color_range == ColorRange::Mpeg {
                    log::warn!(
                        "{}: limited-range stream converted to full-range pixels",
                        path.display(),
                    );
                }
                let frame = reader.decode_frame(frame_id, layout)?;
                *lock(&output) = Some(frame);
                Ok(())
            });
        }

        self.join_slots(paths.len())?;
        collect_outputs(outputs)
    }

    /// Extract the Groups of Pictures for each file and merge them into
    /// one serialized bundle.
    ///
    /// `frame_ids` holds one id list per file, parallel to `paths`. The
    /// merged bundle's summary arrays follow file order, then per-file
    /// record order.
    ///
    /// # Errors
    ///
    /// Request validation, extraction, or merge errors.
    pub fn get_gop(
        &self,
        paths: &[PathBuf],
        frame_ids: &[Vec<u64>],
    ) -> Result<SerializedPacketBundle, FrameSeekError> {
        let per_file = self.get_gop_list(paths, frame_ids)?;

        let output: Arc<Mutex<Option<SerializedPacketBundle>>> = Arc::new(Mutex::new(None));
        let task_output = Arc::clone(&output);
        self.merge_runner.submit(move || {
            let buffers: Vec<&[u8]> = per_file.iter().map(|b| b.data.as_slice()).collect();
            let data = merge_serialized(&buffers)?;

            let mut first_frame_ids = Vec::new();
            let mut gop_lens = Vec::new();
            for bundle in &per_file {
                first_frame_ids.extend_from_slice(&bundle.first_frame_ids);
                gop_lens.extend_from_slice(&bundle.gop_lens);
            }

            *lock(&task_output) = Some(SerializedPacketBundle {
                data,
                first_frame_ids,
                gop_lens,
            });
            Ok(())
        });
        self.merge_runner.join()?;

        lock(&output).take().ok_or_else(|| {
            FrameSeekError::TaskFailed("merge task produced no output".to_string())
        })
    }

    /// Extract the Groups of Pictures for each file, one serialized
    /// bundle per file.
    ///
    /// # Errors
    ///
    /// Request validation or extraction errors.
    pub fn get_gop_list(
        &self,
        paths: &[PathBuf],
        frame_ids: &[Vec<u64>],
    ) -> Result<Vec<SerializedPacketBundle>, FrameSeekError> {
        self.validate_request(paths.len(), frame_ids.len())?;

        let outputs: Vec<Arc<Mutex<Option<SerializedPacketBundle>>>> = (0..paths.len())
            .map(|_| Arc::new(Mutex::new(None)))
            .collect();

        for (i, (path, ids)) in paths.iter().zip(frame_ids).enumerate() {
            let slot = &self.slots[i];
            let readers = Arc::clone(&slot.readers);
            let output = Arc::clone(&outputs[i]);
            let path = path.clone();
            let ids = ids.clone();

            slot.demux_runner.submit(move || {
                let mut cache = lock(&readers);
                let reader = acquire_reader(&mut cache, &path)?;
                let bundle = reader.extract_gops(&ids)?;
                *lock(&output) = Some(bundle.serialize());
                Ok(())
            });
        }

        self.join_slots(paths.len())?;
        collect_outputs(outputs)
    }

    /// Decode frames from an already serialized bundle, no file access.
    ///
    /// Every requested id must fall inside some record's Group of
    /// Pictures. Results come back in caller order.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::InvalidBundle`] for malformed data,
    /// [`FrameSeekError::FrameOutOfRange`] for ids no record covers, or
    /// decode errors.
    pub fn decode_from_bundle(
        &self,
        data: &[u8],
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        let parsed = ParsedBundle::parse(data)?;
        let covered_end = parsed
            .frames
            .iter()
            .map(|view| view.first_frame_id + view.gop_len())
            .max()
            .unwrap_or(0);

        if self.options.warn_limited_color_range
            && parsed
                .frames
                .iter()
                .any(|view| view.color_range == ColorRange::Mpeg)
        {
            log::warn!("bundle holds limited-range streams converted to full-range pixels");
        }

        let mut grouped: HashMap<usize, Vec<u64>> = HashMap::new();
        for &frame_id in frame_ids {
            let record_index = parsed
                .frames
                .iter()
                .position(|view| {
                    frame_id >= view.first_frame_id
                        && frame_id < view.first_frame_id + view.gop_len()
                })
                .ok_or(FrameSeekError::FrameOutOfRange {
                    frame_id,
                    frame_count: covered_end,
                })?;
            grouped.entry(record_index).or_default().push(frame_id);
        }

        let mut engine = SoftwareEngine::new();
        let mut decoded: HashMap<u64, DecodedFrame> = HashMap::new();
        for (record_index, ids) in grouped {
            let frames = engine.decode_frames(&parsed.frames[record_index], &ids, layout)?;
            for (id, frame) in ids.into_iter().zip(frames) {
                decoded.insert(id, frame);
            }
        }

        frame_ids
            .iter()
            .map(|frame_id| {
                decoded.get(frame_id).cloned().ok_or_else(|| {
                    FrameSeekError::DecodeError(format!(
                        "frame {frame_id} missing from decode output"
                    ))
                })
            })
            .collect()
    }

    /// Tear down all pending work: discard queued tasks on every runner,
    /// wait for in-flight tasks, and clear captured failures.
    pub fn force_join_all(&self) {
        for slot in &self.slots {
            slot.demux_runner.force_join();
            slot.decode_runner.force_join();
        }
        self.merge_runner.force_join();
    }

    fn validate_request(&self, path_count: usize, id_count: usize) -> Result<(), FrameSeekError> {
        if path_count == 0 {
            return Err(FrameSeekError::Configuration(
                "request addresses no files".to_string(),
            ));
        }
        if path_count != id_count {
            return Err(FrameSeekError::Configuration(format!(
                "request has {path_count} files but {id_count} frame lists"
            )));
        }
        if path_count > self.slots.len() {
            return Err(FrameSeekError::Configuration(format!(
                "request addresses {path_count} files but the decoder allows {}",
                self.slots.len(),
            )));
        }
        Ok(())
    }

    /// Join the first `count` slots, returning the first captured failure
    /// after every slot has drained.
    fn join_slots(&self, count: usize) -> Result<(), FrameSeekError> {
        let mut first_error: Option<FrameSeekError> = None;
        for slot in &self.slots[..count] {
            if let Err(error) = slot.demux_runner.join() {
                first_error.get_or_insert(error);
            }
            if let Err(error) = slot.decode_runner.join() {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// One cached Group of Pictures range for a file.
struct CachedRange {
    data: Vec<u8>,
    first_frame_id: u64,
    gop_len: u64,
}

impl CachedRange {
    fn contains(&self, frame_id: u64) -> bool {
        frame_id >= self.first_frame_id && frame_id < self.first_frame_id + self.gop_len
    }
}

/// [`GopDecoder`] with a per-file Group-of-Pictures range cache.
///
/// A request hits the cache when the file's cached GOP contains the
/// requested frame; only misses touch the source files, and the fetched
/// GOPs replace the cached ones. [`last_cache_hits`] reports the hit
/// pattern of the most recent decode.
///
/// [`last_cache_hits`]: CachedGopDecoder::last_cache_hits
pub struct CachedGopDecoder {
    decoder: GopDecoder,
    ranges: HashMap<PathBuf, CachedRange>,
    last_hits: Vec<bool>,
}

impl std::fmt::Debug for CachedGopDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedGopDecoder")
            .field("cached_files", &self.ranges.len())
            .finish_non_exhaustive()
    }
}

impl CachedGopDecoder {
    /// Create a caching decoder.
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            decoder: GopDecoder::new(options),
            ranges: HashMap::new(),
            last_hits: Vec::new(),
        }
    }

    /// The wrapped decoder.
    pub fn decoder(&self) -> &GopDecoder {
        &self.decoder
    }

    /// Decode one frame per file, serving from cached Groups of Pictures
    /// where possible.
    ///
    /// # Errors
    ///
    /// Same as [`GopDecoder::decode_with_layout`] for the miss subset,
    /// plus bundle decode errors.
    pub fn decode(
        &mut self,
        paths: &[PathBuf],
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        self.decoder.validate_request(paths.len(), frame_ids.len())?;

        self.last_hits = paths
            .iter()
            .zip(frame_ids)
            .map(|(path, &frame_id)| {
                self.ranges
                    .get(path.as_path())
                    .is_some_and(|range| range.contains(frame_id))
            })
            .collect();

        // Fetch GOPs for the misses only.
        let miss_indices: Vec<usize> = (0..paths.len())
            .filter(|&i| !self.last_hits[i])
            .collect();
        if !miss_indices.is_empty() {
            let miss_paths: Vec<PathBuf> = miss_indices.iter().map(|&i| paths[i].clone()).collect();
            let miss_ids: Vec<Vec<u64>> = miss_indices.iter().map(|&i| vec![frame_ids[i]]).collect();
            let bundles = self.decoder.get_gop_list(&miss_paths, &miss_ids)?;

            for (path, bundle) in miss_paths.into_iter().zip(bundles) {
                let first_frame_id = bundle.first_frame_ids.first().copied().unwrap_or(0);
                let gop_len = bundle.gop_lens.first().copied().unwrap_or(0);
                self.ranges.insert(
                    path,
                    CachedRange {
                        data: bundle.data,
                        first_frame_id,
                        gop_len,
                    },
                );
            }
        }

        let hits = self.last_hits.iter().filter(|&&hit| hit).count();
        log::debug!(
            "Cached decode: {hits}/{} files served from cached GOPs",
            paths.len(),
        );

        paths
            .iter()
            .zip(frame_ids)
            .map(|(path, &frame_id)| {
                let range = self.ranges.get(path.as_path()).ok_or_else(|| {
                    FrameSeekError::Configuration(format!(
                        "no cached GOP for {} after fetch",
                        path.display(),
                    ))
                })?;
                let mut frames =
                    self.decoder
                        .decode_from_bundle(&range.data, &[frame_id], layout)?;
                frames.pop().ok_or_else(|| {
                    FrameSeekError::DecodeError(format!(
                        "frame {frame_id} missing from decode output"
                    ))
                })
            })
            .collect()
    }

    /// Per-file hit pattern of the most recent [`decode`] call.
    ///
    /// [`decode`]: CachedGopDecoder::decode
    pub fn last_cache_hits(&self) -> &[bool] {
        &self.last_hits
    }

    /// Drop all cached Groups of Pictures.
    pub fn clear(&mut self) {
        self.ranges.clear();
        self.last_hits.clear();
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fetch the cached reader for `path`, opening one on a miss.
pub(crate) fn acquire_reader<'a>(
    cache: &'a mut ReaderCache<VideoReader>,
    path: &Path,
) -> Result<&'a mut VideoReader, FrameSeekError> {
    let fresh = if cache.contains(path) {
        None
    } else {
        Some(VideoReader::open(path)?)
    };
    cache.find(path, fresh)
}

fn collect_outputs<T>(outputs: Vec<Arc<Mutex<Option<T>>>>) -> Result<Vec<T>, FrameSeekError> {
    outputs
        .into_iter()
        .map(|output| {
            lock(&output).take().ok_or_else(|| {
                FrameSeekError::TaskFailed("worker finished without storing output".to_string())
            })
        })
        .collect()
}

//! Per-file reader: demuxer, index, and decode engine in one handle.
//!
//! [`VideoReader`] is the unit the [`ReaderCache`](crate::ReaderCache)
//! stores: one open demuxer plus a lazily built [`GopIndex`] and a
//! software decode engine. Opening is cheap; the full index scan happens
//! on the first operation that needs it.
//!
//! # Example
//!
//! ```no_run
//! use frameseek::{FrameSeekError, PixelLayout, VideoReader};
//!
//! let mut reader = VideoReader::open("input.mp4")?;
//! let frame = reader.decode_frame(42, PixelLayout::Rgb)?;
//! frame.into_image()?.save("frame_42.png")?;
//! # Ok::<(), FrameSeekError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::bundle::PacketBundle;
use crate::decode::{DecodedFrame, GopDecodeEngine, PixelLayout, SoftwareEngine};
use crate::demux::{Demuxer, FfmpegDemuxer, StreamInfo};
use crate::error::FrameSeekError;
use crate::extract;
use crate::index::GopIndex;

/// One open video file, ready for random-access frame decoding.
pub struct VideoReader {
    path: PathBuf,
    demuxer: FfmpegDemuxer,
    index: Option<GopIndex>,
    engine: SoftwareEngine,
}

impl std::fmt::Debug for VideoReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoReader")
            .field("path", &self.path)
            .field("indexed", &self.index.is_some())
            .finish_non_exhaustive()
    }
}

impl VideoReader {
    /// Open a video file.
    ///
    /// # Errors
    ///
    /// Open, stream-discovery, and codec errors from
    /// [`FfmpegDemuxer::open`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrameSeekError> {
        let path = path.as_ref().to_path_buf();
        let demuxer = FfmpegDemuxer::open(&path)?;
        Ok(Self {
            path,
            demuxer,
            index: None,
            engine: SoftwareEngine::new(),
        })
    }

    /// Path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Static stream properties.
    pub fn stream_info(&self) -> &StreamInfo {
        self.demuxer.stream_info()
    }

    /// The Group of Pictures index, building it on first use.
    ///
    /// # Errors
    ///
    /// Scan errors, including [`FrameSeekError::EmptyVideo`].
    pub fn index(&mut self) -> Result<&GopIndex, FrameSeekError> {
        if self.index.is_none() {
            log::debug!("Building GOP index for {}", self.path.display());
            self.index = Some(GopIndex::scan(&mut self.demuxer)?);
        }
        self.index.as_ref().ok_or_else(|| {
            FrameSeekError::Configuration("GOP index vanished after construction".to_string())
        })
    }

    /// Extract the Groups of Pictures enclosing `frame_ids` as a bundle.
    ///
    /// # Errors
    ///
    /// Index and navigation errors; see [`extract_gops`](crate::extract_gops).
    pub fn extract_gops(&mut self, frame_ids: &[u64]) -> Result<PacketBundle, FrameSeekError> {
        if self.index.is_none() {
            self.index = Some(GopIndex::scan(&mut self.demuxer)?);
        }
        match self.index.as_ref() {
            Some(index) => extract::extract_gops(&mut self.demuxer, index, frame_ids),
            None => Err(FrameSeekError::Configuration(
                "GOP index vanished after construction".to_string(),
            )),
        }
    }

    /// Decode one frame.
    ///
    /// # Errors
    ///
    /// Extraction or decode errors for the enclosing Group of Pictures.
    pub fn decode_frame(
        &mut self,
        frame_id: u64,
        layout: PixelLayout,
    ) -> Result<DecodedFrame, FrameSeekError> {
        let mut frames = self.decode_frames(&[frame_id], layout)?;
        frames.pop().ok_or_else(|| {
            FrameSeekError::DecodeError(format!("frame {frame_id} missing from decode output"))
        })
    }

    /// Decode several frames, returned in the caller's order.
    ///
    /// Frames sharing a Group of Pictures are decoded in one pass.
    ///
    /// # Errors
    ///
    /// Extraction or decode errors for any enclosing Group of Pictures.
    pub fn decode_frames(
        &mut self,
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        let bundle = self.extract_gops(frame_ids)?;

        // Group requested ids by the record whose GOP contains them.
        let mut grouped: HashMap<usize, Vec<u64>> = HashMap::new();
        for &frame_id in frame_ids {
            let record_index = bundle
                .records
                .iter()
                .position(|record| {
                    frame_id >= record.first_frame_id
                        && frame_id < record.first_frame_id + record.gop_len()
                })
                .ok_or_else(|| {
                    FrameSeekError::DecodeError(format!(
                        "no extracted GOP contains frame {frame_id}"
                    ))
                })?;
            grouped.entry(record_index).or_default().push(frame_id);
        }

        let mut decoded: HashMap<u64, DecodedFrame> = HashMap::new();
        for (record_index, ids) in grouped {
            let view = bundle.records[record_index].as_view();
            let frames = self.engine.decode_frames(&view, &ids, layout)?;
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
}

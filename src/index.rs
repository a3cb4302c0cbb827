//! Group of Pictures index construction and lookup.
//!
//! A [`GopIndex`] is built from one full demux pass over a video stream. It
//! records, in presentation order, which frame ids open a Group of Pictures,
//! and (for variable frame rate streams) the bidirectional mapping between
//! frame ids and presentation timestamps. Once built, the index answers
//! "which Group of Pictures encloses frame N" in logarithmic time.
//!
//! # Example
//!
//! ```no_run
//! use frameseek::{FfmpegDemuxer, FrameSeekError, GopIndex};
//!
//! let mut demuxer = FfmpegDemuxer::open("input.mp4")?;
//! let index = GopIndex::scan(&mut demuxer)?;
//! let span = index.enclosing_gop(42)?;
//! println!("frame 42 lives in the GOP starting at {}", span.first_frame_id);
//! # Ok::<(), FrameSeekError>(())
//! ```

use std::collections::HashMap;

use crate::demux::Demuxer;
use crate::error::FrameSeekError;
use crate::keyframe::is_gop_start;

/// One Group of Pictures: its first frame id and its length in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GopSpan {
    /// Frame id of the key frame that opens this Group of Pictures.
    pub first_frame_id: u64,
    /// Number of frames up to (not including) the next boundary.
    pub len: u64,
}

impl GopSpan {
    /// Whether `frame_id` falls inside this span.
    pub fn contains(&self, frame_id: u64) -> bool {
        frame_id >= self.first_frame_id && frame_id < self.first_frame_id + self.len
    }
}

/// Bidirectional frame id / presentation timestamp mapping.
///
/// Only populated for variable frame rate streams, where frame ids cannot
/// be derived from timestamps arithmetically. Lookups never fall back to a
/// default: an absent entry is an error.
#[derive(Debug, Clone, Default)]
pub struct FrameTimestampMap {
    frame_to_ts: HashMap<u64, i64>,
    ts_to_frame: HashMap<i64, u64>,
}

impl FrameTimestampMap {
    /// Presentation timestamp recorded for `frame_id`.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::MissingFrameMapping`] if the frame was never seen.
    pub fn timestamp_for_frame(&self, frame_id: u64) -> Result<i64, FrameSeekError> {
        self.frame_to_ts
            .get(&frame_id)
            .copied()
            .ok_or(FrameSeekError::MissingFrameMapping(frame_id))
    }

    /// Frame id recorded for `timestamp`.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::MissingTimestampMapping`] if no frame carries this
    /// timestamp.
    pub fn frame_for_timestamp(&self, timestamp: i64) -> Result<u64, FrameSeekError> {
        self.ts_to_frame
            .get(&timestamp)
            .copied()
            .ok_or(FrameSeekError::MissingTimestampMapping(timestamp))
    }

    /// Number of mapped frames.
    pub fn len(&self) -> usize {
        self.frame_to_ts.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.frame_to_ts.is_empty()
    }
}

/// Index of Group of Pictures boundaries for one video stream.
#[derive(Debug, Clone)]
pub struct GopIndex {
    /// Frame ids that open a Group of Pictures, ascending, terminated by a
    /// sentinel equal to the total frame count.
    boundaries: Vec<u64>,
    /// Total number of frames seen during the scan.
    frame_count: u64,
    /// Frame/timestamp maps, present only for variable frame rate streams.
    map: Option<FrameTimestampMap>,
}

impl GopIndex {
    /// Build an index from raw scan output.
    ///
    /// `pairs` holds one `(presentation timestamp, opens a GOP)` entry per
    /// video packet, in demux order. Entries are stably sorted by timestamp
    /// to recover presentation order, then assigned dense frame ids
    /// `0..frame_count`. When `vfr` is set the frame/timestamp maps are
    /// populated as well.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::EmptyVideo`] if no packet opens a Group of
    /// Pictures (this includes the zero-packet case).
    pub fn from_scan(mut pairs: Vec<(i64, bool)>, vfr: bool) -> Result<Self, FrameSeekError> {
        pairs.sort_by_key(|&(timestamp, _)| timestamp);

        let frame_count = pairs.len() as u64;
        let mut boundaries: Vec<u64> = Vec::new();
        let mut map = if vfr {
            Some(FrameTimestampMap::default())
        } else {
            None
        };

        for (frame_id, &(timestamp, opens_gop)) in pairs.iter().enumerate() {
            let frame_id = frame_id as u64;
            if opens_gop {
                boundaries.push(frame_id);
            }
            if let Some(map) = map.as_mut() {
                map.frame_to_ts.insert(frame_id, timestamp);
                map.ts_to_frame.insert(timestamp, frame_id);
            }
        }

        if boundaries.is_empty() {
            return Err(FrameSeekError::EmptyVideo);
        }

        // Sentinel: the end of the last Group of Pictures.
        boundaries.push(frame_count);

        log::debug!(
            "Built GOP index: {} frames, {} GOPs, vfr={}",
            frame_count,
            boundaries.len() - 1,
            vfr,
        );

        Ok(Self {
            boundaries,
            frame_count,
            map,
        })
    }

    /// Build an index by running one full demux pass over a stream.
    ///
    /// Each packet is classified with the strict predicate
    /// ([`is_gop_start`]): payload header and container key flag must
    /// agree. The demuxer is rewound first, and left at end of stream.
    ///
    /// # Errors
    ///
    /// Demux errors, or [`FrameSeekError::EmptyVideo`] if the stream holds
    /// no Group of Pictures boundary.
    pub fn scan<D: Demuxer>(demuxer: &mut D) -> Result<Self, FrameSeekError> {
        let codec = demuxer.codec();
        demuxer.rewind()?;

        let mut pairs: Vec<(i64, bool)> = Vec::new();
        while let Some(packet) = demuxer.next_packet()? {
            let opens_gop = is_gop_start(codec, &packet.data, packet.is_key);
            pairs.push((packet.timestamp, opens_gop));
        }

        Self::from_scan(pairs, demuxer.is_vfr())
    }

    /// Total number of frames covered by the index.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Group of Pictures boundaries, ascending, including the sentinel.
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// The frame/timestamp map, if the stream is variable frame rate.
    pub fn map(&self) -> Option<&FrameTimestampMap> {
        self.map.as_ref()
    }

    /// Find the Group of Pictures that encloses `frame_id`.
    ///
    /// Upper-bound binary search over the boundary list: the enclosing span
    /// runs from the last boundary at or before `frame_id` to the first one
    /// after it.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::FrameOutOfRange`] if `frame_id` is at or past
    ///   the sentinel.
    /// - [`FrameSeekError::SeekFailed`] if no boundary precedes `frame_id`
    ///   (frames before the first key frame are not decodable entry points).
    pub fn enclosing_gop(&self, frame_id: u64) -> Result<GopSpan, FrameSeekError> {
        if frame_id >= self.frame_count {
            return Err(FrameSeekError::FrameOutOfRange {
                frame_id,
                frame_count: self.frame_count,
            });
        }

        // First boundary strictly greater than frame_id.
        let upper = self.boundaries.partition_point(|&b| b <= frame_id);
        if upper == 0 {
            return Err(FrameSeekError::SeekFailed {
                frame_id: frame_id as i64,
                reason: "no Group of Pictures boundary at or before this frame".to_string(),
            });
        }

        let first_frame_id = self.boundaries[upper - 1];
        let len = self.boundaries[upper] - first_frame_id;
        Ok(GopSpan {
            first_frame_id,
            len,
        })
    }

    /// Map a sorted list of requested frame ids onto their enclosing
    /// Groups of Pictures.
    ///
    /// Consecutive ids that share a Group of Pictures collapse into a
    /// single span, so the result holds one entry per distinct GOP touched,
    /// in ascending order.
    ///
    /// # Errors
    ///
    /// Same as [`enclosing_gop`](GopIndex::enclosing_gop), for the first
    /// offending id.
    pub fn gops_for_frames(&self, sorted_frame_ids: &[u64]) -> Result<Vec<GopSpan>, FrameSeekError> {
        let mut spans: Vec<GopSpan> = Vec::new();

        for &frame_id in sorted_frame_ids {
            if let Some(last) = spans.last() {
                if last.contains(frame_id) {
                    continue;
                }
            }
            spans.push(self.enclosing_gop(frame_id)?);
        }

        Ok(spans)
    }
}

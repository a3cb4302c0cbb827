//! Key-frame seek navigation.
//!
//! Container-level seeks land on *a* key frame at or before the requested
//! timestamp, but not necessarily on the key frame that opens the Group of
//! Pictures a caller wants. [`SeekNavigator`] drives repeated container
//! seeks until the stream is positioned exactly on a GOP's first packet.
//!
//! Two modes exist:
//!
//! - **Mapped** ([`seek_gop_start`](SeekNavigator::seek_gop_start)) — a
//!   [`GopIndex`] is available, so the target timestamp is known exactly
//!   and the navigator verifies each landing against it.
//! - **Unmapped**
//!   ([`seek_gop_start_unindexed`](SeekNavigator::seek_gop_start_unindexed))
//!   — no index exists. Only constant frame rate streams qualify; the
//!   navigator probes backwards, classifying packet payloads, until it
//!   lands on a Group of Pictures start at or before the target frame.

use crate::demux::{DemuxedPacket, Demuxer};
use crate::error::FrameSeekError;
use crate::index::GopIndex;
use crate::keyframe::has_gop_start_unit;

/// Where a navigation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekState {
    /// A container seek is about to be (or has just been) issued.
    Seeking,
    /// A landing packet is being checked against the target.
    Verifying,
    /// The stream is positioned on the target Group of Pictures start.
    Found,
    /// Navigation gave up.
    Failed,
}

/// Drives container seeks until the stream sits on a Group of Pictures
/// start.
///
/// A navigator is cheap and single-use per operation; its [`state`]
/// reflects the most recent navigation.
///
/// [`state`]: SeekNavigator::state
#[derive(Debug)]
pub struct SeekNavigator {
    state: SeekState,
}

impl Default for SeekNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl SeekNavigator {
    /// Create a navigator in the [`Seeking`](SeekState::Seeking) state.
    pub fn new() -> Self {
        Self {
            state: SeekState::Seeking,
        }
    }

    /// State after the most recent navigation.
    pub fn state(&self) -> SeekState {
        self.state
    }

    /// Position the stream on the first packet of the Group of Pictures
    /// that starts at `gop_first_frame_id`, using the index to verify the
    /// landing.
    ///
    /// The target timestamp comes from the frame/timestamp map for
    /// variable frame rate streams and from frame rate arithmetic
    /// otherwise. Container seeks undershoot, so after each seek the
    /// returned packet's timestamp is compared with the target; on a
    /// mismatch the probe advances by one frame and the seek is retried.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::MissingFrameMapping`] if the map lacks an entry
    ///   for a probe frame.
    /// - [`FrameSeekError::SeekFailed`] if the stream ends or the probe
    ///   runs past the indexed frame count without an exact landing.
    pub fn seek_gop_start<D: Demuxer>(
        &mut self,
        demuxer: &mut D,
        index: &GopIndex,
        gop_first_frame_id: u64,
    ) -> Result<DemuxedPacket, FrameSeekError> {
        let target_timestamp = match index.map() {
            Some(map) => map.timestamp_for_frame(gop_first_frame_id)?,
            None => demuxer.timestamp_for_frame(gop_first_frame_id),
        };

        let mut probe = gop_first_frame_id;
        loop {
            self.state = SeekState::Seeking;
            let probe_timestamp = match index.map() {
                Some(map) => map.timestamp_for_frame(probe)?,
                None => demuxer.timestamp_for_frame(probe),
            };

            let packet = match demuxer.seek_to_timestamp(probe_timestamp)? {
                Some(packet) => packet,
                None => {
                    self.state = SeekState::Failed;
                    return Err(FrameSeekError::SeekFailed {
                        frame_id: probe as i64,
                        reason: "stream ended while navigating to GOP start".to_string(),
                    });
                }
            };

            self.state = SeekState::Verifying;
            if packet.timestamp == target_timestamp {
                self.state = SeekState::Found;
                log::debug!(
                    "Mapped seek landed on GOP start {} (ts={}) after probing frame {}",
                    gop_first_frame_id,
                    target_timestamp,
                    probe,
                );
                return Ok(packet);
            }

            // The container undershot: nudge the probe forward one frame so
            // the next seek resolves to a later position.
            probe += 1;
            if probe >= index.frame_count() {
                self.state = SeekState::Failed;
                return Err(FrameSeekError::SeekFailed {
                    frame_id: probe as i64,
                    reason: format!(
                        "probe ran past the end of the stream hunting for ts {target_timestamp}"
                    ),
                });
            }
        }
    }

    /// Position the stream on the start of the Group of Pictures enclosing
    /// `target_frame_id`, with no index available.
    ///
    /// Returns the frame id the navigation landed on together with the
    /// landing packet. Constant frame rate only: frame ids are derived
    /// from timestamps arithmetically, which a variable frame rate stream
    /// does not permit.
    ///
    /// The landing packet's payload is classified with the flag-less
    /// predicate. When the container returns a key frame *later* than the
    /// target, the probe retreats by one frame; when it returns a non-key
    /// packet, the probe jumps to one before the landed frame.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::VariableFrameRate`] for VFR streams.
    /// - [`FrameSeekError::SeekFailed`] if the probe goes negative, the
    ///   stream ends, or navigation stops making progress.
    pub fn seek_gop_start_unindexed<D: Demuxer>(
        &mut self,
        demuxer: &mut D,
        target_frame_id: u64,
    ) -> Result<(u64, DemuxedPacket), FrameSeekError> {
        if demuxer.is_vfr() {
            self.state = SeekState::Failed;
            return Err(FrameSeekError::VariableFrameRate(
                "index-free GOP navigation needs frame ids derivable from timestamps".to_string(),
            ));
        }

        let codec = demuxer.codec();
        let mut probe: i64 = target_frame_id as i64;
        // Every round either retreats or jumps strictly backwards, so the
        // probe can move at most target+1 times before going negative.
        let max_rounds = target_frame_id + 2;

        for _ in 0..max_rounds {
            if probe < 0 {
                break;
            }

            self.state = SeekState::Seeking;
            let probe_timestamp = demuxer.timestamp_for_frame(probe as u64);
            let packet = match demuxer.seek_to_timestamp(probe_timestamp)? {
                Some(packet) => packet,
                None => {
                    self.state = SeekState::Failed;
                    return Err(FrameSeekError::SeekFailed {
                        frame_id: probe,
                        reason: "stream ended while probing for a GOP start".to_string(),
                    });
                }
            };

            self.state = SeekState::Verifying;
            let landed_frame_id = demuxer.frame_for_timestamp(packet.timestamp);

            if has_gop_start_unit(codec, &packet.data) {
                if landed_frame_id <= target_frame_id {
                    self.state = SeekState::Found;
                    log::debug!(
                        "Unindexed seek for frame {} landed on GOP start {}",
                        target_frame_id,
                        landed_frame_id,
                    );
                    return Ok((landed_frame_id, packet));
                }
                // The container resolved to a key frame past the target;
                // retreat one frame and try again.
                probe -= 1;
            } else {
                // Landed mid-GOP: the opening key frame is strictly before
                // the landed frame.
                probe = landed_frame_id as i64 - 1;
            }
        }

        self.state = SeekState::Failed;
        Err(FrameSeekError::SeekFailed {
            frame_id: probe,
            reason: format!("no GOP start found at or before frame {target_frame_id}"),
        })
    }
}

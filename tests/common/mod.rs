//! Shared test doubles: a scripted in-memory demuxer.

#![allow(dead_code)]

use frameseek::{
    CodecFamily, ColorRange, DemuxedPacket, Demuxer, FrameSeekError, StreamInfo,
};

/// How a scripted seek resolves its landing packet.
pub enum SeekLanding {
    /// Land on the first packet at or after the requested timestamp,
    /// regardless of key flags.
    Exact,
    /// Land on the last key packet at or before `requested - undershoot`,
    /// imitating containers whose seeks resolve short of the target.
    KeyAtOrBefore { undershoot: i64 },
    /// Land on the first key packet at or after the requested timestamp,
    /// falling back to the last key before it.
    KeyAtOrAfter,
}

/// In-memory [`Demuxer`] over a scripted packet list.
///
/// Timestamps equal frame ids (one tick per frame), so constant frame
/// rate arithmetic is the identity in both directions.
pub struct MockDemuxer {
    packets: Vec<DemuxedPacket>,
    info: StreamInfo,
    landing: SeekLanding,
    vfr: bool,
    position: usize,
}

impl MockDemuxer {
    pub fn new(packets: Vec<DemuxedPacket>, landing: SeekLanding) -> Self {
        Self {
            packets,
            info: mock_stream_info(),
            landing,
            vfr: false,
            position: 0,
        }
    }

    pub fn with_vfr(mut self, vfr: bool) -> Self {
        self.vfr = vfr;
        self
    }
}

impl Demuxer for MockDemuxer {
    fn next_packet(&mut self) -> Result<Option<DemuxedPacket>, FrameSeekError> {
        match self.packets.get(self.position) {
            Some(packet) => {
                self.position += 1;
                Ok(Some(packet.clone()))
            }
            None => Ok(None),
        }
    }

    fn seek_to_timestamp(
        &mut self,
        timestamp: i64,
    ) -> Result<Option<DemuxedPacket>, FrameSeekError> {
        let landing_index = match self.landing {
            SeekLanding::Exact => self
                .packets
                .iter()
                .position(|packet| packet.timestamp >= timestamp),
            SeekLanding::KeyAtOrBefore { undershoot } => {
                let effective = timestamp - undershoot;
                self.packets
                    .iter()
                    .enumerate()
                    .rev()
                    .find(|(_, packet)| packet.is_key && packet.timestamp <= effective)
                    .map(|(index, _)| index)
            }
            SeekLanding::KeyAtOrAfter => self
                .packets
                .iter()
                .position(|packet| packet.is_key && packet.timestamp >= timestamp)
                .or_else(|| {
                    self.packets
                        .iter()
                        .enumerate()
                        .rev()
                        .find(|(_, packet)| packet.is_key && packet.timestamp <= timestamp)
                        .map(|(index, _)| index)
                }),
        };

        match landing_index {
            Some(index) => {
                self.position = index + 1;
                Ok(Some(self.packets[index].clone()))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> Result<(), FrameSeekError> {
        self.position = 0;
        Ok(())
    }

    fn codec(&self) -> CodecFamily {
        CodecFamily::H264
    }

    fn is_vfr(&self) -> bool {
        self.vfr
    }

    fn timestamp_for_frame(&self, frame_id: u64) -> i64 {
        frame_id as i64
    }

    fn frame_for_timestamp(&self, timestamp: i64) -> u64 {
        timestamp.max(0) as u64
    }

    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }
}

pub fn mock_stream_info() -> StreamInfo {
    StreamInfo {
        codec: CodecFamily::H264,
        codec_name: "h264".to_string(),
        width: 64,
        height: 48,
        color_range: ColorRange::Unspecified,
        time_base: (1, 25),
        avg_frame_rate: (25, 1),
        real_frame_rate: (25, 1),
        start_time: 0,
        duration: 0,
        frame_count_estimate: 0,
    }
}

/// An H.264 packet opening a Group of Pictures: 4-byte start code, then a
/// sequence parameter set.
pub fn key_packet(timestamp: i64) -> DemuxedPacket {
    DemuxedPacket {
        data: vec![0x00, 0x00, 0x00, 0x01, 0x67, 0x64, 0x00, 0x1F],
        timestamp,
        is_key: true,
        is_disposable: false,
    }
}

/// A mid-GOP H.264 packet: non-IDR slice, reference.
pub fn slice_packet(timestamp: i64) -> DemuxedPacket {
    DemuxedPacket {
        data: vec![0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, 0x20, 0x04],
        timestamp,
        is_key: false,
        is_disposable: false,
    }
}

/// A constant frame rate stream with key frames at `gop_starts`.
pub fn cfr_stream(frame_count: u64, gop_starts: &[u64]) -> Vec<DemuxedPacket> {
    (0..frame_count)
        .map(|frame_id| {
            if gop_starts.contains(&frame_id) {
                key_packet(frame_id as i64)
            } else {
                slice_packet(frame_id as i64)
            }
        })
        .collect()
}

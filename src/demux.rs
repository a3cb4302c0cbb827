//! Demultiplexing seam and the FFmpeg-backed implementation.
//!
//! [`Demuxer`] is the narrow interface the indexing, seeking, and
//! extraction layers are written against. [`FfmpegDemuxer`] implements it
//! on top of `ffmpeg-next`, reading compressed packets from the best video
//! stream of a container without decoding them.
//!
//! [`StreamInfo`] is a cheap per-file probe (no packet scan) carrying the
//! stream properties needed to size decoders and serialize packet bundles.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational, codec::context::Context as CodecContext,
    format::context::Input, media::Type,
};

use crate::decode::ColorRange;
use crate::error::FrameSeekError;
use crate::keyframe::{CodecFamily, leading_nal_byte};

/// One compressed video packet, detached from the demuxer.
#[derive(Debug, Clone)]
pub struct DemuxedPacket {
    /// Raw compressed payload.
    pub data: Vec<u8>,
    /// Presentation timestamp in the stream's time base (falls back to the
    /// decode timestamp when the container omits one).
    pub timestamp: i64,
    /// Container-level key frame flag.
    pub is_key: bool,
    /// Whether the packet carries a non-reference frame that decoders may
    /// drop (H.264 `nal_ref_idc == 0`).
    pub is_disposable: bool,
}

/// Static properties of a video stream, read from container headers.
///
/// Obtained via [`probe_stream_info`] or [`Demuxer::stream_info`]; no
/// packets are read to produce it.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Codec family of the stream.
    pub codec: CodecFamily,
    /// Human-readable codec name.
    pub codec_name: String,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Color range signalled by the stream.
    pub color_range: ColorRange,
    /// Stream time base as `(numerator, denominator)`.
    pub time_base: (i32, i32),
    /// Average frame rate as `(numerator, denominator)`.
    pub avg_frame_rate: (i32, i32),
    /// Real (container) frame rate as `(numerator, denominator)`.
    pub real_frame_rate: (i32, i32),
    /// Stream start time in the stream time base.
    pub start_time: i64,
    /// Stream duration in the stream time base.
    pub duration: i64,
    /// Frame count estimate from container headers (0 when unknown).
    pub frame_count_estimate: u64,
}

impl StreamInfo {
    /// Frames per second, preferring the average frame rate and falling
    /// back to the real frame rate.
    pub fn frames_per_second(&self) -> f64 {
        let (num, den) = self.avg_frame_rate;
        if den != 0 && num != 0 {
            return num as f64 / den as f64;
        }
        let (num, den) = self.real_frame_rate;
        if den != 0 { num as f64 / den as f64 } else { 0.0 }
    }

    /// Whether the container's average and real frame rates disagree,
    /// which is how variable frame rate content presents in headers.
    pub fn is_vfr(&self) -> bool {
        let (avg_num, avg_den) = self.avg_frame_rate;
        let (real_num, real_den) = self.real_frame_rate;
        if avg_den == 0 || real_den == 0 {
            return false;
        }
        // Cross-multiplied comparison avoids floating point.
        i64::from(avg_num) * i64::from(real_den) != i64::from(real_num) * i64::from(avg_den)
    }
}

/// The demultiplexer interface the rest of the crate is written against.
pub trait Demuxer {
    /// Read the next video packet, or `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<DemuxedPacket>, FrameSeekError>;

    /// Seek the container to at-or-before `timestamp` and return the first
    /// video packet after the seek, or `None` if the stream is exhausted.
    fn seek_to_timestamp(&mut self, timestamp: i64)
    -> Result<Option<DemuxedPacket>, FrameSeekError>;

    /// Reposition at the start of the stream.
    fn rewind(&mut self) -> Result<(), FrameSeekError>;

    /// Codec family of the video stream.
    fn codec(&self) -> CodecFamily;

    /// Whether the stream is variable frame rate.
    fn is_vfr(&self) -> bool;

    /// Derive the presentation timestamp of `frame_id` from the frame
    /// rate. Only meaningful for constant frame rate streams.
    fn timestamp_for_frame(&self, frame_id: u64) -> i64;

    /// Derive the frame id at `timestamp` from the frame rate. Only
    /// meaningful for constant frame rate streams.
    fn frame_for_timestamp(&self, timestamp: i64) -> u64;

    /// Static stream properties.
    fn stream_info(&self) -> &StreamInfo;
}

/// `ffmpeg-next`-backed [`Demuxer`] over the best video stream of a file.
pub struct FfmpegDemuxer {
    input: Input,
    stream_index: usize,
    info: StreamInfo,
    path: PathBuf,
}

impl std::fmt::Debug for FfmpegDemuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegDemuxer")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl FfmpegDemuxer {
    /// Open a media file for demultiplexing.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, and locates the
    /// best video stream.
    ///
    /// # Errors
    ///
    /// - [`FrameSeekError::FileOpen`] if the file cannot be opened.
    /// - [`FrameSeekError::NoVideoStream`] if no video stream exists.
    /// - [`FrameSeekError::UnsupportedCodec`] if the stream codec is not
    ///   H.264, HEVC, or AV1.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrameSeekError> {
        let path = path.as_ref();
        let owned_path = path.to_path_buf();

        log::debug!("Opening demuxer: {}", owned_path.display());

        ffmpeg_next::init().map_err(|error| FrameSeekError::FileOpen {
            path: owned_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| FrameSeekError::FileOpen {
            path: owned_path.clone(),
            reason: error.to_string(),
        })?;

        let (stream_index, info) = read_stream_info(&input)?;

        log::debug!(
            "Demuxer ready: stream={}, codec={}, {}x{}, avg_fps={:?}, vfr={}",
            stream_index,
            info.codec_name,
            info.width,
            info.height,
            info.avg_frame_rate,
            info.is_vfr(),
        );

        Ok(Self {
            input,
            stream_index,
            info,
            path: owned_path,
        })
    }

    /// Path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn packet_from(&self, packet: &Packet) -> DemuxedPacket {
        let data = packet.data().map(<[u8]>::to_vec).unwrap_or_default();
        let timestamp = packet.pts().or_else(|| packet.dts()).unwrap_or(0);
        let is_disposable = match self.info.codec {
            // Non-reference H.264 frames advertise nal_ref_idc == 0.
            CodecFamily::H264 => leading_nal_byte(&data)
                .is_some_and(|byte| (byte >> 5) & 0x3 == 0 && byte & 0x1F <= 5),
            _ => false,
        };

        DemuxedPacket {
            data,
            timestamp,
            is_key: packet.is_key(),
            is_disposable,
        }
    }
}

impl Demuxer for FfmpegDemuxer {
    fn next_packet(&mut self) -> Result<Option<DemuxedPacket>, FrameSeekError> {
        let mut packet = Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() as usize != self.stream_index {
                        continue;
                    }
                    return Ok(Some(self.packet_from(&packet)));
                }
                Err(FfmpegError::Eof) => return Ok(None),
                Err(error) => return Err(FrameSeekError::from(error)),
            }
        }
    }

    fn seek_to_timestamp(
        &mut self,
        timestamp: i64,
    ) -> Result<Option<DemuxedPacket>, FrameSeekError> {
        self.input.seek(timestamp, ..timestamp)?;
        self.next_packet()
    }

    fn rewind(&mut self) -> Result<(), FrameSeekError> {
        let start = self.info.start_time;
        self.input.seek(start, ..start)?;
        Ok(())
    }

    fn codec(&self) -> CodecFamily {
        self.info.codec
    }

    fn is_vfr(&self) -> bool {
        self.info.is_vfr()
    }

    fn timestamp_for_frame(&self, frame_id: u64) -> i64 {
        let (fps_num, fps_den) = effective_frame_rate(&self.info);
        let (tb_num, tb_den) = self.info.time_base;

        // frame_id / fps seconds, rescaled into the stream time base, with
        // rounding so the mapping inverts cleanly.
        let numerator = frame_id as i128 * fps_den as i128 * tb_den as i128;
        let denominator = (fps_num as i128 * tb_num as i128).max(1);
        self.info.start_time + ((numerator + denominator / 2) / denominator) as i64
    }

    fn frame_for_timestamp(&self, timestamp: i64) -> u64 {
        let (fps_num, fps_den) = effective_frame_rate(&self.info);
        let (tb_num, tb_den) = self.info.time_base;

        let relative = (timestamp - self.info.start_time).max(0);
        let numerator = relative as i128 * tb_num as i128 * fps_num as i128;
        let denominator = (tb_den as i128 * fps_den as i128).max(1);
        (((numerator + denominator / 2) / denominator) as i64).max(0) as u64
    }

    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }
}

fn effective_frame_rate(info: &StreamInfo) -> (i32, i32) {
    let (num, den) = info.avg_frame_rate;
    if den != 0 && num != 0 {
        (num, den)
    } else {
        info.real_frame_rate
    }
}

fn rational_pair(rational: Rational) -> (i32, i32) {
    (rational.numerator(), rational.denominator())
}

/// Read [`StreamInfo`] for the best video stream of an opened input.
fn read_stream_info(input: &Input) -> Result<(usize, StreamInfo), FrameSeekError> {
    let stream = input
        .streams()
        .best(Type::Video)
        .ok_or(FrameSeekError::NoVideoStream)?;

    let stream_index = stream.index();
    let parameters = stream.parameters();
    let codec = CodecFamily::try_from(parameters.id())?;

    let decoder_context = CodecContext::from_parameters(parameters)?;
    let decoder = decoder_context.decoder().video()?;

    let info = StreamInfo {
        codec,
        codec_name: decoder
            .codec()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        width: decoder.width(),
        height: decoder.height(),
        color_range: ColorRange::from(decoder.color_range()),
        time_base: rational_pair(stream.time_base()),
        avg_frame_rate: rational_pair(stream.avg_frame_rate()),
        real_frame_rate: rational_pair(stream.rate()),
        start_time: stream.start_time().max(0),
        duration: stream.duration().max(0),
        frame_count_estimate: stream.frames().max(0) as u64,
    };

    Ok((stream_index, info))
}

/// Probe stream properties for a list of files without scanning packets.
///
/// # Errors
///
/// Fails on the first file that cannot be opened or whose video stream is
/// missing or uses an unsupported codec.
pub fn probe_stream_info<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<StreamInfo>, FrameSeekError> {
    let mut infos = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();

        ffmpeg_next::init().map_err(|error| FrameSeekError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| FrameSeekError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let (_, info) = read_stream_info(&input)?;
        infos.push(info);
    }
    Ok(infos)
}

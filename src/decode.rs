//! Software decoding of packet-bundle Groups of Pictures.
//!
//! [`SoftwareEngine`] rebuilds an FFmpeg decoder from a record's codec
//! family, feeds the stored packets back through it, and converts the
//! requested presentation-order frames to packed RGB or BGR pixels.
//!
//! # Example
//!
//! ```no_run
//! use frameseek::{FrameSeekError, GopDecodeEngine, ParsedBundle, PixelLayout, SoftwareEngine};
//!
//! let data = std::fs::read("clip.gop")?;
//! let parsed = ParsedBundle::parse(&data)?;
//! let mut engine = SoftwareEngine::new();
//! let frame = engine.decode_frame(&parsed.frames[0], parsed.frames[0].frame_id, PixelLayout::Rgb)?;
//! frame.into_image()?.save("frame.png")?;
//! # Ok::<(), FrameSeekError>(())
//! ```

use ffmpeg_next::{
    Packet,
    codec::context::Context as CodecContext,
    color,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::bundle::FrameView;
use crate::error::FrameSeekError;

/// Packed 8-bit output channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// Red, green, blue. This is the default.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
}

impl PixelLayout {
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelLayout::Rgb => Pixel::RGB24,
            PixelLayout::Bgr => Pixel::BGR24,
        }
    }
}

/// Color range signalled by a stream, preserved through serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    /// Not signalled.
    #[default]
    Unspecified,
    /// Limited / studio range (16–235 for 8-bit luma).
    Mpeg,
    /// Full range (0–255).
    Jpeg,
}

impl ColorRange {
    /// Stable numeric code for serialization.
    pub fn code(self) -> u32 {
        match self {
            ColorRange::Unspecified => 0,
            ColorRange::Mpeg => 1,
            ColorRange::Jpeg => 2,
        }
    }

    /// Inverse of [`code`](ColorRange::code). Unknown codes map to
    /// [`Unspecified`](ColorRange::Unspecified); the field is advisory.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ColorRange::Mpeg,
            2 => ColorRange::Jpeg,
            _ => ColorRange::Unspecified,
        }
    }
}

impl From<color::Range> for ColorRange {
    fn from(range: color::Range) -> Self {
        match range {
            color::Range::MPEG => ColorRange::Mpeg,
            color::Range::JPEG => ColorRange::Jpeg,
            _ => ColorRange::Unspecified,
        }
    }
}

/// One decoded frame as tightly packed 8-bit pixels.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame id within the source stream.
    pub frame_id: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel order of `data`.
    pub layout: PixelLayout,
    /// Presentation timestamp reported by the decoder.
    pub timestamp: i64,
    /// Packed pixel bytes, `width * height * 3` long.
    pub data: Vec<u8>,
}

impl DecodedFrame {
    /// Convert into an [`image::RgbImage`].
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::Configuration`] for BGR frames (the `image` crate
    /// has no packed BGR buffer type), or
    /// [`FrameSeekError::DecodeError`] if the pixel buffer does not match
    /// the stated dimensions.
    pub fn into_image(self) -> Result<RgbImage, FrameSeekError> {
        if self.layout != PixelLayout::Rgb {
            return Err(FrameSeekError::Configuration(
                "only RGB frames convert to an image; decode with PixelLayout::Rgb".to_string(),
            ));
        }
        RgbImage::from_raw(self.width, self.height, self.data).ok_or_else(|| {
            FrameSeekError::DecodeError(
                "failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

/// Decoding seam: turn a Group of Pictures record into pixel frames.
pub trait GopDecodeEngine {
    /// Decode the frames `frame_ids` (absolute ids, all inside the
    /// record's Group of Pictures) and return them in the requested order.
    fn decode_frames(
        &mut self,
        view: &FrameView<'_>,
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError>;

    /// Decode a single frame.
    fn decode_frame(
        &mut self,
        view: &FrameView<'_>,
        frame_id: u64,
        layout: PixelLayout,
    ) -> Result<DecodedFrame, FrameSeekError> {
        let mut frames = self.decode_frames(view, &[frame_id], layout)?;
        frames.pop().ok_or_else(|| {
            FrameSeekError::DecodeError(format!("frame {frame_id} missing from decode output"))
        })
    }
}

/// CPU decoding via FFmpeg's software decoders.
#[derive(Debug, Default)]
pub struct SoftwareEngine;

impl SoftwareEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self
    }
}

impl GopDecodeEngine for SoftwareEngine {
    fn decode_frames(
        &mut self,
        view: &FrameView<'_>,
        frame_ids: &[u64],
        layout: PixelLayout,
    ) -> Result<Vec<DecodedFrame>, FrameSeekError> {
        // Presentation offsets inside the Group of Pictures, ascending.
        let mut offsets: Vec<u64> = Vec::with_capacity(frame_ids.len());
        for &frame_id in frame_ids {
            if frame_id < view.first_frame_id || frame_id >= view.first_frame_id + view.gop_len() {
                return Err(FrameSeekError::FrameOutOfRange {
                    frame_id,
                    frame_count: view.first_frame_id + view.gop_len(),
                });
            }
            offsets.push(frame_id - view.first_frame_id);
        }
        let mut wanted = offsets.clone();
        wanted.sort_unstable();
        wanted.dedup();

        let codec = ffmpeg_next::decoder::find(view.codec.ffmpeg_id()).ok_or_else(|| {
            FrameSeekError::UnsupportedCodec(format!("no decoder available for {:?}", view.codec))
        })?;
        let decoder_context = CodecContext::new_with_codec(codec);
        let mut decoder = decoder_context.decoder().video()?;

        log::debug!(
            "Decoding GOP [{}..{}) for {} target frame(s)",
            view.first_frame_id,
            view.first_frame_id + view.gop_len(),
            wanted.len(),
        );

        let mut decoded_frame = VideoFrame::empty();
        let mut converted = VideoFrame::empty();
        let mut scaler: Option<ScalingContext> = None;
        let mut presentation_index: u64 = 0;
        let mut produced: Vec<(u64, DecodedFrame)> = Vec::with_capacity(wanted.len());

        let mut handle_decoded = |decoded: &VideoFrame,
                                  converted: &mut VideoFrame,
                                  scaler: &mut Option<ScalingContext>,
                                  presentation_index: u64|
         -> Result<Option<DecodedFrame>, FrameSeekError> {
            if !wanted.contains(&presentation_index) {
                return Ok(None);
            }

            if scaler.is_none() {
                *scaler = Some(ScalingContext::get(
                    decoded.format(),
                    decoded.width(),
                    decoded.height(),
                    layout.to_ffmpeg_pixel(),
                    decoded.width(),
                    decoded.height(),
                    ScalingFlags::BILINEAR,
                )?);
            }
            if let Some(scaler) = scaler.as_mut() {
                scaler.run(decoded, converted)?;
            }

            let width = decoded.width();
            let height = decoded.height();
            Ok(Some(DecodedFrame {
                frame_id: view.first_frame_id + presentation_index,
                width,
                height,
                layout,
                timestamp: decoded.pts().unwrap_or(0),
                data: packed_pixel_buffer(converted, width, height),
            }))
        };

        for packet_data in view.packets() {
            if produced.len() == wanted.len() {
                break;
            }
            let packet = Packet::copy(packet_data);
            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                if let Some(frame) = handle_decoded(
                    &decoded_frame,
                    &mut converted,
                    &mut scaler,
                    presentation_index,
                )? {
                    produced.push((presentation_index, frame));
                }
                presentation_index += 1;
            }
        }

        // Flush for frames still buffered in the decoder.
        if produced.len() < wanted.len() {
            decoder.send_eof()?;
            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                if let Some(frame) = handle_decoded(
                    &decoded_frame,
                    &mut converted,
                    &mut scaler,
                    presentation_index,
                )? {
                    produced.push((presentation_index, frame));
                }
                presentation_index += 1;
            }
        }

        if produced.len() < wanted.len() {
            return Err(FrameSeekError::DecodeError(format!(
                "GOP starting at frame {} yielded {} of {} requested frames",
                view.first_frame_id,
                produced.len(),
                wanted.len(),
            )));
        }

        // Hand frames back in the caller's order, duplicating as needed.
        let mut output = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let frame = produced
                .iter()
                .find(|(produced_offset, _)| *produced_offset == offset)
                .map(|(_, frame)| frame.clone())
                .ok_or_else(|| {
                    FrameSeekError::DecodeError(format!(
                        "presentation offset {offset} missing from decode output"
                    ))
                })?;
            output.push(frame);
        }
        Ok(output)
    }
}

/// Copy pixel data from an FFmpeg video frame into a tightly-packed
/// 3-bytes-per-pixel buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3);
/// this strips it so the result can go straight into
/// [`image::RgbImage::from_raw`].
fn packed_pixel_buffer(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let data = frame.data(0);

    if stride == row_len {
        data[..row_len * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_len * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_len]);
        }
        buffer
    }
}

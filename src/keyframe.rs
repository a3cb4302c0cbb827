//! Key-frame classification from compressed packet headers.
//!
//! This module inspects the first bytes of a compressed video packet to
//! decide whether it opens a Group of Pictures, without running a decoder.
//! For H.264 and HEVC the leading NAL unit type is examined; for AV1 the
//! leading OBU type. Two predicates are provided:
//!
//! - [`is_gop_start`] — the strict form used while building an index: the
//!   payload must carry a parameter-set/SEI leading unit *and* the container
//!   must have flagged the packet as a key frame.
//! - [`has_gop_start_unit`] — the payload-only form used while re-probing
//!   mid-seek, where container flags are not trustworthy.
//!
//! # Example
//!
//! ```
//! use frameseek::{CodecFamily, is_gop_start};
//!
//! // 4-byte start code, NAL type 7 (sequence parameter set).
//! let packet = [0x00, 0x00, 0x00, 0x01, 0x67, 0x64];
//! assert!(is_gop_start(CodecFamily::H264, &packet, true));
//! assert!(!is_gop_start(CodecFamily::H264, &packet, false));
//! ```

use ffmpeg_next::codec::Id;

use crate::error::FrameSeekError;

// H.264 NAL unit types that open an access unit at a sync point.
const H264_NAL_SEI: u8 = 6;
const H264_NAL_SPS: u8 = 7;
const H264_NAL_PPS: u8 = 8;
const H264_NAL_AUD: u8 = 9;

// HEVC NAL unit types, same role.
const HEVC_NAL_VPS: u8 = 32;
const HEVC_NAL_SPS: u8 = 33;
const HEVC_NAL_PPS: u8 = 34;
const HEVC_NAL_PREFIX_SEI: u8 = 39;
const HEVC_NAL_SUFFIX_SEI: u8 = 40;

// AV1 OBU type that opens a coded video sequence.
const AV1_OBU_SEQUENCE_HEADER: u8 = 1;

/// The codec families whose packet headers this crate can classify.
///
/// Each family has a stable numeric id used in the serialized packet
/// bundle format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFamily {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    Hevc,
    /// AV1.
    Av1,
}

impl CodecFamily {
    /// Stable numeric id for serialization.
    pub fn code(self) -> u32 {
        match self {
            CodecFamily::H264 => 1,
            CodecFamily::Hevc => 2,
            CodecFamily::Av1 => 3,
        }
    }

    /// Map to the FFmpeg codec id, for building decoders.
    pub fn ffmpeg_id(self) -> Id {
        match self {
            CodecFamily::H264 => Id::H264,
            CodecFamily::Hevc => Id::HEVC,
            CodecFamily::Av1 => Id::AV1,
        }
    }
}

impl TryFrom<u32> for CodecFamily {
    type Error = FrameSeekError;

    fn try_from(code: u32) -> Result<Self, FrameSeekError> {
        match code {
            1 => Ok(CodecFamily::H264),
            2 => Ok(CodecFamily::Hevc),
            3 => Ok(CodecFamily::Av1),
            other => Err(FrameSeekError::UnsupportedCodec(format!(
                "unknown codec code {other}"
            ))),
        }
    }
}

impl TryFrom<Id> for CodecFamily {
    type Error = FrameSeekError;

    fn try_from(id: Id) -> Result<Self, FrameSeekError> {
        match id {
            Id::H264 => Ok(CodecFamily::H264),
            Id::HEVC => Ok(CodecFamily::Hevc),
            Id::AV1 => Ok(CodecFamily::Av1),
            other => Err(FrameSeekError::UnsupportedCodec(format!("{other:?}"))),
        }
    }
}

/// Payload-only classification: does the packet begin with a unit that
/// opens a Group of Pictures?
///
/// For H.264 and HEVC the packet is expected to start with a 3-byte
/// (`00 00 01`) or 4-byte (`00 00 00 01`) start code; the NAL unit type is
/// read from the byte that follows. For AV1 the OBU type is read from the
/// first byte. Packets too short to carry a start code classify as `false`.
pub fn has_gop_start_unit(codec: CodecFamily, data: &[u8]) -> bool {
    match codec {
        CodecFamily::H264 => match leading_nal_byte(data) {
            Some(byte) => matches!(
                byte & 0x1F,
                H264_NAL_SEI | H264_NAL_SPS | H264_NAL_PPS | H264_NAL_AUD
            ),
            None => false,
        },
        CodecFamily::Hevc => match leading_nal_byte(data) {
            Some(byte) => matches!(
                (byte >> 1) & 0x3F,
                HEVC_NAL_VPS
                    | HEVC_NAL_SPS
                    | HEVC_NAL_PPS
                    | HEVC_NAL_PREFIX_SEI
                    | HEVC_NAL_SUFFIX_SEI
            ),
            None => false,
        },
        CodecFamily::Av1 => match data.first() {
            Some(&byte) => (byte >> 3) & 0x0F == AV1_OBU_SEQUENCE_HEADER,
            None => false,
        },
    }
}

/// Strict classification: the payload must carry a Group-of-Pictures
/// opening unit *and* the container must have marked the packet as a key
/// frame.
///
/// This is the predicate used when scanning a stream to build a
/// [`GopIndex`](crate::GopIndex). The container flag alone is not enough:
/// open-GOP encoders flag recovery points that cannot serve as clean decode
/// entry points, and the payload check alone would also accept parameter
/// sets re-sent mid-stream.
pub fn is_gop_start(codec: CodecFamily, data: &[u8], container_key_flag: bool) -> bool {
    container_key_flag && has_gop_start_unit(codec, data)
}

/// Locate the NAL header byte after a 3- or 4-byte Annex B start code.
pub(crate) fn leading_nal_byte(data: &[u8]) -> Option<u8> {
    if data.len() < 5 {
        return None;
    }
    // 00 00 01 .. is a 3-byte start code; anything else is treated as the
    // 4-byte form 00 00 00 01.
    if data[2] == 1 {
        Some(data[3])
    } else {
        Some(data[4])
    }
}

//! Error types for the `frameseek` crate.
//!
//! This module defines [`FrameSeekError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry rich context to aid
//! debugging, including file paths, frame ids, and upstream error messages.
//!
//! Variants fall into four broad groups:
//!
//! - **Configuration** — the caller built an invalid request
//!   ([`Configuration`](FrameSeekError::Configuration),
//!   [`RequestMismatch`](FrameSeekError::RequestMismatch),
//!   [`NoPendingRequest`](FrameSeekError::NoPendingRequest)).
//! - **Stream structure** — the media does not have the shape an operation
//!   needs ([`EmptyVideo`](FrameSeekError::EmptyVideo),
//!   [`UnsupportedCodec`](FrameSeekError::UnsupportedCodec),
//!   [`FrameOutOfRange`](FrameSeekError::FrameOutOfRange),
//!   [`VariableFrameRate`](FrameSeekError::VariableFrameRate),
//!   [`SeekFailed`](FrameSeekError::SeekFailed),
//!   [`InvalidBundle`](FrameSeekError::InvalidBundle)).
//! - **I/O** — the file or the FFmpeg layer failed
//!   ([`FileOpen`](FrameSeekError::FileOpen),
//!   [`IoError`](FrameSeekError::IoError),
//!   [`FfmpegError`](FrameSeekError::FfmpegError)).
//! - **Task** — a background worker failed
//!   ([`TaskFailed`](FrameSeekError::TaskFailed)).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `frameseek` operations.
///
/// Every public method that can fail returns `Result<T, FrameSeekError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameSeekError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the open call.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The stream's codec is not one of the supported families
    /// (H.264, HEVC, AV1).
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A full stream scan found no Group of Pictures boundary.
    #[error("Empty video: no Group of Pictures boundary found in stream")]
    EmptyVideo,

    /// The requested frame id lies beyond the indexed stream.
    #[error("Frame {frame_id} is out of range (stream has {frame_count} frames)")]
    FrameOutOfRange {
        /// The frame id that was requested.
        frame_id: u64,
        /// The total number of indexed frames.
        frame_count: u64,
    },

    /// No timestamp is recorded for the given frame id in the
    /// frame/timestamp map.
    #[error("No timestamp mapping recorded for frame {0}")]
    MissingFrameMapping(u64),

    /// No frame id is recorded for the given timestamp in the
    /// frame/timestamp map.
    #[error("No frame mapping recorded for timestamp {0}")]
    MissingTimestampMapping(i64),

    /// An operation that requires constant frame rate was invoked on a
    /// variable frame rate stream.
    #[error("Variable frame rate stream not supported here: {0}")]
    VariableFrameRate(String),

    /// Navigating to a Group of Pictures start failed.
    #[error("Seek failed at frame {frame_id}: {reason}")]
    SeekFailed {
        /// The probe frame id at which navigation gave up.
        frame_id: i64,
        /// Why the navigation failed.
        reason: String,
    },

    /// A serialized packet bundle is structurally invalid.
    #[error("Invalid packet bundle: {0}")]
    InvalidBundle(String),

    /// The request shape is invalid (mismatched list lengths, too many
    /// files, zero capacity, and so on).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// An asynchronously produced result does not correspond to the
    /// retrieval request.
    #[error("Decode request mismatch: submitted `{submitted}`, requested `{requested}`")]
    RequestMismatch {
        /// Rendered key of the request that produced the buffered result.
        submitted: String,
        /// Rendered key of the request passed to retrieval.
        requested: String,
    },

    /// Retrieval was attempted with no submitted request and no buffered
    /// result.
    #[error("No decode request is pending")]
    NoPendingRequest,

    /// A background task failed for a reason that could not be captured
    /// as a typed error.
    #[error("Background task failed: {0}")]
    TaskFailed(String),

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    DecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for FrameSeekError {
    fn from(error: FfmpegError) -> Self {
        FrameSeekError::FfmpegError(error.to_string())
    }
}

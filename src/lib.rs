//! # frameseek
//!
//! Random access to compressed video — index Groups of Pictures, seek to
//! key frames, extract packet bundles, and decode exact frames.
//!
//! `frameseek` treats a video file as an indexable sequence of Groups of
//! Pictures (GOPs). It scans the container once to learn where every GOP
//! starts, then serves any frame by seeking to the enclosing GOP's key
//! frame and decoding forward, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Decode One Frame
//!
//! ```no_run
//! use frameseek::{PixelLayout, VideoReader};
//!
//! let mut reader = VideoReader::open("input.mp4").unwrap();
//! let frame = reader.decode_frame(42, PixelLayout::Rgb).unwrap();
//! frame.into_image().unwrap().save("frame_42.png").unwrap();
//! ```
//!
//! ### Extract GOPs Without Decoding
//!
//! ```no_run
//! use frameseek::{VideoReader, save_bundle};
//!
//! let mut reader = VideoReader::open("input.mp4").unwrap();
//! let bundle = reader.extract_gops(&[42, 1000]).unwrap();
//! save_bundle("frames.gop", &bundle.serialize().data).unwrap();
//! ```
//!
//! ### Sample Across Files
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use frameseek::{DecoderOptions, GopDecoder};
//!
//! let decoder = GopDecoder::new(DecoderOptions::new().with_max_files(2));
//! let paths = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
//! let frames = decoder.decode(&paths, &[10, 250]).unwrap();
//! ```
//!
//! ## Features
//!
//! - **GOP indexing** — one demux pass maps every frame to its enclosing
//!   GOP, for constant and variable frame rate streams
//! - **Key-frame classification** — H.264, HEVC, and AV1 payloads are
//!   classified from their leading NAL units and OBUs, with and without
//!   container key flags
//! - **Packet bundles** — self-describing serialized GOPs that round-trip
//!   bit-exactly and merge without reserialization
//! - **Exact decoding** — any frame id decodes to RGB or BGR pixels,
//!   never a nearby approximation
//! - **Multi-file decoding** — [`GopDecoder`] fans one request across
//!   per-file worker slots with cached readers
//! - **GOP caching** — [`CachedGopDecoder`] serves repeat requests inside
//!   a cached GOP without touching the source file
//! - **Pipelined sampling** — [`SampleReader`] overlaps batch decoding
//!   with caller work through a submit/retrieve pipeline
//! - **Stream probing** — lightweight [`probe_stream_info`] for
//!   dimensions, frame rates, and codec identity
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod bundle;
pub mod cache;
pub mod configuration;
pub mod decode;
pub mod decoder;
pub mod demux;
pub mod error;
pub mod extract;
pub mod index;
pub mod keyframe;
pub mod pipeline;
pub mod reader;
pub mod runner;
pub mod sample_reader;
pub mod seek;

pub use bundle::{
    FrameRecord, FrameView, PacketBundle, ParsedBundle, SerializedPacketBundle, load_bundles,
    load_merged, merge_serialized, save_bundle,
};
pub use cache::ReaderCache;
pub use configuration::DecoderOptions;
pub use decode::{ColorRange, DecodedFrame, GopDecodeEngine, PixelLayout, SoftwareEngine};
pub use decoder::{CachedGopDecoder, GopDecoder};
pub use demux::{DemuxedPacket, Demuxer, FfmpegDemuxer, StreamInfo, probe_stream_info};
pub use error::FrameSeekError;
pub use extract::{extract_gop_unindexed, extract_gops};
pub use index::{FrameTimestampMap, GopIndex, GopSpan};
pub use keyframe::{CodecFamily, has_gop_start_unit, is_gop_start};
pub use pipeline::{AsyncDecodePipeline, DecodeRequest};
pub use reader::VideoReader;
pub use runner::TaskRunner;
pub use sample_reader::SampleReader;
pub use seek::{SeekNavigator, SeekState};

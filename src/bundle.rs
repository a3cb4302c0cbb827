//! Serialized packet bundle format.
//!
//! A packet bundle carries the compressed packets of one or more Groups of
//! Pictures in a single flat buffer, so that frames can be decoded later
//! (possibly on another machine) without touching the source container.
//!
//! The wire layout is little-endian throughout:
//!
//! ```text
//! [frame_count: u32] [frame_offset: u64 × frame_count] [record ...]
//! ```
//!
//! Each offset is absolute into the buffer and points at one
//! self-describing record:
//!
//! ```text
//! frame_id: u64            requested frame this record answers
//! first_frame_id: u64      frame id of the GOP's key frame
//! codec: u32               CodecFamily wire code
//! width: u32
//! height: u32
//! color_range: u32
//! packet_count: u32        frames in the GOP, one packet per frame
//! payload_len: u64
//! packet_sizes: u32 × packet_count
//! decode_order: u32 × packet_count
//! payload: u8 × payload_len
//! ```
//!
//! Parsing yields [`FrameView`] values whose payloads borrow the input
//! buffer; every access is bounds-checked and a malformed buffer fails
//! with [`FrameSeekError::InvalidBundle`] rather than panicking. Because
//! records are opaque byte regions delimited by the offset table, bundles
//! merge by concatenating record regions and recomputing one offset table,
//! bit-exactly.

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::decode::ColorRange;
use crate::error::FrameSeekError;
use crate::keyframe::CodecFamily;

/// Fixed bytes of one record before its variable-length tails.
const RECORD_FIXED_LEN: usize = 8 + 8 + 4 + 4 + 4 + 4 + 4 + 8;

/// One owned record: the packets of a Group of Pictures plus the identity
/// of the frame they were collected for.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// The requested frame this record answers.
    pub frame_id: u64,
    /// Frame id of the key frame opening the enclosing Group of Pictures.
    pub first_frame_id: u64,
    /// Codec family of the packets.
    pub codec: CodecFamily,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Color range of the stream.
    pub color_range: ColorRange,
    /// Byte size of each packet, in stored (decode) order.
    pub packet_sizes: Vec<u32>,
    /// Presentation-order index of each stored packet.
    pub decode_order: Vec<u32>,
    /// All packet bytes, concatenated in stored order.
    pub payload: Vec<u8>,
}

impl FrameRecord {
    /// Length of the enclosing Group of Pictures in frames.
    pub fn gop_len(&self) -> u64 {
        self.packet_sizes.len() as u64
    }

    /// Borrow this record as a [`FrameView`].
    pub fn as_view(&self) -> FrameView<'_> {
        FrameView {
            frame_id: self.frame_id,
            first_frame_id: self.first_frame_id,
            codec: self.codec,
            width: self.width,
            height: self.height,
            color_range: self.color_range,
            packet_sizes: self.packet_sizes.clone(),
            decode_order: self.decode_order.clone(),
            payload: &self.payload,
        }
    }

    fn serialized_len(&self) -> usize {
        RECORD_FIXED_LEN + 8 * self.packet_sizes.len() + self.payload.len()
    }
}

/// A set of owned [`FrameRecord`]s ready for serialization.
#[derive(Debug, Clone, Default)]
pub struct PacketBundle {
    /// Records in requested-frame order.
    pub records: Vec<FrameRecord>,
}

/// A serialized bundle plus the per-record summary arrays callers use to
/// address it without reparsing.
#[derive(Debug, Clone)]
pub struct SerializedPacketBundle {
    /// The wire bytes.
    pub data: Vec<u8>,
    /// `first_frame_id` of each record, in record order.
    pub first_frame_ids: Vec<u64>,
    /// Group of Pictures length of each record, in record order.
    pub gop_lens: Vec<u64>,
}

impl PacketBundle {
    /// Serialize all records into the wire format.
    pub fn serialize(&self) -> SerializedPacketBundle {
        let header_len = 4 + 8 * self.records.len();
        let total_len: usize = header_len + self.records.iter().map(FrameRecord::serialized_len).sum::<usize>();

        let mut data: Vec<u8> = Vec::with_capacity(total_len);
        // Writes into a Vec cannot fail; byteorder still returns io::Result.
        let _ = data.write_u32::<LittleEndian>(self.records.len() as u32);

        let mut offset = header_len as u64;
        for record in &self.records {
            let _ = data.write_u64::<LittleEndian>(offset);
            offset += record.serialized_len() as u64;
        }

        let mut first_frame_ids = Vec::with_capacity(self.records.len());
        let mut gop_lens = Vec::with_capacity(self.records.len());

        for record in &self.records {
            let _ = data.write_u64::<LittleEndian>(record.frame_id);
            let _ = data.write_u64::<LittleEndian>(record.first_frame_id);
            let _ = data.write_u32::<LittleEndian>(record.codec.code());
            let _ = data.write_u32::<LittleEndian>(record.width);
            let _ = data.write_u32::<LittleEndian>(record.height);
            let _ = data.write_u32::<LittleEndian>(record.color_range.code());
            let _ = data.write_u32::<LittleEndian>(record.packet_sizes.len() as u32);
            let _ = data.write_u64::<LittleEndian>(record.payload.len() as u64);
            for &size in &record.packet_sizes {
                let _ = data.write_u32::<LittleEndian>(size);
            }
            for &index in &record.decode_order {
                let _ = data.write_u32::<LittleEndian>(index);
            }
            data.extend_from_slice(&record.payload);

            first_frame_ids.push(record.first_frame_id);
            gop_lens.push(record.gop_len());
        }

        SerializedPacketBundle {
            data,
            first_frame_ids,
            gop_lens,
        }
    }
}

/// One parsed record, payload borrowed from the input buffer.
#[derive(Debug, Clone)]
pub struct FrameView<'a> {
    /// The requested frame this record answers.
    pub frame_id: u64,
    /// Frame id of the key frame opening the Group of Pictures.
    pub first_frame_id: u64,
    /// Codec family of the packets.
    pub codec: CodecFamily,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Color range of the stream.
    pub color_range: ColorRange,
    /// Byte size of each packet, in stored order.
    pub packet_sizes: Vec<u32>,
    /// Presentation-order index of each stored packet.
    pub decode_order: Vec<u32>,
    /// All packet bytes, concatenated; borrowed, not copied.
    pub payload: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Length of the Group of Pictures in frames.
    pub fn gop_len(&self) -> u64 {
        self.packet_sizes.len() as u64
    }

    /// Iterate over the individual packet slices in stored order.
    pub fn packets(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        let payload = self.payload;
        self.packet_sizes.iter().scan(0usize, move |cursor, &size| {
            let start = *cursor;
            let end = start + size as usize;
            *cursor = end;
            Some(&payload[start..end])
        })
    }
}

/// A fully validated parse of one serialized bundle.
#[derive(Debug)]
pub struct ParsedBundle<'a> {
    /// Parsed records in stored order.
    pub frames: Vec<FrameView<'a>>,
}

impl<'a> ParsedBundle<'a> {
    /// Parse and validate a serialized bundle.
    ///
    /// All offsets and lengths are checked against the buffer before any
    /// slice is taken.
    ///
    /// # Errors
    ///
    /// [`FrameSeekError::InvalidBundle`] for any structural defect:
    /// truncated header, non-monotonic offsets, out-of-bounds record, or
    /// packet sizes that disagree with the payload length.
    pub fn parse(data: &'a [u8]) -> Result<Self, FrameSeekError> {
        let offsets = read_offset_table(data)?;

        let mut frames = Vec::with_capacity(offsets.len());
        for &offset in &offsets {
            frames.push(parse_record(data, offset as usize)?);
        }

        Ok(Self { frames })
    }

    /// Find the record whose Group of Pictures contains `frame_id`.
    pub fn record_for_frame(&self, frame_id: u64) -> Option<&FrameView<'a>> {
        self.frames.iter().find(|view| {
            frame_id >= view.first_frame_id && frame_id < view.first_frame_id + view.gop_len()
        })
    }
}

/// Bounds-checked little-endian reader over a byte slice.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FrameSeekError> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            FrameSeekError::InvalidBundle("record length overflows the address space".to_string())
        })?;
        if end > self.data.len() {
            return Err(FrameSeekError::InvalidBundle(format!(
                "record runs past the end of the buffer ({} > {})",
                end,
                self.data.len(),
            )));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, FrameSeekError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_u64(&mut self) -> Result<u64, FrameSeekError> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }
}

/// Read and validate the offset table of a serialized bundle.
fn read_offset_table(data: &[u8]) -> Result<Vec<u64>, FrameSeekError> {
    let mut reader = ByteReader::at(data, 0);
    let frame_count = reader.read_u32()? as usize;

    let header_len = 4 + 8 * frame_count;
    let mut offsets = Vec::with_capacity(frame_count);
    let mut previous = 0u64;
    for i in 0..frame_count {
        let offset = reader.read_u64()?;
        if offset < header_len as u64 || offset as usize >= data.len() {
            return Err(FrameSeekError::InvalidBundle(format!(
                "record offset {offset} (entry {i}) outside the record region"
            )));
        }
        if i > 0 && offset <= previous {
            return Err(FrameSeekError::InvalidBundle(format!(
                "record offsets not strictly increasing at entry {i}"
            )));
        }
        previous = offset;
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Parse one record starting at `offset`.
fn parse_record(data: &[u8], offset: usize) -> Result<FrameView<'_>, FrameSeekError> {
    let mut reader = ByteReader::at(data, offset);

    let frame_id = reader.read_u64()?;
    let first_frame_id = reader.read_u64()?;
    let codec = CodecFamily::try_from(reader.read_u32()?)
        .map_err(|error| FrameSeekError::InvalidBundle(error.to_string()))?;
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let color_range = ColorRange::from_code(reader.read_u32()?);
    let packet_count = reader.read_u32()? as usize;
    let payload_len = reader.read_u64()? as usize;

    let mut packet_sizes = Vec::with_capacity(packet_count);
    let mut total_packet_bytes = 0u64;
    for _ in 0..packet_count {
        let size = reader.read_u32()?;
        total_packet_bytes += u64::from(size);
        packet_sizes.push(size);
    }

    let mut decode_order = Vec::with_capacity(packet_count);
    for _ in 0..packet_count {
        decode_order.push(reader.read_u32()?);
    }

    if total_packet_bytes != payload_len as u64 {
        return Err(FrameSeekError::InvalidBundle(format!(
            "packet sizes sum to {total_packet_bytes} but payload length is {payload_len}"
        )));
    }

    let payload = reader.take(payload_len)?;

    Ok(FrameView {
        frame_id,
        first_frame_id,
        codec,
        width,
        height,
        color_range,
        packet_sizes,
        decode_order,
        payload,
    })
}

/// Record byte regions of a serialized bundle, delimited by its offset
/// table. Regions are returned as sub-slices in stored order.
fn record_regions(data: &[u8]) -> Result<Vec<&[u8]>, FrameSeekError> {
    let offsets = read_offset_table(data)?;

    let mut regions = Vec::with_capacity(offsets.len());
    for (i, &offset) in offsets.iter().enumerate() {
        let end = if i + 1 < offsets.len() {
            offsets[i + 1] as usize
        } else {
            data.len()
        };
        regions.push(&data[offset as usize..end]);
    }
    Ok(regions)
}

/// Merge serialized bundles into one, preserving record order and bytes.
///
/// Records are carried over verbatim; only the header and offset table are
/// rebuilt. Merging is associative: merging A with B and then with C
/// produces the same bytes as merging A with the merge of B and C.
///
/// # Errors
///
/// [`FrameSeekError::InvalidBundle`] if any input fails header validation.
pub fn merge_serialized<B: AsRef<[u8]>>(bundles: &[B]) -> Result<Vec<u8>, FrameSeekError> {
    let mut all_regions: Vec<&[u8]> = Vec::new();
    for bundle in bundles {
        all_regions.extend(record_regions(bundle.as_ref())?);
    }

    let header_len = 4 + 8 * all_regions.len();
    let total_len = header_len + all_regions.iter().map(|r| r.len()).sum::<usize>();

    let mut data: Vec<u8> = Vec::with_capacity(total_len);
    let _ = data.write_u32::<LittleEndian>(all_regions.len() as u32);

    let mut offset = header_len as u64;
    for region in &all_regions {
        let _ = data.write_u64::<LittleEndian>(offset);
        offset += region.len() as u64;
    }
    for region in &all_regions {
        data.extend_from_slice(region);
    }

    Ok(data)
}

/// Write a serialized bundle to a file.
///
/// # Errors
///
/// [`FrameSeekError::IoError`] if the file cannot be written.
pub fn save_bundle<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), FrameSeekError> {
    log::debug!(
        "Saving packet bundle: {} ({} bytes)",
        path.as_ref().display(),
        data.len(),
    );
    fs::write(path, data)?;
    Ok(())
}

/// Load serialized bundles from files, one buffer per file.
///
/// Each file is validated structurally after loading.
///
/// # Errors
///
/// [`FrameSeekError::IoError`] on read failure,
/// [`FrameSeekError::InvalidBundle`] if a file is not a valid bundle.
pub fn load_bundles<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Vec<u8>>, FrameSeekError> {
    let mut bundles = Vec::with_capacity(paths.len());
    for path in paths {
        let data = fs::read(path)?;
        read_offset_table(&data)?;
        bundles.push(data);
    }
    Ok(bundles)
}

/// Load serialized bundles from files and merge them into one buffer.
///
/// # Errors
///
/// Same as [`load_bundles`] and [`merge_serialized`].
pub fn load_merged<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<u8>, FrameSeekError> {
    let bundles = load_bundles(paths)?;
    merge_serialized(&bundles)
}

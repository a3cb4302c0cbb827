//! Group of Pictures packet extraction.
//!
//! Collects the compressed packets of whole Groups of Pictures into
//! [`FrameRecord`]s, without decoding. The indexed path uses a
//! [`GopIndex`] to know each GOP's extent exactly; the index-free path
//! works on constant frame rate streams by classifying packet payloads as
//! it reads.

use crate::bundle::{FrameRecord, PacketBundle};
use crate::demux::{DemuxedPacket, Demuxer};
use crate::error::FrameSeekError;
use crate::index::{GopIndex, GopSpan};
use crate::keyframe::has_gop_start_unit;
use crate::seek::SeekNavigator;

/// Extract the Groups of Pictures enclosing `frame_ids`.
///
/// Frame ids are sorted and deduplicated; ids sharing a GOP produce one
/// record. Each record carries every packet of its GOP in stored order,
/// with per-packet sizes and presentation-order indices.
///
/// # Errors
///
/// Index lookup errors for out-of-range ids, navigation errors from the
/// seek loop, or [`FrameSeekError::SeekFailed`] if the stream ends before
/// a GOP is fully read.
pub fn extract_gops<D: Demuxer>(
    demuxer: &mut D,
    index: &GopIndex,
    frame_ids: &[u64],
) -> Result<PacketBundle, FrameSeekError> {
    let mut sorted = frame_ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let spans = index.gops_for_frames(&sorted)?;
    let mut records = Vec::with_capacity(spans.len());

    for span in spans {
        let mut navigator = SeekNavigator::new();
        let first_packet = navigator.seek_gop_start(demuxer, index, span.first_frame_id)?;
        let packets = collect_gop_packets(demuxer, span, first_packet)?;

        // The record answers for the first requested frame in this GOP.
        let frame_id = sorted
            .iter()
            .copied()
            .find(|&id| span.contains(id))
            .unwrap_or(span.first_frame_id);

        records.push(record_from_packets(demuxer, span, frame_id, packets));
    }

    Ok(PacketBundle { records })
}

/// Extract the Group of Pictures enclosing `frame_id` without an index.
///
/// Constant frame rate only. The GOP's extent is discovered on the fly:
/// packets are read from the navigated GOP start until the next packet
/// whose payload classifies as a GOP opener, or end of stream.
///
/// # Errors
///
/// [`FrameSeekError::VariableFrameRate`] for VFR streams, or navigation
/// errors from the index-free seek.
pub fn extract_gop_unindexed<D: Demuxer>(
    demuxer: &mut D,
    frame_id: u64,
) -> Result<FrameRecord, FrameSeekError> {
    let codec = demuxer.codec();
    let mut navigator = SeekNavigator::new();
    let (first_frame_id, first_packet) = navigator.seek_gop_start_unindexed(demuxer, frame_id)?;

    let mut packets = vec![first_packet];
    while let Some(packet) = demuxer.next_packet()? {
        if has_gop_start_unit(codec, &packet.data) {
            break;
        }
        packets.push(packet);
    }

    let span = GopSpan {
        first_frame_id,
        len: packets.len() as u64,
    };
    Ok(record_from_packets(demuxer, span, frame_id, packets))
}

/// Read the remaining packets of a Group of Pictures after its first.
fn collect_gop_packets<D: Demuxer>(
    demuxer: &mut D,
    span: GopSpan,
    first_packet: DemuxedPacket,
) -> Result<Vec<DemuxedPacket>, FrameSeekError> {
    let mut packets = Vec::with_capacity(span.len as usize);
    packets.push(first_packet);

    while (packets.len() as u64) < span.len {
        match demuxer.next_packet()? {
            Some(packet) => packets.push(packet),
            None => {
                return Err(FrameSeekError::SeekFailed {
                    frame_id: span.first_frame_id as i64,
                    reason: format!(
                        "stream ended after {} of {} GOP packets",
                        packets.len(),
                        span.len,
                    ),
                });
            }
        }
    }

    Ok(packets)
}

/// Assemble one record from collected packets.
fn record_from_packets<D: Demuxer>(
    demuxer: &D,
    span: GopSpan,
    frame_id: u64,
    packets: Vec<DemuxedPacket>,
) -> FrameRecord {
    let info = demuxer.stream_info();

    let timestamps: Vec<i64> = packets.iter().map(|p| p.timestamp).collect();
    let decode_order = presentation_order(&timestamps);

    let mut packet_sizes = Vec::with_capacity(packets.len());
    let mut payload = Vec::new();
    for packet in &packets {
        packet_sizes.push(packet.data.len() as u32);
        payload.extend_from_slice(&packet.data);
    }

    log::debug!(
        "Extracted GOP [{}..{}): {} packets, {} bytes",
        span.first_frame_id,
        span.first_frame_id + span.len,
        packets.len(),
        payload.len(),
    );

    FrameRecord {
        frame_id,
        first_frame_id: span.first_frame_id,
        codec: info.codec,
        width: info.width,
        height: info.height,
        color_range: info.color_range,
        packet_sizes,
        decode_order,
        payload,
    }
}

/// Presentation-order rank of each packet, from its timestamp.
fn presentation_order(timestamps: &[i64]) -> Vec<u32> {
    let mut by_timestamp: Vec<usize> = (0..timestamps.len()).collect();
    by_timestamp.sort_by_key(|&i| timestamps[i]);

    let mut ranks = vec![0u32; timestamps.len()];
    for (rank, &i) in by_timestamp.iter().enumerate() {
        ranks[i] = rank as u32;
    }
    ranks
}

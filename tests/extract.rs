//! Group of Pictures extraction tests over scripted demuxers.

mod common;

use common::{MockDemuxer, SeekLanding, cfr_stream, key_packet, slice_packet};
use frameseek::{FrameSeekError, GopIndex, extract_gop_unindexed, extract_gops};

fn indexed(frame_count: u64, gop_starts: &[u64]) -> GopIndex {
    let pairs = (0..frame_count)
        .map(|frame_id| (frame_id as i64, gop_starts.contains(&frame_id)))
        .collect();
    GopIndex::from_scan(pairs, false).expect("index")
}

#[test]
fn extracts_one_record_per_distinct_gop() {
    let mut demuxer = MockDemuxer::new(cfr_stream(12, &[0, 4, 8]), SeekLanding::Exact);
    let index = indexed(12, &[0, 4, 8]);

    // Frames 5 and 6 share a GOP; 9 lives in another.
    let bundle = extract_gops(&mut demuxer, &index, &[9, 5, 6]).expect("extract");

    assert_eq!(bundle.records.len(), 2);

    let first = &bundle.records[0];
    assert_eq!(first.first_frame_id, 4);
    assert_eq!(first.gop_len(), 4);
    assert_eq!(first.frame_id, 5, "record answers for the first requested frame");
    assert_eq!(first.packet_sizes.len(), 4);

    let second = &bundle.records[1];
    assert_eq!(second.first_frame_id, 8);
    assert_eq!(second.gop_len(), 4);
    assert_eq!(second.frame_id, 9);
}

#[test]
fn record_payload_concatenates_packets_in_stored_order() {
    let mut demuxer = MockDemuxer::new(cfr_stream(8, &[0, 4]), SeekLanding::Exact);
    let index = indexed(8, &[0, 4]);

    let bundle = extract_gops(&mut demuxer, &index, &[1]).expect("extract");
    let record = &bundle.records[0];

    let expected: Vec<u8> = [
        key_packet(0).data,
        slice_packet(1).data,
        slice_packet(2).data,
        slice_packet(3).data,
    ]
    .concat();
    assert_eq!(record.payload, expected);
    assert_eq!(
        record.packet_sizes.iter().map(|&s| s as usize).sum::<usize>(),
        record.payload.len()
    );
    // Timestamps ascend, so decode order equals presentation order here.
    assert_eq!(record.decode_order, vec![0, 1, 2, 3]);
}

#[test]
fn record_carries_stream_properties() {
    let mut demuxer = MockDemuxer::new(cfr_stream(8, &[0, 4]), SeekLanding::Exact);
    let index = indexed(8, &[0, 4]);

    let bundle = extract_gops(&mut demuxer, &index, &[0]).expect("extract");
    let record = &bundle.records[0];

    assert_eq!(record.width, 64);
    assert_eq!(record.height, 48);
}

#[test]
fn truncated_stream_fails_mid_gop() {
    // The index claims 8 frames but the stream ends after 6.
    let mut demuxer = MockDemuxer::new(cfr_stream(6, &[0, 4]), SeekLanding::Exact);
    let index = indexed(8, &[0, 4]);

    let result = extract_gops(&mut demuxer, &index, &[5]);
    assert!(matches!(result, Err(FrameSeekError::SeekFailed { .. })));
}

#[test]
fn out_of_range_request_fails_before_any_seek() {
    let mut demuxer = MockDemuxer::new(cfr_stream(8, &[0, 4]), SeekLanding::Exact);
    let index = indexed(8, &[0, 4]);

    assert!(matches!(
        extract_gops(&mut demuxer, &index, &[8]),
        Err(FrameSeekError::FrameOutOfRange { .. })
    ));
}

#[test]
fn unindexed_extraction_discovers_the_gop_extent() {
    let mut demuxer = MockDemuxer::new(cfr_stream(12, &[0, 4, 8]), SeekLanding::Exact);

    let record = extract_gop_unindexed(&mut demuxer, 6).expect("extract");

    assert_eq!(record.first_frame_id, 4);
    assert_eq!(record.gop_len(), 4, "collection stops at the next GOP opener");
    assert_eq!(record.frame_id, 6);
}

#[test]
fn unindexed_extraction_of_the_last_gop_runs_to_end_of_stream() {
    let mut demuxer = MockDemuxer::new(cfr_stream(10, &[0, 4]), SeekLanding::Exact);

    let record = extract_gop_unindexed(&mut demuxer, 7).expect("extract");

    assert_eq!(record.first_frame_id, 4);
    assert_eq!(record.gop_len(), 6);
}

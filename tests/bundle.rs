//! Packet bundle serialization, parsing, and merge tests.

use frameseek::{
    CodecFamily, ColorRange, FrameRecord, FrameSeekError, PacketBundle, ParsedBundle,
    load_bundles, load_merged, merge_serialized, save_bundle,
};

fn record(frame_id: u64, first_frame_id: u64, packets: &[&[u8]]) -> FrameRecord {
    let packet_sizes: Vec<u32> = packets.iter().map(|p| p.len() as u32).collect();
    let decode_order: Vec<u32> = (0..packets.len() as u32).collect();
    let payload: Vec<u8> = packets.concat();
    FrameRecord {
        frame_id,
        first_frame_id,
        codec: CodecFamily::H264,
        width: 1920,
        height: 1080,
        color_range: ColorRange::Mpeg,
        packet_sizes,
        decode_order,
        payload,
    }
}

fn two_record_bundle() -> PacketBundle {
    PacketBundle {
        records: vec![
            record(5, 4, &[b"keyframe-data", b"delta-1", b"delta-22"]),
            record(9, 8, &[b"another-key", b"d"]),
        ],
    }
}

#[test]
fn serialize_then_parse_recovers_every_field() {
    let bundle = two_record_bundle();
    let serialized = bundle.serialize();

    assert_eq!(serialized.first_frame_ids, vec![4, 8]);
    assert_eq!(serialized.gop_lens, vec![3, 2]);

    let parsed = ParsedBundle::parse(&serialized.data).expect("parse");
    assert_eq!(parsed.frames.len(), 2);

    for (original, view) in bundle.records.iter().zip(&parsed.frames) {
        assert_eq!(view.frame_id, original.frame_id);
        assert_eq!(view.first_frame_id, original.first_frame_id);
        assert_eq!(view.codec, original.codec);
        assert_eq!(view.width, original.width);
        assert_eq!(view.height, original.height);
        assert_eq!(view.color_range, original.color_range);
        assert_eq!(view.packet_sizes, original.packet_sizes);
        assert_eq!(view.decode_order, original.decode_order);
        assert_eq!(view.payload, original.payload.as_slice());
    }
}

#[test]
fn parsed_views_split_the_payload_per_packet() {
    let bundle = PacketBundle {
        records: vec![record(0, 0, &[b"alpha", b"bravo!", b"c"])],
    };
    let serialized = bundle.serialize();
    let parsed = ParsedBundle::parse(&serialized.data).expect("parse");

    let packets: Vec<&[u8]> = parsed.frames[0].packets().collect();
    assert_eq!(packets, vec![b"alpha".as_slice(), b"bravo!", b"c"]);
}

#[test]
fn record_for_frame_matches_gop_extents() {
    let serialized = two_record_bundle().serialize();
    let parsed = ParsedBundle::parse(&serialized.data).expect("parse");

    assert_eq!(parsed.record_for_frame(6).expect("frame 6").first_frame_id, 4);
    assert_eq!(parsed.record_for_frame(8).expect("frame 8").first_frame_id, 8);
    assert!(parsed.record_for_frame(3).is_none());
    assert!(parsed.record_for_frame(10).is_none());
}

#[test]
fn merging_a_single_bundle_is_byte_identical() {
    let serialized = two_record_bundle().serialize();
    let merged = merge_serialized(&[serialized.data.as_slice()]).expect("merge");
    assert_eq!(merged, serialized.data);
}

#[test]
fn merge_preserves_record_order_and_bytes() {
    let a = PacketBundle {
        records: vec![record(1, 0, &[b"a0", b"a1"])],
    }
    .serialize();
    let b = PacketBundle {
        records: vec![record(12, 10, &[b"b0"])],
    }
    .serialize();

    let merged = merge_serialized(&[a.data.as_slice(), b.data.as_slice()]).expect("merge");
    let parsed = ParsedBundle::parse(&merged).expect("parse");

    assert_eq!(parsed.frames.len(), 2);
    assert_eq!(parsed.frames[0].frame_id, 1);
    assert_eq!(parsed.frames[0].payload, b"a0a1");
    assert_eq!(parsed.frames[1].frame_id, 12);
    assert_eq!(parsed.frames[1].payload, b"b0");
}

#[test]
fn merge_is_associative() {
    let a = PacketBundle {
        records: vec![record(1, 0, &[b"aaaa"])],
    }
    .serialize();
    let b = PacketBundle {
        records: vec![record(5, 4, &[b"bb", b"bbb"])],
    }
    .serialize();
    let c = PacketBundle {
        records: vec![record(9, 8, &[b"c"])],
    }
    .serialize();

    let ab = merge_serialized(&[a.data.as_slice(), b.data.as_slice()]).expect("merge ab");
    let bc = merge_serialized(&[b.data.as_slice(), c.data.as_slice()]).expect("merge bc");

    let left = merge_serialized(&[ab.as_slice(), c.data.as_slice()]).expect("merge (ab)c");
    let right = merge_serialized(&[a.data.as_slice(), bc.as_slice()]).expect("merge a(bc)");
    let flat = merge_serialized(&[
        a.data.as_slice(),
        b.data.as_slice(),
        c.data.as_slice(),
    ])
    .expect("merge abc");

    assert_eq!(left, right);
    assert_eq!(left, flat);
}

#[test]
fn merging_nothing_yields_an_empty_bundle() {
    let empty: [&[u8]; 0] = [];
    let merged = merge_serialized(&empty).expect("merge");
    let parsed = ParsedBundle::parse(&merged).expect("parse");
    assert!(parsed.frames.is_empty());
}

#[test]
fn malformed_bundles_are_rejected() {
    assert!(ParsedBundle::parse(&[]).is_err());

    // Frame count claims more records than the data can hold.
    let mut data = Vec::new();
    data.extend_from_slice(&1000u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 16]);
    assert!(matches!(
        ParsedBundle::parse(&data),
        Err(FrameSeekError::InvalidBundle(_))
    ));

    // A valid bundle with its offset table corrupted.
    let serialized = two_record_bundle().serialize();
    let mut corrupt = serialized.data.clone();
    corrupt[4] = 0xFF;
    assert!(ParsedBundle::parse(&corrupt).is_err());

    // Truncated payload.
    let truncated = &serialized.data[..serialized.data.len() - 3];
    assert!(ParsedBundle::parse(truncated).is_err());
}

#[test]
fn bundles_survive_the_filesystem() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a_path = dir.path().join("a.gop");
    let b_path = dir.path().join("b.gop");

    let a = PacketBundle {
        records: vec![record(1, 0, &[b"file-a"])],
    }
    .serialize();
    let b = PacketBundle {
        records: vec![record(5, 4, &[b"file-b", b"x"])],
    }
    .serialize();

    save_bundle(&a_path, &a.data).expect("save a");
    save_bundle(&b_path, &b.data).expect("save b");

    let loaded = load_bundles(&[&a_path, &b_path]).expect("load");
    assert_eq!(loaded[0], a.data);
    assert_eq!(loaded[1], b.data);

    let merged = load_merged(&[&a_path, &b_path]).expect("load merged");
    let expected = merge_serialized(&[a.data.as_slice(), b.data.as_slice()]).expect("merge");
    assert_eq!(merged, expected);
}

#[test]
fn loading_a_corrupt_bundle_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.gop");
    std::fs::write(&path, b"not a bundle").expect("write");

    assert!(load_bundles(&[&path]).is_err());
}

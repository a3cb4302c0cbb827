//! Key-frame classification tests over synthetic packet headers.

use frameseek::{CodecFamily, has_gop_start_unit, is_gop_start};

fn h264_nal(nal_type: u8, ref_idc: u8) -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x01, (ref_idc << 5) | (nal_type & 0x1F), 0x00]
}

fn hevc_nal(nal_type: u8) -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x01, (nal_type << 1) & 0x7E, 0x01]
}

fn av1_obu(obu_type: u8) -> Vec<u8> {
    vec![(obu_type << 3) & 0x78, 0x00]
}

#[test]
fn h264_parameter_sets_open_a_gop() {
    for nal_type in [6, 7, 8, 9] {
        assert!(
            has_gop_start_unit(CodecFamily::H264, &h264_nal(nal_type, 3)),
            "NAL type {nal_type} should classify as a GOP opener"
        );
    }
}

#[test]
fn h264_slices_do_not_open_a_gop() {
    for nal_type in [1, 2, 3, 4, 5] {
        assert!(
            !has_gop_start_unit(CodecFamily::H264, &h264_nal(nal_type, 3)),
            "NAL type {nal_type} should not classify as a GOP opener"
        );
    }
}

#[test]
fn h264_three_byte_start_code() {
    // 00 00 01 followed by an SPS header byte.
    let packet = [0x00, 0x00, 0x01, 0x67, 0x64, 0x00];
    assert!(has_gop_start_unit(CodecFamily::H264, &packet));

    let slice = [0x00, 0x00, 0x01, 0x41, 0x9A, 0x20];
    assert!(!has_gop_start_unit(CodecFamily::H264, &slice));
}

#[test]
fn hevc_parameter_sets_and_sei_open_a_gop() {
    for nal_type in [32, 33, 34, 39, 40] {
        assert!(
            has_gop_start_unit(CodecFamily::Hevc, &hevc_nal(nal_type)),
            "HEVC NAL type {nal_type} should classify as a GOP opener"
        );
    }
    for nal_type in [0, 1, 19, 20, 21] {
        assert!(
            !has_gop_start_unit(CodecFamily::Hevc, &hevc_nal(nal_type)),
            "HEVC NAL type {nal_type} should not classify as a GOP opener"
        );
    }
}

#[test]
fn av1_sequence_header_opens_a_gop() {
    assert!(has_gop_start_unit(CodecFamily::Av1, &av1_obu(1)));
    for obu_type in [2, 3, 4, 6] {
        assert!(
            !has_gop_start_unit(CodecFamily::Av1, &av1_obu(obu_type)),
            "OBU type {obu_type} should not classify as a GOP opener"
        );
    }
}

#[test]
fn short_packets_never_classify() {
    assert!(!has_gop_start_unit(CodecFamily::H264, &[]));
    assert!(!has_gop_start_unit(CodecFamily::H264, &[0x00, 0x00, 0x01]));
    assert!(!has_gop_start_unit(
        CodecFamily::H264,
        &[0x00, 0x00, 0x00, 0x01]
    ));
    assert!(!has_gop_start_unit(CodecFamily::Hevc, &[0x00, 0x00]));
    assert!(!has_gop_start_unit(CodecFamily::Av1, &[]));
}

#[test]
fn strict_classification_needs_the_container_flag() {
    let sps = h264_nal(7, 3);
    assert!(is_gop_start(CodecFamily::H264, &sps, true));
    assert!(!is_gop_start(CodecFamily::H264, &sps, false));

    // A flagged packet without an opening unit is also rejected: open-GOP
    // recovery points carry the flag but no parameter sets.
    let slice = h264_nal(1, 3);
    assert!(!is_gop_start(CodecFamily::H264, &slice, true));
}

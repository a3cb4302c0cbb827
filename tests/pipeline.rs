//! Async decode pipeline handoff and verification tests.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use frameseek::{
    AsyncDecodePipeline, DecodeRequest, DecodedFrame, FrameSeekError, PixelLayout,
};

fn request(name: &str, frame_id: u64) -> DecodeRequest {
    DecodeRequest {
        paths: vec![PathBuf::from(format!("/videos/{name}.mp4"))],
        frame_ids: vec![frame_id],
        layout: PixelLayout::Rgb,
    }
}

fn frame(frame_id: u64) -> DecodedFrame {
    DecodedFrame {
        frame_id,
        width: 2,
        height: 2,
        layout: PixelLayout::Rgb,
        timestamp: frame_id as i64,
        data: vec![0u8; 12],
    }
}

#[test]
fn submit_then_retrieve_returns_the_frames() {
    let pipeline = AsyncDecodePipeline::new();
    let request = request("a", 42);

    pipeline.submit(request.clone(), || Ok(vec![frame(42)]));
    let frames = pipeline.retrieve(&request).expect("retrieve");

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_id, 42);
}

#[test]
fn retrieve_without_a_submission_fails() {
    let pipeline = AsyncDecodePipeline::new();
    assert!(matches!(
        pipeline.retrieve(&request("a", 1)),
        Err(FrameSeekError::NoPendingRequest)
    ));
}

#[test]
fn retrieve_consumes_the_result() {
    let pipeline = AsyncDecodePipeline::new();
    let request = request("a", 7);

    pipeline.submit(request.clone(), || Ok(vec![frame(7)]));
    pipeline.retrieve(&request).expect("first retrieve");

    assert!(matches!(
        pipeline.retrieve(&request),
        Err(FrameSeekError::NoPendingRequest)
    ));
}

#[test]
fn mismatched_retrieval_is_rejected() {
    let pipeline = AsyncDecodePipeline::new();
    let submitted = request("a", 1);

    pipeline.submit(submitted.clone(), || Ok(vec![frame(1)]));

    // Different frame id.
    match pipeline.retrieve(&request("a", 2)) {
        Err(FrameSeekError::RequestMismatch {
            submitted: s,
            requested: r,
        }) => {
            assert_ne!(s, r);
        }
        other => panic!("expected RequestMismatch, got {other:?}"),
    }
}

#[test]
fn layout_is_part_of_the_request_identity() {
    let pipeline = AsyncDecodePipeline::new();
    let submitted = request("a", 1);

    pipeline.submit(submitted.clone(), || Ok(vec![frame(1)]));

    let mut bgr = submitted;
    bgr.layout = PixelLayout::Bgr;
    assert!(matches!(
        pipeline.retrieve(&bgr),
        Err(FrameSeekError::RequestMismatch { .. })
    ));
}

#[test]
fn decode_failure_is_reraised_on_retrieve() {
    let pipeline = AsyncDecodePipeline::new();
    let request = request("broken", 3);

    pipeline.submit(request.clone(), || {
        Err(FrameSeekError::DecodeError("no such frame".to_string()))
    });

    match pipeline.retrieve(&request) {
        Err(FrameSeekError::DecodeError(message)) => assert_eq!(message, "no such frame"),
        other => panic!("expected the captured failure, got {other:?}"),
    }

    // The failed result was consumed with the error.
    assert!(matches!(
        pipeline.retrieve(&request),
        Err(FrameSeekError::NoPendingRequest)
    ));
}

#[test]
fn resubmission_discards_the_unretrieved_result() {
    let pipeline = AsyncDecodePipeline::new();
    let first = request("a", 1);
    let second = request("b", 2);

    pipeline.submit(first, || Ok(vec![frame(1)]));
    pipeline.submit(second.clone(), || Ok(vec![frame(2)]));

    let frames = pipeline.retrieve(&second).expect("retrieve second");
    assert_eq!(frames[0].frame_id, 2);
}

#[test]
fn submit_waits_out_in_flight_work() {
    let pipeline = AsyncDecodePipeline::new();
    let slow = request("slow", 1);
    let fast = request("fast", 2);

    pipeline.submit(slow, || {
        thread::sleep(Duration::from_millis(80));
        Ok(vec![frame(1)])
    });
    // Blocks until the slow request finishes, then replaces its result.
    pipeline.submit(fast.clone(), || Ok(vec![frame(2)]));

    let frames = pipeline.retrieve(&fast).expect("retrieve");
    assert_eq!(frames[0].frame_id, 2);
}

#[test]
fn discard_pending_clears_the_slot() {
    let pipeline = AsyncDecodePipeline::new();
    let request = request("a", 5);

    pipeline.submit(request.clone(), || Ok(vec![frame(5)]));
    pipeline.discard_pending();

    assert!(matches!(
        pipeline.retrieve(&request),
        Err(FrameSeekError::NoPendingRequest)
    ));
}

//! The fakes honour the same on-disk contract as the real tools.

use std::path::Path;

use evovibe_media::fakes::{FakeCamera, FakeExtractor, FakePainter, ScriptedComparator};
use evovibe_media::*;

#[tokio::test]
async fn extractor_produces_requested_frames_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let frames = FakeExtractor
        .extract(Path::new("v.avi"), 4, 5, dir.path())
        .await
        .unwrap();
    assert_eq!(frames.len(), 5);
    assert!(frames[0].ends_with(frame_file_name(1)));
    assert!(frames[4].exists());
}

#[tokio::test]
async fn camera_writes_output_and_records_request() {
    let dir = tempfile::tempdir().unwrap();
    let camera = FakeCamera::new();
    let req = CaptureRequest {
        duration_secs: 3.0,
        size: ImageSize::new(320, 240),
        frame_rate: 2,
    };
    let out = dir.path().join("trial.avi");
    camera.record(&req, &out).await.unwrap();
    assert!(out.exists());
    assert_eq!(camera.requests(), vec![req]);
}

#[tokio::test(start_paused = true)]
async fn realtime_camera_takes_the_requested_time() {
    let dir = tempfile::tempdir().unwrap();
    let camera = FakeCamera::realtime();
    let req = CaptureRequest {
        duration_secs: 10.0,
        size: ImageSize::new(320, 240),
        frame_rate: 2,
    };
    let start = tokio::time::Instant::now();
    camera.record(&req, &dir.path().join("v.avi")).await.unwrap();
    assert!(start.elapsed() >= std::time::Duration::from_secs(10));
}

#[tokio::test]
async fn scripted_comparator_counts_calls() {
    let cmp = ScriptedComparator::new(|a, _, _| if a.ends_with("x.png") { 7 } else { 0 });
    assert_eq!(
        cmp.difference(Path::new("x.png"), Path::new("y"), Path::new("m"))
            .await
            .unwrap(),
        7
    );
    assert_eq!(
        cmp.difference(Path::new("z.png"), Path::new("y"), Path::new("m"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(cmp.calls(), 2);
}

#[tokio::test]
async fn fake_painter_validates_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let bad = RegionOfInterest::Circle {
        center_x: 5,
        center_y: 5,
        radius: 10,
    };
    assert!(FakePainter
        .paint_mask(ImageSize::new(100, 100), &bad, &dir.path().join("m.png"))
        .await
        .is_err());
}

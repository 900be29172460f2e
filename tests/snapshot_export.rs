//! Snapshot export through the download, callback and review sinks.

use ar_capture::camera::{FacingMode, Resolution, TestPatternBackend};
use ar_capture::profile::EngineProfile;
use ar_capture::session::Session;
use ar_capture::snapshot::{CallbackSink, Delivery, DownloadSink, ReviewSink, Snapshot, SnapshotSink};
use image::{Rgba, RgbaImage};

async fn streaming_session() -> Session<TestPatternBackend> {
    let backend = TestPatternBackend::new().with_native_resolution(Resolution::new(48, 32));
    let mut session = Session::new(backend, EngineProfile::default());
    session.start(FacingMode::Environment).await.unwrap();
    session.start_preview().unwrap();
    session.animation_frame();
    session
}

#[tokio::test]
async fn test_download_sink_writes_named_png() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = streaming_session().await;
    let mut sink = DownloadSink::new(dir.path());

    let delivery = session.capture_to(&mut sink).unwrap();
    let Delivery::Saved(path) = delivery else {
        panic!("Expected a saved file");
    };

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("ar-capture-"), "{}", name);
    assert!(name.ends_with(".png"), "{}", name);
    let millis = name
        .trim_start_matches("ar-capture-")
        .trim_end_matches(".png");
    assert!(millis.parse::<u64>().is_ok(), "{}", name);

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (48, 32));
}

#[test]
fn test_download_sink_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = DownloadSink::new(dir.path().join("nested")).with_prefix("room");
    let snapshot = Snapshot::encode(&RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]))).unwrap();

    let first = sink.deliver(snapshot.clone()).unwrap();
    let second = sink.deliver(snapshot.clone()).unwrap();
    let third = sink.deliver(snapshot).unwrap();
    assert_ne!(first, second);
    assert_ne!(second, third);
    assert_eq!(std::fs::read_dir(dir.path().join("nested")).unwrap().count(), 3);
}

#[test]
fn test_concurrent_download_sinks_never_share_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Snapshot::encode(&RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255]))).unwrap();

    let mut paths: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let snapshot = snapshot.clone();
                let dir = dir.path();
                scope.spawn(move || {
                    let mut sink = DownloadSink::new(dir);
                    match sink.deliver(snapshot).unwrap() {
                        Delivery::Saved(path) => path,
                        other => panic!("Expected a saved file, got {:?}", other),
                    }
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 8);
    for path in &paths {
        assert_eq!(std::fs::read(path).unwrap(), snapshot.png_bytes());
    }
}

#[tokio::test]
async fn test_callback_sink_receives_data_url() {
    let mut session = streaming_session().await;
    let mut urls = Vec::new();
    {
        let mut sink = CallbackSink::new(|s: Snapshot| urls.push(s.to_data_url()));
        assert_eq!(session.capture_to(&mut sink).unwrap(), Delivery::Handed);
    }
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_review_then_accept_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = streaming_session().await;
    let mut review = ReviewSink::new();

    assert_eq!(session.capture_to(&mut review).unwrap(), Delivery::PendingReview);
    let pending = review.pending().unwrap().clone();
    assert_eq!((pending.width(), pending.height()), (48, 32));

    let mut download = DownloadSink::new(dir.path());
    let delivery = review.accept(&mut download).unwrap();
    assert!(matches!(delivery, Delivery::Saved(_)));
    assert!(review.pending().is_none());

    session.capture_to(&mut review).unwrap();
    assert!(review.discard().is_some());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_snapshot_metadata_serializes() {
    let mut session = streaming_session().await;
    let snapshot = session.capture().unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["width"], 48);
    assert_eq!(json["height"], 32);
    assert!(json["captured_at_ms"].as_u64().unwrap() > 0);
    assert!(json.get("png").is_none());
}

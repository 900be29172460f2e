//! End-to-end session tests on the synthetic camera backend.

use ar_capture::camera::{
    DeviceFailure, FacingMode, Resolution, StillImageBackend, StreamErrorKind, TestPatternBackend,
};
use ar_capture::interaction::{Adjustment, ContainerSize, PointerPos};
use ar_capture::overlay::{OverlayImage, OverlaySource};
use ar_capture::profile::{EngineProfile, ProfilePreset};
use ar_capture::render::TickOutcome;
use ar_capture::session::{Session, SessionError, SessionEvent, SessionStatus};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

fn small_backend() -> TestPatternBackend {
    TestPatternBackend::new().with_native_resolution(Resolution::new(80, 60))
}

fn red_square() -> OverlayImage {
    OverlayImage::from_rgba(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]))).unwrap()
}

fn png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn assert_near(actual: [u8; 4], expected: [u8; 4]) {
    assert!(
        actual.iter().zip(expected).all(|(a, e)| a.abs_diff(e) <= 3),
        "{:?} != {:?}",
        actual,
        expected
    );
}

/// A still background makes consecutive captures comparable.
fn still_backend() -> StillImageBackend {
    StillImageBackend::from_image(
        "room.png".into(),
        RgbImage::from_pixel(80, 60, Rgb([20, 40, 60])),
    )
}

#[tokio::test]
async fn test_overlay_changes_capture() {
    let mut session = Session::new(still_backend(), EngineProfile::default());
    session.set_overlay(red_square());
    session.start(FacingMode::Environment).await.unwrap();
    session.start_preview().unwrap();

    assert_eq!(session.animation_frame(), Some(TickOutcome::Drawn));
    let with_overlay = session.capture().unwrap();

    session.set_overlay_visible(false);
    assert_eq!(session.animation_frame(), Some(TickOutcome::Drawn));
    let without_overlay = session.capture().unwrap();

    assert_ne!(with_overlay.png_bytes(), without_overlay.png_bytes());
    assert_ne!(with_overlay.digest(), without_overlay.digest());

    let center = with_overlay.decode().unwrap().get_pixel(40, 30).0;
    assert_near(center, [255, 0, 0, 255]);
    let plain = without_overlay.decode().unwrap().get_pixel(40, 30).0;
    assert_eq!(plain, [20, 40, 60, 255]);
}

#[tokio::test]
async fn test_capture_does_not_stop_stream_or_loop() {
    let mut session = Session::new(small_backend(), EngineProfile::default());
    session.start(FacingMode::User).await.unwrap();
    session.start_preview().unwrap();
    session.animation_frame();

    session.capture().unwrap();
    assert_eq!(session.status(), SessionStatus::Streaming);
    assert_eq!(session.animation_frame(), Some(TickOutcome::Drawn));
}

#[tokio::test]
async fn test_capture_requires_streaming() {
    let mut session = Session::new(small_backend(), EngineProfile::default());
    for _ in 0..2 {
        let err = session.capture().unwrap_err();
        assert!(err.is_contract_violation(), "{}", err);
    }

    session.start(FacingMode::User).await.unwrap();
    session.capture_once().unwrap();
    session.stop().unwrap();

    let err = session.capture().unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            status: SessionStatus::Stopped,
            ..
        }
    ));
}

#[tokio::test]
async fn test_stream_exclusivity_over_many_requests() {
    let backend = small_backend();
    let stats = backend.stats();
    let mut session = Session::new(backend, EngineProfile::default());

    session.start(FacingMode::User).await.unwrap();
    for _ in 0..5 {
        session.toggle_facing().await.unwrap();
        assert_eq!(stats.open(), 1);
    }
    session.stop().unwrap();
    session.start(FacingMode::User).await.unwrap();

    assert_eq!(stats.peak(), 1);
    assert_eq!(stats.opened_total(), 7);
    session.shutdown();
    assert_eq!(stats.open(), 0);
}

#[tokio::test]
async fn test_error_then_retry() {
    let backend = small_backend();
    backend.fail_next(DeviceFailure::named("NotReadableError", "in use by another app"));
    let mut session = Session::new(backend, EngineProfile::default());
    let events = session.subscribe();

    let err = session.start(FacingMode::Environment).await.unwrap_err();
    assert!(matches!(err, SessionError::Stream(StreamErrorKind::DeviceBusy)));
    assert!(!err.is_contract_violation());
    assert!(session.start_preview().is_err());

    session.retry().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Streaming);

    let events: Vec<SessionEvent> = events.try_iter().collect();
    assert!(events.contains(&SessionEvent::Failed {
        kind: StreamErrorKind::DeviceBusy
    }));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::StreamAcquired {
            facing: FacingMode::Environment,
            resolution: Resolution::new(80, 60),
        })
    );
}

#[tokio::test]
async fn test_events_serialize() {
    let mut session = Session::new(small_backend(), EngineProfile::default());
    let events = session.subscribe();
    session.start(FacingMode::User).await.unwrap();
    session.capture_once().unwrap();
    session.shutdown();

    let json: Vec<serde_json::Value> = events
        .try_iter()
        .map(|e| serde_json::to_value(&e).unwrap())
        .collect();

    assert_eq!(json[0]["event"], "status_changed");
    assert_eq!(json[0]["from"], "idle");
    assert_eq!(json[0]["to"], "requesting_permission");
    assert!(json
        .iter()
        .any(|e| e["event"] == "stream_acquired" && e["facing"] == "user"));
    assert!(json
        .iter()
        .any(|e| e["event"] == "captured" && e["width"] == 80 && e["height"] == 60));
    assert_eq!(json.last().unwrap()["to"], "stopped");
}

#[tokio::test]
async fn test_drag_and_sliders_drive_the_composite() {
    let mut session = Session::new(still_backend(), EngineProfile::default());
    session.set_overlay(red_square());
    session.start(FacingMode::User).await.unwrap();

    // Drag the overlay 25% to the left
    let drag = session.begin_drag(PointerPos::new(400.0, 300.0)).unwrap();
    session
        .update_drag(&drag, PointerPos::new(200.0, 300.0), ContainerSize::new(800.0, 600.0))
        .unwrap();
    session.end_drag(&drag).unwrap();
    session.adjust(Adjustment::Scale(50.0)).unwrap();

    let image = session.capture_once().unwrap().decode().unwrap();
    assert_near(image.get_pixel(20, 30).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(40, 30).0, [20, 40, 60, 255]);

    session.adjust(Adjustment::Opacity(0.0)).unwrap();
    let image = session.capture_once().unwrap().decode().unwrap();
    assert_eq!(image.get_pixel(20, 30).0, [20, 40, 60, 255]);
}

#[tokio::test]
async fn test_overlay_from_data_url() {
    use base64::Engine;

    let encoded = base64::engine::general_purpose::STANDARD
        .encode(png(&RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]))));
    let mut session = Session::new(still_backend(), EngineProfile::default());
    session
        .load_overlay(OverlaySource::DataUrl(format!("data:image/png;base64,{}", encoded)))
        .await
        .unwrap();
    session.start(FacingMode::User).await.unwrap();

    let image = session.capture_once().unwrap().decode().unwrap();
    assert_near(image.get_pixel(40, 30).0, [0, 0, 255, 255]);
}

#[tokio::test]
async fn test_bad_overlay_keeps_previous() {
    let mut session = Session::new(small_backend(), EngineProfile::default());
    session.set_overlay(red_square());
    let err = session
        .load_overlay(OverlaySource::Bytes(vec![0, 1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Overlay(_)));
    assert_eq!(session.overlay().map(|o| o.width()), Some(8));
}

#[tokio::test]
async fn test_profile_limits_apply() {
    let mut session = Session::new(small_backend(), EngineProfile::preset(ProfilePreset::Mobile));
    session.start(FacingMode::User).await.unwrap();
    session.adjust(Adjustment::Scale(280.0)).unwrap();
    assert_eq!(session.transform().scale_percent(), 200.0);

    let mut session = Session::new(small_backend(), EngineProfile::preset(ProfilePreset::HighRes));
    session.start(FacingMode::User).await.unwrap();
    session.adjust(Adjustment::Rotation(-90.0)).unwrap();
    assert_eq!(session.transform().rotation_degrees(), 270.0);
}

#[tokio::test]
async fn test_transformed_overlay_capture_differs_from_hidden() {
    let mut session = Session::new(still_backend(), EngineProfile::default());
    session.set_overlay(red_square());
    session.start(FacingMode::Environment).await.unwrap();
    for adjustment in [
        Adjustment::Position { x: 30.0, y: 70.0 },
        Adjustment::Scale(150.0),
        Adjustment::Rotation(45.0),
        Adjustment::Opacity(50.0),
    ] {
        session.adjust(adjustment).unwrap();
    }
    session.start_preview().unwrap();

    assert_eq!(session.animation_frame(), Some(TickOutcome::Drawn));
    assert!(session.last_report().unwrap().overlay_drawn);
    let shown = session.capture().unwrap();
    assert!(!shown.png_bytes().is_empty());

    session.set_overlay_visible(false);
    assert_eq!(session.animation_frame(), Some(TickOutcome::Drawn));
    assert!(!session.last_report().unwrap().overlay_drawn);
    let hidden = session.capture().unwrap();

    assert_ne!(shown.png_bytes(), hidden.png_bytes());

    // Overlay center lands at (30%, 70%) of the 80x60 frame, half blended
    let shown = shown.decode().unwrap().get_pixel(24, 42).0;
    let hidden = hidden.decode().unwrap().get_pixel(24, 42).0;
    assert_eq!(hidden, [20, 40, 60, 255]);
    assert!(shown[0] > 120 && shown[0] < 150, "{:?}", shown);
}

#[tokio::test]
async fn test_session_from_deserialized_profile_with_inverted_range() {
    let mut json = serde_json::to_value(EngineProfile::default()).unwrap();
    json["scale_range"] = serde_json::json!({ "min": 300.0, "max": 10.0 });
    let profile: EngineProfile = serde_json::from_value(json).unwrap();

    let mut session = Session::new(small_backend(), profile);
    assert_eq!(session.transform().scale_percent(), 100.0);
    session.start(FacingMode::User).await.unwrap();
    session.adjust(Adjustment::Scale(1000.0)).unwrap();
    assert_eq!(session.transform().scale_percent(), 300.0);
}

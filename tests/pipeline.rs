//! End-to-end refresh cycle tests.
//!
//! Viewport -> fetch -> normalize -> aggregate -> render, driven through the
//! public API with an in-memory point source and recording render targets.
//!
//! Run with: `cargo test --test pipeline`

use std::sync::Mutex;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};

use safeheat::{
    parse_csv, present, Band, Bounds, FallbackMarker, FetchRequest, HeatConfig, HeatError,
    HeatFrame, PointSource, RefreshEvent, RefreshScheduler, RenderPath, RenderTarget, Result,
    Rgb, SampleIndex,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves a fixed response and records every request it sees.
struct StaticSource {
    body: Value,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticSource {
    fn new(body: Value) -> Self {
        Self {
            body,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl PointSource for StaticSource {
    fn fetch(&self, request: &FetchRequest) -> BoxFuture<'_, Result<Value>> {
        self.requests.lock().unwrap().push(*request);
        let body = self.body.clone();
        async move { Ok(body) }.boxed()
    }
}

/// Always fails like an upstream outage.
struct DownSource;

impl PointSource for DownSource {
    fn fetch(&self, _request: &FetchRequest) -> BoxFuture<'_, Result<Value>> {
        async {
            Err(HeatError::FetchFailure {
                message: "Service Unavailable".to_string(),
                status_code: Some(503),
            })
        }
        .boxed()
    }
}

#[derive(Default)]
struct Canvas {
    heat_layer: bool,
    frames: Vec<HeatFrame>,
    markers: Vec<FallbackMarker>,
}

impl RenderTarget for Canvas {
    fn supports_heat_layer(&self) -> bool {
        self.heat_layer
    }

    fn draw_heat(&mut self, frame: &HeatFrame) {
        self.frames.push(frame.clone());
    }

    fn draw_markers(&mut self, markers: &[FallbackMarker]) {
        self.markers = markers.to_vec();
    }
}

fn viewport() -> Bounds {
    Bounds::new(77.580, 12.980, 77.600, 13.090)
}

/// Three audits on one block, one elsewhere, one unscored, one junk record.
fn audit_body() -> Value {
    json!({"data": [
        {"lat": 13.0520, "lng": 77.5920, "score": 0.08, "samples": 6, "confidence": 0.12},
        {"latitude": "13.0521", "lon": 77.5921, "score": 0.1, "count": 3},
        {"lat": 13.0519, "lng": 77.5919, "score": 0.12},
        {"lat": 13.0700, "lng": 77.5900, "score": 0.78, "samples": 10},
        {"lat": 13.0300, "lng": 77.5870},
        {"lat": null, "lng": 77.0}
    ]})
}

async fn first_frame(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<RefreshEvent>,
) -> (u64, HeatFrame) {
    match rx.recv().await {
        Some(RefreshEvent::Rendered { seq, frame }) => (seq, frame),
        other => panic!("expected a rendered frame, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_viewport_to_heat_layer() {
    init_logging();
    let (mut scheduler, mut rx) =
        RefreshScheduler::new(StaticSource::new(audit_body()), HeatConfig::default()).unwrap();

    scheduler.viewport_changed(viewport());
    let (seq, frame) = first_frame(&mut rx).await;
    assert_eq!(seq, 1);

    // Five valid audits, three of them sharing a cell
    assert_eq!(scheduler.current_points().len(), 5);
    assert_eq!(frame.entries.len(), 3);
    for entry in &frame.entries {
        assert!(entry.intensity >= 0.01 && entry.intensity <= 4.0);
    }

    let hotspot = frame
        .entries
        .iter()
        .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
        .unwrap();
    assert!((hotspot.lat - 13.052).abs() < 0.0005);
    assert!((hotspot.lng - 77.592).abs() < 0.0005);

    let mut canvas = Canvas {
        heat_layer: true,
        ..Default::default()
    };
    let path = present(&mut canvas, &frame, &scheduler.current_points(), 0.75);
    assert_eq!(path, RenderPath::HeatLayer);
    assert_eq!(canvas.frames[0].triples().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_marker_fallback_without_heat_layer() {
    init_logging();
    let (mut scheduler, mut rx) =
        RefreshScheduler::new(StaticSource::new(audit_body()), HeatConfig::default()).unwrap();

    scheduler.viewport_changed(viewport());
    let (_, frame) = first_frame(&mut rx).await;

    let mut canvas = Canvas::default();
    let points = scheduler.current_points();
    let path = present(&mut canvas, &frame, &points, scheduler.config().unknown_score_risk);

    assert_eq!(path, RenderPath::Markers);
    assert!(canvas.frames.is_empty());
    assert_eq!(canvas.markers.len(), points.len());
    // Dangerous spots are warm, safe ones cool
    assert_ne!(canvas.markers[0].color, canvas.markers[3].color);
    assert_ne!(canvas.markers[3].color, Rgb::new(255, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_controls_reach_the_source() {
    init_logging();
    let source = std::sync::Arc::new(StaticSource::new(audit_body()));
    let (mut scheduler, mut rx) =
        RefreshScheduler::new(std::sync::Arc::clone(&source), HeatConfig::default()).unwrap();

    scheduler.viewport_changed(viewport());
    first_frame(&mut rx).await;
    scheduler.set_band(Band::Night);
    first_frame(&mut rx).await;
    scheduler.set_min_samples(0);
    first_frame(&mut rx).await;

    let requests = source.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].band, Band::Day);
    assert_eq!(requests[1].band, Band::Night);
    assert_eq!(requests[2].min_samples, 1);
    assert!(requests.iter().all(|r| r.bbox == viewport()));
}

#[tokio::test(start_paused = true)]
async fn test_unaggregated_config_from_json() {
    init_logging();
    let config = HeatConfig::from_json(r#"{"aggregate": false, "debounce_ms": 50}"#).unwrap();
    let (mut scheduler, mut rx) =
        RefreshScheduler::new(StaticSource::new(audit_body()), config).unwrap();

    scheduler.viewport_changed(viewport());
    tokio::time::sleep(Duration::from_millis(60)).await;
    let (_, frame) = first_frame(&mut rx).await;

    assert!(!frame.aggregated);
    assert_eq!(frame.entries.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_outage_reports_failure() {
    init_logging();
    let (mut scheduler, mut rx) = RefreshScheduler::new(DownSource, HeatConfig::default()).unwrap();

    scheduler.viewport_changed(viewport());
    match rx.recv().await {
        Some(RefreshEvent::Failed { seq, message }) => {
            assert_eq!(seq, 1);
            assert!(message.contains("503"));
        }
        other => panic!("expected a failure, got {:?}", other),
    }
    assert!(scheduler.current_points().is_empty());
    assert_eq!(scheduler.summary().total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_export_summary_and_popup_lookup() {
    init_logging();
    let (mut scheduler, mut rx) =
        RefreshScheduler::new(StaticSource::new(audit_body()), HeatConfig::default()).unwrap();

    scheduler.viewport_changed(viewport());
    first_frame(&mut rx).await;

    let points = scheduler.current_points();
    assert_eq!(parse_csv(&scheduler.export_csv()).unwrap(), points.to_vec());

    let summary = scheduler.summary();
    assert_eq!(summary.total, 5);
    assert_eq!(summary.unscored, 1);
    assert_eq!(summary.riskiest.unwrap().score, Some(0.08));

    let index = SampleIndex::build(&points);
    let tapped = index.nearest(13.0699, 77.5901).unwrap();
    assert_eq!(tapped.score, Some(0.78));
    assert_eq!(index.within(&Bounds::new(77.5915, 13.0515, 77.5925, 13.0525)).len(), 3);
}

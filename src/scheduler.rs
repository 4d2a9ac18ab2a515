//! # Refresh Scheduler
//!
//! Turns viewport and control changes into fetch → aggregate → render cycles.
//!
//! ## Behaviour
//!
//! - Viewport changes are debounced: each one cancels the pending timer and
//!   starts a new one, so a burst of pans/zooms yields a single fetch.
//! - Band and sample-threshold changes fetch immediately.
//! - An in-flight fetch is never cancelled. Every cycle is tagged with a
//!   sequence number; with `discard_stale_responses` on, a result older than
//!   the newest applied one is reported as [`RefreshEvent::Superseded`] and
//!   dropped instead of overwriting fresher data.
//! - On success the current point set is replaced wholesale. On failure it is
//!   left untouched and the error is reported as an event, never thrown.
//!
//! One scheduler serves one map view. All methods that start work must be
//! called from within a Tokio runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::aggregate::build_heat_entries;
use crate::export::{to_csv, PointSetSummary};
use crate::ingest::parse_response_with_report;
use crate::{
    Band, Bounds, FetchRequest, GradientTable, HeatConfig, HeatFrame, LayerConfig, PointSource,
    RawSample, Result,
};

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    /// The point set was replaced and a new frame is ready to draw
    Rendered { seq: u64, frame: HeatFrame },
    /// The fetch failed; the previous point set and frame still stand
    Failed { seq: u64, message: String },
    /// The fetch succeeded but a newer cycle had already been applied
    Superseded { seq: u64 },
}

impl RefreshEvent {
    pub fn seq(&self) -> u64 {
        match self {
            RefreshEvent::Rendered { seq, .. }
            | RefreshEvent::Failed { seq, .. }
            | RefreshEvent::Superseded { seq } => *seq,
        }
    }
}

/// Mutable state shared between the scheduler handle and its cycles.
struct CycleState {
    viewport: Option<Bounds>,
    band: Band,
    min_samples: u32,
    current: Arc<[RawSample]>,
    applied_seq: u64,
}

/// Everything a spawned cycle needs.
struct Pipeline<S> {
    source: S,
    config: HeatConfig,
    layer: LayerConfig,
    gradient: GradientTable,
    state: Mutex<CycleState>,
    next_seq: AtomicU64,
    fetches: AtomicU64,
    events: mpsc::UnboundedSender<RefreshEvent>,
}

impl<S: PointSource> Pipeline<S> {
    fn state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RefreshEvent) {
        if self.events.send(event).is_err() {
            debug!("[RefreshScheduler] Event receiver dropped");
        }
    }

    /// Snapshot the request parameters, assign a sequence number and spawn
    /// the fetch. Does nothing until a viewport is known.
    fn start_cycle(self: &Arc<Self>) {
        let (seq, request) = {
            let state = self.state();
            let Some(bbox) = state.viewport else {
                debug!("[RefreshScheduler] Cycle skipped: no viewport yet");
                return;
            };
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
            (seq, FetchRequest::new(state.band, state.min_samples, bbox))
        };

        self.fetches.fetch_add(1, Ordering::SeqCst);
        debug!(
            "[RefreshScheduler] Cycle #{} fetching band={} min_samples={} bbox={}",
            seq,
            request.band,
            request.min_samples,
            request.bbox.to_bbox_string()
        );
        tokio::spawn(Arc::clone(self).run_fetch(seq, request));
    }

    async fn run_fetch(self: Arc<Self>, seq: u64, request: FetchRequest) {
        let start = Instant::now();

        let outcome = match self.source.fetch(&request).await {
            Ok(body) => parse_response_with_report(body),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((points, report)) => {
                if self.apply(seq, points) {
                    info!(
                        "[RefreshScheduler] Cycle #{} applied {} points ({} dropped) in {} ms",
                        seq,
                        report.accepted,
                        report.dropped,
                        start.elapsed().as_millis()
                    );
                }
            }
            Err(e) => {
                warn!("[RefreshScheduler] Cycle #{} failed: {}", seq, e);
                self.emit(RefreshEvent::Failed {
                    seq,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Install a fetched point set unless a newer cycle already won.
    ///
    /// The frame is built before shared state is touched. The staleness
    /// check, the swap and the emit then happen under one lock, so events
    /// leave in the same order cycles are applied. Returns true if applied.
    fn apply(&self, seq: u64, points: Vec<RawSample>) -> bool {
        let current: Arc<[RawSample]> = Arc::from(points);
        let frame = HeatFrame {
            entries: build_heat_entries(&current, &self.config),
            gradient: self.gradient.clone(),
            layer: self.layer.clone(),
            aggregated: self.config.aggregate,
        };

        let mut state = self.state();
        if self.config.discard_stale_responses && seq < state.applied_seq {
            debug!(
                "[RefreshScheduler] Cycle #{} superseded by #{}, discarding",
                seq, state.applied_seq
            );
            self.emit(RefreshEvent::Superseded { seq });
            return false;
        }
        state.current = current;
        state.applied_seq = state.applied_seq.max(seq);
        self.emit(RefreshEvent::Rendered { seq, frame });
        true
    }
}

/// Receiving half of a scheduler's event stream.
pub type RefreshEvents = mpsc::UnboundedReceiver<RefreshEvent>;

/// Debounced, latest-wins refresh controller for one map view.
pub struct RefreshScheduler<S: PointSource> {
    pipeline: Arc<Pipeline<S>>,
    pending: Option<JoinHandle<()>>,
}

impl<S: PointSource> RefreshScheduler<S> {
    /// Create a scheduler with the default layer and gradient.
    ///
    /// Returns the scheduler and the receiver on which every cycle reports
    /// its [`RefreshEvent`]. Fails with [`HeatError::ConfigError`] if the
    /// config does not validate.
    ///
    /// [`HeatError::ConfigError`]: crate::HeatError::ConfigError
    pub fn new(source: S, config: HeatConfig) -> Result<(Self, RefreshEvents)> {
        Self::with_layer(source, config, LayerConfig::default(), GradientTable::default())
    }

    /// Create a scheduler with explicit renderer parameters.
    pub fn with_layer(
        source: S,
        config: HeatConfig,
        layer: LayerConfig,
        gradient: GradientTable,
    ) -> Result<(Self, RefreshEvents)> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = Arc::new(Pipeline {
            source,
            config,
            layer,
            gradient,
            state: Mutex::new(CycleState {
                viewport: None,
                band: Band::default(),
                min_samples: 1,
                current: Arc::from(Vec::new()),
                applied_seq: 0,
            }),
            next_seq: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            events: tx,
        });
        Ok((
            Self {
                pipeline,
                pending: None,
            },
            rx,
        ))
    }

    pub fn config(&self) -> &HeatConfig {
        &self.pipeline.config
    }

    /// Record a new viewport and (re)start the debounce timer.
    pub fn viewport_changed(&mut self, bounds: Bounds) {
        self.pipeline.state().viewport = Some(bounds);

        if let Some(timer) = self.pending.take() {
            timer.abort();
        }

        let pipeline = Arc::clone(&self.pipeline);
        let delay = Duration::from_millis(self.pipeline.config.debounce_ms);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The fetch runs in its own task; aborting this timer later cannot cancel it
            pipeline.start_cycle();
        }));
    }

    /// Change the band and fetch immediately.
    pub fn set_band(&mut self, band: Band) {
        self.pipeline.state().band = band;
        self.refresh_now();
    }

    /// Change the minimum sample threshold (floored at 1) and fetch immediately.
    pub fn set_min_samples(&mut self, min_samples: u32) {
        self.pipeline.state().min_samples = min_samples.max(1);
        self.refresh_now();
    }

    /// Start a cycle for the current viewport without debouncing.
    pub fn refresh_now(&self) {
        self.pipeline.start_cycle();
    }

    /// Whether a debounce timer is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn band(&self) -> Band {
        self.pipeline.state().band
    }

    pub fn min_samples(&self) -> u32 {
        self.pipeline.state().min_samples
    }

    pub fn viewport(&self) -> Option<Bounds> {
        self.pipeline.state().viewport
    }

    /// Snapshot of the most recently applied point set.
    pub fn current_points(&self) -> Arc<[RawSample]> {
        Arc::clone(&self.pipeline.state().current)
    }

    /// Sequence number of the cycle that produced the current point set.
    pub fn applied_seq(&self) -> u64 {
        self.pipeline.state().applied_seq
    }

    /// Number of fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.pipeline.fetches.load(Ordering::SeqCst)
    }

    /// CSV export of the current point set.
    pub fn export_csv(&self) -> String {
        to_csv(&self.current_points())
    }

    pub fn summary(&self) -> PointSetSummary {
        PointSetSummary::from_samples(&self.current_points())
    }
}

impl<S: PointSource> Drop for RefreshScheduler<S> {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.abort();
        }
    }
}

//! Update Scheduler
//!
//! Background loop that periodically recomputes a price for every active
//! ticker and publishes it to that ticker's group.
//!
//! # State Machine
//!
//! ```text
//! Idle --interval elapsed--> Tick --all tickers processed--> Idle
//! any  --cancellation------> Stopped (terminal)
//! ```
//!
//! A failing ticker is logged and skipped; it never aborts the tick or the
//! loop. Cancellation is observed while sleeping, between tickers and while a
//! resolution is in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::UpdatePublisher;
use crate::application::services::resolver::PriceResolver;
use crate::domain::pricing::{PriceJitter, PriceUpdate};
use crate::domain::registry::TickerRegistry;
use crate::application::metrics;

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SchedulerState {
    /// Waiting for the next interval.
    Idle = 0,
    /// Processing the active ticker set.
    Tick = 1,
    /// Cancelled. Terminal.
    Stopped = 2,
}

impl SchedulerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Tick,
            _ => Self::Stopped,
        }
    }
}

/// Outcome of one pass over the active tickers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tickers whose recomputed price was published.
    pub published: usize,
    /// Tickers with no price available.
    pub skipped: usize,
    /// Tickers whose resolution failed.
    pub failed: usize,
    /// Whether the pass stopped early because of cancellation.
    pub cancelled: bool,
}

/// Periodic recompute and publish loop.
pub struct UpdateScheduler {
    resolver: Arc<PriceResolver>,
    registry: Arc<TickerRegistry>,
    publisher: Arc<dyn UpdatePublisher>,
    jitter: PriceJitter,
    interval: Duration,
    cancel: CancellationToken,
    state: AtomicU8,
    last_report: Mutex<Option<TickReport>>,
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("interval", &self.interval)
            .field("jitter", &self.jitter)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl UpdateScheduler {
    /// Create a scheduler. Nothing runs until [`Self::run`] is awaited.
    #[must_use]
    pub fn new(
        resolver: Arc<PriceResolver>,
        publisher: Arc<dyn UpdatePublisher>,
        jitter: PriceJitter,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let registry = Arc::clone(resolver.registry());
        Self {
            resolver,
            registry,
            publisher,
            jitter,
            interval,
            cancel,
            state: AtomicU8::new(SchedulerState::Idle as u8),
            last_report: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Report of the most recent completed tick.
    #[must_use]
    pub fn last_report(&self) -> Option<TickReport> {
        *self.last_report.lock()
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run until the cancellation token fires.
    ///
    /// Each iteration processes the active tickers, then sleeps for the
    /// configured interval.
    pub async fn run(&self) {
        info!(
            interval_ms = self.interval.as_millis(),
            max_pct = self.jitter.max_pct(),
            "Update scheduler started"
        );

        while !self.cancel.is_cancelled() {
            self.set_state(SchedulerState::Tick);
            let report = self.tick().await;
            self.set_state(SchedulerState::Idle);

            if report.cancelled {
                break;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("Update scheduler stopped");
    }

    /// Process every active ticker once.
    ///
    /// The active set is snapshotted at the start; tickers registered during
    /// the pass are picked up by the next one.
    pub async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::default();

        for ticker in self.registry.all_tickers() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let resolved = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                resolved = self.resolver.resolve(&ticker) => resolved,
            };

            match resolved {
                Ok(Some(point)) => {
                    let price = self.jitter.next_price(point.price);
                    let delivered = self
                        .publisher
                        .publish(&ticker, PriceUpdate::new(ticker.clone(), price));
                    metrics::record_update_published(delivered);
                    debug!(ticker = %ticker, price = %price, delivered, "Published price update");
                    report.published += 1;
                }
                Ok(None) => {
                    debug!(ticker = %ticker, "No price for active ticker, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "Price update failed, skipping ticker");
                    report.failed += 1;
                }
            }
        }

        metrics::record_tick(started.elapsed(), &report);
        *self.last_report.lock() = Some(report);

        if report.published + report.skipped + report.failed > 0 {
            info!(
                published = report.published,
                skipped = report.skipped,
                failed = report.failed,
                "Updated stock prices"
            );
        }

        report
    }
}

//! Periodic health-check pipeline
//!
//! One cycle reads the stored settings, gates on the enabled flag and the
//! allowed-hours window, fetches the last 24 hours of samples, asks the model
//! whether to notify and shows the notification. Every failure inside a cycle
//! ends the cycle as a logged no-op; nothing is retried.

use crate::ai::{parse_response, HealthAnalyzer};
use crate::alerts::Notifier;
use crate::providers::{fetch_window, HealthDataProvider};
use crate::samples::TimeRange;
use crate::store::{Database, NotificationSettings};
use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Hours of data included in every cycle
pub const WINDOW_HOURS: i64 = 24;

/// Progress of a single cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    WindowFetched,
    Serialized,
    ModelQueried,
    NotificationEmitted,
    Suppressed,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Idle => "idle",
            CycleStage::WindowFetched => "window fetched",
            CycleStage::Serialized => "serialized",
            CycleStage::ModelQueried => "model queried",
            CycleStage::NotificationEmitted => "notification emitted",
            CycleStage::Suppressed => "suppressed",
        };
        f.write_str(name)
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Checks are switched off
    Disabled,
    /// The local hour is outside the allowed window
    OutsideAllowedHours { hour: u32 },
    /// The model decided there is nothing worth telling
    Suppressed,
    NotificationEmitted(String),
    /// A step failed; `stage` is the last stage that completed
    Failed { stage: CycleStage, reason: String },
}

impl CycleOutcome {
    /// Final stage of the cycle state machine for this outcome
    pub fn stage(&self) -> CycleStage {
        match self {
            CycleOutcome::Disabled | CycleOutcome::OutsideAllowedHours { .. } => CycleStage::Idle,
            CycleOutcome::Suppressed => CycleStage::Suppressed,
            CycleOutcome::NotificationEmitted(_) => CycleStage::NotificationEmitted,
            CycleOutcome::Failed { stage, .. } => *stage,
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Disabled => write!(f, "skipped: health checks are disabled"),
            CycleOutcome::OutsideAllowedHours { hour } => {
                write!(f, "skipped: hour {} is outside the allowed window", hour)
            }
            CycleOutcome::Suppressed => write!(f, "no notification needed"),
            CycleOutcome::NotificationEmitted(message) => write!(f, "notified: {}", message),
            CycleOutcome::Failed { stage, reason } => {
                write!(f, "failed after '{}': {}", stage, reason)
            }
        }
    }
}

pub struct HealthCheckScheduler {
    db: Database,
    provider: Arc<dyn HealthDataProvider>,
    analyzer: HealthAnalyzer,
    notifier: Notifier,
}

impl HealthCheckScheduler {
    pub fn new(
        db: Database,
        provider: Arc<dyn HealthDataProvider>,
        analyzer: HealthAnalyzer,
        notifier: Notifier,
    ) -> Self {
        Self {
            db,
            provider,
            analyzer,
            notifier,
        }
    }

    /// Run one cycle at the current local time
    pub async fn run_once(&self, force: bool) -> CycleOutcome {
        self.run_cycle_at(local_now(), force).await
    }

    /// Run one cycle as if the local time were `now`
    ///
    /// With `force` the enabled flag and the hour window are ignored.
    pub async fn run_cycle_at(&self, now: DateTime<FixedOffset>, force: bool) -> CycleOutcome {
        let outcome = self.cycle(now, force).await;
        match &outcome {
            CycleOutcome::Failed { .. } => error!("Health check {}", outcome),
            CycleOutcome::NotificationEmitted(_) => info!("Health check {}", outcome),
            _ => debug!("Health check {}", outcome),
        }
        outcome
    }

    async fn cycle(&self, now: DateTime<FixedOffset>, force: bool) -> CycleOutcome {
        let mut stage = CycleStage::Idle;

        if !force {
            let settings = match self
                .db
                .run_blocking(|db| db.notification_settings())
                .await
            {
                Ok(settings) => settings,
                Err(e) => return failed(stage, format!("reading settings: {}", e)),
            };
            if !settings.enabled {
                return CycleOutcome::Disabled;
            }
            let hour = now.hour();
            if !settings.allows_hour(hour) {
                return CycleOutcome::OutsideAllowedHours { hour };
            }
        }

        let range = TimeRange::last_hours(now.with_timezone(&Utc), WINDOW_HOURS);
        let window = match fetch_window(self.provider.as_ref(), range).await {
            Ok(window) => window,
            Err(e) => return failed(stage, format!("fetching health data: {}", e)),
        };
        stage = CycleStage::WindowFetched;
        debug!("Window holds {} samples", window.sample_count());

        let prompt = self.analyzer.build_prompt(&window, now);
        stage = CycleStage::Serialized;

        let response = match self.analyzer.query(&prompt).await {
            Ok(response) => response,
            Err(e) => return failed(stage, format!("querying model: {}", e)),
        };
        stage = CycleStage::ModelQueried;

        let Some(message) = parse_response(&response) else {
            return CycleOutcome::Suppressed;
        };

        match self.notifier.notify(&message).await {
            Ok(_) => CycleOutcome::NotificationEmitted(message),
            Err(e) => failed(stage, format!("showing notification: {}", e)),
        }
    }

    /// Run cycles until `shutdown` flips to `true`
    ///
    /// Settings are re-read after every cycle so a changed interval applies to
    /// the next sleep.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Health check scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_once(false).await;

            let interval = self.current_interval().await;
            debug!("Next health check in {:?}", interval);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Health check scheduler stopped");
    }

    async fn current_interval(&self) -> Duration {
        match self
            .db
            .run_blocking(|db| db.notification_settings())
            .await
        {
            Ok(settings) => settings.effective_interval(),
            Err(e) => {
                warn!("Failed to read settings, using default interval: {}", e);
                NotificationSettings::default().effective_interval()
            }
        }
    }
}

fn failed(stage: CycleStage, reason: String) -> CycleOutcome {
    CycleOutcome::Failed { stage, reason }
}

/// Current wall-clock time in the local offset
pub fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

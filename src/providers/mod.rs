//! Health data providers
//!
//! A provider answers time-ranged queries for each metric. `fetch_window` queries
//! every metric concurrently and joins the results into a `HealthWindow`.

pub mod file;
pub mod synthetic;

pub use file::FileProvider;
pub use synthetic::SyntheticProvider;

use crate::error::ProviderError;
use crate::samples::{
    BloodPressureSample, CaloriesSample, GlucoseSample, HealthWindow, HeartRateSample,
    OxygenSaturationSample, SleepSession, StepsSample, TimeRange,
};
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by provider queries
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Vec<T>, ProviderError>> + Send + 'a>>;

/// Source of health samples
pub trait HealthDataProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn read_steps<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, StepsSample>;

    fn read_heart_rate<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, HeartRateSample>;

    fn read_sleep<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, SleepSession>;

    fn read_calories<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, CaloriesSample>;

    fn read_blood_pressure<'a>(
        &'a self,
        range: TimeRange,
    ) -> ProviderFuture<'a, BloodPressureSample>;

    fn read_glucose<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, GlucoseSample>;

    fn read_oxygen_saturation<'a>(
        &'a self,
        range: TimeRange,
    ) -> ProviderFuture<'a, OxygenSaturationSample>;
}

/// Fetch every metric for `range` concurrently and build a window
///
/// A metric that fails is logged and left empty. If every metric fails the
/// first error is returned.
pub async fn fetch_window(
    provider: &dyn HealthDataProvider,
    range: TimeRange,
) -> Result<HealthWindow, ProviderError> {
    debug!(
        "Fetching health window from '{}' for {} .. {}",
        provider.name(),
        range.start,
        range.end
    );

    let (steps, heart_rate, sleep, calories, blood_pressure, glucose, oxygen_saturation) = tokio::join!(
        provider.read_steps(range),
        provider.read_heart_rate(range),
        provider.read_sleep(range),
        provider.read_calories(range),
        provider.read_blood_pressure(range),
        provider.read_glucose(range),
        provider.read_oxygen_saturation(range),
    );

    let mut first_error = None;
    let mut failures = 0;
    let mut window = HealthWindow::empty(range);

    window.steps = take_or_empty("steps", steps, &mut first_error, &mut failures);
    window.heart_rate = take_or_empty("heart_rate", heart_rate, &mut first_error, &mut failures);
    window.sleep = take_or_empty("sleep", sleep, &mut first_error, &mut failures);
    window.calories = take_or_empty("calories", calories, &mut first_error, &mut failures);
    window.blood_pressure =
        take_or_empty("blood_pressure", blood_pressure, &mut first_error, &mut failures);
    window.glucose = take_or_empty("glucose", glucose, &mut first_error, &mut failures);
    window.oxygen_saturation = take_or_empty(
        "oxygen_saturation",
        oxygen_saturation,
        &mut first_error,
        &mut failures,
    );

    if failures == METRIC_COUNT {
        if let Some(err) = first_error {
            return Err(err);
        }
    }

    debug!(
        "Fetched {} samples across all metrics ({} metrics failed)",
        window.sample_count(),
        failures
    );
    Ok(window)
}

const METRIC_COUNT: usize = 7;

fn take_or_empty<T>(
    metric: &str,
    result: Result<Vec<T>, ProviderError>,
    first_error: &mut Option<ProviderError>,
    failures: &mut usize,
) -> Vec<T> {
    match result {
        Ok(samples) => samples,
        Err(e) => {
            warn!("Failed to read {} samples: {}", metric, e);
            *failures += 1;
            if first_error.is_none() {
                *first_error = Some(e);
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// Provider whose every metric fails, optionally except heart rate
    struct FailingProvider {
        heart_rate_ok: bool,
    }

    fn fail<'a, T: Send + 'a>() -> ProviderFuture<'a, T> {
        Box::pin(async { Err(ProviderError::Unavailable("permission denied".to_string())) })
    }

    impl HealthDataProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn read_steps<'a>(&'a self, _range: TimeRange) -> ProviderFuture<'a, StepsSample> {
            fail()
        }

        fn read_heart_rate<'a>(
            &'a self,
            range: TimeRange,
        ) -> ProviderFuture<'a, HeartRateSample> {
            if self.heart_rate_ok {
                Box::pin(async move {
                    Ok(vec![HeartRateSample {
                        time: range.start,
                        bpm: 72,
                    }])
                })
            } else {
                fail()
            }
        }

        fn read_sleep<'a>(&'a self, _range: TimeRange) -> ProviderFuture<'a, SleepSession> {
            fail()
        }

        fn read_calories<'a>(&'a self, _range: TimeRange) -> ProviderFuture<'a, CaloriesSample> {
            fail()
        }

        fn read_blood_pressure<'a>(
            &'a self,
            _range: TimeRange,
        ) -> ProviderFuture<'a, BloodPressureSample> {
            fail()
        }

        fn read_glucose<'a>(&'a self, _range: TimeRange) -> ProviderFuture<'a, GlucoseSample> {
            fail()
        }

        fn read_oxygen_saturation<'a>(
            &'a self,
            _range: TimeRange,
        ) -> ProviderFuture<'a, OxygenSaturationSample> {
            fail()
        }
    }

    fn range() -> TimeRange {
        TimeRange::last_hours(Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap(), 24)
    }

    #[tokio::test]
    async fn test_partial_failure_still_produces_window() {
        let provider = FailingProvider {
            heart_rate_ok: true,
        };
        let window = fetch_window(&provider, range()).await.unwrap();
        assert_eq!(window.heart_rate.len(), 1);
        assert!(window.steps.is_empty());
        assert_eq!(window.range(), range());
    }

    #[tokio::test]
    async fn test_total_failure_returns_error() {
        let provider = FailingProvider {
            heart_rate_ok: false,
        };
        let result = fetch_window(&provider, range()).await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_synthetic_window_has_every_metric() {
        let provider = SyntheticProvider::new(7);
        let window = fetch_window(&provider, range()).await.unwrap();
        assert!(!window.steps.is_empty());
        assert!(!window.heart_rate.is_empty());
        assert!(!window.sleep.is_empty());
        assert!(!window.calories.is_empty());
        assert!(!window.blood_pressure.is_empty());
        assert!(!window.glucose.is_empty());
        assert!(!window.oxygen_saturation.is_empty());
    }
}

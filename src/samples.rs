//! Core health sample types
//!
//! This module defines the per-metric sample records a provider returns and the
//! `HealthWindow` bundle that a single health-check cycle works on.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Half-open time range `[start, end)` used when querying providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// The `hours` immediately preceding `end`
    pub fn last_hours(end: Timestamp, hours: i64) -> Self {
        Self {
            start: end - Duration::hours(hours),
            end,
        }
    }

    pub fn contains(&self, time: Timestamp) -> bool {
        time >= self.start && time < self.end
    }

    /// Whether an interval `[start, end)` overlaps this range
    pub fn overlaps(&self, start: Timestamp, end: Timestamp) -> bool {
        start < self.end && end > self.start
    }
}

/// Step count over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsSample {
    pub start: Timestamp,
    pub end: Timestamp,
    pub count: u32,
}

/// Instantaneous heart rate reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub time: Timestamp,
    pub bpm: u32,
}

/// Sleep stage classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStageKind {
    Awake,
    Light,
    Deep,
    Rem,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepStage {
    pub start: Timestamp,
    pub end: Timestamp,
    pub kind: SleepStageKind,
}

/// A single sleep session, optionally broken down into stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSession {
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(default)]
    pub stages: Vec<SleepStage>,
}

impl SleepSession {
    pub fn duration(&self) -> Duration {
        self.end.signed_duration_since(self.start)
    }

    /// Total minutes spent in the given stage
    pub fn minutes_in(&self, kind: SleepStageKind) -> i64 {
        self.stages
            .iter()
            .filter(|stage| stage.kind == kind)
            .map(|stage| stage.end.signed_duration_since(stage.start).num_minutes())
            .sum()
    }
}

/// Energy burned over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloriesSample {
    pub start: Timestamp,
    pub end: Timestamp,
    pub kilocalories: f64,
}

/// Blood pressure reading in mmHg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureSample {
    pub time: Timestamp,
    pub systolic: u32,
    pub diastolic: u32,
}

/// Blood glucose reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSample {
    pub time: Timestamp,
    pub mmol_per_l: f64,
}

/// Peripheral oxygen saturation reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OxygenSaturationSample {
    pub time: Timestamp,
    pub percent: f64,
}

/// Bundle of per-metric samples for one analysis cycle
///
/// A window is built once by a provider and never mutated afterwards. It is
/// not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(default)]
    pub steps: Vec<StepsSample>,
    #[serde(default)]
    pub heart_rate: Vec<HeartRateSample>,
    #[serde(default)]
    pub sleep: Vec<SleepSession>,
    #[serde(default)]
    pub calories: Vec<CaloriesSample>,
    #[serde(default)]
    pub blood_pressure: Vec<BloodPressureSample>,
    #[serde(default)]
    pub glucose: Vec<GlucoseSample>,
    #[serde(default)]
    pub oxygen_saturation: Vec<OxygenSaturationSample>,
}

impl HealthWindow {
    /// An empty window over the given range
    pub fn empty(range: TimeRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            steps: Vec::new(),
            heart_rate: Vec::new(),
            sleep: Vec::new(),
            calories: Vec::new(),
            blood_pressure: Vec::new(),
            glucose: Vec::new(),
            oxygen_saturation: Vec::new(),
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    pub fn total_steps(&self) -> u64 {
        self.steps.iter().map(|s| s.count as u64).sum()
    }

    pub fn total_kilocalories(&self) -> f64 {
        self.calories.iter().map(|c| c.kilocalories).sum()
    }

    pub fn total_sleep_hours(&self) -> f64 {
        self.sleep
            .iter()
            .map(|s| s.duration().num_minutes() as f64 / 60.0)
            .sum()
    }

    pub fn average_heart_rate(&self) -> Option<f64> {
        if self.heart_rate.is_empty() {
            return None;
        }
        let sum: u64 = self.heart_rate.iter().map(|h| h.bpm as u64).sum();
        Some(sum as f64 / self.heart_rate.len() as f64)
    }

    pub fn average_glucose(&self) -> Option<f64> {
        if self.glucose.is_empty() {
            return None;
        }
        let sum: f64 = self.glucose.iter().map(|g| g.mmol_per_l).sum();
        Some(sum / self.glucose.len() as f64)
    }

    pub fn latest_blood_pressure(&self) -> Option<&BloodPressureSample> {
        self.blood_pressure.iter().max_by_key(|bp| bp.time)
    }

    pub fn latest_oxygen_saturation(&self) -> Option<&OxygenSaturationSample> {
        self.oxygen_saturation.iter().max_by_key(|o| o.time)
    }

    pub fn sample_count(&self) -> usize {
        self.steps.len()
            + self.heart_rate.len()
            + self.sleep.len()
            + self.calories.len()
            + self.blood_pressure.len()
            + self.glucose.len()
            + self.oxygen_saturation.len()
    }
}

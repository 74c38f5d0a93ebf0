//! Health score computation
//!
//! Each metric maps to a 0-100 sub-score through fixed threshold bands. The
//! overall score is the rounded mean of the sub-scores that have data.

use crate::samples::HealthWindow;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DAILY_STEP_GOAL: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthScore {
    pub overall: Option<u8>,
    pub steps: Option<u8>,
    pub heart_rate: Option<u8>,
    pub sleep: Option<u8>,
    pub oxygen_saturation: Option<u8>,
    pub blood_pressure: Option<u8>,
    pub glucose: Option<u8>,
}

impl HealthScore {
    pub fn compute(window: &HealthWindow) -> Self {
        let steps = (!window.steps.is_empty()).then(|| steps_score(window.total_steps()));
        let heart_rate = window.average_heart_rate().map(heart_rate_score);
        let sleep = (!window.sleep.is_empty()).then(|| sleep_score(window.total_sleep_hours()));
        let oxygen_saturation = window
            .latest_oxygen_saturation()
            .map(|o| oxygen_score(o.percent));
        let blood_pressure = window
            .latest_blood_pressure()
            .map(|bp| blood_pressure_score(bp.systolic, bp.diastolic));
        let glucose = window.average_glucose().map(glucose_score);

        let parts: Vec<u32> = [
            steps,
            heart_rate,
            sleep,
            oxygen_saturation,
            blood_pressure,
            glucose,
        ]
        .iter()
        .flatten()
        .map(|s| *s as u32)
        .collect();

        let overall = if parts.is_empty() {
            None
        } else {
            let sum: u32 = parts.iter().sum();
            Some((sum as f64 / parts.len() as f64).round() as u8)
        };

        Self {
            overall,
            steps,
            heart_rate,
            sleep,
            oxygen_saturation,
            blood_pressure,
            glucose,
        }
    }
}

impl fmt::Display for HealthScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<u8>| v.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "overall={} steps={} heart_rate={} sleep={} spo2={} blood_pressure={} glucose={}",
            show(self.overall),
            show(self.steps),
            show(self.heart_rate),
            show(self.sleep),
            show(self.oxygen_saturation),
            show(self.blood_pressure),
            show(self.glucose)
        )
    }
}

fn steps_score(total: u64) -> u8 {
    (total.min(DAILY_STEP_GOAL) * 100 / DAILY_STEP_GOAL) as u8
}

fn heart_rate_score(avg_bpm: f64) -> u8 {
    if (60.0..=100.0).contains(&avg_bpm) {
        100
    } else if (50.0..60.0).contains(&avg_bpm) || (100.0..=110.0).contains(&avg_bpm) {
        70
    } else {
        40
    }
}

fn sleep_score(hours: f64) -> u8 {
    if (7.0..=9.0).contains(&hours) {
        100
    } else if (6.0..7.0).contains(&hours) || (9.0..=10.0).contains(&hours) {
        70
    } else {
        40
    }
}

fn oxygen_score(percent: f64) -> u8 {
    if percent >= 95.0 {
        100
    } else if percent >= 90.0 {
        60
    } else {
        20
    }
}

fn blood_pressure_score(systolic: u32, diastolic: u32) -> u8 {
    if systolic < 120 && diastolic < 80 {
        100
    } else if systolic < 130 && diastolic < 80 {
        80
    } else if systolic < 140 && diastolic < 90 {
        60
    } else {
        30
    }
}

fn glucose_score(mmol_per_l: f64) -> u8 {
    if (3.9..=7.8).contains(&mmol_per_l) {
        100
    } else {
        50
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{
        BloodPressureSample, HeartRateSample, OxygenSaturationSample, StepsSample, TimeRange,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn window() -> HealthWindow {
        let end = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        HealthWindow::empty(TimeRange::last_hours(end, 24))
    }

    #[test]
    fn test_empty_window_has_no_score() {
        let score = HealthScore::compute(&window());
        assert_eq!(score.overall, None);
        assert_eq!(score.steps, None);
    }

    #[test]
    fn test_steps_score_caps_at_goal() {
        assert_eq!(steps_score(0), 0);
        assert_eq!(steps_score(5_000), 50);
        assert_eq!(steps_score(25_000), 100);
    }

    #[test]
    fn test_threshold_bands() {
        assert_eq!(heart_rate_score(72.0), 100);
        assert_eq!(heart_rate_score(55.0), 70);
        assert_eq!(heart_rate_score(105.0), 70);
        assert_eq!(heart_rate_score(120.0), 40);

        assert_eq!(sleep_score(8.0), 100);
        assert_eq!(sleep_score(6.5), 70);
        assert_eq!(sleep_score(4.0), 40);

        assert_eq!(oxygen_score(97.0), 100);
        assert_eq!(oxygen_score(92.0), 60);
        assert_eq!(oxygen_score(85.0), 20);

        assert_eq!(blood_pressure_score(115, 75), 100);
        assert_eq!(blood_pressure_score(125, 75), 80);
        assert_eq!(blood_pressure_score(135, 85), 60);
        assert_eq!(blood_pressure_score(150, 95), 30);

        assert_eq!(glucose_score(5.5), 100);
        assert_eq!(glucose_score(9.0), 50);
    }

    #[test]
    fn test_overall_is_mean_of_available() {
        let mut w = window();
        let t = w.start + Duration::hours(1);
        w.steps.push(StepsSample {
            start: t,
            end: t + Duration::hours(1),
            count: 5_000,
        });
        w.heart_rate.push(HeartRateSample { time: t, bpm: 70 });
        w.oxygen_saturation.push(OxygenSaturationSample {
            time: t,
            percent: 92.0,
        });
        w.blood_pressure.push(BloodPressureSample {
            time: t,
            systolic: 150,
            diastolic: 95,
        });

        let score = HealthScore::compute(&w);
        // (50 + 100 + 60 + 30) / 4
        assert_eq!(score.overall, Some(60));
        assert_eq!(score.sleep, None);
        assert_eq!(score.glucose, None);
    }

    #[test]
    fn test_display() {
        let mut w = window();
        w.heart_rate.push(HeartRateSample {
            time: w.start,
            bpm: 70,
        });
        let text = HealthScore::compute(&w).to_string();
        assert_eq!(
            text,
            "overall=100 steps=- heart_rate=100 sleep=- spo2=- blood_pressure=- glucose=-"
        );
    }
}

use crate::providers::{HealthDataProvider, ProviderFuture};
use crate::samples::{
    BloodPressureSample, CaloriesSample, GlucoseSample, HeartRateSample, OxygenSaturationSample,
    SleepSession, SleepStage, SleepStageKind, StepsSample, TimeRange, Timestamp,
};
use chrono::{Duration, DurationRound, NaiveTime, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic generator of plausible health samples
///
/// Samples are derived from the seed and the queried time slots, so the same
/// seed always yields the same sample for a given slot. Used for demos and
/// for running without a real health data export.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// RNG for one metric at one time slot
    fn rng_for(&self, metric: u64, slot: Timestamp) -> StdRng {
        let mixed = self
            .seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(metric.wrapping_mul(1442695040888963407))
            ^ slot.timestamp() as u64;
        StdRng::seed_from_u64(mixed)
    }

    fn steps(&self, range: TimeRange) -> Vec<StepsSample> {
        slots(range, Duration::hours(1))
            .into_iter()
            .filter_map(|start| {
                let mut rng = self.rng_for(1, start);
                let count = if is_night(start) {
                    rng.gen_range(0..40)
                } else {
                    rng.gen_range(150..1600)
                };
                (count > 0).then(|| StepsSample {
                    start,
                    end: start + Duration::hours(1),
                    count,
                })
            })
            .collect()
    }

    fn heart_rate(&self, range: TimeRange) -> Vec<HeartRateSample> {
        slots(range, Duration::minutes(30))
            .into_iter()
            .map(|time| {
                let mut rng = self.rng_for(2, time);
                let bpm = if is_night(time) {
                    rng.gen_range(50..64)
                } else {
                    rng.gen_range(62..98)
                };
                HeartRateSample { time, bpm }
            })
            .collect()
    }

    fn sleep(&self, range: TimeRange) -> Vec<SleepSession> {
        let mut sessions = Vec::new();
        let first_day = range.start.date_naive() - Duration::days(1);
        let last_day = range.end.date_naive();
        let bedtime = NaiveTime::from_hms_opt(23, 0, 0).unwrap_or_default();

        let mut day = first_day;
        while day <= last_day {
            let start = Utc.from_utc_datetime(&day.and_time(bedtime));
            let mut rng = self.rng_for(3, start);
            let start = start + Duration::minutes(rng.gen_range(-45..45));
            let end = start + Duration::minutes(rng.gen_range(330..520));

            if range.overlaps(start, end) {
                sessions.push(SleepSession {
                    start,
                    end,
                    stages: sleep_stages(start, end),
                });
            }
            day += Duration::days(1);
        }
        sessions
    }

    fn calories(&self, range: TimeRange) -> Vec<CaloriesSample> {
        slots(range, Duration::hours(1))
            .into_iter()
            .map(|start| {
                let mut rng = self.rng_for(4, start);
                let base = if is_night(start) { 55.0 } else { 75.0 };
                CaloriesSample {
                    start,
                    end: start + Duration::hours(1),
                    kilocalories: round1(base + rng.gen_range(0.0..60.0)),
                }
            })
            .collect()
    }

    fn blood_pressure(&self, range: TimeRange) -> Vec<BloodPressureSample> {
        slots(range, Duration::hours(1))
            .into_iter()
            .filter(|time| time.hour() == 8 || time.hour() == 20)
            .map(|time| {
                let mut rng = self.rng_for(5, time);
                BloodPressureSample {
                    time,
                    systolic: rng.gen_range(108..138),
                    diastolic: rng.gen_range(68..90),
                }
            })
            .collect()
    }

    fn glucose(&self, range: TimeRange) -> Vec<GlucoseSample> {
        slots(range, Duration::hours(1))
            .into_iter()
            .filter(|time| matches!(time.hour(), 7 | 13 | 19))
            .map(|time| {
                let mut rng = self.rng_for(6, time);
                GlucoseSample {
                    time,
                    mmol_per_l: round1(rng.gen_range(4.4..7.6)),
                }
            })
            .collect()
    }

    fn oxygen_saturation(&self, range: TimeRange) -> Vec<OxygenSaturationSample> {
        slots(range, Duration::hours(2))
            .into_iter()
            .map(|time| {
                let mut rng = self.rng_for(7, time);
                OxygenSaturationSample {
                    time,
                    percent: round1(rng.gen_range(94.0..99.5)),
                }
            })
            .collect()
    }
}

impl HealthDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn read_steps<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, StepsSample> {
        Box::pin(async move { Ok(self.steps(range)) })
    }

    fn read_heart_rate<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, HeartRateSample> {
        Box::pin(async move { Ok(self.heart_rate(range)) })
    }

    fn read_sleep<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, SleepSession> {
        Box::pin(async move { Ok(self.sleep(range)) })
    }

    fn read_calories<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, CaloriesSample> {
        Box::pin(async move { Ok(self.calories(range)) })
    }

    fn read_blood_pressure<'a>(
        &'a self,
        range: TimeRange,
    ) -> ProviderFuture<'a, BloodPressureSample> {
        Box::pin(async move { Ok(self.blood_pressure(range)) })
    }

    fn read_glucose<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, GlucoseSample> {
        Box::pin(async move { Ok(self.glucose(range)) })
    }

    fn read_oxygen_saturation<'a>(
        &'a self,
        range: TimeRange,
    ) -> ProviderFuture<'a, OxygenSaturationSample> {
        Box::pin(async move { Ok(self.oxygen_saturation(range)) })
    }
}

/// Slot start times aligned to `step` that fall inside `range`
fn slots(range: TimeRange, step: Duration) -> Vec<Timestamp> {
    let mut time = range.start.duration_trunc(step).unwrap_or(range.start);
    let mut out = Vec::new();
    while time < range.end {
        if time >= range.start {
            out.push(time);
        }
        time += step;
    }
    out
}

fn is_night(time: Timestamp) -> bool {
    time.hour() < 7 || time.hour() >= 23
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Repeating light/deep/light/rem cycles of ~90 minutes
fn sleep_stages(start: Timestamp, end: Timestamp) -> Vec<SleepStage> {
    const PATTERN: [(SleepStageKind, i64); 4] = [
        (SleepStageKind::Light, 30),
        (SleepStageKind::Deep, 25),
        (SleepStageKind::Light, 15),
        (SleepStageKind::Rem, 20),
    ];

    let mut stages = Vec::new();
    let mut cursor = start;
    for (kind, minutes) in PATTERN.iter().cycle() {
        if cursor >= end {
            break;
        }
        let stage_end = (cursor + Duration::minutes(*minutes)).min(end);
        stages.push(SleepStage {
            start: cursor,
            end: stage_end,
            kind: *kind,
        });
        cursor = stage_end;
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> TimeRange {
        TimeRange::last_hours(Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap(), 24)
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = SyntheticProvider::new(42);
        let b = SyntheticProvider::new(42);
        assert_eq!(a.heart_rate(range()), b.heart_rate(range()));
        assert_eq!(a.steps(range()), b.steps(range()));
        assert_eq!(a.sleep(range()), b.sleep(range()));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = SyntheticProvider::new(1);
        let b = SyntheticProvider::new(2);
        assert_ne!(a.heart_rate(range()), b.heart_rate(range()));
    }

    #[test]
    fn test_samples_fall_inside_range() {
        let provider = SyntheticProvider::new(9);
        let r = range();
        assert!(provider.heart_rate(r).iter().all(|h| r.contains(h.time)));
        assert!(provider.glucose(r).iter().all(|g| r.contains(g.time)));
        assert!(provider
            .sleep(r)
            .iter()
            .all(|s| r.overlaps(s.start, s.end)));
    }

    #[test]
    fn test_slot_counts_for_full_day() {
        let provider = SyntheticProvider::new(3);
        assert_eq!(provider.heart_rate(range()).len(), 48);
        assert_eq!(provider.calories(range()).len(), 24);
        assert_eq!(provider.oxygen_saturation(range()).len(), 12);
        assert_eq!(provider.blood_pressure(range()).len(), 2);
        assert_eq!(provider.glucose(range()).len(), 3);
    }

    #[test]
    fn test_unaligned_range_start_skips_earlier_slot() {
        let start = Utc.with_ymd_and_hms(2026, 10, 15, 8, 30, 0).unwrap();
        let r = TimeRange::new(start, start + Duration::hours(2));
        let out = slots(r, Duration::hours(1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hour(), 9);
    }

    #[test]
    fn test_sleep_stages_cover_session() {
        let start = Utc.with_ymd_and_hms(2026, 10, 14, 23, 0, 0).unwrap();
        let end = start + Duration::minutes(400);
        let stages = sleep_stages(start, end);
        assert_eq!(stages.first().unwrap().start, start);
        assert_eq!(stages.last().unwrap().end, end);
        for pair in stages.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
}

//! Compact tabular serializer for health windows
//!
//! Produces a TOON-style text block: each metric is a header line naming the
//! row count and columns, followed by one indented comma-separated row per
//! sample. Column names are written once per metric instead of once per value,
//! which keeps prompts small.
//!
//! ```text
//! window{start,end,tz}: 10-14 12:00,10-15 12:00,+00:00
//! heart_rate[2]{time,bpm}:
//!   10-15 08:00,64
//!   10-15 08:30,70
//! glucose[0]
//! ```

use crate::samples::{HealthWindow, SleepStageKind, Timestamp};
use chrono::FixedOffset;
use std::fmt::Write;

/// Default number of rows kept per metric
pub const DEFAULT_MAX_ROWS: usize = 200;

/// Serializer converting a `HealthWindow` into compact text
#[derive(Debug, Clone)]
pub struct ToonSerializer {
    offset: FixedOffset,
    max_rows: usize,
}

impl ToonSerializer {
    /// Create a serializer that renders timestamps in `offset`
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Limit rows per metric; the most recent rows are kept
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    pub fn serialize(&self, window: &HealthWindow) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "window{{start,end,tz}}: {},{},{}",
            self.time(window.start),
            self.time(window.end),
            self.offset
        );

        let _ = writeln!(
            out,
            "summary{{steps,kcal,avg_bpm,sleep_h}}: {},{},{},{}",
            window.total_steps(),
            num(window.total_kilocalories()),
            window
                .average_heart_rate()
                .map(num)
                .unwrap_or_else(|| "-".to_string()),
            num(window.total_sleep_hours())
        );

        self.table(
            &mut out,
            "steps",
            "start,end,count",
            window.steps.iter().map(|s| s.start).collect(),
            window
                .steps
                .iter()
                .map(|s| format!("{},{},{}", self.time(s.start), self.end_time(s.start, s.end), s.count))
                .collect(),
        );

        self.table(
            &mut out,
            "heart_rate",
            "time,bpm",
            window.heart_rate.iter().map(|h| h.time).collect(),
            window
                .heart_rate
                .iter()
                .map(|h| format!("{},{}", self.time(h.time), h.bpm))
                .collect(),
        );

        self.table(
            &mut out,
            "sleep",
            "start,end,min,deep,rem,light,awake",
            window.sleep.iter().map(|s| s.start).collect(),
            window
                .sleep
                .iter()
                .map(|s| {
                    format!(
                        "{},{},{},{},{},{},{}",
                        self.time(s.start),
                        self.end_time(s.start, s.end),
                        s.duration().num_minutes(),
                        s.minutes_in(SleepStageKind::Deep),
                        s.minutes_in(SleepStageKind::Rem),
                        s.minutes_in(SleepStageKind::Light),
                        s.minutes_in(SleepStageKind::Awake)
                    )
                })
                .collect(),
        );

        self.table(
            &mut out,
            "calories",
            "start,end,kcal",
            window.calories.iter().map(|c| c.start).collect(),
            window
                .calories
                .iter()
                .map(|c| {
                    format!(
                        "{},{},{}",
                        self.time(c.start),
                        self.end_time(c.start, c.end),
                        num(c.kilocalories)
                    )
                })
                .collect(),
        );

        self.table(
            &mut out,
            "blood_pressure",
            "time,sys,dia",
            window.blood_pressure.iter().map(|bp| bp.time).collect(),
            window
                .blood_pressure
                .iter()
                .map(|bp| format!("{},{},{}", self.time(bp.time), bp.systolic, bp.diastolic))
                .collect(),
        );

        self.table(
            &mut out,
            "glucose",
            "time,mmol_l",
            window.glucose.iter().map(|g| g.time).collect(),
            window
                .glucose
                .iter()
                .map(|g| format!("{},{}", self.time(g.time), num(g.mmol_per_l)))
                .collect(),
        );

        self.table(
            &mut out,
            "oxygen_saturation",
            "time,pct",
            window.oxygen_saturation.iter().map(|o| o.time).collect(),
            window
                .oxygen_saturation
                .iter()
                .map(|o| format!("{},{}", self.time(o.time), num(o.percent)))
                .collect(),
        );

        out.trim_end().to_string()
    }

    /// Write one metric table, rows sorted by time and capped at `max_rows`
    fn table(
        &self,
        out: &mut String,
        name: &str,
        columns: &str,
        times: Vec<Timestamp>,
        rows: Vec<String>,
    ) {
        if rows.is_empty() {
            let _ = writeln!(out, "{}[0]", name);
            return;
        }

        let mut keyed: Vec<(Timestamp, String)> = times.into_iter().zip(rows).collect();
        keyed.sort_by_key(|(time, _)| *time);
        let skip = keyed.len().saturating_sub(self.max_rows);

        let _ = writeln!(out, "{}[{}]{{{}}}:", name, keyed.len() - skip, columns);
        for (_, row) in keyed.into_iter().skip(skip) {
            let _ = writeln!(out, "  {}", row);
        }
    }

    fn time(&self, time: Timestamp) -> String {
        time.with_timezone(&self.offset)
            .format("%m-%d %H:%M")
            .to_string()
    }

    /// End of an interval; the date is omitted when it matches the start
    fn end_time(&self, start: Timestamp, end: Timestamp) -> String {
        let start_local = start.with_timezone(&self.offset);
        let end_local = end.with_timezone(&self.offset);
        if start_local.date_naive() == end_local.date_naive() {
            end_local.format("%H:%M").to_string()
        } else {
            end_local.format("%m-%d %H:%M").to_string()
        }
    }
}

/// Render with at most one decimal, dropping a trailing `.0`
fn num(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{
        GlucoseSample, HeartRateSample, SleepSession, SleepStage, StepsSample, TimeRange,
    };
    use chrono::{Duration, TimeZone, Utc};
    use quickcheck_macros::quickcheck;

    fn at(day: u32, hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    fn utc() -> ToonSerializer {
        ToonSerializer::new(FixedOffset::east_opt(0).unwrap())
    }

    fn sample_window() -> HealthWindow {
        let mut window = HealthWindow::empty(TimeRange::new(at(14, 12, 0), at(15, 12, 0)));
        window.heart_rate.push(HeartRateSample {
            time: at(15, 8, 30),
            bpm: 70,
        });
        window.heart_rate.push(HeartRateSample {
            time: at(15, 8, 0),
            bpm: 64,
        });
        window.steps.push(StepsSample {
            start: at(15, 8, 0),
            end: at(15, 9, 0),
            count: 1200,
        });
        window.sleep.push(SleepSession {
            start: at(14, 23, 0),
            end: at(15, 6, 30),
            stages: vec![SleepStage {
                start: at(14, 23, 0),
                end: at(15, 0, 30),
                kind: SleepStageKind::Deep,
            }],
        });
        window.glucose.push(GlucoseSample {
            time: at(15, 7, 0),
            mmol_per_l: 5.25,
        });
        window
    }

    #[test]
    fn test_header_and_rows() {
        let text = utc().serialize(&sample_window());

        assert!(text.starts_with("window{start,end,tz}: 10-14 12:00,10-15 12:00,+00:00"));
        assert!(text.contains("summary{steps,kcal,avg_bpm,sleep_h}: 1200,0,67,7.5"));
        assert!(text.contains("heart_rate[2]{time,bpm}:\n  10-15 08:00,64\n  10-15 08:30,70"));
        assert!(text.contains("steps[1]{start,end,count}:\n  10-15 08:00,09:00,1200"));
        assert!(text.contains("sleep[1]{start,end,min,deep,rem,light,awake}:\n  10-14 23:00,10-15 06:30,450,90,0,0,0"));
        assert!(text.contains("glucose[1]{time,mmol_l}:\n  10-15 07:00,5.3"));
        assert!(text.contains("blood_pressure[0]"));
        assert!(text.contains("oxygen_saturation[0]"));
    }

    #[test]
    fn test_offset_shifts_timestamps() {
        let serializer = ToonSerializer::new(FixedOffset::east_opt(2 * 3600).unwrap());
        let text = serializer.serialize(&sample_window());
        assert!(text.contains("heart_rate[2]{time,bpm}:\n  10-15 10:00,64"));
        assert!(text.contains(",+02:00"));
    }

    #[test]
    fn test_max_rows_keeps_most_recent() {
        let mut window = HealthWindow::empty(TimeRange::new(at(15, 0, 0), at(15, 12, 0)));
        for hour in 0..10 {
            window.heart_rate.push(HeartRateSample {
                time: at(15, hour, 0),
                bpm: 60 + hour,
            });
        }
        let text = utc().with_max_rows(3).serialize(&window);
        assert!(text.contains("heart_rate[3]{time,bpm}:"));
        assert!(text.contains("10-15 09:00,69"));
        assert!(!text.contains("10-15 06:00,66"));
    }

    #[test]
    fn test_empty_window() {
        let window = HealthWindow::empty(TimeRange::new(at(14, 12, 0), at(15, 12, 0)));
        let text = utc().serialize(&window);
        assert!(text.contains("summary{steps,kcal,avg_bpm,sleep_h}: 0,0,-,0"));
        assert!(text.contains("steps[0]"));
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(2100.0), "2100");
        assert_eq!(num(97.46), "97.5");
        assert_eq!(num(0.0), "0");
    }

    // Header row counts always match the number of emitted rows
    #[quickcheck]
    fn prop_row_count_matches_header(bpms: Vec<u8>) -> bool {
        let base = at(15, 0, 0);
        let mut window = HealthWindow::empty(TimeRange::new(base, base + Duration::days(1)));
        for (i, bpm) in bpms.iter().enumerate() {
            window.heart_rate.push(HeartRateSample {
                time: base + Duration::minutes(i as i64),
                bpm: *bpm as u32,
            });
        }

        let text = utc().serialize(&window);
        let rows = text
            .lines()
            .skip_while(|line| !line.starts_with("heart_rate"))
            .skip(1)
            .take_while(|line| line.starts_with("  "))
            .count();

        let expected = bpms.len().min(DEFAULT_MAX_ROWS);
        let header = if expected == 0 {
            "heart_rate[0]".to_string()
        } else {
            format!("heart_rate[{}]{{time,bpm}}:", expected)
        };
        rows == expected && text.contains(&header)
    }
}

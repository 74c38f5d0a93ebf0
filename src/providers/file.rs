use crate::error::ProviderError;
use crate::providers::{HealthDataProvider, ProviderFuture};
use crate::samples::{
    BloodPressureSample, CaloriesSample, GlucoseSample, HeartRateSample, OxygenSaturationSample,
    SleepSession, StepsSample, TimeRange,
};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

/// Reads samples from a JSON health data export
///
/// The parsed export is cached and parsed again only when the file's
/// modification time or size changes, so an external exporter can keep the
/// file up to date while the daemon runs. Every metric list is optional.
///
/// ```json
/// {
///   "heart_rate": [{ "time": "2026-10-15T08:00:00Z", "bpm": 64 }],
///   "steps": [{ "start": "2026-10-15T08:00:00Z", "end": "2026-10-15T09:00:00Z", "count": 1200 }]
/// }
/// ```
#[derive(Debug)]
pub struct FileProvider {
    path: PathBuf,
    snapshot: Mutex<Option<Snapshot>>,
}

#[derive(Debug)]
struct Snapshot {
    modified: SystemTime,
    len: u64,
    export: Arc<HealthExport>,
}

#[derive(Debug, Default, Deserialize)]
struct HealthExport {
    #[serde(default)]
    steps: Vec<StepsSample>,
    #[serde(default)]
    heart_rate: Vec<HeartRateSample>,
    #[serde(default)]
    sleep: Vec<SleepSession>,
    #[serde(default)]
    calories: Vec<CaloriesSample>,
    #[serde(default)]
    blood_pressure: Vec<BloodPressureSample>,
    #[serde(default)]
    glucose: Vec<GlucoseSample>,
    #[serde(default)]
    oxygen_saturation: Vec<OxygenSaturationSample>,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: Mutex::new(None),
        }
    }

    async fn load(&self) -> Result<Arc<HealthExport>, ProviderError> {
        let unavailable =
            |e: std::io::Error| ProviderError::Unavailable(format!("{}: {}", self.path.display(), e));

        let metadata = tokio::fs::metadata(&self.path).await.map_err(unavailable)?;
        let modified = metadata.modified().map_err(unavailable)?;
        let len = metadata.len();

        // Held across the parse so concurrent metric reads share one load
        let mut snapshot = self.snapshot.lock().await;
        if let Some(current) = snapshot.as_ref() {
            if current.modified == modified && current.len == len {
                return Ok(Arc::clone(&current.export));
            }
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(unavailable)?;
        let export: HealthExport = serde_json::from_str(&text)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", self.path.display(), e)))?;
        debug!("Loaded health export from {}", self.path.display());

        let export = Arc::new(export);
        *snapshot = Some(Snapshot {
            modified,
            len,
            export: Arc::clone(&export),
        });
        Ok(export)
    }
}

impl HealthDataProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn read_steps<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, StepsSample> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .steps
                .iter()
                .filter(|s| range.overlaps(s.start, s.end))
                .cloned()
                .collect())
        })
    }

    fn read_heart_rate<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, HeartRateSample> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .heart_rate
                .iter()
                .filter(|h| range.contains(h.time))
                .cloned()
                .collect())
        })
    }

    fn read_sleep<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, SleepSession> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .sleep
                .iter()
                .filter(|s| range.overlaps(s.start, s.end))
                .cloned()
                .collect())
        })
    }

    fn read_calories<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, CaloriesSample> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .calories
                .iter()
                .filter(|c| range.overlaps(c.start, c.end))
                .cloned()
                .collect())
        })
    }

    fn read_blood_pressure<'a>(
        &'a self,
        range: TimeRange,
    ) -> ProviderFuture<'a, BloodPressureSample> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .blood_pressure
                .iter()
                .filter(|bp| range.contains(bp.time))
                .cloned()
                .collect())
        })
    }

    fn read_glucose<'a>(&'a self, range: TimeRange) -> ProviderFuture<'a, GlucoseSample> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .glucose
                .iter()
                .filter(|g| range.contains(g.time))
                .cloned()
                .collect())
        })
    }

    fn read_oxygen_saturation<'a>(
        &'a self,
        range: TimeRange,
    ) -> ProviderFuture<'a, OxygenSaturationSample> {
        Box::pin(async move {
            let export = self.load().await?;
            Ok(export
                .oxygen_saturation
                .iter()
                .filter(|o| range.contains(o.time))
                .cloned()
                .collect())
        })
    }
}

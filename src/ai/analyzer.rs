use crate::ai::backends::TextGenerator;
use crate::error::AnalysisError;
use crate::samples::HealthWindow;
use crate::score::HealthScore;
use crate::serializer::ToonSerializer;
use chrono::{DateTime, FixedOffset};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Model reply meaning "nothing to tell the user"
pub const NO_NOTIFICATION: &str = "NO_NOTIFICATION";

/// Opening marker of a notification payload
pub const NOTIFICATION_MARKER: &str = "[NOTIFICATION:";

/// Longest message length requested from the model
pub const REQUESTED_MESSAGE_CHARS: usize = 100;

/// Hard cap applied to extracted messages
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Longest plain response accepted when the model ignores the contract
pub const FALLBACK_MAX_CHARS: usize = 150;

/// Profile fields embedded in the analysis prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub goals: Option<String>,
}

impl UserProfile {
    pub(crate) fn describe(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "- Name: {}",
            if self.name.is_empty() { "unknown" } else { &self.name }
        ));
        if let Some(age) = self.age {
            lines.push(format!("- Age: {}", age));
        }
        if let Some(ref sex) = self.sex {
            lines.push(format!("- Sex: {}", sex));
        }
        if let Some(height) = self.height_cm {
            lines.push(format!("- Height: {:.0} cm", height));
        }
        if let Some(weight) = self.weight_kg {
            lines.push(format!("- Weight: {:.1} kg", weight));
        }
        if let Some(ref goals) = self.goals {
            lines.push(format!("- Goals: {}", goals));
        }
        lines.join("\n")
    }
}

/// Builds health-check prompts, queries the model and interprets its reply
pub struct HealthAnalyzer {
    backend: Arc<dyn TextGenerator>,
    profile: UserProfile,
}

impl HealthAnalyzer {
    pub fn new(backend: Arc<dyn TextGenerator>, profile: UserProfile) -> Self {
        Self { backend, profile }
    }

    /// Serialize the window and the user context into the analysis prompt
    ///
    /// Timestamps in the data tables are rendered in `now`'s offset so the
    /// model sees the same clock as the "current time" line.
    pub fn build_prompt(&self, window: &HealthWindow, now: DateTime<FixedOffset>) -> String {
        let score = HealthScore::compute(window);
        let data = ToonSerializer::new(*now.offset()).serialize(window);

        format!(
            r#"You are a proactive personal health assistant. Review the user's last 24 hours of health data and decide whether a short notification would genuinely help them right now.

User profile:
{}

Current local time: {}
Health score (0-100 per metric, "-" means no data): {}

Health data (compact tables: `name[rows]{{columns}}:` followed by one row per sample):
{}

Rules:
- Only notify about something actionable or noteworthy for this user at this time of day, such as low activity, an unusual heart rate, poor sleep, low oxygen saturation or elevated blood pressure.
- Be specific to the data. Do not give generic advice.
- Respond with exactly one of the following and nothing else:
[NOTIFICATION: <message of at most {} characters>]
{}"#,
            self.profile.describe(),
            now.format("%Y-%m-%d %H:%M (%A)"),
            score,
            data,
            REQUESTED_MESSAGE_CHARS,
            NO_NOTIFICATION
        )
    }

    /// Send a prompt to the backend and return its raw text
    pub async fn query(&self, prompt: &str) -> Result<String, AnalysisError> {
        let start_time = Instant::now();
        debug!(
            "Querying '{}' backend with a {} character prompt",
            self.backend.name(),
            prompt.len()
        );

        let result = self.backend.generate(prompt).await;
        let duration = start_time.elapsed();

        match &result {
            Ok(text) => info!(
                "Model responded in {:?} ({} characters)",
                duration,
                text.len()
            ),
            Err(e) => warn!("Model query failed after {:?}: {}", duration, e),
        }

        result
    }
}

/// Interpret a model reply
///
/// Returns the notification text or `None`:
/// 1. anything containing `NO_NOTIFICATION` yields `None`;
/// 2. `[NOTIFICATION: text]` yields `text`, trimmed and capped. A payload whose
///    closing bracket is missing yields `None`;
/// 3. otherwise a short plain reply without any `[` is accepted as-is.
pub fn parse_response(response: &str) -> Option<String> {
    let text = response.trim();

    if text.contains(NO_NOTIFICATION) {
        return None;
    }

    if let Some(start) = text.find(NOTIFICATION_MARKER) {
        let payload_start = start + NOTIFICATION_MARKER.len();
        let Some(len) = text[payload_start..].find(']') else {
            debug!("Notification payload has no closing bracket, discarding");
            return None;
        };
        let payload = text[payload_start..payload_start + len].trim();
        if payload.is_empty() {
            return None;
        }
        return Some(truncate_text(payload, MAX_MESSAGE_CHARS));
    }

    if !text.is_empty() && !text.contains('[') && text.chars().count() <= FALLBACK_MAX_CHARS {
        debug!("Model ignored the response format, using plain reply as notification");
        return Some(text.to_string());
    }

    None
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::backends::MockBackend;
    use crate::samples::{HeartRateSample, TimeRange};
    use chrono::{TimeZone, Utc};
    use quickcheck_macros::quickcheck;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 16, 14, 5, 0)
            .unwrap()
    }

    fn window() -> HealthWindow {
        let end = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let mut window = HealthWindow::empty(TimeRange::last_hours(end, 24));
        window.heart_rate.push(HeartRateSample {
            time: Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(),
            bpm: 118,
        });
        window
    }

    fn profile() -> UserProfile {
        UserProfile {
            name: "Sam".to_string(),
            age: Some(34),
            goals: Some("Sleep more".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_notification_sentinel() {
        assert_eq!(parse_response("NO_NOTIFICATION"), None);
        assert_eq!(parse_response("  NO_NOTIFICATION\n"), None);
        assert_eq!(parse_response("I think NO_NOTIFICATION is best."), None);
    }

    #[test]
    fn test_bracketed_notification_is_extracted_verbatim() {
        assert_eq!(
            parse_response("[NOTIFICATION: Drink water]"),
            Some("Drink water".to_string())
        );
        assert_eq!(
            parse_response("Sure!\n[NOTIFICATION:   Take a short walk, you've been still since noon.  ]\n"),
            Some("Take a short walk, you've been still since noon.".to_string())
        );
    }

    // Current behaviour: a payload missing its closing bracket is dropped
    #[test]
    fn test_missing_closing_bracket_yields_nothing() {
        assert_eq!(parse_response("[NOTIFICATION: Drink water"), None);
    }

    #[test]
    fn test_empty_payload_yields_nothing() {
        assert_eq!(parse_response("[NOTIFICATION:   ]"), None);
    }

    #[test]
    fn test_long_payload_is_truncated() {
        let long = "a".repeat(300);
        let message = parse_response(&format!("[NOTIFICATION: {}]", long)).unwrap();
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_short_plain_reply_fallback() {
        assert_eq!(
            parse_response("Your resting heart rate is elevated today."),
            Some("Your resting heart rate is elevated today.".to_string())
        );
    }

    #[test]
    fn test_fallback_rejects_long_or_bracketed_replies() {
        assert_eq!(parse_response(&"word ".repeat(40)), None);
        assert_eq!(parse_response("[ALERT] something odd"), None);
        assert_eq!(parse_response("   "), None);
    }

    #[test]
    fn test_truncate_text_respects_char_boundaries() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_text("🙂🙂🙂🙂🙂", 4), "🙂...");
    }

    #[test]
    fn test_prompt_contents() {
        let analyzer = HealthAnalyzer::new(Arc::new(MockBackend::silent()), profile());
        let prompt = analyzer.build_prompt(&window(), now());

        assert!(prompt.contains("- Name: Sam"));
        assert!(prompt.contains("- Age: 34"));
        assert!(prompt.contains("- Goals: Sleep more"));
        assert!(prompt.contains("Current local time: 2026-10-16 14:05 (Friday)"));
        assert!(prompt.contains("heart_rate=40"));
        // 08:00 UTC rendered at +02:00
        assert!(prompt.contains("heart_rate[1]{time,bpm}:\n  10-16 10:00,118"));
        assert!(prompt.contains("[NOTIFICATION: <message of at most 100 characters>]"));
        assert!(prompt.trim_end().ends_with(NO_NOTIFICATION));
    }

    #[test]
    fn test_profile_without_name() {
        let text = UserProfile::default().describe();
        assert_eq!(text, "- Name: unknown");
    }

    #[tokio::test]
    async fn test_query_and_parse_notification() {
        let backend = MockBackend::with_text("[NOTIFICATION: Your heart rate spiked to 118 bpm this morning]");
        let analyzer = HealthAnalyzer::new(Arc::new(backend.clone()), profile());

        let prompt = analyzer.build_prompt(&window(), now());
        let raw = analyzer.query(&prompt).await.unwrap();
        assert_eq!(
            parse_response(&raw).as_deref(),
            Some("Your heart rate spiked to 118 bpm this morning")
        );
        assert_eq!(backend.call_count(), 1);
        assert!(backend.last_prompt().unwrap().contains("Health score"));
    }

    #[tokio::test]
    async fn test_query_propagates_backend_error() {
        let analyzer = HealthAnalyzer::new(Arc::new(MockBackend::timeout()), profile());
        let result = analyzer.query("prompt").await;
        assert_eq!(result.unwrap_err(), AnalysisError::Timeout);
    }

    // Parsing arbitrary text never panics and never yields an over-long message
    #[quickcheck]
    fn prop_parse_is_total_and_bounded(text: String) -> bool {
        match parse_response(&text) {
            Some(message) => {
                !message.is_empty() && message.chars().count() <= MAX_MESSAGE_CHARS
            }
            None => true,
        }
    }

    #[quickcheck]
    fn prop_bracketed_payload_round_trips(payload: String) -> bool {
        let clean: String = payload
            .chars()
            .filter(|c| *c != ']' && *c != '[' && !c.is_control())
            .take(REQUESTED_MESSAGE_CHARS)
            .collect();
        let expected = clean.trim();
        if expected.is_empty() || expected.contains(NO_NOTIFICATION) {
            return true;
        }
        parse_response(&format!("[NOTIFICATION: {}]", clean)).as_deref() == Some(expected)
    }
}

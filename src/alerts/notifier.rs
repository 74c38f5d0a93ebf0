use crate::ai::analyzer::truncate_text;
use crate::error::NotifyError;
use crate::store::{Database, HistoryEntry};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;

/// Notification title shown for every health check
pub const NOTIFICATION_TITLE: &str = "Health Check";

/// History category attached to health-check notifications
pub const HEALTH_CHECK_CATEGORY: &str = "health_check";

const MAX_BODY_CHARS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    Default,
    High,
}

/// Delivery channel a notification is posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: &'static str,
    pub name: &'static str,
    pub importance: Importance,
}

pub const HEALTH_CHECK_CHANNEL: NotificationChannel = NotificationChannel {
    id: "health_check_channel",
    name: "Health Alerts",
    importance: Importance::High,
};

/// Something that can put a notification in front of the user
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn show(
        &self,
        channel: &NotificationChannel,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

/// Native desktop notifications through `notify-rust`
#[derive(Debug, Default)]
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn show(
        &self,
        channel: &NotificationChannel,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let mut notification = notify_rust::Notification::new();
        notification
            .summary(title)
            .body(body)
            .appname(channel.name);

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let urgency = match channel.importance {
                Importance::High => notify_rust::Urgency::Critical,
                Importance::Default => notify_rust::Urgency::Normal,
            };
            notification.urgency(urgency).hint(notify_rust::Hint::Category(
                channel.id.to_string(),
            ));
        }

        notification
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::NotificationFailed(e.to_string()))
    }
}

/// Sink that only writes the notification to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn show(
        &self,
        channel: &NotificationChannel,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        info!("[{}] {}: {}", channel.id, title, body);
        Ok(())
    }
}

/// Shows health-check notifications and records them in the history table
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    db: Database,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, db: Database) -> Self {
        Self { sink, db }
    }

    /// Show `message` and then record it
    ///
    /// Only a failure to show is returned. The history write runs on the
    /// blocking pool and its failure is logged; the returned entry is `None`
    /// in that case.
    pub async fn notify(&self, message: &str) -> Result<Option<HistoryEntry>, NotifyError> {
        let body = truncate_text(message, MAX_BODY_CHARS);

        if let Err(e) = self
            .sink
            .show(&HEALTH_CHECK_CHANNEL, NOTIFICATION_TITLE, &body)
        {
            error!("Failed to show notification: {}", e);
            return Err(e);
        }
        info!("Sent notification: {}", body);

        let recorded = self
            .db
            .run_blocking(move |db| {
                db.record_notification(&body, Some(HEALTH_CHECK_CATEGORY), Utc::now())
            })
            .await;

        match recorded {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Failed to record notification history: {}", e);
                Ok(None)
            }
        }
    }
}

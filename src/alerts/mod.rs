/// Desktop notifications and notification history
pub mod notifier;

pub use notifier::{
    DesktopSink, LogSink, NotificationChannel, NotificationSink, Notifier, HEALTH_CHECK_CHANNEL,
};

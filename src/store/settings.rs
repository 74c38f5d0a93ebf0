use crate::error::StoreError;
use crate::store::Database;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Primary key of the singleton settings row
pub const SETTINGS_ROW_ID: &str = "settings";

/// Lower bound for the check interval
pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 15;

/// User-controlled health-check notification settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    /// First hour (0-23) in which checks may run
    pub start_hour: u8,
    /// Hour (0-23) at which the allowed window closes
    pub end_hour: u8,
    /// Honour windows that wrap past midnight
    pub allow_overnight: bool,
    /// Requested interval; see `effective_interval_minutes`
    pub check_interval_minutes: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 8,
            end_hour: 22,
            allow_overnight: false,
            check_interval_minutes: 60,
        }
    }
}

impl NotificationSettings {
    /// Interval actually used by the scheduler, never below 15 minutes
    pub fn effective_interval_minutes(&self) -> u32 {
        self.check_interval_minutes.max(MIN_CHECK_INTERVAL_MINUTES)
    }

    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.effective_interval_minutes() as u64 * 60)
    }

    /// Whether a check may run during `hour` (0-23)
    ///
    /// `start == end` allows the whole day. A window with `start > end` wraps
    /// past midnight when `allow_overnight` is set; otherwise it stops at
    /// midnight.
    pub fn allows_hour(&self, hour: u32) -> bool {
        let start = self.start_hour as u32;
        let end = self.end_hour as u32;

        if start == end {
            true
        } else if start < end {
            hour >= start && hour < end
        } else if self.allow_overnight {
            hour >= start || hour < end
        } else {
            hour >= start
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start_hour > 23 {
            return Err(format!("start_hour must be 0-23, got {}", self.start_hour));
        }
        if self.end_hour > 23 {
            return Err(format!("end_hour must be 0-23, got {}", self.end_hour));
        }
        if self.check_interval_minutes == 0 {
            return Err("check_interval_minutes must be positive".to_string());
        }
        Ok(())
    }
}

impl Database {
    /// Stored settings, or defaults when the row has never been written
    pub fn notification_settings(&self) -> Result<NotificationSettings, StoreError> {
        Ok(self.stored_notification_settings()?.unwrap_or_default())
    }

    pub fn stored_notification_settings(
        &self,
    ) -> Result<Option<NotificationSettings>, StoreError> {
        self.with_conn(|conn| {
            let settings = conn
                .query_row(
                    "SELECT enabled, start_hour, end_hour, allow_overnight, check_interval_minutes
                     FROM notification_settings WHERE id = ?1",
                    [SETTINGS_ROW_ID],
                    |row| {
                        Ok(NotificationSettings {
                            enabled: row.get(0)?,
                            start_hour: row.get(1)?,
                            end_hour: row.get(2)?,
                            allow_overnight: row.get(3)?,
                            check_interval_minutes: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(settings)
        })
    }

    /// Upsert the singleton settings row
    pub fn save_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_settings
                    (id, enabled, start_hour, end_hour, allow_overnight, check_interval_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    enabled = excluded.enabled,
                    start_hour = excluded.start_hour,
                    end_hour = excluded.end_hour,
                    allow_overnight = excluded.allow_overnight,
                    check_interval_minutes = excluded.check_interval_minutes",
                params![
                    SETTINGS_ROW_ID,
                    settings.enabled,
                    settings.start_hour,
                    settings.end_hour,
                    settings.allow_overnight,
                    settings.check_interval_minutes
                ],
            )?;
            Ok(())
        })
    }

    /// Write `defaults` only if no settings row exists yet
    ///
    /// Returns the settings now in effect.
    pub fn seed_notification_settings(
        &self,
        defaults: &NotificationSettings,
    ) -> Result<NotificationSettings, StoreError> {
        match self.stored_notification_settings()? {
            Some(existing) => Ok(existing),
            None => {
                self.save_notification_settings(defaults)?;
                Ok(*defaults)
            }
        }
    }
}

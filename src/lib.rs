/// Error types for every layer
pub mod error;

/// Health sample types and the 24-hour window
pub mod samples;

/// Health data providers
pub mod providers;

/// Compact tabular serialization of a health window
pub mod serializer;

/// Per-metric health score
pub mod score;

/// Analysis service and text generation backends
pub mod ai;

/// SQLite store for chat, settings and notification history
pub mod store;

/// Desktop notifications
pub mod alerts;

/// Periodic health-check cycle
pub mod scheduler;

/// Health assistant chat
pub mod chat;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{AnalysisError, ChatError, ConfigError, NotifyError, ProviderError, StoreError};
pub use scheduler::{CycleOutcome, CycleStage, HealthCheckScheduler};

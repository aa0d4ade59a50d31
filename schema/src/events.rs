//! Lifecycle event types emitted by the supervisor engine
//!
//! Events are delivered synchronously to registered listeners and can be
//! serialized for control channels or structured logs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Events emitted as a service moves through its lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ServiceEvent {
    /// Service reached the started state
    Started,
    /// Service reached the stopped state
    Stopped,
    /// Service failed to start
    FailedStart,
    /// A start in progress (or a pending restart) was cancelled
    StartCancelled,
    /// A stop in progress was cancelled
    StopCancelled,
}

/// Severity level of an event, for filtering and alerting
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum EventSeverity {
    /// Informational events
    Info,
    /// Conditions worth attention but not failures
    Warning,
    /// Failure conditions
    Error,
}

impl ServiceEvent {
    /// Get the severity level for this event
    #[must_use]
    pub fn severity(&self) -> EventSeverity {
        match self {
            ServiceEvent::Started | ServiceEvent::Stopped => EventSeverity::Info,
            ServiceEvent::StartCancelled | ServiceEvent::StopCancelled => EventSeverity::Warning,
            ServiceEvent::FailedStart => EventSeverity::Error,
        }
    }
}

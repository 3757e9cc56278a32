// MIT License - Copyright (c) 2026 Peter Wright
// Event stream

use serde::Serialize;
use tracing::{debug, error, warn};

/// Arm mode carried by the partition-armed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmMode {
    #[serde(rename = "AWAY")]
    Away,
    #[serde(rename = "STAY")]
    Stay,
    #[serde(rename = "ZERO-ENTRY-AWAY")]
    ZeroEntryAway,
    #[serde(rename = "ZERO-ENTRY-STAY")]
    ZeroEntryStay,
}

impl ArmMode {
    /// Map the mode digit. Anything other than 0-2 is zero-entry stay.
    pub fn from_code(code: &str) -> Self {
        match code {
            "0" => Self::Away,
            "1" => Self::Stay,
            "2" => Self::ZeroEntryAway,
            _ => Self::ZeroEntryStay,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Away => "AWAY",
            Self::Stay => "STAY",
            Self::ZeroEntryAway => "ZERO-ENTRY-AWAY",
            Self::ZeroEntryStay => "ZERO-ENTRY-STAY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneUpdate {
    pub zone: u32,
    pub code: String,
    pub status: String,
    pub initial_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionUpdate {
    pub partition: u32,
    pub code: String,
    /// Raw mode digit, only on the partition-armed frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ArmMode>,
    pub status: String,
    pub initial_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionUserUpdate {
    pub partition: u32,
    pub code: String,
    pub user: u32,
    pub status: String,
    pub initial_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemUpdate {
    pub code: String,
    pub status: String,
}

/// All events emitted by a TPI session, in processing order.
///
/// Users subscribe via `client.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<TpiEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpiEvent {
    /// Panel accepted the password
    Connected,
    /// Socket closed by either side
    Disconnected,
    /// Transport-level failure
    Error(String),
    LogDebug(String),
    LogWarn(String),
    LogError(String),
    ZoneUpdate(ZoneUpdate),
    PartitionUpdate(PartitionUpdate),
    PartitionUserUpdate(PartitionUserUpdate),
    SystemUpdate(SystemUpdate),
}

impl TpiEvent {
    /// The event surface name, e.g. `zoneupdate` or `log-debug`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnect",
            Self::Error(_) => "error",
            Self::LogDebug(_) => "log-debug",
            Self::LogWarn(_) => "log-warn",
            Self::LogError(_) => "log-error",
            Self::ZoneUpdate(_) => "zoneupdate",
            Self::PartitionUpdate(_) => "partitionupdate",
            Self::PartitionUserUpdate(_) => "partitionuserupdate",
            Self::SystemUpdate(_) => "systemupdate",
        }
    }

    /// Whether this is the first sighting of its entity since connect.
    ///
    /// System updates never count as initial.
    pub fn is_initial_update(&self) -> bool {
        match self {
            Self::ZoneUpdate(u) => u.initial_update,
            Self::PartitionUpdate(u) => u.initial_update,
            Self::PartitionUserUpdate(u) => u.initial_update,
            _ => false,
        }
    }
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<TpiEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<TpiEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}

/// Publish an event, mirroring log events into `tracing`.
///
/// Having no subscribers is not an error.
pub fn emit(tx: &EventSender, event: TpiEvent) {
    match &event {
        TpiEvent::LogDebug(text) => debug!("{}", text),
        TpiEvent::LogWarn(text) => warn!("{}", text),
        TpiEvent::LogError(text) => error!("{}", text),
        TpiEvent::Error(text) => error!("Transport error: {}", text),
        other => debug!("Event: {}", other.name()),
    }
    let _ = tx.send(event);
}

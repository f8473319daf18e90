//! Control messages accepted by the orchestrator and notifications it emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::CycleReport;
use crate::models::timestamp;

/// Where to sync and from which watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTarget {
    #[serde(alias = "endpointUrl")]
    pub endpoint: String,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncTarget {
    pub fn new(endpoint: impl Into<String>, last_sync: Option<DateTime<Utc>>) -> Self {
        Self {
            endpoint: endpoint.into(),
            last_sync,
        }
    }
}

/// A control message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncCommand {
    /// Sync now, then keep syncing on the interval
    Start(SyncTarget),
    /// Sync exactly once
    Once(SyncTarget),
    /// Cancel the next scheduled cycle
    Pause,
}

impl SyncCommand {
    pub fn start(endpoint: impl Into<String>, last_sync: Option<DateTime<Utc>>) -> Self {
        Self::Start(SyncTarget::new(endpoint, last_sync))
    }

    pub fn once(endpoint: impl Into<String>, last_sync: Option<DateTime<Utc>>) -> Self {
        Self::Once(SyncTarget::new(endpoint, last_sync))
    }

    /// Parse a JSON control message. Unknown or malformed messages yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => Self::from_value(value),
            Err(error) => {
                debug!("Ignoring control message that is not JSON: {error}");
                None
            }
        }
    }

    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value::<Self>(value) {
            Ok(Self::Start(target) | Self::Once(target)) if target.endpoint.trim().is_empty() => {
                debug!("Ignoring control message without an endpoint");
                None
            }
            Ok(command) => Some(command),
            Err(error) => {
                debug!("Ignoring unrecognized control message: {error}");
                None
            }
        }
    }

    pub const fn target(&self) -> Option<&SyncTarget> {
        match self {
            Self::Start(target) | Self::Once(target) => Some(target),
            Self::Pause => None,
        }
    }
}

/// Notification sent from the orchestrator to its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SyncEvent {
    /// The pull phase succeeded; persist this watermark
    LastSync {
        #[serde(rename = "lastSync", with = "timestamp")]
        last_sync: DateTime<Utc>,
    },
    CycleFinished(CycleReport),
}

impl SyncEvent {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

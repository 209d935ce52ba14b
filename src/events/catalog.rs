//! Event catalog
//!
//! The closed set of events the hub can push to clients. Every payload carries
//! the wall-clock time at which the event was generated, serialized as
//! RFC3339, and uses camelCase field names on the wire.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire name of an event, sent as the envelope's `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    DownloadCountUpdate,
    UploadProgress,
    UploadComplete,
    UploadError,
    FileDeleted,
    FileShared,
    ShareDeleted,
    SystemStatsUpdate,
    UserStatsUpdate,
    Notification,
    ConnectionStatus,
}

impl EventType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DownloadCountUpdate => "download-count-update",
            EventType::UploadProgress => "upload-progress",
            EventType::UploadComplete => "upload-complete",
            EventType::UploadError => "upload-error",
            EventType::FileDeleted => "file-deleted",
            EventType::FileShared => "file-shared",
            EventType::ShareDeleted => "share-deleted",
            EventType::SystemStatsUpdate => "system-stats-update",
            EventType::UserStatsUpdate => "user-stats-update",
            EventType::Notification => "notification",
            EventType::ConnectionStatus => "connection-status",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A share link was downloaded
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCountUpdate {
    pub file_id: String,
    pub share_id: String,
    pub count: u64,
    pub timestamp: DateTime<Utc>,
}

/// Bytes received so far for an in-flight upload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_id: String,
    pub file_name: String,
    /// Percentage in `0.0..=100.0`
    pub progress: f64,
    pub bytes_total: u64,
    pub bytes_sent: u64,
    pub timestamp: DateTime<Utc>,
}

impl UploadProgress {
    /// Percentage of `bytes_total` covered by `bytes_sent`, clamped to 0–100
    pub fn percent(bytes_sent: u64, bytes_total: u64) -> f64 {
        if bytes_total == 0 {
            return 0.0;
        }
        (bytes_sent as f64 / bytes_total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadComplete {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
    /// Content already existed and was deduplicated
    pub is_duplicate: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadError {
    pub file_id: String,
    pub file_name: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDeleted {
    pub file_id: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileShared {
    pub file_id: String,
    pub file_name: String,
    pub share_id: String,
    pub share_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDeleted {
    pub share_id: String,
    pub file_id: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate figures shown on the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: u64,
    pub total_files: u64,
    /// Bytes on disk after deduplication
    pub total_storage: u64,
    pub unique_files: u64,
    pub duplicate_files: u64,
    /// Percentage of storage saved by deduplication
    pub storage_efficiency: f64,
    pub active_users: u64,
    pub new_users_today: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatsUpdate {
    #[serde(flatten)]
    pub stats: SystemStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsUpdate {
    pub user_id: String,
    pub total_files: u64,
    pub storage_used: u64,
    pub timestamp: DateTime<Utc>,
}

/// Severity class of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Auto-dismiss delay in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// State of the real-time channel as reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub status: ConnectionState,
    pub timestamp: DateTime<Utc>,
}

/// One event with its payload; the variant fixes the wire `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    DownloadCountUpdate(DownloadCountUpdate),
    UploadProgress(UploadProgress),
    UploadComplete(UploadComplete),
    UploadError(UploadError),
    FileDeleted(FileDeleted),
    FileShared(FileShared),
    ShareDeleted(ShareDeleted),
    SystemStatsUpdate(SystemStatsUpdate),
    UserStatsUpdate(UserStatsUpdate),
    Notification(Notification),
    ConnectionStatus(ConnectionStatus),
}

impl Event {
    /// Catalog type of this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::DownloadCountUpdate(_) => EventType::DownloadCountUpdate,
            Event::UploadProgress(_) => EventType::UploadProgress,
            Event::UploadComplete(_) => EventType::UploadComplete,
            Event::UploadError(_) => EventType::UploadError,
            Event::FileDeleted(_) => EventType::FileDeleted,
            Event::FileShared(_) => EventType::FileShared,
            Event::ShareDeleted(_) => EventType::ShareDeleted,
            Event::SystemStatsUpdate(_) => EventType::SystemStatsUpdate,
            Event::UserStatsUpdate(_) => EventType::UserStatsUpdate,
            Event::Notification(_) => EventType::Notification,
            Event::ConnectionStatus(_) => EventType::ConnectionStatus,
        }
    }

    /// When the event was generated
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::DownloadCountUpdate(e) => e.timestamp,
            Event::UploadProgress(e) => e.timestamp,
            Event::UploadComplete(e) => e.timestamp,
            Event::UploadError(e) => e.timestamp,
            Event::FileDeleted(e) => e.timestamp,
            Event::FileShared(e) => e.timestamp,
            Event::ShareDeleted(e) => e.timestamp,
            Event::SystemStatsUpdate(e) => e.timestamp,
            Event::UserStatsUpdate(e) => e.timestamp,
            Event::Notification(e) => e.timestamp,
            Event::ConnectionStatus(e) => e.timestamp,
        }
    }
}

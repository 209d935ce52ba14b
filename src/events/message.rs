//! Routable messages and the wire envelope
//!
//! A [`Message`] is built once by one of the constructors below, which stamp
//! the generation time, and is serialized once per broadcast into a
//! reference-counted [`Bytes`] frame shared by every recipient:
//!
//! ```text
//! {"type": "upload-progress", "data": {...}, "userId": "u1", "room": "admin"}
//! ```

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

use super::catalog::{
    ConnectionState, ConnectionStatus, DownloadCountUpdate, Event, EventType, FileDeleted,
    FileShared, Notification, NotificationKind, ShareDeleted, SystemStats, SystemStatsUpdate,
    UploadComplete, UploadError, UploadProgress, UserStatsUpdate,
};

/// An event plus optional routing metadata, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    event: Event,
    target_user: Option<String>,
    target_room: Option<String>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    event_type: EventType,
    data: &'a Event,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    room: Option<&'a str>,
}

impl Message {
    /// Wrap an already built event
    pub fn new(event: Event) -> Self {
        Self {
            event,
            target_user: None,
            target_room: None,
        }
    }

    /// Same message addressed to one user
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.target_user = Some(user_id.into());
        self
    }

    /// Same message addressed to a room (a role name for role broadcasts)
    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.target_room = Some(room.into());
        self
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.event.timestamp()
    }

    pub fn target_user(&self) -> Option<&str> {
        self.target_user.as_deref()
    }

    pub fn target_room(&self) -> Option<&str> {
        self.target_room.as_deref()
    }

    /// Serialize into the JSON wire envelope
    pub fn encode(&self) -> Result<Bytes> {
        let envelope = Envelope {
            event_type: self.event.event_type(),
            data: &self.event,
            user_id: self.target_user.as_deref(),
            room: self.target_room.as_deref(),
        };
        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }

    pub fn download_count_update(
        file_id: impl Into<String>,
        share_id: impl Into<String>,
        count: u64,
    ) -> Self {
        Self::new(Event::DownloadCountUpdate(DownloadCountUpdate {
            file_id: file_id.into(),
            share_id: share_id.into(),
            count,
            timestamp: Utc::now(),
        }))
    }

    /// Upload progress; the percentage is derived from the byte counts
    pub fn upload_progress(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        bytes_sent: u64,
        bytes_total: u64,
    ) -> Self {
        Self::new(Event::UploadProgress(UploadProgress {
            file_id: file_id.into(),
            file_name: file_name.into(),
            progress: UploadProgress::percent(bytes_sent, bytes_total),
            bytes_total,
            bytes_sent,
            timestamp: Utc::now(),
        }))
    }

    pub fn upload_complete(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        size: u64,
        is_duplicate: bool,
    ) -> Self {
        Self::new(Event::UploadComplete(UploadComplete {
            file_id: file_id.into(),
            file_name: file_name.into(),
            size,
            is_duplicate,
            timestamp: Utc::now(),
        }))
    }

    pub fn upload_error(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(Event::UploadError(UploadError {
            file_id: file_id.into(),
            file_name: file_name.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }))
    }

    pub fn file_deleted(file_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(Event::FileDeleted(FileDeleted {
            file_id: file_id.into(),
            file_name: file_name.into(),
            timestamp: Utc::now(),
        }))
    }

    pub fn file_shared(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        share_id: impl Into<String>,
        share_url: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(Event::FileShared(FileShared {
            file_id: file_id.into(),
            file_name: file_name.into(),
            share_id: share_id.into(),
            share_url: share_url.into(),
            expires_at,
            timestamp: Utc::now(),
        }))
    }

    pub fn share_deleted(
        share_id: impl Into<String>,
        file_id: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self::new(Event::ShareDeleted(ShareDeleted {
            share_id: share_id.into(),
            file_id: file_id.into(),
            file_name: file_name.into(),
            timestamp: Utc::now(),
        }))
    }

    pub fn system_stats_update(stats: SystemStats) -> Self {
        Self::new(Event::SystemStatsUpdate(SystemStatsUpdate {
            stats,
            timestamp: Utc::now(),
        }))
    }

    pub fn user_stats_update(user_id: impl Into<String>, total_files: u64, storage_used: u64) -> Self {
        Self::new(Event::UserStatsUpdate(UserStatsUpdate {
            user_id: user_id.into(),
            total_files,
            storage_used,
            timestamp: Utc::now(),
        }))
    }

    /// User-facing notification with a freshly generated id
    ///
    /// `duration` is the auto-dismiss delay; `None` keeps it on screen.
    pub fn notification(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> Self {
        Self::new(Event::Notification(Notification {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            duration: duration.map(|d| d.as_millis() as u64),
            timestamp: Utc::now(),
        }))
    }

    pub fn connection_status(status: ConnectionState) -> Self {
        Self::new(Event::ConnectionStatus(ConnectionStatus {
            status,
            timestamp: Utc::now(),
        }))
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Self::new(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(message: &Message) -> serde_json::Value {
        serde_json::from_slice(&message.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_envelope_shape() {
        let msg = Message::file_deleted("f1", "report.pdf").for_user("u1");
        let json = wire(&msg);

        assert_eq!(json["type"], "file-deleted");
        assert_eq!(json["data"]["fileId"], "f1");
        assert_eq!(json["data"]["fileName"], "report.pdf");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("room").is_none());
    }

    #[test]
    fn test_room_routing_field() {
        let msg = Message::system_stats_update(SystemStats::default()).in_room("admin");
        let json = wire(&msg);

        assert_eq!(json["room"], "admin");
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn test_upload_progress_fields() {
        let msg = Message::upload_progress("f1", "movie.mkv", 512, 2048);
        let json = wire(&msg);

        assert_eq!(msg.event_type(), EventType::UploadProgress);
        assert_eq!(json["data"]["progress"], 25.0);
        assert_eq!(json["data"]["bytesSent"], 512);
        assert_eq!(json["data"]["bytesTotal"], 2048);
    }

    #[test]
    fn test_upload_progress_always_in_range() {
        for (sent, total) in [(0, 0), (0, 10), (10, 10), (u64::MAX, 1), (1, u64::MAX)] {
            let msg = Message::upload_progress("f", "n", sent, total);
            let Event::UploadProgress(payload) = msg.event() else {
                panic!("wrong variant");
            };
            assert!((0.0..=100.0).contains(&payload.progress));
        }
    }

    #[test]
    fn test_upload_complete_duplicate_flag() {
        let json = wire(&Message::upload_complete("f1", "a.txt", 10, true));

        assert_eq!(json["type"], "upload-complete");
        assert_eq!(json["data"]["isDuplicate"], true);
        assert_eq!(json["data"]["size"], 10);
    }

    #[test]
    fn test_file_shared_optional_expiry() {
        let without = wire(&Message::file_shared("f1", "a.txt", "s1", "https://x/s/s1", None));
        assert!(without["data"].get("expiresAt").is_none());
        assert_eq!(without["data"]["shareUrl"], "https://x/s/s1");

        let expiry = Utc::now();
        let with = wire(&Message::file_shared(
            "f1",
            "a.txt",
            "s1",
            "https://x/s/s1",
            Some(expiry),
        ));
        assert!(with["data"]["expiresAt"].is_string());
    }

    #[test]
    fn test_notification_fields() {
        let a = Message::notification(
            NotificationKind::Warning,
            "Quota",
            "90% used",
            Some(Duration::from_secs(5)),
        );
        let b = Message::notification(NotificationKind::Info, "Hi", "there", None);
        let json_a = wire(&a);
        let json_b = wire(&b);

        assert_eq!(json_a["data"]["type"], "warning");
        assert_eq!(json_a["data"]["duration"], 5000);
        assert!(json_b["data"].get("duration").is_none());
        assert_ne!(json_a["data"]["id"], json_b["data"]["id"]);
    }

    #[test]
    fn test_connection_status_values() {
        let json = wire(&Message::connection_status(ConnectionState::Reconnecting));

        assert_eq!(json["type"], "connection-status");
        assert_eq!(json["data"]["status"], "reconnecting");
    }

    #[test]
    fn test_timestamp_stamped_at_construction() {
        let before = Utc::now();
        let msg = Message::share_deleted("s1", "f1", "a.txt");
        let after = Utc::now();

        assert!(msg.timestamp() >= before && msg.timestamp() <= after);

        // Encoding later does not restamp
        let json = wire(&msg);
        let encoded: DateTime<Utc> = json["data"]["timestamp"].as_str().unwrap().parse().unwrap();
        assert_eq!(encoded, msg.timestamp());
    }

    #[test]
    fn test_remaining_payload_fields() {
        let download = wire(&Message::download_count_update("f1", "s1", 4));
        assert_eq!(download["data"]["shareId"], "s1");
        assert_eq!(download["data"]["count"], 4);

        let error = wire(&Message::upload_error("f1", "a.txt", "disk full"));
        assert_eq!(error["data"]["error"], "disk full");

        let user = wire(&Message::user_stats_update("u1", 12, 4096));
        assert_eq!(user["data"]["userId"], "u1");
        assert_eq!(user["data"]["totalFiles"], 12);
        assert_eq!(user["data"]["storageUsed"], 4096);
    }

    #[test]
    fn test_every_event_encodes() {
        let stats = SystemStats {
            storage_efficiency: f64::NAN,
            ..Default::default()
        };
        let messages = [
            Message::download_count_update("", "", u64::MAX),
            Message::upload_progress("f", "\u{0}\"quoted\"", u64::MAX, 1),
            Message::upload_complete("f", "n", 0, false),
            Message::upload_error("f", "n", "e"),
            Message::file_deleted("f", "n"),
            Message::file_shared("f", "n", "s", "u", Some(Utc::now())),
            Message::share_deleted("s", "f", "n"),
            Message::system_stats_update(stats),
            Message::user_stats_update("u", 0, 0),
            Message::notification(NotificationKind::Error, "t", "m", Some(Duration::MAX)),
            Message::connection_status(ConnectionState::Disconnected),
        ];

        let mut types = std::collections::HashSet::new();
        for message in &messages {
            let json = wire(message);
            assert_eq!(json["type"], message.event_type().as_str());
            types.insert(message.event_type());
        }
        assert_eq!(types.len(), 11);
    }
}

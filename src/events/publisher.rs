//! Event publisher
//!
//! The entry point business logic uses to push events. A publisher is a thin,
//! cloneable handle around the hub; it stamps routing metadata onto the
//! message and picks the matching fan-out.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use filehub_events::{EventPublisher, Hub, Message};
//!
//! # async fn example() -> filehub_events::error::Result<()> {
//! let hub = Arc::new(Hub::new());
//! let publisher = EventPublisher::new(Arc::clone(&hub));
//!
//! publisher
//!     .send_to_user("user-42", Message::upload_complete("f1", "notes.txt", 1024, false))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::hub::{BroadcastReport, Hub};
use crate::session::Role;

use super::catalog::{NotificationKind, SystemStats};
use super::message::Message;

/// Routes messages through a hub
#[derive(Clone)]
pub struct EventPublisher {
    hub: Arc<Hub>,
}

impl EventPublisher {
    /// Create a publisher for the given hub
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// The hub this publisher routes through
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Deliver to every connection of one user
    pub async fn send_to_user(&self, user_id: &str, message: Message) -> Result<BroadcastReport> {
        let message = message.for_user(user_id);
        self.hub.broadcast_to_user(user_id, &message).await
    }

    /// Deliver to every connection whose user has `role`
    pub async fn send_to_role(&self, role: Role, message: Message) -> Result<BroadcastReport> {
        let message = message.in_room(role.as_str());
        self.hub.broadcast_to_role(role, &message).await
    }

    /// Deliver to every connection
    pub async fn send_to_all(&self, message: Message) -> Result<BroadcastReport> {
        self.hub.broadcast_to_all(&message).await
    }

    /// Report upload progress to the uploading user
    pub async fn upload_progress(
        &self,
        user_id: &str,
        file_id: &str,
        file_name: &str,
        bytes_sent: u64,
        bytes_total: u64,
    ) -> Result<BroadcastReport> {
        let message = Message::upload_progress(file_id, file_name, bytes_sent, bytes_total);
        self.send_to_user(user_id, message).await
    }

    /// Share link downloaded; tells the file owner
    pub async fn download_count(
        &self,
        owner_id: &str,
        file_id: &str,
        share_id: &str,
        count: u64,
    ) -> Result<BroadcastReport> {
        let message = Message::download_count_update(file_id, share_id, count);
        self.send_to_user(owner_id, message).await
    }

    /// Push dashboard figures to administrators
    pub async fn system_stats(&self, stats: SystemStats) -> Result<BroadcastReport> {
        self.send_to_role(Role::Admin, Message::system_stats_update(stats))
            .await
    }

    /// Push a user's own usage figures to that user
    pub async fn user_stats(
        &self,
        user_id: &str,
        total_files: u64,
        storage_used: u64,
    ) -> Result<BroadcastReport> {
        let message = Message::user_stats_update(user_id, total_files, storage_used);
        self.send_to_user(user_id, message).await
    }

    /// Show a notification to one user
    pub async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        body: &str,
        duration: Option<Duration>,
    ) -> Result<BroadcastReport> {
        let message = Message::notification(kind, title, body, duration);
        self.send_to_user(user_id, message).await
    }
}

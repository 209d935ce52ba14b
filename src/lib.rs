//! # filehub-events
//!
//! Real-time event hub for a file-storage service. Server-side events (upload
//! progress, share changes, admin statistics, notifications) are pushed to
//! connected clients over WebSocket, addressed to a single user, to every user
//! with a role, or to everyone.
//!
//! ## Layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`hub`] | Session registry and non-blocking fan-out with slow-consumer eviction |
//! | [`session`] | Identity types and the per-connection reader/writer loops |
//! | [`events`] | Event catalog, wire envelope and the publisher API |
//! | [`transport`] | Connection adapters (WebSocket, in-memory) |
//! | [`server`] | TCP accept loop, WebSocket upgrade and admission |
//! | [`stats`] | Hub statistics |
//!
//! ## Example
//!
//! ```no_run
//! use filehub_events::{HubServer, Message, ServerConfig, TrustedHeaderAdmission};
//!
//! # async fn example() -> filehub_events::error::Result<()> {
//! let server = HubServer::new(ServerConfig::default(), TrustedHeaderAdmission::default());
//! let publisher = server.publisher();
//!
//! tokio::spawn(async move {
//!     let _ = publisher
//!         .send_to_user("user-1", Message::file_deleted("f1", "old.txt"))
//!         .await;
//! });
//!
//! server.run().await
//! # }
//! ```

pub mod error;
pub mod events;
pub mod hub;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;

pub use error::{Error, Result};
pub use events::{EventPublisher, Message};
pub use hub::{BroadcastReport, Hub, HubConfig};
pub use server::{HubServer, ServerConfig, TrustedHeaderAdmission};
pub use session::{Identity, Role, SessionId};

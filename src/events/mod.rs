//! Event catalog and publishing
//!
//! - [`catalog`]: the closed set of event types and their payloads
//! - [`message`]: routable messages and the JSON wire envelope
//! - [`publisher`]: the API business logic calls to broadcast events

pub mod catalog;
pub mod message;
pub mod publisher;

pub use catalog::{
    ConnectionState, Event, EventType, NotificationKind, SystemStats, UploadProgress,
};
pub use message::Message;
pub use publisher::EventPublisher;

//! WebSocket server
//!
//! Accepts TCP connections, upgrades them to WebSocket after the admission
//! handler attaches an identity, and runs a client session for each.

pub mod admission;
pub mod config;
pub mod listener;

pub use admission::{AdmissionHandler, AdmissionRequest, TrustedHeaderAdmission};
pub use config::ServerConfig;
pub use listener::HubServer;

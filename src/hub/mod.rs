//! Session hub for real-time event fan-out
//!
//! The hub is the single authority over which sessions are connected and who
//! receives what. Messages are serialized once into a reference-counted frame
//! and pushed onto each matching session's bounded outbound queue without
//! waiting.
//!
//! # Architecture
//!
//! ```text
//!                            Arc<Hub>
//!                 ┌─────────────────────────────┐
//!                 │ sessions: HashMap<Id,       │
//!                 │   SessionEntry {            │
//!                 │     context (user, role),   │
//!                 │     tx: mpsc::Sender,       │
//!                 │   }                         │
//!                 │ >                           │
//!                 └──────────────┬──────────────┘
//!                                │ try_send (never blocks)
//!         ┌──────────────────────┼──────────────────────┐
//!         ▼                      ▼                      ▼
//!    [writer loop]          [writer loop]          [writer loop]
//!    outbound.recv()        outbound.recv()        outbound.recv()
//!         │                      │                      │
//!         └──► sink.send() ──► WebSocket
//! ```
//!
//! # Backpressure
//!
//! A full outbound queue means the client cannot keep up. The session is
//! evicted on the spot: its entry is removed (closing the queue) and its
//! writer flushes what was already queued before closing the connection with
//! a "slow consumer" close frame. Broadcasters are never blocked.

pub mod config;
pub mod entry;
pub mod store;

pub use config::HubConfig;
pub use entry::{BroadcastReport, Registration, SessionControl};
pub use store::Hub;

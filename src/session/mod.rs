//! Client sessions
//!
//! A session is the server-side state of one live client connection: who the
//! client is, its outbound queue, and the reader/writer loops that bridge the
//! queue to the connection.

pub mod client;
pub mod context;

pub use client::ClientSession;
pub use context::{Identity, Role, SessionContext, SessionId};

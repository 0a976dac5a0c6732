//! # chat-relay
//!
//! Real-time chat relay that sanitizes every message before fan-out.
//!
//! This crate implements a relay server that:
//! - Accepts WebSocket connections at `/ws`
//! - Admits each inbound message through a size gate and a per-connection
//!   fixed-window rate gate
//! - Classifies and renders the message content (image, video, escaped text
//!   or a blocked notice)
//! - Broadcasts the processed envelope to every connection, sender included
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐                          ┌── Client B
//!            │  text frame (JSON)       │
//!            ├─────────────────────────►│
//!            │                          │
//!        ┌───┴──────────────────────────┴───┐
//!        │            chat-relay            │
//!        │  admission → validate → fan-out  │
//!        └──────────────────────────────────┘
//! ```
//!
//! ## Frames
//!
//! - inbound: `{"mensaje": "...", ...}`
//! - broadcast: `{"event":"message","data":{...}}`
//! - notice to the sender only: `{"event":"error","data":"..."}`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod hub;
pub mod limits;
pub mod protocol;
pub mod reset;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::{ProtocolError, RelayError};
pub use hub::{BroadcastHub, RelayMetrics};
pub use server::{start, RelayHandle};

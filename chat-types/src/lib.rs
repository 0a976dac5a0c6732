//! # chat-types
//!
//! Wire format types for the Murmur chat relay.
//!
//! This crate provides the foundational types shared by the relay crates:
//! - [`ConnectionId`] - Opaque identity of one live connection
//! - [`Envelope`] - One inbound/outbound chat payload (untyped JSON object)
//! - [`Classification`] - What kind of content a message carries
//! - [`ServerEvent`] - Frames the relay writes back to clients
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod classification;
mod envelope;
mod error;
mod event;
mod ids;

pub use classification::{Classification, ContentKind, VideoProvider};
pub use envelope::{Envelope, CONTENT_FIELD};
pub use error::TypesError;
pub use event::ServerEvent;
pub use ids::ConnectionId;

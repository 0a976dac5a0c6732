//! # chat-core
//!
//! Pure logic for the Murmur chat relay (no I/O, instant tests).
//!
//! This crate holds everything the relay decides about a message without
//! touching a socket or a clock:
//! - [`escape`] - HTML escaping for untrusted text
//! - [`injection`] - heuristic active-content signatures
//! - [`classify`] - the ordered classification chain
//! - [`render`] - outbound markup for each classification
//! - [`validate`] - the envelope pipeline tying the above together
//! - [`admission`] - per-connection size and fixed-window rate gates
//!
//! ## Design Philosophy
//!
//! All modules are **pure** - they take input and produce output without
//! side effects beyond logging. The relay (`chat-relay`) owns the sockets,
//! the registry and the clock, and calls into this crate for every decision.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admission;
pub mod classify;
pub mod escape;
pub mod injection;
pub mod render;
pub mod validate;

pub use admission::{AdmissionError, AdmissionPolicy, PayloadClass, WindowCounter};
pub use classify::classify;
pub use escape::escape_html;
pub use injection::is_suspicious;
pub use render::{render, BLOCKED_NOTICE};
pub use validate::{validate, validate_message, ValidatedMessage};

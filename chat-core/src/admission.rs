//! Per-connection admission control.
//!
//! Two gates run on every inbound payload before classification:
//! - **Size gate**: payload bytes against a ceiling, with a larger ceiling
//!   for payloads that carry embedded image data.
//! - **Rate gate**: a fixed-window message counter. Each admitted message
//!   takes one slot; once the window is full everything is rejected until the
//!   window is rolled over by the reset tick.
//!
//! Nothing here reads a clock. Callers pass "now" in milliseconds, which keeps
//! the window logic deterministic under test.

use chat_types::{Envelope, CONTENT_FIELD};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Marker that identifies embedded image data without parsing the envelope.
const IMAGE_DATA_MARKER: &str = "data:image/";

/// Admission limits for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Messages admitted per window.
    pub max_messages: u32,
    /// Window length.
    pub window: Duration,
    /// Byte ceiling for ordinary payloads.
    pub max_text_bytes: usize,
    /// Byte ceiling for payloads carrying embedded image data.
    pub max_image_bytes: usize,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_messages: 30,
            window: Duration::from_secs(60),
            max_text_bytes: 10 * 1024,
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Which size ceiling applied to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    /// Ordinary text payload.
    Text,
    /// Payload carrying a `data:image/` URI.
    ImageData,
}

/// Why a payload was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Payload exceeds the ceiling for its class.
    #[error("payload too large: {size} bytes (limit: {limit} bytes)")]
    PayloadTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Ceiling that applied.
        limit: usize,
        /// Which ceiling applied.
        class: PayloadClass,
    },

    /// The connection used up its messages for the current window.
    #[error("rate limit exceeded: {limit} messages per {window_secs}s")]
    RateLimited {
        /// Messages allowed per window.
        limit: u32,
        /// Window length in seconds.
        window_secs: u64,
    },
}

impl AdmissionError {
    /// Human-readable notice for the originating connection.
    pub fn notice(&self) -> String {
        match self {
            Self::PayloadTooLarge {
                size,
                limit,
                class: PayloadClass::Text,
            } => format!(
                "Message too large ({} KB). Maximum allowed is {} KB.",
                size.div_ceil(1024),
                limit / 1024
            ),
            Self::PayloadTooLarge {
                size,
                limit,
                class: PayloadClass::ImageData,
            } => format!(
                "Image too large ({} KB). Maximum allowed is {} KB.",
                size.div_ceil(1024),
                limit / 1024
            ),
            Self::RateLimited { limit, window_secs } => format!(
                "Too many messages. You can send {} messages every {} seconds; please wait.",
                limit, window_secs
            ),
        }
    }
}

/// Cheap prefix check for embedded image data, done without parsing.
///
/// Only a value right after a `"mensaje":` key counts. The marker anywhere
/// else (another field, the middle of the text) does not.
pub fn looks_like_image_data(payload: &str) -> bool {
    let key = format!("\"{CONTENT_FIELD}\"");
    payload.match_indices(&key).any(|(at, _)| {
        let rest = payload[at + key.len()..].trim_start();
        rest.strip_prefix(':')
            .map(str::trim_start)
            .and_then(|value| value.strip_prefix('"'))
            .is_some_and(|value| value.starts_with(IMAGE_DATA_MARKER))
    })
}

/// Whether the content field the validator will actually see starts with
/// `data:image/`. Parses the envelope, so it only runs for payloads that
/// need the larger ceiling.
fn content_is_image_data(payload: &str) -> bool {
    Envelope::parse(payload).is_ok_and(|envelope| {
        envelope
            .content()
            .is_ok_and(|content| content.starts_with(IMAGE_DATA_MARKER))
    })
}

/// Apply the size gate.
///
/// Payloads within the text ceiling pass without inspection. Larger ones get
/// the image ceiling only when the parsed content field starts with
/// `data:image/`.
pub fn check_size(payload: &str, policy: &AdmissionPolicy) -> Result<PayloadClass, AdmissionError> {
    let size = payload.len();
    if size <= policy.max_text_bytes {
        return Ok(PayloadClass::Text);
    }

    let class = if size <= policy.max_image_bytes {
        if looks_like_image_data(payload) && content_is_image_data(payload) {
            return Ok(PayloadClass::ImageData);
        }
        PayloadClass::Text
    } else if looks_like_image_data(payload) {
        PayloadClass::ImageData
    } else {
        PayloadClass::Text
    };

    let limit = match class {
        PayloadClass::Text => policy.max_text_bytes,
        PayloadClass::ImageData => policy.max_image_bytes,
    };
    Err(AdmissionError::PayloadTooLarge { size, limit, class })
}

/// Fixed-window message counter for one connection.
///
/// Increments come from the connection's own task; resets come from the
/// shared reset tick. The increment is a compare-and-swap loop and the reset
/// a plain store, so a reset landing between a load and a swap makes the swap
/// retry against zero instead of losing the reset.
#[derive(Debug)]
pub struct WindowCounter {
    count: AtomicU32,
    window_start_ms: AtomicU64,
}

impl WindowCounter {
    /// Create a counter whose first window starts at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            count: AtomicU32::new(0),
            window_start_ms: AtomicU64::new(now_ms),
        }
    }

    /// Take one slot in the current window.
    ///
    /// Returns the number of slots used including this one, or
    /// [`AdmissionError::RateLimited`] when the window is full.
    pub fn try_admit(&self, policy: &AdmissionPolicy) -> Result<u32, AdmissionError> {
        let max = policy.max_messages;
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < max).then(|| used + 1)
            })
            .map(|prev| prev + 1)
            .map_err(|_| AdmissionError::RateLimited {
                limit: max,
                window_secs: policy.window.as_secs(),
            })
    }

    /// Start a new window if the current one has elapsed.
    ///
    /// Windows stay on a fixed grid anchored at the connection's first
    /// window, so a late tick does not stretch the next window. Returns
    /// whether a reset happened.
    pub fn roll_if_elapsed(&self, now_ms: u64, window: Duration) -> bool {
        let window_ms = window.as_millis() as u64;
        if window_ms == 0 {
            return false;
        }

        let start = self.window_start_ms.load(Ordering::Acquire);
        let elapsed = now_ms.saturating_sub(start);
        if elapsed < window_ms {
            return false;
        }

        let new_start = start + (elapsed / window_ms) * window_ms;
        if self
            .window_start_ms
            .compare_exchange(start, new_start, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another tick already rolled this window.
            return false;
        }
        self.count.store(0, Ordering::Release);
        true
    }

    /// Give back one slot taken in the window that started at
    /// `window_start_ms`, for a message that was admitted here but rejected
    /// further on. A no-op once that window has been rolled over.
    pub fn release(&self, window_start_ms: u64) {
        if self.window_start_ms.load(Ordering::Acquire) != window_start_ms {
            return;
        }
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_sub(1)
            });
    }

    /// Slots used in the current window.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Start of the current window, in the caller's millisecond clock.
    pub fn window_start_ms(&self) -> u64 {
        self.window_start_ms.load(Ordering::Acquire)
    }
}

/// Run both gates, size first. Oversized payloads do not use up rate budget.
pub fn admit(
    payload: &str,
    counter: &WindowCounter,
    policy: &AdmissionPolicy,
) -> Result<PayloadClass, AdmissionError> {
    let class = check_size(payload, policy)?;
    counter.try_admit(policy)?;
    Ok(class)
}

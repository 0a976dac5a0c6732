//! Classification - the decision of what kind of content a message holds.

use std::fmt;

/// Video hosting provider recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoProvider {
    /// youtube.com / youtu.be, identified by an 11 character video id
    YouTube,
    /// vimeo.com, identified by a numeric video id
    Vimeo,
    /// A direct link to a video file
    Direct,
}

impl fmt::Display for VideoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YouTube => write!(f, "youtube"),
            Self::Vimeo => write!(f, "vimeo"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Result of classifying one content string.
///
/// Exactly one variant holds per classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Suspected active-content injection.
    Blocked {
        /// Name of the first signature that matched. For logs only, never
        /// sent to peers.
        signature: &'static str,
    },
    /// Image link or base64 image data URI.
    Image {
        /// The original, unmodified URL.
        url: String,
    },
    /// Video link.
    Video {
        /// Which provider the link belongs to.
        provider: VideoProvider,
        /// Provider video id (YouTube, Vimeo) or the full URL (Direct).
        target: String,
    },
    /// Anything else.
    PlainText {
        /// The original text.
        text: String,
    },
}

impl Classification {
    /// The variant tag without its payload.
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Blocked { .. } => ContentKind::Blocked,
            Self::Image { .. } => ContentKind::Image,
            Self::Video { .. } => ContentKind::Video,
            Self::PlainText { .. } => ContentKind::PlainText,
        }
    }
}

/// Payload-free classification tag, used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Content was replaced by the safety notice
    Blocked,
    /// Content was rendered as an image
    Image,
    /// Content was rendered as a video embed
    Video,
    /// Content was HTML-escaped text
    PlainText,
    /// Content was an empty string
    Empty,
    /// Envelope was malformed, or its content field missing or not a string
    Invalid,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Blocked => "blocked",
            Self::Image => "image",
            Self::Video => "video",
            Self::PlainText => "text",
            Self::Empty => "empty",
            Self::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

//! Content classification.
//!
//! Classification is an ordered chain of rules evaluated top to bottom; the
//! first rule that returns a result wins and anything no rule claims is plain
//! text. Injection detection is first in the chain: a payload can be crafted to
//! look like an image or video URL *and* carry script, and it must never reach
//! the URL renderers.
//!
//! URL rules match the whole (trimmed) content as one token. Characters that
//! could close an HTML attribute (`"`, `'`, `<`, `>`, whitespace) are outside
//! every URL character class, because the renderer embeds image and direct
//! video URLs without escaping them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chat_types::{Classification, VideoProvider};
use regex::Regex;
use std::sync::LazyLock;

use crate::injection;

/// One step of the classification chain.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Short identifier used in logs and tests.
    pub name: &'static str,
    /// Returns `Some` when this rule claims the content.
    pub apply: fn(&str) -> Option<Classification>,
}

/// The classification chain, in priority order.
pub static RULES: &[Rule] = &[
    Rule {
        name: "injection",
        apply: classify_injection,
    },
    Rule {
        name: "image_url",
        apply: classify_image_url,
    },
    Rule {
        name: "image_data_uri",
        apply: classify_image_data_uri,
    },
    Rule {
        name: "youtube",
        apply: classify_youtube,
    },
    Rule {
        name: "vimeo",
        apply: classify_vimeo,
    },
    Rule {
        name: "direct_video",
        apply: classify_direct_video,
    },
];

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^https?://[^\s"'<>]+\.(?:jpe?g|gif|png|bmp|webp|svg|tiff|ico)(?:[?#][^\s"'<>]*)?$"#,
    )
    .expect("image url pattern must compile")
});

static IMAGE_DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^data:image/(?:png|jpe?g|gif|webp|bmp|svg\+xml|tiff|x-icon|vnd\.microsoft\.icon);base64,([A-Za-z0-9+/]+={0,2})$",
    )
    .expect("image data uri pattern must compile")
});

static YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(?:https?://)?(?:www\.|m\.)?(?:youtu\.be/|youtube\.com/(?:embed/|v/|watch\?v=|watch\?[^\s#"'<>]*?&v=))([A-Za-z0-9_-]{11})?(?:[?&#][^\s"'<>]*)?$"#,
    )
    .expect("youtube pattern must compile")
});

static VIMEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^(?:https?://)?(?:www\.)?vimeo\.com/(\d+)?(?:[/?#][^\s"'<>]*)?$"#)
        .expect("vimeo pattern must compile")
});

static DIRECT_VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^https?://[^\s"'<>]+\.(?:mp4|webm|avi|mov|wmv|flv|mkv)(?:[?#][^\s"'<>]*)?$"#,
    )
    .expect("direct video pattern must compile")
});

/// Classify one content string. Total: every input gets a classification.
pub fn classify(text: &str) -> Classification {
    for rule in RULES {
        if let Some(classification) = (rule.apply)(text) {
            tracing::trace!(rule = rule.name, "classification rule matched");
            return classification;
        }
    }
    Classification::PlainText {
        text: text.to_string(),
    }
}

fn classify_injection(text: &str) -> Option<Classification> {
    injection::first_match(text).map(|signature| Classification::Blocked { signature })
}

fn classify_image_url(text: &str) -> Option<Classification> {
    let url = text.trim();
    IMAGE_URL.is_match(url).then(|| Classification::Image {
        url: url.to_string(),
    })
}

fn classify_image_data_uri(text: &str) -> Option<Classification> {
    let uri = text.trim();
    let payload = IMAGE_DATA_URI.captures(uri)?.get(1)?;
    STANDARD.decode(payload.as_str()).ok()?;
    Some(Classification::Image {
        url: uri.to_string(),
    })
}

fn classify_youtube(text: &str) -> Option<Classification> {
    provider_video(&YOUTUBE, VideoProvider::YouTube, text)
}

fn classify_vimeo(text: &str) -> Option<Classification> {
    provider_video(&VIMEO, VideoProvider::Vimeo, text)
}

/// Match a provider URL pattern whose first group is the video id.
fn provider_video(
    pattern: &Regex,
    provider: VideoProvider,
    text: &str,
) -> Option<Classification> {
    let caps = pattern.captures(text.trim())?;
    Some(match caps.get(1) {
        Some(id) => Classification::Video {
            provider,
            target: id.as_str().to_string(),
        },
        None => degrade(text),
    })
}

fn classify_direct_video(text: &str) -> Option<Classification> {
    let url = text.trim();
    DIRECT_VIDEO.is_match(url).then(|| Classification::Video {
        provider: VideoProvider::Direct,
        target: url.to_string(),
    })
}

/// A provider pattern matched but no id could be extracted.
fn degrade(text: &str) -> Classification {
    tracing::debug!("video link without extractable id, treating as text");
    Classification::PlainText {
        text: text.to_string(),
    }
}

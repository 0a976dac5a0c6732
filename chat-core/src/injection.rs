//! Active-content injection detection.
//!
//! A heuristic denylist, not an HTML parser. It catches the common shapes of
//! script injection (script tags, `javascript:` URLs, inline event handlers,
//! embedding tags, `eval(` and DOM sinks). Payloads using encodings the list
//! does not know about will get through; anything that does reach a client
//! as text has still been escaped by the renderer.

use regex::RegexSet;
use std::sync::LazyLock;

/// A single named injection signature.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Short, snake_case identifier used in logs.
    pub name: &'static str,
    /// Case-insensitive regex source.
    pub pattern: &'static str,
}

/// The signature catalogue, in evaluation order.
pub static SIGNATURES: &[Signature] = &[
    Signature {
        name: "script_tag",
        pattern: r"(?i)<\s*script\b",
    },
    Signature {
        name: "javascript_scheme",
        pattern: r"(?i)javascript\s*:",
    },
    Signature {
        name: "event_handler",
        pattern: r"(?i)on\w+\s*=",
    },
    Signature {
        name: "iframe_tag",
        pattern: r"(?i)<\s*iframe",
    },
    Signature {
        name: "object_tag",
        pattern: r"(?i)<\s*object",
    },
    Signature {
        name: "embed_tag",
        pattern: r"(?i)<\s*embed",
    },
    Signature {
        name: "form_tag",
        pattern: r"(?i)<\s*form",
    },
    Signature {
        name: "eval_call",
        pattern: r"(?i)eval\s*\(",
    },
    Signature {
        name: "document_cookie",
        pattern: r"(?i)document\.cookie",
    },
    Signature {
        name: "document_write",
        pattern: r"(?i)document\.write",
    },
    Signature {
        name: "inner_html",
        pattern: r"(?i)innerhtml",
    },
    Signature {
        name: "outer_html",
        pattern: r"(?i)outerhtml",
    },
];

static SIGNATURE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(SIGNATURES.iter().map(|s| s.pattern))
        .expect("built-in injection signatures must compile")
});

/// Name of the first signature (in catalogue order) that matches `text`.
pub fn first_match(text: &str) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    SIGNATURE_SET
        .matches(text)
        .iter()
        .next()
        .map(|idx| SIGNATURES[idx].name)
}

/// Whether `text` looks like an active-content injection attempt.
pub fn is_suspicious(text: &str) -> bool {
    first_match(text).is_some()
}

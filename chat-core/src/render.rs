//! Rendering of classified content into the outbound `mensaje` string.
//!
//! The renderer trusts the classifier's variant tag and never re-validates.
//! Image and direct-video URLs go into `src` unescaped: escaping would corrupt
//! query strings, and the classifier only produces those variants for values
//! that are a single URL token without quote, angle bracket or whitespace
//! characters. YouTube and Vimeo embeds are built from the extracted id alone.

use chat_types::{Classification, VideoProvider};

use crate::escape::escape_html;

/// Notice substituted for any blocked message. Never echoes the original.
pub const BLOCKED_NOTICE: &str = "⚠️ Content blocked for security reasons";

/// Render a classification into its outbound string.
pub fn render(classification: &Classification) -> String {
    match classification {
        Classification::Blocked { .. } => BLOCKED_NOTICE.to_string(),
        Classification::Image { url } => image_tag(url),
        Classification::Video { provider, target } => match provider {
            VideoProvider::YouTube => youtube_embed(target),
            VideoProvider::Vimeo => vimeo_embed(target),
            VideoProvider::Direct => video_tag(target),
        },
        Classification::PlainText { text } => escape_html(text),
    }
}

fn image_tag(url: &str) -> String {
    format!(r#"<img src="{url}" style="max-height: 400px;max-width: 400px;">"#)
}

fn youtube_embed(id: &str) -> String {
    format!(
        r#"<iframe width="560" height="315" src="https://www.youtube.com/embed/{id}" frameborder="0" allow="accelerometer; autoplay; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe>"#
    )
}

fn vimeo_embed(id: &str) -> String {
    format!(
        r#"<iframe src="https://player.vimeo.com/video/{id}" width="560" height="315" frameborder="0" allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe>"#
    )
}

fn video_tag(url: &str) -> String {
    let mime = video_mime(url);
    format!(
        r#"<video width="560" height="315" controls><source src="{url}" type="{mime}">Your browser does not support HTML5 video.</video>"#
    )
}

/// MIME type for a direct video link, from its file extension.
fn video_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "mkv" => "video/x-matroska",
        _ => "video/mp4",
    }
}

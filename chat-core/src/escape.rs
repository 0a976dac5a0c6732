//! HTML escaping for untrusted text.

/// Escape the five HTML-significant characters in `input`.
///
/// | char | entity   |
/// |------|----------|
/// | `&`  | `&amp;`  |
/// | `<`  | `&lt;`   |
/// | `>`  | `&gt;`   |
/// | `"`  | `&quot;` |
/// | `'`  | `&#039;` |
///
/// Single pass over the input, so an `&` introduced by one replacement is
/// never re-escaped by another. Escaping already-escaped text escapes it
/// again (`&amp;` becomes `&amp;amp;`).
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

//! Pull the code artifact out of a model response.

use std::sync::LazyLock;

use regex::Regex;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+.-]*)[^\n]*\n(.*?)```").expect("fence regex is valid")
});

/// Code found in a response, and whether it came from a fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCode {
    pub code: String,
    pub fenced: bool,
}

/// Extract the code block from `response`.
///
/// Takes the first ```` ```python ```` (or ```` ```py ````) block, else the first
/// fenced block of any language, else an unterminated opening fence, else the
/// whole response. Returns `None` when nothing but whitespace is left.
pub fn extract_code(response: &str) -> Option<ExtractedCode> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    let blocks: Vec<(String, String)> = FENCE_RE
        .captures_iter(trimmed)
        .map(|caps| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            (lang.to_ascii_lowercase(), body.trim().to_string())
        })
        .collect();

    let preferred = blocks
        .iter()
        .find(|(lang, _)| lang == "python" || lang == "py")
        .or_else(|| blocks.first());
    if let Some((_, body)) = preferred {
        return non_empty(body, true);
    }

    // Truncated responses can open a fence and never close it.
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        return non_empty(body.trim(), true);
    }

    non_empty(trimmed, false)
}

fn non_empty(code: &str, fenced: bool) -> Option<ExtractedCode> {
    if code.trim().is_empty() {
        return None;
    }
    Some(ExtractedCode {
        code: code.to_string(),
        fenced,
    })
}

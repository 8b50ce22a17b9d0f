//! Hover content rendering.
//!
//! The service returns hover text as markdown. Tooltips need markup, so
//! fenced code becomes a highlighted `<pre>` block and the prose around it
//! gets inline code spans and line breaks. Newlines inside code blocks are
//! left alone; `<pre>` keeps them.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::highlight::{escape_html, highlight_tooltip_code};

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w*)\n([\s\S]*?)```").expect("fence pattern is valid"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("inline code pattern is valid"));

/// Languages highlighted inside tooltips. Untagged fences count as WAT.
const HIGHLIGHTED: &[&str] = &["wat", "wast", ""];

/// Render hover markdown as tooltip markup.
pub fn render_hover(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 2);
    let mut last = 0;

    for caps in FENCE.captures_iter(markdown) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&render_prose(&markdown[last..whole.start()]));
        out.push_str(&render_code_block(&caps));
        last = whole.end();
    }
    out.push_str(&render_prose(&markdown[last..]));

    out
}

fn render_code_block(caps: &Captures<'_>) -> String {
    let lang = caps.get(1).map_or("", |m| m.as_str());
    let code = caps.get(2).map_or("", |m| m.as_str()).trim();
    let body = if HIGHLIGHTED.contains(&lang) {
        highlight_tooltip_code(code)
    } else {
        escape_html(code)
    };
    format!("<pre class=\"cm-tooltip-codeblock\"><code>{body}</code></pre>")
}

fn render_prose(text: &str) -> String {
    let escaped = escape_html(text);
    let with_code = INLINE_CODE.replace_all(&escaped, "<code>$1</code>");
    with_code.replace('\n', "<br>")
}

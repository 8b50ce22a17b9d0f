//! Lexical highlighting for WAT.
//!
//! Two highlighters with different jobs:
//! - `tooltip.rs`: a deliberately small one for code inside hover
//!   tooltips, emitting inline-coloured HTML
//! - `stream.rs`: the editor's line tokenizer, carrying block-comment
//!   state from one line to the next

pub mod stream;
pub mod tooltip;

pub use stream::{tokenize, tokenize_line, HighlightSpan, LineState};
pub use tooltip::highlight_tooltip_code;

/// Token classes shared by both highlighters and the editor theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Keyword,
    Type,
    Variable,
    String,
    Number,
    Comment,
    Bracket,
    Name,
}

impl TokenClass {
    /// Theme colour.
    pub fn color(self) -> &'static str {
        match self {
            TokenClass::Keyword => "#569cd6",
            TokenClass::Type => "#4ec9b0",
            TokenClass::Variable => "#9cdcfe",
            TokenClass::String => "#ce9178",
            TokenClass::Number => "#b5cea8",
            TokenClass::Comment => "#6a9955",
            TokenClass::Bracket => "#d4d4d4",
            TokenClass::Name => "#dcdcaa",
        }
    }
}

/// Escape text for injection into rendered markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

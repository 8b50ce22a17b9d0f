//! Line tokenizer used for editor highlighting.
//!
//! Works like a stream language: each call consumes one token at the
//! current position, and the only state kept between lines is whether we
//! are inside a `(; … ;)` block comment.

use std::sync::LazyLock;

use regex::Regex;

use super::TokenClass;

fn anchored(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})")).expect("highlighter pattern is valid")
}

static STRING: LazyLock<Regex> = LazyLock::new(|| anchored(r#""([^"\\]|\\.)*""#));
static HEX: LazyLock<Regex> = LazyLock::new(|| {
    anchored(r"[+-]?0x[0-9a-fA-F_]+(\.[0-9a-fA-F_]*)?([pP][+-]?[0-9_]+)?")
});
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| anchored(r"[+-]?\d[\d_]*(\.\d[\d_]*)?([eE][+-]?\d[\d_]*)?"));
static IDENT: LazyLock<Regex> =
    LazyLock::new(|| anchored(r"\$[a-zA-Z0-9_!#$%&'*+\-./:<=>?@\\^`|~]+"));
static NUMERIC_OP: LazyLock<Regex> = LazyLock::new(|| {
    anchored(r"(i32|i64|f32|f64|v128|i8x16|i16x8|i32x4|i64x2|f32x4|f64x2)\.[a-z_][a-z0-9_]*")
});
static NAMESPACED_OP: LazyLock<Regex> = LazyLock::new(|| {
    anchored(r"(local|global|memory|table|ref|struct|array|i31)\.[a-z_][a-z0-9_]*")
});
static TYPE: LazyLock<Regex> = LazyLock::new(|| {
    anchored(r"(i32|i64|f32|f64|v128|funcref|externref|anyref|eqref|i31ref|structref|arrayref)\b")
});
static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    anchored(
        r"(module|func|param|result|local|global|table|memory|type|import|export|start|elem|data|offset|declare|item|field|mut|block|loop|if|then|else|end|br|br_if|br_table|return|call|call_indirect|call_ref|drop|select|unreachable|nop|ref|null|struct|array|rec|sub|final|tag|try|catch|throw)\b",
    )
});
static WORD: LazyLock<Regex> = LazyLock::new(|| anchored(r"[a-zA-Z_][a-zA-Z0-9_]*"));

/// Tokenizer state carried from one line to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    pub in_block_comment: bool,
}

/// A classified byte range within one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub class: TokenClass,
}

/// Tokenize a whole document, one span list per line.
pub fn tokenize(text: &str) -> Vec<Vec<HighlightSpan>> {
    let mut state = LineState::default();
    text.split('\n')
        .map(|line| tokenize_line(line, &mut state))
        .collect()
}

/// Tokenize a single line, updating `state` for the next one.
/// Whitespace and unrecognised characters produce no span.
pub fn tokenize_line(line: &str, state: &mut LineState) -> Vec<HighlightSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while pos < line.len() {
        let rest = &line[pos..];
        let (len, class) = next_token(rest, state);
        if let Some(class) = class {
            spans.push(HighlightSpan {
                start: pos,
                end: pos + len,
                class,
            });
        }
        pos += len;
    }

    spans
}

/// Length of the token at the start of `rest` and its class, if any.
fn next_token(rest: &str, state: &mut LineState) -> (usize, Option<TokenClass>) {
    if state.in_block_comment {
        return match rest.find(";)") {
            Some(i) => {
                state.in_block_comment = false;
                (i + 2, Some(TokenClass::Comment))
            }
            None => (rest.len(), Some(TokenClass::Comment)),
        };
    }

    if rest.starts_with("(;") {
        state.in_block_comment = true;
        return (2, Some(TokenClass::Comment));
    }

    if rest.starts_with(";;") {
        return (rest.len(), Some(TokenClass::Comment));
    }

    let rules: [(&Regex, TokenClass); 5] = [
        (&*STRING, TokenClass::String),
        (&*HEX, TokenClass::Number),
        (&*DECIMAL, TokenClass::Number),
        (&*IDENT, TokenClass::Variable),
        (&*NUMERIC_OP, TokenClass::Keyword),
    ];
    for (re, class) in rules {
        if let Some(m) = re.find(rest) {
            return (m.end(), Some(class));
        }
    }

    let rules: [(&Regex, TokenClass); 3] = [
        (&*NAMESPACED_OP, TokenClass::Keyword),
        (&*TYPE, TokenClass::Type),
        (&*KEYWORD, TokenClass::Keyword),
    ];
    for (re, class) in rules {
        if let Some(m) = re.find(rest) {
            return (m.end(), Some(class));
        }
    }

    let Some(c) = rest.chars().next() else {
        return (0, None);
    };

    if c == '(' || c == ')' {
        return (1, Some(TokenClass::Bracket));
    }

    if c.is_whitespace() {
        let len = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        return (len, None);
    }

    if let Some(m) = WORD.find(rest) {
        return (m.end(), Some(TokenClass::Name));
    }

    (c.len_utf8(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(line: &str) -> Vec<(&str, TokenClass)> {
        let mut state = LineState::default();
        tokenize_line(line, &mut state)
            .into_iter()
            .map(|s| (&line[s.start..s.end], s.class))
            .collect()
    }

    #[test]
    fn classifies_function_header() {
        assert_eq!(
            classes("(func $add (param $a i32) (result i32)"),
            vec![
                ("(", TokenClass::Bracket),
                ("func", TokenClass::Keyword),
                ("$add", TokenClass::Variable),
                ("(", TokenClass::Bracket),
                ("param", TokenClass::Keyword),
                ("$a", TokenClass::Variable),
                ("i32", TokenClass::Type),
                (")", TokenClass::Bracket),
                ("(", TokenClass::Bracket),
                ("result", TokenClass::Keyword),
                ("i32", TokenClass::Type),
                (")", TokenClass::Bracket),
            ]
        );
    }

    #[test]
    fn dotted_instructions_and_numbers() {
        assert_eq!(
            classes("i32x4.splat local.get 0x1F -1.5e3"),
            vec![
                ("i32x4.splat", TokenClass::Keyword),
                ("local.get", TokenClass::Keyword),
                ("0x1F", TokenClass::Number),
                ("-1.5e3", TokenClass::Number),
            ]
        );
    }

    #[test]
    fn block_comment_spans_lines() {
        let lines = tokenize("(; start\nstill comment\nend ;) nop");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 2);
        assert!(lines[0].iter().all(|s| s.class == TokenClass::Comment));
        assert_eq!(lines[1].len(), 1);
        assert_eq!(lines[1][0].class, TokenClass::Comment);
        assert_eq!(lines[2][0].class, TokenClass::Comment);
        assert_eq!(lines[2][0].end, 6);
        assert_eq!(lines[2][1].class, TokenClass::Keyword);
    }

    #[test]
    fn line_comment_and_strings() {
        assert_eq!(
            classes(r#"(data "hi\"") ;; bytes"#),
            vec![
                ("(", TokenClass::Bracket),
                ("data", TokenClass::Keyword),
                (r#""hi\"""#, TokenClass::String),
                (")", TokenClass::Bracket),
                (";; bytes", TokenClass::Comment),
            ]
        );
    }

    #[test]
    fn keyword_prefix_of_longer_word_is_a_name() {
        assert_eq!(classes("module_name"), vec![("module_name", TokenClass::Name)]);
        assert_eq!(classes("br_if"), vec![("br_if", TokenClass::Keyword)]);
    }

    #[test]
    fn non_ascii_text_does_not_split_chars() {
        let spans = classes("nop ☃ nop");
        assert_eq!(spans.len(), 2);
    }
}

//! Minimal highlighter for code shown in hover tooltips.
//!
//! Not the editor grammar: one pass per line, no state between lines, just
//! enough classes to make signatures and short examples readable.

use super::{escape_html, TokenClass};

const TYPES: &[&str] = &[
    "i32", "i64", "f32", "f64", "v128", "funcref", "externref", "anyref",
];

const KEYWORDS: &[&str] = &[
    "module", "func", "param", "result", "local", "global", "table", "memory", "type", "import",
    "export", "block", "loop", "if", "then", "else", "end", "br", "br_if", "return", "call",
    "drop", "select", "unreachable", "nop",
];

/// Instruction suffixes that mark a dotted word as an instruction.
const OP_SUFFIXES: &[&str] = &[
    "get", "set", "const", "add", "sub", "mul", "div", "load", "store", "eq", "ne", "lt", "gt",
    "le", "ge",
];

/// Highlight `code` as HTML. Newlines are kept as-is.
pub fn highlight_tooltip_code(code: &str) -> String {
    code.split('\n')
        .map(highlight_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn highlight_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut out = String::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            out.push(c);
            i += 1;
            continue;
        }

        if c == ';' && chars.get(i + 1) == Some(&';') {
            push_span(&mut out, TokenClass::Comment, &chars[i..]);
            break;
        }

        if c == '"' {
            let mut end = i + 1;
            while end < len && (chars[end] != '"' || chars[end - 1] == '\\') {
                end += 1;
            }
            let end = (end + 1).min(len);
            push_span(&mut out, TokenClass::String, &chars[i..end]);
            i = end;
            continue;
        }

        if c == '(' || c == ')' {
            push_span(&mut out, TokenClass::Bracket, &chars[i..i + 1]);
            i += 1;
            continue;
        }

        if c == '$' {
            let end = scan(&chars, i + 1, |c| c.is_ascii_alphanumeric() || c == '_');
            push_span(&mut out, TokenClass::Variable, &chars[i..end]);
            i = end;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let end = scan(&chars, i, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            let word: String = chars[i..end].iter().collect();
            push_span(&mut out, classify_word(&word), &chars[i..end]);
            i = end;
            continue;
        }

        let negative_number = c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if c.is_ascii_digit() || negative_number {
            let start = if negative_number { i + 1 } else { i };
            let end = scan(&chars, start, |c| {
                c.is_ascii_hexdigit() || matches!(c, 'x' | '_' | '.')
            });
            push_span(&mut out, TokenClass::Number, &chars[i..end]);
            i = end;
            continue;
        }

        out.push_str(&escape_html(&c.to_string()));
        i += 1;
    }

    out
}

fn scan(chars: &[char], from: usize, accept: impl Fn(char) -> bool) -> usize {
    chars[from..]
        .iter()
        .position(|&c| !accept(c))
        .map_or(chars.len(), |n| from + n)
}

fn classify_word(word: &str) -> TokenClass {
    if TYPES.contains(&word) {
        return TokenClass::Type;
    }
    if KEYWORDS.contains(&word) {
        return TokenClass::Keyword;
    }
    let is_instruction = word
        .split('.')
        .skip(1)
        .any(|part| OP_SUFFIXES.iter().any(|op| part.starts_with(op)));
    if is_instruction {
        TokenClass::Keyword
    } else {
        TokenClass::Name
    }
}

fn push_span(out: &mut String, class: TokenClass, chars: &[char]) {
    let text: String = chars.iter().collect();
    out.push_str(&format!(
        "<span style=\"color:{}\">{}</span>",
        class.color(),
        escape_html(&text)
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(class: TokenClass, text: &str) -> String {
        format!("<span style=\"color:{}\">{}</span>", class.color(), text)
    }

    #[test]
    fn signature_line() {
        let html = highlight_tooltip_code("(func $add (param i32))");
        let expected = [
            span(TokenClass::Bracket, "("),
            span(TokenClass::Keyword, "func"),
            " ".into(),
            span(TokenClass::Variable, "$add"),
            " ".into(),
            span(TokenClass::Bracket, "("),
            span(TokenClass::Keyword, "param"),
            " ".into(),
            span(TokenClass::Type, "i32"),
            span(TokenClass::Bracket, ")"),
            span(TokenClass::Bracket, ")"),
        ]
        .concat();
        assert_eq!(html, expected);
    }

    #[test]
    fn instructions_are_keywords() {
        assert_eq!(classify_word("i32.add"), TokenClass::Keyword);
        assert_eq!(classify_word("local.get"), TokenClass::Keyword);
        assert_eq!(classify_word("memory.grow"), TokenClass::Name);
        assert_eq!(classify_word("funcref"), TokenClass::Type);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let html = highlight_tooltip_code("nop ;; does <nothing>");
        assert!(html.ends_with(&span(TokenClass::Comment, ";; does &lt;nothing&gt;")));
    }

    #[test]
    fn negative_and_hex_numbers() {
        let html = highlight_tooltip_code("-42 0xFF");
        assert_eq!(
            html,
            format!(
                "{} {}",
                span(TokenClass::Number, "-42"),
                span(TokenClass::Number, "0xFF")
            )
        );
    }

    #[test]
    fn escaped_quote_stays_in_string() {
        let html = highlight_tooltip_code(r#""a\"b" x"#);
        assert!(html.starts_with(&span(TokenClass::String, r#""a\"b""#)));
    }

    #[test]
    fn unterminated_string_stops_at_line_end() {
        let html = highlight_tooltip_code("\"abc\nnop");
        let (first, second) = html.split_once('\n').unwrap();
        assert_eq!(first, span(TokenClass::String, "\"abc"));
        assert_eq!(second, span(TokenClass::Keyword, "nop"));
    }

    #[test]
    fn unknown_characters_escaped() {
        assert_eq!(highlight_tooltip_code("<"), "&lt;");
    }
}

//! Fenced code block scanning for markdown documentation sources.

/// A fenced code block found in markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// First word of the fence's info string ("" when untagged).
    pub language: String,
    pub lines: Vec<String>,
    /// One-indexed line of the opening fence.
    pub fence_line: usize,
}

impl FencedBlock {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Markdown split into prose and fenced blocks, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Prose(String),
    Fence(FencedBlock),
}

/// Split `markdown` into segments. An unterminated fence stays prose.
pub fn segments(markdown: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut open: Option<(FencedBlock, Vec<&str>)> = None;

    for (i, line) in markdown.split('\n').enumerate() {
        match open.as_mut() {
            Some((block, raw)) => {
                raw.push(line);
                if is_closing_fence(line) {
                    if let Some((block, _)) = open.take() {
                        flush_prose(&mut out, &mut prose);
                        out.push(Segment::Fence(block));
                    }
                } else {
                    block.lines.push(line.to_string());
                }
            }
            None => match opening_fence(line) {
                Some(language) => {
                    let block = FencedBlock {
                        language: language.to_string(),
                        lines: Vec::new(),
                        fence_line: i + 1,
                    };
                    open = Some((block, vec![line]));
                }
                None => prose.push(line),
            },
        }
    }

    if let Some((block, raw)) = open {
        tracing::debug!("unterminated fence at line {}", block.fence_line);
        prose.extend(raw);
    }
    flush_prose(&mut out, &mut prose);
    out
}

/// Only the fenced blocks of `markdown`.
pub fn fenced_blocks(markdown: &str) -> Vec<FencedBlock> {
    segments(markdown)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Fence(block) => Some(block),
            Segment::Prose(_) => None,
        })
        .collect()
}

fn flush_prose(out: &mut Vec<Segment>, prose: &mut Vec<&str>) {
    if !prose.is_empty() {
        out.push(Segment::Prose(prose.join("\n")));
        prose.clear();
    }
}

/// Language of an opening fence line, if it is one.
fn opening_fence(line: &str) -> Option<&str> {
    let info = line.trim_start().strip_prefix("```")?;
    if info.contains('`') {
        return None;
    }
    Some(info.split_whitespace().next().unwrap_or(""))
}

fn is_closing_fence(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("```")
        .is_some_and(|rest| rest.trim().is_empty())
}

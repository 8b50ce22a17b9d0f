//! Semantic token stream decoding.
//!
//! The service encodes tokens as flat 5-tuples of `u32`:
//! `[delta_line, delta_start, length, token_type, modifier_bits]`.
//! `delta_start` is relative to the previous token's start only when both
//! sit on the same line.

use std::ops::Range;

use lsp_types::{Position, SemanticTokensLegend};

use super::position::LineIndex;

/// A decoded token in service coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsoluteToken {
    pub line: u32,
    pub start: u32,
    pub length: u32,
    pub token_type: String,
    pub modifiers: Vec<String>,
}

/// A decoded token in editor byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticSpan {
    pub span: Range<usize>,
    pub token_type: String,
    pub modifiers: Vec<String>,
}

/// Decode a token stream against its legend.
///
/// Tokens whose type index is outside the legend are skipped (their deltas
/// still advance the cursor). A trailing partial tuple is ignored. Deltas that
/// overflow the cursor end decoding; the tokens before them are kept.
pub fn decode(data: &[u32], legend: &SemanticTokensLegend) -> Vec<AbsoluteToken> {
    let chunks = data.chunks_exact(5);
    if !chunks.remainder().is_empty() {
        tracing::warn!(
            "semantic token stream has {} trailing values, ignoring",
            chunks.remainder().len()
        );
    }

    let mut tokens = Vec::with_capacity(data.len() / 5);
    let mut line = 0u32;
    let mut start = 0u32;

    for chunk in chunks {
        let [delta_line, delta_start, length, type_index, bits] =
            [chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]];

        let next_start = if delta_line == 0 {
            start.checked_add(delta_start)
        } else {
            Some(delta_start)
        };
        let (Some(next_line), Some(next_start)) = (line.checked_add(delta_line), next_start) else {
            tracing::warn!(
                "semantic token stream overflows after {} token(s), ignoring the rest",
                tokens.len()
            );
            break;
        };
        line = next_line;
        start = next_start;

        let Some(token_type) = legend.token_types.get(type_index as usize) else {
            tracing::debug!("semantic token type {type_index} not in legend");
            continue;
        };

        let modifiers = legend
            .token_modifiers
            .iter()
            .enumerate()
            .filter(|(bit, _)| *bit < 32 && bits & (1 << bit) != 0)
            .map(|(_, m)| m.as_str().to_string())
            .collect();

        tokens.push(AbsoluteToken {
            line,
            start,
            length,
            token_type: token_type.as_str().to_string(),
            modifiers,
        });
    }

    tokens
}

/// Translate decoded tokens into byte spans of `text`.
pub fn to_spans(tokens: Vec<AbsoluteToken>, text: &str) -> Vec<SemanticSpan> {
    let index = LineIndex::new(text);
    tokens
        .into_iter()
        .map(|t| {
            let from = index.offset_of(Position::new(t.line, t.start));
            let to = index
                .offset_of(Position::new(t.line, t.start.saturating_add(t.length)))
                .max(from);
            SemanticSpan {
                span: from..to,
                token_type: t.token_type,
                modifiers: t.modifiers,
            }
        })
        .collect()
}

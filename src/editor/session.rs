//! One live editor: its buffer, its decorations and its language queries.

use std::ops::Range as Span;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;

use super::debounce::Debouncer;
use super::{EditorError, EditorFlavor, SessionId};
use crate::highlight::{tokenize, HighlightSpan};
use crate::lifecycle::EnhancerEvent;
use crate::lsp::bridge::{
    is_completion_trigger, Completion, Decoration, HoverTooltip, LanguageBridge, Marker,
};
use crate::lsp::position::{EditorPosition, EditorRange, LineIndex};
use crate::lsp::semantic::SemanticSpan;
use crate::page::BlockId;

/// Replace the bytes in `range` with `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Span<usize>,
    pub insert: String,
}

impl TextEdit {
    pub fn new(range: Span<usize>, insert: impl Into<String>) -> Self {
        Self {
            range,
            insert: insert.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }
}

#[derive(Debug)]
struct Buffer {
    text: String,
    /// Bumped on every edit.
    generation: u64,
}

#[derive(Debug, Default)]
struct Shown {
    /// Generation the decorations were computed from.
    generation: Option<u64>,
    decorations: Vec<Decoration>,
}

#[derive(Debug)]
struct Shared {
    buffer: Mutex<Buffer>,
    shown: Mutex<Shown>,
}

impl Shared {
    fn buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn shown(&self) -> MutexGuard<'_, Shown> {
        self.shown.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Where `offset` lands after `replaced` is swapped for `inserted` bytes.
/// Offsets inside the replaced range collapse to its start.
fn map_through_edit(offset: usize, replaced: Span<usize>, inserted: usize) -> usize {
    if offset <= replaced.start {
        offset
    } else if offset >= replaced.end {
        offset - replaced.len() + inserted
    } else {
        replaced.start
    }
}

fn clamp_offset(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Everything a diagnostics refresh needs, detached from the session so a
/// timer can own it.
#[derive(Debug, Clone)]
struct Refresher {
    block: BlockId,
    bridge: LanguageBridge,
    shared: Arc<Shared>,
    events: Option<broadcast::Sender<EnhancerEvent>>,
}

impl Refresher {
    /// Parse+diagnose the current text. Returns whether the result was shown.
    async fn run(self) -> bool {
        let (text, generation) = {
            let buffer = self.shared.buffer();
            (buffer.text.clone(), buffer.generation)
        };

        let decorations = self.bridge.diagnostics(&text).await;
        if self.bridge.handle().failure().is_some() {
            return false;
        }

        let count = decorations.len();
        {
            let buffer = self.shared.buffer();
            let mut shown = self.shared.shown();
            if shown.generation.is_some_and(|g| g > generation) {
                tracing::debug!("{}: dropping diagnostics for generation {generation}", self.block);
                return false;
            }
            shown.generation = Some(generation);
            shown.decorations = decorations;
            // edited while the service was busy
            if buffer.generation != generation {
                for d in &mut shown.decorations {
                    d.from = clamp_offset(&buffer.text, d.from);
                    d.to = clamp_offset(&buffer.text, d.to).max(d.from);
                }
            }
        }

        tracing::debug!("{}: {count} diagnostic(s)", self.block);
        if let Some(events) = &self.events {
            let _ = events.send(EnhancerEvent::DiagnosticsUpdated {
                block: self.block.clone(),
                count,
            });
        }
        true
    }
}

/// A mounted editor. Dropping it cancels any pending diagnostics timer.
#[derive(Debug)]
pub struct EditorSession {
    id: SessionId,
    flavor: EditorFlavor,
    diagnostics_enabled: bool,
    refresher: Refresher,
    debouncer: Debouncer,
}

impl EditorSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SessionId,
        block: BlockId,
        flavor: EditorFlavor,
        text: String,
        bridge: LanguageBridge,
        diagnostics_enabled: bool,
        debounce: Duration,
        events: Option<broadcast::Sender<EnhancerEvent>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer {
                text,
                generation: 0,
            }),
            shown: Mutex::new(Shown::default()),
        });
        Self {
            id,
            flavor,
            diagnostics_enabled,
            refresher: Refresher {
                block,
                bridge,
                shared,
                events,
            },
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn block(&self) -> &BlockId {
        &self.refresher.block
    }

    pub fn flavor(&self) -> EditorFlavor {
        self.flavor
    }

    pub fn is_read_only(&self) -> bool {
        !self.flavor.capabilities().editable
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics_enabled
    }

    pub fn text(&self) -> String {
        self.refresher.shared.buffer().text.clone()
    }

    /// Number of edits applied so far.
    pub fn generation(&self) -> u64 {
        self.refresher.shared.buffer().generation
    }

    /// Decorations currently shown. Spans always lie within the current text.
    pub fn diagnostics(&self) -> Vec<Decoration> {
        self.refresher.shared.shown().decorations.clone()
    }

    /// Shown decorations as one-indexed markers, for widgets that address
    /// lines and columns.
    pub fn markers(&self) -> Vec<Marker> {
        let buffer = self.refresher.shared.buffer();
        let shown = self.refresher.shared.shown();
        let index = LineIndex::new(&buffer.text);
        shown
            .decorations
            .iter()
            .map(|d| Marker::from_decoration(d, &index))
            .collect()
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn apply_edit(&self, edit: TextEdit) -> Result<(), EditorError> {
        if self.is_read_only() {
            return Err(EditorError::ReadOnly);
        }
        {
            let mut buffer = self.refresher.shared.buffer();
            let Span { start, end } = edit.range;
            let valid = start <= end
                && end <= buffer.text.len()
                && buffer.text.is_char_boundary(start)
                && buffer.text.is_char_boundary(end);
            if !valid {
                return Err(EditorError::InvalidRange { start, end });
            }
            buffer.text.replace_range(start..end, &edit.insert);
            buffer.generation += 1;

            let inserted = edit.insert.len();
            for d in &mut self.refresher.shared.shown().decorations {
                d.from = map_through_edit(d.from, start..end, inserted);
                d.to = map_through_edit(d.to, start..end, inserted).max(d.from);
            }
        }
        self.schedule_refresh();
        Ok(())
    }

    /// Replace the whole buffer.
    pub fn replace_text(&self, text: impl Into<String>) -> Result<(), EditorError> {
        let len = self.refresher.shared.buffer().text.len();
        self.apply_edit(TextEdit::new(0..len, text))
    }

    /// Run diagnostics now, bypassing the debounce timer.
    pub async fn refresh_diagnostics(&self) -> bool {
        if !self.diagnostics_enabled {
            return false;
        }
        self.refresher.clone().run().await
    }

    pub async fn hover(&self, offset: usize) -> Option<HoverTooltip> {
        if !self.flavor.capabilities().hover {
            return None;
        }
        let text = self.text();
        self.refresher.bridge.hover(&text, offset).await
    }

    pub async fn completions(&self, offset: usize) -> Vec<Completion> {
        if !self.flavor.capabilities().completion {
            return Vec::new();
        }
        let text = self.text();
        self.refresher.bridge.completions(&text, offset).await
    }

    /// Completions after typing at `offset`; empty unless the character just
    /// typed is a trigger character.
    pub async fn completions_after_typing(&self, offset: usize) -> Vec<Completion> {
        if !is_completion_trigger(&self.text(), offset) {
            return Vec::new();
        }
        self.completions(offset).await
    }

    /// `definition` in one-indexed editor coordinates.
    pub async fn definition_at(&self, pos: EditorPosition) -> Option<EditorRange> {
        if !self.flavor.capabilities().definition {
            return None;
        }
        let text = self.text();
        let index = LineIndex::new(&text);
        let span = self
            .refresher
            .bridge
            .definition(&text, index.offset_at(pos))
            .await?;
        Some(index.editor_range(span))
    }

    pub async fn definition(&self, offset: usize) -> Option<Span<usize>> {
        if !self.flavor.capabilities().definition {
            return None;
        }
        let text = self.text();
        self.refresher.bridge.definition(&text, offset).await
    }

    pub async fn semantic_tokens(&self) -> Vec<SemanticSpan> {
        if !self.flavor.capabilities().semantic_tokens {
            return Vec::new();
        }
        let text = self.text();
        self.refresher.bridge.semantic_tokens(&text).await
    }

    /// Lexical highlighting of the current buffer, one span list per line.
    pub fn highlight(&self) -> Vec<Vec<HighlightSpan>> {
        tokenize(&self.text())
    }

    /// First diagnostics pass after mounting: debounced for editable
    /// widgets, a single background run for read-only ones.
    pub(crate) fn start_diagnostics(&self) {
        if !self.diagnostics_enabled {
            return;
        }
        if self.flavor.capabilities().live_diagnostics {
            self.schedule_refresh();
        } else {
            tokio::spawn(self.refresher.clone().run());
        }
    }

    fn schedule_refresh(&self) {
        if !self.diagnostics_enabled || !self.flavor.capabilities().live_diagnostics {
            return;
        }
        let refresher = self.refresher.clone();
        self.debouncer.schedule(async move {
            refresher.run().await;
        });
    }
}

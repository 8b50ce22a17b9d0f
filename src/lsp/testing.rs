//! In-memory analysis service with scripted behaviour.
//!
//! Stands in for the external language server in tests and demos. Like the
//! real service it answers every query from the text last given to `parse`,
//! so callers that forget to re-parse get stale answers. Every call is
//! recorded in a shared journal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, Position, Range,
    SemanticTokenType, SemanticTokensLegend,
};

use super::position::LineIndex;
use super::{AnalysisService, HoverInfo, LoadError, ServiceError, ServiceLoader};

/// One recorded call into the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Parse(String),
    Diagnostics,
    Hover(Position),
    Completion(Position),
    Definition(Position),
    Legend,
    SemanticTokens,
}

/// Shared record of calls, readable while the service lives in a queue.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<ServiceCall>>>);

impl Journal {
    fn push(&self, call: ServiceCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Texts passed to `parse`, in order.
    pub fn parsed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ServiceCall::Parse(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &ServiceCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

const COMPLETIONS: &[(&str, &str)] = &[
    ("i32.add", "[i32, i32] -> [i32]"),
    ("i32.const", "[] -> [i32]"),
    ("i64.add", "[i64, i64] -> [i64]"),
    ("local.get", "[] -> [t]"),
    ("local.set", "[t] -> []"),
];

/// Scripted analysis service.
///
/// Lines containing the error marker produce an error diagnostic spanning
/// the marker; lines containing the warning marker produce a warning.
#[derive(Debug, Clone)]
pub struct ScriptedService {
    text: String,
    error_marker: String,
    warning_marker: Option<String>,
    fail_queries: bool,
    panic_on_hover: bool,
    ready: bool,
    journal: Journal,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            error_marker: "oops".into(),
            warning_marker: None,
            fail_queries: false,
            panic_on_hover: false,
            ready: true,
            journal: Journal::default(),
        }
    }

    pub fn with_error_marker(mut self, marker: &str) -> Self {
        self.error_marker = marker.into();
        self
    }

    pub fn with_warning_marker(mut self, marker: &str) -> Self {
        self.warning_marker = Some(marker.into());
        self
    }

    /// Every query after `parse` returns an error.
    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// Hover queries panic, as a misbehaving foreign binary might.
    pub fn panicking_hover(mut self) -> Self {
        self.panic_on_hover = true;
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn check(&self, query: &'static str) -> Result<(), ServiceError> {
        if self.fail_queries {
            return Err(ServiceError::Query {
                query,
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }

    fn marker_diagnostics(&self, marker: &str, severity: DiagnosticSeverity) -> Vec<Diagnostic> {
        let index = LineIndex::new(&self.text);
        self.text
            .match_indices(marker)
            .map(|(offset, _)| Diagnostic {
                range: Range::new(
                    index.position_of(offset),
                    index.position_of(offset + marker.len()),
                ),
                severity: Some(severity),
                message: format!("unexpected token `{marker}`"),
                ..Default::default()
            })
            .collect()
    }

    /// The word under `pos` and its byte span.
    fn word_at(&self, pos: Position) -> Option<(usize, usize)> {
        let index = LineIndex::new(&self.text);
        let offset = index.offset_of(pos);
        let is_word = |c: char| !c.is_whitespace() && !matches!(c, '(' | ')' | '"');
        let start = self.text[..offset]
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word(*c))
            .last()
            .map(|(i, _)| i)
            .unwrap_or(offset);
        let end = self.text[offset..]
            .char_indices()
            .find(|(_, c)| !is_word(*c))
            .map(|(i, _)| offset + i)
            .unwrap_or(self.text.len());
        (start < end).then_some((start, end))
    }

    fn range_of(&self, start: usize, end: usize) -> Range {
        let index = LineIndex::new(&self.text);
        Range::new(index.position_of(start), index.position_of(end))
    }
}

impl AnalysisService for ScriptedService {
    fn ready(&self) -> bool {
        self.ready
    }

    fn parse(&mut self, text: &str) -> Result<(), ServiceError> {
        self.journal.push(ServiceCall::Parse(text.to_string()));
        self.text = text.to_string();
        Ok(())
    }

    fn diagnostics(&self) -> Result<Vec<Diagnostic>, ServiceError> {
        self.journal.push(ServiceCall::Diagnostics);
        self.check("diagnostics")?;
        let mut diags = self.marker_diagnostics(&self.error_marker, DiagnosticSeverity::ERROR);
        if let Some(marker) = &self.warning_marker {
            diags.extend(self.marker_diagnostics(marker, DiagnosticSeverity::WARNING));
        }
        Ok(diags)
    }

    fn hover(&self, pos: Position) -> Result<Option<HoverInfo>, ServiceError> {
        self.journal.push(ServiceCall::Hover(pos));
        if self.panic_on_hover {
            panic!("scripted hover panic");
        }
        self.check("hover")?;
        Ok(self.word_at(pos).map(|(start, end)| {
            let word = &self.text[start..end];
            HoverInfo {
                content: format!("```wat\n{word}\n```\nHovered `{word}`"),
                range: Some(self.range_of(start, end)),
            }
        }))
    }

    fn completion(&self, pos: Position) -> Result<Vec<CompletionItem>, ServiceError> {
        self.journal.push(ServiceCall::Completion(pos));
        self.check("completion")?;
        let index = LineIndex::new(&self.text);
        let offset = index.offset_of(pos);
        let prefix = self
            .word_at(pos)
            .map(|(start, _)| &self.text[start..offset.max(start)])
            .unwrap_or("");
        Ok(COMPLETIONS
            .iter()
            .filter(|(label, _)| label.starts_with(prefix))
            .map(|(label, detail)| CompletionItem {
                label: label.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                detail: Some(detail.to_string()),
                ..Default::default()
            })
            .collect())
    }

    fn definition(&self, pos: Position) -> Result<Option<Range>, ServiceError> {
        self.journal.push(ServiceCall::Definition(pos));
        self.check("definition")?;
        let Some((start, end)) = self.word_at(pos) else {
            return Ok(None);
        };
        let word = &self.text[start..end];
        if !word.starts_with('$') {
            return Ok(None);
        }
        Ok(self
            .text
            .find(word)
            .map(|first| self.range_of(first, first + word.len())))
    }

    fn semantic_tokens_legend(&self) -> Result<SemanticTokensLegend, ServiceError> {
        self.journal.push(ServiceCall::Legend);
        Ok(SemanticTokensLegend {
            token_types: vec![SemanticTokenType::KEYWORD, SemanticTokenType::VARIABLE],
            token_modifiers: Vec::new(),
        })
    }

    /// `$identifiers` as variables, everything else unclassified.
    fn semantic_tokens(&self) -> Result<Vec<u32>, ServiceError> {
        self.journal.push(ServiceCall::SemanticTokens);
        self.check("semantic tokens")?;
        let index = LineIndex::new(&self.text);
        let mut data = Vec::new();
        let (mut prev_line, mut prev_start) = (0u32, 0u32);
        for (offset, _) in self.text.match_indices('$') {
            let len = self.text[offset..]
                .find(|c: char| c.is_whitespace() || c == ')' || c == '(')
                .unwrap_or(self.text.len() - offset);
            let pos = index.position_of(offset);
            let delta_line = pos.line - prev_line;
            let delta_start = if delta_line == 0 {
                pos.character - prev_start
            } else {
                pos.character
            };
            data.extend([delta_line, delta_start, len as u32, 1, 0]);
            prev_line = pos.line;
            prev_start = pos.character;
        }
        Ok(data)
    }
}

/// Loader handing out a `ScriptedService`, counting how often it is asked.
#[derive(Debug)]
pub struct ScriptedLoader {
    service: ScriptedService,
    delay: Duration,
    fail: Option<String>,
    loads: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn new(service: ScriptedService) -> Self {
        Self {
            service,
            delay: Duration::ZERO,
            fail: None,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate a slow asset download before the service is available.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Simulate an asset fetch failure.
    pub fn failing(mut self, reason: &str) -> Self {
        self.fail = Some(reason.into());
        self
    }

    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        self.loads.clone()
    }
}

#[async_trait]
impl ServiceLoader for ScriptedLoader {
    async fn load(&self) -> Result<Box<dyn AnalysisService>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(reason) = &self.fail {
            return Err(LoadError::Fetch {
                location: "/wasm/wat_lsp_rust_bg.wasm".into(),
                message: reason.clone(),
            });
        }
        Ok(Box::new(self.service.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_answer_for_last_parse() {
        let mut svc = ScriptedService::new();
        svc.parse("(module oops)").unwrap();
        assert_eq!(svc.diagnostics().unwrap().len(), 1);
        svc.parse("(module)").unwrap();
        assert!(svc.diagnostics().unwrap().is_empty());
    }

    #[test]
    fn hover_reports_word_range() {
        let mut svc = ScriptedService::new();
        svc.parse("(func $main)").unwrap();
        let hover = svc.hover(Position::new(0, 7)).unwrap().unwrap();
        assert!(hover.content.contains("$main"));
        assert_eq!(
            hover.range,
            Some(Range::new(Position::new(0, 6), Position::new(0, 11)))
        );
    }

    #[test]
    fn completion_filters_by_prefix() {
        let mut svc = ScriptedService::new();
        svc.parse("(i32.").unwrap();
        let items = svc.completion(Position::new(0, 5)).unwrap();
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["i32.add", "i32.const"]);
    }

    #[test]
    fn journal_records_calls() {
        let mut svc = ScriptedService::new();
        let journal = svc.journal();
        svc.parse("x").unwrap();
        svc.diagnostics().unwrap();
        assert_eq!(
            journal.calls(),
            vec![ServiceCall::Parse("x".into()), ServiceCall::Diagnostics]
        );
    }
}

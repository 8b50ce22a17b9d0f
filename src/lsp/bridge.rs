//! Editor-facing language features.
//!
//! Every method takes the editor's current text and a byte offset, waits for
//! the shared service if it is still loading, runs one parse+query job on the
//! queue and translates the answer back into editor terms. When the service
//! is unavailable the answer is empty; callers never see an error.

use std::ops::Range as Span;

use lsp_types::{CompletionItem, Diagnostic, DiagnosticSeverity, Documentation};

use super::handle::ServiceHandle;
use super::position::{EditorRange, LineIndex};
use super::semantic::{self, SemanticSpan};
use crate::markup::render_hover;

/// Characters after which the editor asks for completions unprompted.
pub const TRIGGER_CHARACTERS: &[char] = &['.', '$', '@', '2', '4'];

/// Whether the character just before `offset` asks for completions.
pub fn is_completion_trigger(text: &str, offset: usize) -> bool {
    let mut end = offset.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end]
        .chars()
        .next_back()
        .is_some_and(|c| TRIGGER_CHARACTERS.contains(&c))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// `1` is an error, `2` a warning, anything else (or nothing) info.
    pub fn from_service(severity: Option<DiagnosticSeverity>) -> Self {
        match severity {
            Some(DiagnosticSeverity::ERROR) => Self::Error,
            Some(DiagnosticSeverity::WARNING) => Self::Warning,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A diagnostic placed on the editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub severity: Severity,
    pub message: String,
}

impl Decoration {
    fn from_service(diagnostic: Diagnostic, index: &LineIndex<'_>) -> Self {
        let span = index.span_of(diagnostic.range);
        Self {
            from: span.start,
            to: span.end,
            severity: Severity::from_service(diagnostic.severity),
            message: diagnostic.message,
        }
    }
}

/// A decoration in one-indexed line/column coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub range: EditorRange,
    pub severity: Severity,
    pub message: String,
}

impl Marker {
    pub fn from_decoration(decoration: &Decoration, index: &LineIndex<'_>) -> Self {
        Self {
            range: index.editor_range(decoration.from..decoration.to),
            severity: decoration.severity,
            message: decoration.message.clone(),
        }
    }
}

/// Rendered hover content and the buffer span it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverTooltip {
    pub html: String,
    pub range: Option<Span<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub insert_text: String,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    /// Buffer offset the completion applies at.
    pub at: usize,
}

impl Completion {
    fn from_service(item: CompletionItem, at: usize) -> Self {
        let documentation = item.documentation.map(|doc| match doc {
            Documentation::String(s) => s,
            Documentation::MarkupContent(markup) => markup.value,
        });
        Self {
            insert_text: item.insert_text.unwrap_or_else(|| item.label.clone()),
            label: item.label,
            detail: item.detail,
            documentation,
            at,
        }
    }
}

/// Language features for one or many editors over the shared service.
#[derive(Debug, Clone)]
pub struct LanguageBridge {
    handle: ServiceHandle,
}

impl LanguageBridge {
    pub fn new(handle: ServiceHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }

    pub async fn diagnostics(&self, text: &str) -> Vec<Decoration> {
        let Some(queue) = self.handle.initialize().await else {
            return Vec::new();
        };
        let diagnostics = queue.diagnostics(text.to_string()).await;
        let index = LineIndex::new(text);
        diagnostics
            .into_iter()
            .map(|d| Decoration::from_service(d, &index))
            .collect()
    }

    pub async fn hover(&self, text: &str, offset: usize) -> Option<HoverTooltip> {
        let queue = self.handle.initialize().await?;
        let index = LineIndex::new(text);
        let info = queue.hover(text.to_string(), index.position_of(offset)).await?;
        if info.content.trim().is_empty() {
            return None;
        }
        Some(HoverTooltip {
            html: render_hover(&info.content),
            range: info.range.map(|r| index.span_of(r)),
        })
    }

    pub async fn completions(&self, text: &str, offset: usize) -> Vec<Completion> {
        let Some(queue) = self.handle.initialize().await else {
            return Vec::new();
        };
        let index = LineIndex::new(text);
        let at = offset.min(text.len());
        queue
            .completion(text.to_string(), index.position_of(offset))
            .await
            .into_iter()
            .map(|item| Completion::from_service(item, at))
            .collect()
    }

    /// Span of the definition of the symbol at `offset`.
    pub async fn definition(&self, text: &str, offset: usize) -> Option<Span<usize>> {
        let queue = self.handle.initialize().await?;
        let index = LineIndex::new(text);
        let range = queue
            .definition(text.to_string(), index.position_of(offset))
            .await?;
        Some(index.span_of(range))
    }

    pub async fn semantic_tokens(&self, text: &str) -> Vec<SemanticSpan> {
        let Some(queue) = self.handle.initialize().await else {
            return Vec::new();
        };
        let Some(legend) = queue.legend().cloned() else {
            return Vec::new();
        };
        let data = queue.semantic_tokens(text.to_string()).await;
        semantic::to_spans(semantic::decode(&data, &legend), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::testing::{ScriptedLoader, ScriptedService, ServiceCall};

    fn bridge(service: ScriptedService) -> LanguageBridge {
        LanguageBridge::new(ServiceHandle::new(ScriptedLoader::new(service)))
    }

    #[test]
    fn severity_mapping() {
        assert_eq!(Severity::from_service(Some(DiagnosticSeverity::ERROR)), Severity::Error);
        assert_eq!(Severity::from_service(Some(DiagnosticSeverity::WARNING)), Severity::Warning);
        assert_eq!(Severity::from_service(Some(DiagnosticSeverity::HINT)), Severity::Info);
        assert_eq!(
            Severity::from_service(Some(DiagnosticSeverity::INFORMATION)),
            Severity::Info
        );
        assert_eq!(Severity::from_service(None), Severity::Info);
    }

    #[tokio::test]
    async fn diagnostics_become_decorations() {
        let text = "(module\n  (func oops)\n)";
        let decorations = bridge(ScriptedService::new()).diagnostics(text).await;
        assert_eq!(decorations.len(), 1);
        let d = &decorations[0];
        assert_eq!(&text[d.from..d.to], "oops");
        assert_eq!(d.severity, Severity::Error);
    }

    #[tokio::test]
    async fn warnings_are_mapped() {
        let service = ScriptedService::new().with_warning_marker("unused");
        let decorations = bridge(service).diagnostics("(local $unused i32)").await;
        assert_eq!(decorations.len(), 1);
        assert_eq!(decorations[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn every_query_parses_current_text_first() {
        let service = ScriptedService::new();
        let journal = service.journal();
        let bridge = bridge(service);

        bridge.hover("nop", 1).await;
        bridge.completions("i32.", 4).await;
        bridge.definition("drop", 0).await;

        let calls = journal.calls();
        let queries: Vec<_> = calls
            .windows(2)
            .filter(|w| !matches!(w[1], ServiceCall::Parse(_) | ServiceCall::Legend))
            .map(|w| w[0].clone())
            .collect();
        assert_eq!(
            queries,
            vec![
                ServiceCall::Parse("nop".into()),
                ServiceCall::Parse("i32.".into()),
                ServiceCall::Parse("drop".into()),
            ]
        );
    }

    #[tokio::test]
    async fn hover_renders_markup_and_span() {
        let text = "(func $add)";
        let tooltip = bridge(ScriptedService::new()).hover(text, 7).await.unwrap();
        assert!(tooltip.html.starts_with("<pre class=\"cm-tooltip-codeblock\">"));
        assert!(tooltip.html.contains("<code>$add</code>"));
        assert_eq!(tooltip.range, Some(6..10));
    }

    #[tokio::test]
    async fn completions_default_insert_text_to_label() {
        let completions = bridge(ScriptedService::new()).completions("i32.", 4).await;
        let labels: Vec<_> = completions.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["i32.add", "i32.const"]);
        assert!(completions.iter().all(|c| c.insert_text == c.label && c.at == 4));
    }

    #[tokio::test]
    async fn definition_points_at_first_occurrence() {
        let text = "(func $f)\n(call $f)";
        let span = bridge(ScriptedService::new()).definition(text, 17).await;
        assert_eq!(span, Some(6..8));
    }

    #[tokio::test]
    async fn semantic_tokens_as_spans() {
        let text = "(local.get $x)";
        let spans = bridge(ScriptedService::new()).semantic_tokens(text).await;
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].span.clone()], "$x");
        assert_eq!(spans[0].token_type, "variable");
    }

    #[tokio::test]
    async fn unavailable_service_answers_empty() {
        let loader = ScriptedLoader::new(ScriptedService::new()).failing("connection refused");
        let bridge = LanguageBridge::new(ServiceHandle::new(loader));
        assert!(bridge.diagnostics("oops").await.is_empty());
        assert!(bridge.hover("nop", 0).await.is_none());
        assert!(bridge.completions("i32.", 4).await.is_empty());
        assert!(bridge.definition("$f", 0).await.is_none());
        assert!(bridge.semantic_tokens("$f").await.is_empty());
    }

    #[test]
    fn range_past_the_document_is_clamped() {
        let text = "(module)\nnop";
        let index = LineIndex::new(text);
        let diagnostic = Diagnostic {
            range: lsp_types::Range::new(
                lsp_types::Position::new(1, 1),
                lsp_types::Position::new(7, 40),
            ),
            severity: Some(DiagnosticSeverity::ERROR),
            message: "stale".into(),
            ..Default::default()
        };
        let d = Decoration::from_service(diagnostic, &index);
        assert_eq!((d.from, d.to), (10, text.len()));
    }

    #[test]
    fn completion_triggers() {
        assert!(is_completion_trigger("i32.", 4));
        assert!(is_completion_trigger("(call $", 7));
        assert!(is_completion_trigger("i64", 3));
        assert!(!is_completion_trigger("nop", 3));
        assert!(!is_completion_trigger("", 0));
        assert!(is_completion_trigger("i32.", 99));
        // inside a multi-byte character
        assert!(!is_completion_trigger("é", 1));
    }

    #[test]
    fn markers_are_one_indexed() {
        let text = "(module
  oops)";
        let index = LineIndex::new(text);
        let decoration = Decoration {
            from: 10,
            to: 14,
            severity: Severity::Error,
            message: "unknown operator".into(),
        };
        let marker = Marker::from_decoration(&decoration, &index);
        assert_eq!(marker.range.start.line_number, 2);
        assert_eq!(marker.range.start.column, 3);
        assert_eq!(marker.range.end.column, 7);
        assert_eq!(marker.severity, Severity::Error);
    }
}

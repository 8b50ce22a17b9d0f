//! Live editor widgets replacing static code blocks.
//!
//! - `mod.rs`: flavours, sizing, text extraction, the mounter
//! - `session.rs`: EditorSession, buffer, decorations, language queries
//! - `debounce.rs`: single pending timer, last schedule wins

pub mod debounce;
pub mod session;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::lifecycle::EnhancerEvent;
use crate::lsp::bridge::LanguageBridge;
use crate::page::{BlockId, CodeBlock, Page, PageError};

pub use debounce::Debouncer;
pub use session::{EditorSession, TextEdit};

/// Which editor integration replaces the blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorFlavor {
    /// Editable; hover and debounced diagnostics.
    #[default]
    Lightweight,
    /// Read-only; hover, completion, definition, semantic tokens, and
    /// diagnostics computed once after mounting.
    Full,
}

/// What a flavour's widget offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub editable: bool,
    pub hover: bool,
    pub completion: bool,
    pub definition: bool,
    pub semantic_tokens: bool,
    /// Diagnostics re-run after every edit (debounced).
    pub live_diagnostics: bool,
}

impl EditorFlavor {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Lightweight => Capabilities {
                editable: true,
                hover: true,
                completion: false,
                definition: false,
                semantic_tokens: false,
                live_diagnostics: true,
            },
            Self::Full => Capabilities {
                editable: false,
                hover: true,
                completion: true,
                definition: true,
                semantic_tokens: true,
                live_diagnostics: false,
            },
        }
    }
}

/// Widget height in pixels: `lines * line_height + padding`, clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightPolicy {
    pub min_height: u32,
    pub max_height: u32,
    pub line_height: u32,
    pub padding: u32,
}

impl Default for HeightPolicy {
    fn default() -> Self {
        Self {
            min_height: 120,
            max_height: 400,
            line_height: 20,
            padding: 40,
        }
    }
}

impl HeightPolicy {
    pub fn height_for(&self, line_count: usize) -> u32 {
        let lines = u32::try_from(line_count).unwrap_or(u32::MAX);
        let natural = lines
            .saturating_mul(self.line_height)
            .saturating_add(self.padding);
        natural.clamp(self.min_height, self.max_height.max(self.min_height))
    }
}

/// The exact source of a block, or `None` when it is blank.
///
/// Per-line elements are joined with `\n` after stripping newlines that
/// leaked into their edges; blank lines between them survive. Without line
/// elements the single text container is used as is.
pub fn extract_text(block: &CodeBlock) -> Option<String> {
    let text = if block.lines.is_empty() {
        block.text.clone()
    } else {
        block
            .lines
            .iter()
            .map(|line| line.trim_matches('\n'))
            .collect::<Vec<_>>()
            .join("\n")
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Identity of a live editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the host puts where the static block was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSpec {
    pub block: BlockId,
    pub session: SessionId,
    pub flavor: EditorFlavor,
    pub height: u32,
    pub line_count: usize,
    pub read_only: bool,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("block {0} has no code")]
    EmptyBlock(BlockId),
    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    #[error("editor is read-only")]
    ReadOnly,
    #[error("edit range {start}..{end} is outside the buffer or splits a character")]
    InvalidRange { start: usize, end: usize },
}

/// Turns code blocks into editor sessions.
#[derive(Debug, Clone)]
pub struct Mounter {
    flavor: EditorFlavor,
    heights: HeightPolicy,
    debounce: Duration,
}

impl Mounter {
    pub fn new(flavor: EditorFlavor, heights: HeightPolicy, debounce: Duration) -> Self {
        Self {
            flavor,
            heights,
            debounce,
        }
    }

    pub fn flavor(&self) -> EditorFlavor {
        self.flavor
    }

    /// Replace `block` on `page` with a live editor holding its exact text.
    ///
    /// Never waits for the analysis service: language features attach when
    /// it becomes ready. Must run inside a tokio runtime.
    pub fn mount(
        &self,
        block: &CodeBlock,
        page: &mut dyn Page,
        bridge: &LanguageBridge,
        diagnostics_enabled: bool,
        events: Option<broadcast::Sender<EnhancerEvent>>,
    ) -> Result<EditorSession, MountError> {
        let text = extract_text(block).ok_or_else(|| MountError::EmptyBlock(block.id.clone()))?;
        let line_count = text.split('\n').count();
        let caps = self.flavor.capabilities();

        let widget = WidgetSpec {
            block: block.id.clone(),
            session: SessionId::new(),
            flavor: self.flavor,
            height: self.heights.height_for(line_count),
            line_count,
            read_only: !caps.editable,
            text: text.clone(),
        };
        let session_id = widget.session;
        page.replace_block(&block.id, widget)?;

        tracing::debug!(
            "mounted {:?} editor for {} ({line_count} lines)",
            self.flavor,
            block.id
        );

        let session = EditorSession::new(
            session_id,
            block.id.clone(),
            self.flavor,
            text,
            bridge.clone(),
            diagnostics_enabled,
            self.debounce,
            events,
        );
        session.start_diagnostics();
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::handle::ServiceHandle;
    use crate::lsp::testing::{ScriptedLoader, ScriptedService};
    use crate::page::{ContainerId, PageNode, StaticPage};

    fn block(lines: &[&str], text: &str) -> CodeBlock {
        CodeBlock {
            id: BlockId::new("b1"),
            language: "wat".into(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            text: text.into(),
            container: ContainerId("figure-b1".into()),
            source_line: None,
        }
    }

    fn bridge() -> LanguageBridge {
        LanguageBridge::new(ServiceHandle::new(ScriptedLoader::new(ScriptedService::new())))
    }

    #[test]
    fn line_elements_joined_with_blank_lines_kept() {
        let b = block(&["(module", "", "  (func))\n"], "");
        assert_eq!(extract_text(&b).unwrap(), "(module\n\n  (func))");
    }

    #[test]
    fn edge_newlines_stripped_per_line() {
        let b = block(&["\n(module\n", "\n)"], "");
        assert_eq!(extract_text(&b).unwrap(), "(module\n)");
    }

    #[test]
    fn falls_back_to_text_container() {
        let b = block(&[], "(module)\n");
        assert_eq!(extract_text(&b).unwrap(), "(module)\n");
    }

    #[test]
    fn blank_blocks_have_no_text() {
        assert!(extract_text(&block(&[], "  \n\t")).is_none());
        assert!(extract_text(&block(&["", "   "], "ignored")).is_none());
    }

    #[test]
    fn height_is_clamped() {
        let policy = HeightPolicy::default();
        assert_eq!(policy.height_for(1), 120);
        assert_eq!(policy.height_for(5), 140);
        assert_eq!(policy.height_for(18), 400);
        assert_eq!(policy.height_for(1000), 400);
    }

    #[test]
    fn flavours_differ_in_capabilities() {
        let light = EditorFlavor::Lightweight.capabilities();
        let full = EditorFlavor::Full.capabilities();
        assert!(light.editable && light.live_diagnostics && !light.completion);
        assert!(!full.editable && full.completion && full.semantic_tokens);
    }

    #[tokio::test]
    async fn mount_replaces_block_in_place() {
        let mut page = StaticPage::new("/");
        page.push_prose("before");
        let id = page.push_block("wat", vec!["(module)".into()]);
        page.push_prose("after");
        let block = page.code_blocks().remove(0);

        let mounter = Mounter::new(
            EditorFlavor::Lightweight,
            HeightPolicy::default(),
            Duration::from_millis(300),
        );
        let session = mounter.mount(&block, &mut page, &bridge(), true, None).unwrap();

        assert_eq!(session.text(), "(module)");
        assert!(matches!(&page.nodes()[1], PageNode::Widget(w) if w.block == id && w.height == 120));
        assert!(page.code_blocks().is_empty());
    }

    #[tokio::test]
    async fn empty_block_is_not_mounted() {
        let mut page = StaticPage::new("/");
        page.push_block("wat", vec!["".into()]);
        let block = page.code_blocks().remove(0);

        let mounter = Mounter::new(EditorFlavor::Full, HeightPolicy::default(), Duration::ZERO);
        let err = mounter.mount(&block, &mut page, &bridge(), true, None).unwrap_err();
        assert!(matches!(err, MountError::EmptyBlock(_)));
        assert_eq!(page.code_blocks().len(), 1);
    }

    #[tokio::test]
    async fn full_flavour_widget_is_read_only() {
        let mut page = StaticPage::new("/");
        page.push_block("wat", vec!["nop".into()]);
        let block = page.code_blocks().remove(0);

        let mounter = Mounter::new(EditorFlavor::Full, HeightPolicy::default(), Duration::ZERO);
        let session = mounter.mount(&block, &mut page, &bridge(), false, None).unwrap();
        assert!(session.is_read_only());
        assert!(page.widgets().all(|w| w.read_only));
    }
}

//! Host page contract.
//!
//! The enhancer never touches a real DOM. A host exposes its statically
//! rendered code blocks through `Page` and swaps a block for a live widget
//! when asked. `StaticPage` is the in-memory host used by the CLI and tests,
//! built from markdown sources.

pub mod discover;
pub mod markdown;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::editor::WidgetSpec;

pub use discover::Discoverer;

/// Identity of a rendered block, unique across every page the host renders.
/// A page rendered again gets fresh ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a process-unique id.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(format!("block-{}", NEXT.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The element a widget replaces (the block's figure or wrapper).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(pub String);

/// A statically rendered, non-interactive code snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub id: BlockId,
    /// Declared language tag.
    pub language: String,
    /// Per-line sub-elements, when the renderer emits them.
    pub lines: Vec<String>,
    /// The single text container, used when there are no line elements.
    pub text: String,
    pub container: ContainerId,
    /// One-indexed line of the block in its source document, if known.
    pub source_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("block {0} is not on this page")]
    BlockNotFound(BlockId),
    #[error("block {0} was already replaced")]
    AlreadyReplaced(BlockId),
}

/// What the enhancer needs from a rendered page.
pub trait Page {
    /// Route of the page, e.g. `/instructions/numeric/i32-add/`.
    fn path(&self) -> &str;

    /// Every static code block still on the page, in document order.
    fn code_blocks(&self) -> Vec<CodeBlock>;

    /// Put `widget` where the block's container was, detaching the block.
    fn replace_block(&mut self, block: &BlockId, widget: WidgetSpec) -> Result<(), PageError>;

    /// Whether a widget mounted for `block` is still attached.
    fn has_widget(&self, block: &BlockId) -> bool;
}

/// A node of an in-memory page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageNode {
    Prose(String),
    Block(CodeBlock),
    Widget(WidgetSpec),
}

/// In-memory page.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    path: String,
    nodes: Vec<PageNode>,
}

impl StaticPage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            nodes: Vec::new(),
        }
    }

    /// Render a markdown source: prose stays prose, every fence becomes a
    /// block with one line element per source line.
    pub fn from_markdown(path: impl Into<String>, source: &str) -> Self {
        let mut page = Self::new(path);
        for segment in markdown::segments(source) {
            match segment {
                markdown::Segment::Prose(text) => page.push_prose(text),
                markdown::Segment::Fence(fence) => {
                    let text = fence.text();
                    page.push(&fence.language, fence.lines, text, Some(fence.fence_line));
                }
            }
        }
        page
    }

    pub fn push_prose(&mut self, text: impl Into<String>) {
        self.nodes.push(PageNode::Prose(text.into()));
    }

    /// Add a block rendered with per-line elements.
    pub fn push_block(&mut self, language: &str, lines: Vec<String>) -> BlockId {
        let text = lines.join("\n");
        self.push(language, lines, text, None)
    }

    /// Add a block rendered as one text container.
    pub fn push_plain_block(&mut self, language: &str, text: &str) -> BlockId {
        self.push(language, Vec::new(), text.to_string(), None)
    }

    fn push(
        &mut self,
        language: &str,
        lines: Vec<String>,
        text: String,
        source_line: Option<usize>,
    ) -> BlockId {
        let id = BlockId::fresh();
        self.nodes.push(PageNode::Block(CodeBlock {
            id: id.clone(),
            language: language.to_string(),
            lines,
            text,
            container: ContainerId(format!("figure-{id}")),
            source_line,
        }));
        id
    }

    pub fn nodes(&self) -> &[PageNode] {
        &self.nodes
    }

    pub fn widgets(&self) -> impl Iterator<Item = &WidgetSpec> {
        self.nodes.iter().filter_map(|n| match n {
            PageNode::Widget(w) => Some(w),
            _ => None,
        })
    }
}

impl Page for StaticPage {
    fn path(&self) -> &str {
        &self.path
    }

    fn code_blocks(&self) -> Vec<CodeBlock> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                PageNode::Block(block) => Some(block.clone()),
                _ => None,
            })
            .collect()
    }

    fn replace_block(&mut self, block: &BlockId, widget: WidgetSpec) -> Result<(), PageError> {
        for node in &mut self.nodes {
            match node {
                PageNode::Block(b) if &b.id == block => {
                    *node = PageNode::Widget(widget);
                    return Ok(());
                }
                PageNode::Widget(w) if &w.block == block => {
                    return Err(PageError::AlreadyReplaced(block.clone()));
                }
                _ => {}
            }
        }
        Err(PageError::BlockNotFound(block.clone()))
    }

    fn has_widget(&self, block: &BlockId) -> bool {
        self.widgets().any(|w| &w.block == block)
    }
}

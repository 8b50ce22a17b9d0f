//! Language intelligence for live editors, delegated to an external service.
//!
//! The analysis service (a pre-built WAT language server) is opaque: we only
//! see its request/response contract, modelled here by `AnalysisService`
//! using `lsp-types` data structures. The service keeps parse state
//! internally, so every position query must be preceded by a `parse` of the
//! current text. The queue makes that pair atomic; the bridge translates
//! between editor offsets and service positions.
//!
//! Architecture:
//! - `handle.rs`: ServiceHandle, shared, single-flight initialisation
//! - `queue.rs`: ServiceQueue, serialized parse+query jobs
//! - `bridge.rs`: LanguageBridge, editor-facing queries and decorations
//! - `position.rs`: LineIndex, offset ↔ (line, character) translation
//! - `semantic.rs`: semantic token stream decoding
//! - `loader.rs`: asset fetching and service instantiation
//! - `testing.rs`: ScriptedService, an in-memory stand-in

pub mod bridge;
pub mod error;
pub mod handle;
pub mod loader;
pub mod position;
pub mod queue;
pub mod semantic;
pub mod testing;

use async_trait::async_trait;
use lsp_types::{CompletionItem, Diagnostic, Position, Range, SemanticTokensLegend};

pub use error::{LoadError, ServiceError};

/// Hover information for a position in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverInfo {
    /// Content to display (markdown).
    pub content: String,
    /// Optional range the hover applies to.
    pub range: Option<Range>,
}

/// The external analysis service, as seen through its public contract.
///
/// All positions are zero-indexed, characters in UTF-16 code units.
/// Query methods answer for the text most recently passed to `parse`.
pub trait AnalysisService: Send {
    /// Whether the service finished its own start-up.
    fn ready(&self) -> bool {
        true
    }

    /// Replace the service's current document.
    fn parse(&mut self, text: &str) -> Result<(), ServiceError>;

    /// Diagnostics for the whole current document.
    fn diagnostics(&self) -> Result<Vec<Diagnostic>, ServiceError>;

    /// Hover information at the given position.
    fn hover(&self, pos: Position) -> Result<Option<HoverInfo>, ServiceError>;

    /// Completions at the given position.
    fn completion(&self, pos: Position) -> Result<Vec<CompletionItem>, ServiceError>;

    /// Definition range of the symbol at the given position.
    fn definition(&self, pos: Position) -> Result<Option<Range>, ServiceError>;

    fn semantic_tokens_legend(&self) -> Result<SemanticTokensLegend, ServiceError>;

    /// Encoded semantic token stream for the current document.
    fn semantic_tokens(&self) -> Result<Vec<u32>, ServiceError>;
}

/// Produces a ready analysis service. Called at most once per handle.
#[async_trait]
pub trait ServiceLoader: Send + Sync + 'static {
    async fn load(&self) -> Result<Box<dyn AnalysisService>, LoadError>;
}

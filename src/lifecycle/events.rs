//! Events emitted by the enhancer for hosts and observers.

use crate::editor::SessionId;
use crate::page::BlockId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancerEvent {
    /// The analysis service finished loading; language features are live.
    ServiceReady,
    /// The analysis service will never be available. Editors stay plain.
    ServiceFailed { reason: String },
    /// A static block was replaced by a live editor.
    BlockMounted { block: BlockId, session: SessionId },
    /// A matching block was left as it was.
    BlockSkipped { block: BlockId, reason: String },
    /// New diagnostics are shown for a block.
    DiagnosticsUpdated { block: BlockId, count: usize },
    /// An editor left the page and was torn down.
    SessionClosed { block: BlockId },
}

//! watdocs: live WebAssembly-text editors for documentation pages.
//!
//! Static code blocks are discovered on each rendered page, replaced by
//! editor sessions, and wired to an external WAT language server for hover,
//! diagnostics, completion and semantic tokens.

pub mod config;
pub mod editor;
pub mod highlight;
pub mod lifecycle;
pub mod lsp;
pub mod markup;
pub mod page;

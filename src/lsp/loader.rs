//! Loading the analysis service from its published assets.
//!
//! Three assets make up the service: the parser runtime binary, the language
//! server binary and the highlighting grammar. Each lives at a filesystem
//! path or a URL. All three are fetched concurrently and validated before a
//! `ServiceFactory` turns them into a running service; any failure becomes
//! a `LoadError`, which the handle records as terminal.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnalysisService, LoadError, ServiceLoader};

const WASM_MAGIC: &[u8] = b"\0asm";

/// Where an asset lives. Strings starting with `http://` or `https://` are
/// URLs, anything else a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetLocation {
    Path(PathBuf),
    Url(String),
}

impl AssetLocation {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::Path(PathBuf::from(location))
        }
    }
}

impl From<String> for AssetLocation {
    fn from(location: String) -> Self {
        Self::parse(&location)
    }
}

impl From<AssetLocation> for String {
    fn from(location: AssetLocation) -> Self {
        location.to_string()
    }
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// The configured locations of the three service assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSet {
    /// Directory that site-absolute paths like `/wasm/x.wasm` resolve under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
    pub tree_sitter: AssetLocation,
    pub language_server: AssetLocation,
    pub grammar: AssetLocation,
}

impl Default for AssetSet {
    fn default() -> Self {
        Self {
            public_dir: None,
            tree_sitter: AssetLocation::parse("/wasm/tree-sitter.wasm"),
            language_server: AssetLocation::parse("/wasm/wat_lsp_rust_bg.wasm"),
            grammar: AssetLocation::parse("/wat.tmLanguage.json"),
        }
    }
}

/// Which asset, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    TreeSitter,
    LanguageServer,
    Grammar,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [Self::TreeSitter, Self::LanguageServer, Self::Grammar];

    pub fn name(self) -> &'static str {
        match self {
            Self::TreeSitter => "tree-sitter runtime",
            Self::LanguageServer => "language server",
            Self::Grammar => "grammar",
        }
    }
}

impl AssetSet {
    pub fn location(&self, kind: AssetKind) -> &AssetLocation {
        match kind {
            AssetKind::TreeSitter => &self.tree_sitter,
            AssetKind::LanguageServer => &self.language_server,
            AssetKind::Grammar => &self.grammar,
        }
    }
}

/// Fetches asset bytes over HTTP or from disk.
#[derive(Debug, Clone, Default)]
pub struct AssetFetcher {
    client: reqwest::Client,
    public_dir: Option<PathBuf>,
}

impl AssetFetcher {
    pub fn new(public_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            public_dir,
        }
    }

    /// Filesystem path for a path location, honouring the public directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match (&self.public_dir, path.strip_prefix("/")) {
            (Some(dir), Ok(relative)) => dir.join(relative),
            _ => path.to_path_buf(),
        }
    }

    pub async fn fetch(&self, location: &AssetLocation) -> Result<Vec<u8>, LoadError> {
        let fetch_error = |message: String| LoadError::Fetch {
            location: location.to_string(),
            message,
        };
        match location {
            AssetLocation::Path(path) => {
                let path = self.resolve(path);
                tracing::debug!("reading {}", path.display());
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| fetch_error(e.to_string()))
            }
            AssetLocation::Url(url) => {
                tracing::debug!("fetching {url}");
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?;
                let response = response
                    .error_for_status()
                    .map_err(|e| fetch_error(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Validated asset contents, ready for instantiation.
#[derive(Debug, Clone)]
pub struct LoadedAssets {
    pub tree_sitter: Vec<u8>,
    pub language_server: Vec<u8>,
    pub grammar: serde_json::Value,
}

impl LoadedAssets {
    pub fn scope_name(&self) -> Option<&str> {
        self.grammar.get("scopeName").and_then(|v| v.as_str())
    }
}

/// Checks a binary asset is a well-formed WebAssembly module.
pub fn validate_module(location: &AssetLocation, bytes: &[u8]) -> Result<(), LoadError> {
    let invalid = |reason: String| LoadError::InvalidAsset {
        location: location.to_string(),
        reason,
    };
    if !bytes.starts_with(WASM_MAGIC) {
        return Err(invalid("missing wasm magic number".into()));
    }
    let engine = wasmtime::Engine::default();
    wasmtime::Module::validate(&engine, bytes).map_err(|e| invalid(e.to_string()))
}

/// Parses the highlighting grammar, which must name its scope.
pub fn validate_grammar(
    location: &AssetLocation,
    bytes: &[u8],
) -> Result<serde_json::Value, LoadError> {
    let invalid = |reason: String| LoadError::InvalidAsset {
        location: location.to_string(),
        reason,
    };
    let grammar: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
    if !grammar.get("scopeName").is_some_and(|v| v.is_string()) {
        return Err(invalid("grammar has no scopeName".into()));
    }
    Ok(grammar)
}

/// Fetch and validate one asset.
pub async fn check_asset(
    fetcher: &AssetFetcher,
    assets: &AssetSet,
    kind: AssetKind,
) -> Result<usize, LoadError> {
    let location = assets.location(kind);
    let bytes = fetcher.fetch(location).await?;
    match kind {
        AssetKind::Grammar => {
            validate_grammar(location, &bytes)?;
        }
        AssetKind::TreeSitter | AssetKind::LanguageServer => validate_module(location, &bytes)?,
    }
    Ok(bytes.len())
}

/// Turns validated assets into a live service.
pub trait ServiceFactory: Send + Sync + 'static {
    fn instantiate(&self, assets: LoadedAssets) -> Result<Box<dyn AnalysisService>, LoadError>;
}

/// `ServiceLoader` that fetches the configured assets and hands them to a
/// factory.
#[derive(Debug)]
pub struct AssetServiceLoader<F> {
    fetcher: AssetFetcher,
    assets: AssetSet,
    factory: F,
}

impl<F: ServiceFactory> AssetServiceLoader<F> {
    pub fn new(assets: AssetSet, factory: F) -> Self {
        Self {
            fetcher: AssetFetcher::new(assets.public_dir.clone()),
            assets,
            factory,
        }
    }
}

#[async_trait]
impl<F: ServiceFactory> ServiceLoader for AssetServiceLoader<F> {
    async fn load(&self) -> Result<Box<dyn AnalysisService>, LoadError> {
        let (tree_sitter, language_server, grammar) = tokio::try_join!(
            self.fetcher.fetch(&self.assets.tree_sitter),
            self.fetcher.fetch(&self.assets.language_server),
            self.fetcher.fetch(&self.assets.grammar),
        )?;

        validate_module(&self.assets.tree_sitter, &tree_sitter)?;
        validate_module(&self.assets.language_server, &language_server)?;
        let grammar = validate_grammar(&self.assets.grammar, &grammar)?;

        let assets = LoadedAssets {
            tree_sitter,
            language_server,
            grammar,
        };
        tracing::info!(
            "service assets loaded ({} + {} bytes, scope {})",
            assets.tree_sitter.len(),
            assets.language_server.len(),
            assets.scope_name().unwrap_or("?")
        );
        self.factory.instantiate(assets)
    }
}

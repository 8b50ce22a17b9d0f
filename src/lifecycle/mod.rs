//! Enhancer: runs discover → mount → bridge over the host's pages.
//!
//! The host calls `start` once the first page is rendered and
//! `page_navigated` after every client-side transition. Mounting never waits
//! for the analysis service; it warms up in the background and features
//! attach to every session once it is ready.

pub mod events;

use std::collections::{HashMap, HashSet};

use tokio::sync::broadcast;

pub use events::EnhancerEvent;

use crate::config::EnhancerConfig;
use crate::editor::{EditorSession, MountError, Mounter};
use crate::lsp::bridge::LanguageBridge;
use crate::lsp::handle::ServiceHandle;
use crate::page::{BlockId, Discoverer, Page};

pub struct Enhancer {
    config: EnhancerConfig,
    bridge: LanguageBridge,
    discoverer: Discoverer,
    mounter: Mounter,
    sessions: HashMap<BlockId, EditorSession>,
    /// Set once the navigation listener is registered.
    listening: bool,
    event_tx: broadcast::Sender<EnhancerEvent>,
}

impl Enhancer {
    pub fn new(config: EnhancerConfig, handle: ServiceHandle) -> Self {
        let discoverer = Discoverer::new(&config.language, &config.aliases);
        let mounter = Mounter::new(config.flavor, config.editor, config.debounce());
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            bridge: LanguageBridge::new(handle),
            discoverer,
            mounter,
            sessions: HashMap::new(),
            listening: false,
            event_tx,
        }
    }

    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }

    pub fn bridge(&self) -> &LanguageBridge {
        &self.bridge
    }

    /// Subscribe to enhancer events.
    pub fn subscribe(&self) -> broadcast::Receiver<EnhancerEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Initial page load. Registers for navigation, starts loading the
    /// service in the background and enhances `page`. Later calls do
    /// nothing. Must run inside a tokio runtime.
    pub fn start(&mut self, page: &mut dyn Page) -> usize {
        if self.listening {
            tracing::debug!("enhancer already started");
            return 0;
        }
        self.listening = true;
        tracing::info!("navigation listener registered");
        self.warm_up();
        self.enhance(page)
    }

    /// A client-side transition finished rendering `page`. Editors whose
    /// widgets left the page are torn down before the new page is scanned.
    pub fn page_navigated(&mut self, page: &mut dyn Page) -> usize {
        if !self.listening {
            tracing::debug!("navigation before start ignored");
            return 0;
        }

        let gone: Vec<BlockId> = self
            .sessions
            .keys()
            .filter(|block| !page.has_widget(block))
            .cloned()
            .collect();
        for block in gone {
            self.sessions.remove(&block);
            tracing::debug!("closed editor for {block}");
            let _ = self.event_tx.send(EnhancerEvent::SessionClosed { block });
        }

        let live: HashSet<BlockId> = self.sessions.keys().cloned().collect();
        self.discoverer.forget_missing(page, &live);

        self.enhance(page)
    }

    /// One discover → mount pass. Returns how many editors were mounted.
    pub fn enhance(&mut self, page: &mut dyn Page) -> usize {
        let diagnostics_enabled = self.config.diagnostics_enabled_for(page.path());
        let blocks = self.discoverer.discover(page);
        let mut mounted = 0;

        for block in blocks {
            let result = self.mounter.mount(
                &block,
                page,
                &self.bridge,
                diagnostics_enabled,
                Some(self.event_tx.clone()),
            );
            match result {
                Ok(session) => {
                    let _ = self.event_tx.send(EnhancerEvent::BlockMounted {
                        block: block.id.clone(),
                        session: session.id(),
                    });
                    self.sessions.insert(block.id, session);
                    mounted += 1;
                }
                Err(MountError::EmptyBlock(id)) => {
                    tracing::debug!("skipping empty block {id}");
                    let _ = self.event_tx.send(EnhancerEvent::BlockSkipped {
                        block: id,
                        reason: "empty".into(),
                    });
                }
                Err(e) => {
                    tracing::warn!("could not mount editor for {}: {e}", block.id);
                    let _ = self.event_tx.send(EnhancerEvent::BlockSkipped {
                        block: block.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if mounted > 0 {
            tracing::info!(
                "enhanced {mounted} block(s) on {} (diagnostics {})",
                page.path(),
                if diagnostics_enabled { "on" } else { "off" }
            );
        }
        mounted
    }

    pub fn session(&self, block: &BlockId) -> Option<&EditorSession> {
        self.sessions.get(block)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &EditorSession> {
        self.sessions.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn warm_up(&self) {
        let handle = self.bridge.handle().clone();
        handle.warm_up();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match handle.initialize().await {
                Some(_) => EnhancerEvent::ServiceReady,
                None => EnhancerEvent::ServiceFailed {
                    reason: handle
                        .failure()
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "unavailable".into()),
                },
            };
            let _ = event_tx.send(event);
        });
    }
}

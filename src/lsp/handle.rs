//! Shared handle to the analysis service with single-flight initialisation.
//!
//! Lifecycle: `Uninitialized → Initializing → Ready | Failed`.
//!
//! The first caller of `initialize()` (or `warm_up()`) spawns the one and
//! only load task; everyone arriving while it runs waits on the same watch
//! channel. `Failed` is terminal: the loader is never called again and all
//! features degrade to plain editing.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use super::queue::ServiceQueue;
use super::{LoadError, ServiceLoader};

/// Observable state of the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

type Outcome = Result<ServiceQueue, Arc<str>>;

enum Slot {
    Uninitialized,
    Initializing(watch::Receiver<Option<Outcome>>),
    Ready(ServiceQueue),
    Failed(Arc<str>),
}

enum Pending {
    Ready(ServiceQueue),
    Failed,
    Wait(watch::Receiver<Option<Outcome>>),
}

/// Cheap to clone; every editor session holds one.
#[derive(Clone)]
pub struct ServiceHandle {
    loader: Arc<dyn ServiceLoader>,
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ServiceHandle {
    pub fn new(loader: impl ServiceLoader) -> Self {
        Self {
            loader: Arc::new(loader),
            slot: Arc::new(Mutex::new(Slot::Uninitialized)),
        }
    }

    pub fn state(&self) -> ServiceState {
        match &*self.lock() {
            Slot::Uninitialized => ServiceState::Uninitialized,
            Slot::Initializing(_) => ServiceState::Initializing,
            Slot::Ready(_) => ServiceState::Ready,
            Slot::Failed(_) => ServiceState::Failed,
        }
    }

    /// The queue, only if initialisation already succeeded. Never waits.
    pub fn queue(&self) -> Option<ServiceQueue> {
        match &*self.lock() {
            Slot::Ready(queue) => Some(queue.clone()),
            _ => None,
        }
    }

    /// Why initialisation failed, once it has.
    pub fn failure(&self) -> Option<Arc<str>> {
        match &*self.lock() {
            Slot::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Start initialisation in the background without waiting for it.
    /// Must run inside a tokio runtime.
    pub fn warm_up(&self) {
        let _ = self.begin();
    }

    /// Wait for the service. `None` means unavailable, now and forever.
    pub async fn initialize(&self) -> Option<ServiceQueue> {
        let mut rx = match self.begin() {
            Pending::Ready(queue) => return Some(queue),
            Pending::Failed => return None,
            Pending::Wait(rx) => rx,
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(queue)) => Some(queue),
            Some(Err(_)) => None,
            None => {
                // load task died without reporting (panicked loader)
                self.abort();
                None
            }
        }
    }

    fn begin(&self) -> Pending {
        let mut slot = self.lock();
        match &*slot {
            Slot::Ready(queue) => Pending::Ready(queue.clone()),
            Slot::Failed(_) => Pending::Failed,
            Slot::Initializing(rx) => Pending::Wait(rx.clone()),
            Slot::Uninitialized => {
                let (tx, rx) = watch::channel(None);
                *slot = Slot::Initializing(rx.clone());
                tokio::spawn(load(self.loader.clone(), self.slot.clone(), tx));
                Pending::Wait(rx)
            }
        }
    }

    fn abort(&self) {
        let mut slot = self.lock();
        if let Slot::Initializing(_) = &*slot {
            tracing::error!("analysis service failed to initialise: {}", LoadError::Aborted);
            *slot = Slot::Failed(Arc::from(LoadError::Aborted.to_string()));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The single load attempt. Publishes the state before waking waiters.
async fn load(
    loader: Arc<dyn ServiceLoader>,
    slot: Arc<Mutex<Slot>>,
    tx: watch::Sender<Option<Outcome>>,
) {
    tracing::info!("initialising analysis service");

    let outcome = match loader.load().await {
        Ok(service) if service.ready() => Ok(ServiceQueue::spawn(service)),
        Ok(_) => Err(LoadError::NotReady),
        Err(e) => Err(e),
    };

    let outcome: Outcome = match outcome {
        Ok(queue) => {
            tracing::info!("analysis service ready");
            Ok(queue)
        }
        Err(e) => {
            tracing::error!("analysis service failed to initialise: {e}");
            Err(Arc::from(e.to_string()))
        }
    };

    *lock_slot(&slot) = match &outcome {
        Ok(queue) => Slot::Ready(queue.clone()),
        Err(reason) => Slot::Failed(reason.clone()),
    };
    let _ = tx.send(Some(outcome));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::lsp::testing::{ScriptedLoader, ScriptedService};

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let loader = ScriptedLoader::new(ScriptedService::new())
            .with_delay(Duration::from_millis(20));
        let loads = loader.load_counter();
        let handle = ServiceHandle::new(loader);
        let other = handle.clone();

        let (a, b, c) = tokio::join!(
            handle.initialize(),
            handle.initialize(),
            other.initialize()
        );
        assert!(a.is_some() && b.is_some() && c.is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn failure_is_terminal() {
        let loader = ScriptedLoader::new(ScriptedService::new()).failing("404 Not Found");
        let loads = loader.load_counter();
        let handle = ServiceHandle::new(loader);

        assert!(handle.initialize().await.is_none());
        assert_eq!(handle.state(), ServiceState::Failed);
        assert!(handle.failure().unwrap().contains("404"));

        assert!(handle.initialize().await.is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_ready_service_counts_as_failure() {
        let handle = ServiceHandle::new(ScriptedLoader::new(ScriptedService::new().not_ready()));
        assert!(handle.initialize().await.is_none());
        assert_eq!(handle.state(), ServiceState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn warm_up_does_not_wait() {
        let loader = ScriptedLoader::new(ScriptedService::new())
            .with_delay(Duration::from_millis(500));
        let handle = ServiceHandle::new(loader);
        assert_eq!(handle.state(), ServiceState::Uninitialized);

        handle.warm_up();
        assert_eq!(handle.state(), ServiceState::Initializing);
        assert!(handle.queue().is_none());

        assert!(handle.initialize().await.is_some());
        assert!(handle.queue().is_some());
    }
}

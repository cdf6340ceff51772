use std::sync::{Arc, RwLock};

/// Lifecycle events a Wayfinder facade call emits (§4.9 Event emitter).
#[derive(Debug, Clone, PartialEq)]
pub enum WayfinderEvent {
    RoutingStarted { url: String },
    RoutingSucceeded { url: String, gateway: String },
    RoutingFailed { url: String, reason: String },
    /// Emitted for non-`ar://` input, which bypasses gateway selection and
    /// is fetched directly (§4.9).
    RoutingSkipped { url: String },
    VerificationStarted { tx_id: String },
    VerificationProgress { tx_id: String, bytes: u64, total: Option<u64> },
    VerificationSucceeded { tx_id: String },
    VerificationFailed { tx_id: String, reason: String },
    /// Emitted when content is delivered without verification — no tx id to
    /// verify, or no verification strategy configured.
    VerificationSkipped { tx_id: String, reason: String },
    /// Emitted when verification fails but `verification_strict` is false,
    /// so the content is still delivered.
    VerificationWarning { tx_id: String, reason: String },
    /// Emitted once per `requestWithManifest` call as its path resolution
    /// completes (§4.7). Not emitted per recursion depth, so
    /// `wayfinder-manifest` never needs an `EventEmitter` dependency of its
    /// own.
    ManifestProgress { tx_id: String, path: String },
}

type Listener = Arc<dyn Fn(&WayfinderEvent) + Send + Sync>;

/// A pub/sub event bus. `child()` creates a request-scoped emitter whose
/// events also propagate to every ancestor's listeners, unless the caller
/// supplies its own emitter for that request (in which case no child is
/// created and nothing forwards automatically).
pub struct EventEmitter {
    listeners: RwLock<Vec<Listener>>,
    parent: Option<Arc<EventEmitter>>,
}

impl EventEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            parent: None,
        })
    }

    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            parent: Some(self.clone()),
        })
    }

    pub fn on<F>(&self, listener: F)
    where
        F: Fn(&WayfinderEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .expect("event listener lock poisoned")
            .push(Arc::new(listener));
    }

    pub fn emit(&self, event: WayfinderEvent) {
        for listener in self
            .listeners
            .read()
            .expect("event listener lock poisoned")
            .iter()
        {
            listener(&event);
        }
        if let Some(parent) = &self.parent {
            parent.emit(event);
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            parent: None,
        }
    }
}

//! Resolved-instance storage per lifetime.
//!
//! The singleton tier is shared across threads behind a lock with set-once
//! semantics: when two callers race to publish the same id, the first write
//! wins and the loser's candidate is never published.
//!
//! Scope frames are per-execution-context: the LIFO stack lives in
//! thread-local storage keyed by registry identity, so independent callers
//! (and independent containers on one thread) never observe each other's
//! frames.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{DiError, DiResult};
use crate::id::ServiceId;
use crate::value::AnyValue;

type Frame = HashMap<ServiceId, AnyValue>;

thread_local! {
    // Keyed by registry identity so two containers on one thread stay
    // isolated.
    static SCOPE_FRAMES: RefCell<HashMap<usize, Vec<Frame>>> = RefCell::new(HashMap::new());
}

/// Holds resolved instances: a shared singleton map plus a stack of scope
/// frames local to the calling execution context.
pub struct ScopeRegistry {
    singletons: Mutex<HashMap<ServiceId, AnyValue>>,
    // Stable address used as the thread-local key.
    identity: Arc<()>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self {
            singletons: Mutex::new(HashMap::new()),
            identity: Arc::new(()),
        }
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.identity) as usize
    }

    // ----- Singleton tier -----

    /// Publishes a singleton. First write wins: a racing second write is
    /// discarded and `false` is returned.
    pub fn set(&self, id: ServiceId, instance: AnyValue) -> bool {
        let mut singletons = self.singletons.lock();
        if singletons.contains_key(&id) {
            trace!(target: "armature", service = %id, "singleton already published, discarding candidate");
            return false;
        }
        singletons.insert(id, instance);
        true
    }

    pub fn has_singleton(&self, id: &ServiceId) -> bool {
        self.singletons.lock().contains_key(id)
    }

    pub fn singleton(&self, id: &ServiceId) -> Option<AnyValue> {
        self.singletons.lock().get(id).cloned()
    }

    // ----- Scope frames -----

    /// Pushes a fresh scope frame for the calling context.
    pub fn begin_scope(&self) {
        SCOPE_FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let stack = frames.entry(self.key()).or_default();
            stack.push(Frame::new());
            debug!(target: "armature", depth = stack.len(), "scope began");
        });
    }

    /// Pops the top frame. Fails when no frame is active.
    pub fn end_scope(&self) -> DiResult<()> {
        SCOPE_FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let stack = frames.get_mut(&self.key()).ok_or(DiError::ScopeUnderflow)?;
            if stack.pop().is_none() {
                return Err(DiError::ScopeUnderflow);
            }
            debug!(target: "armature", depth = stack.len(), "scope ended");
            Ok(())
        })
    }

    /// Writes into the top frame. Fails when no frame is active.
    pub fn set_scoped(&self, id: ServiceId, instance: AnyValue) -> DiResult<()> {
        SCOPE_FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let frame = frames
                .get_mut(&self.key())
                .and_then(|stack| stack.last_mut())
                .ok_or_else(|| DiError::NoActiveScope {
                    service: id.clone(),
                })?;
            frame.insert(id, instance);
            Ok(())
        })
    }

    /// Frame-only lookup, top frame first.
    pub fn scoped(&self, id: &ServiceId) -> Option<AnyValue> {
        SCOPE_FRAMES.with(|frames| {
            let frames = frames.borrow();
            let stack = frames.get(&self.key())?;
            stack.iter().rev().find_map(|frame| frame.get(id).cloned())
        })
    }

    pub fn has_active_scope(&self) -> bool {
        SCOPE_FRAMES.with(|frames| {
            frames
                .borrow()
                .get(&self.key())
                .map(|stack| !stack.is_empty())
                .unwrap_or(false)
        })
    }

    pub fn scope_depth(&self) -> usize {
        SCOPE_FRAMES.with(|frames| {
            frames
                .borrow()
                .get(&self.key())
                .map(|stack| stack.len())
                .unwrap_or(0)
        })
    }

    // ----- Combined lookup -----

    /// Lookup precedence: top frame down to the bottom frame, then the
    /// singleton map.
    pub fn get(&self, id: &ServiceId) -> Option<AnyValue> {
        self.scoped(id).or_else(|| self.singleton(id))
    }

    pub fn has(&self, id: &ServiceId) -> bool {
        self.get(id).is_some()
    }

    /// Drops the singleton tier and the calling thread's frames. Used at
    /// teardown and in tests.
    pub fn clear(&self) {
        self.singletons.lock().clear();
        SCOPE_FRAMES.with(|frames| {
            frames.borrow_mut().remove(&self.key());
        });
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopeRegistry {
    fn drop(&mut self) {
        // Best effort: release this thread's frames for the dying identity.
        let key = self.key();
        let _ = SCOPE_FRAMES.try_with(|frames| {
            if let Ok(mut frames) = frames.try_borrow_mut() {
                frames.remove(&key);
            }
        });
    }
}

impl std::fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("singletons", &self.singletons.lock().len())
            .field("scope_depth", &self.scope_depth())
            .finish()
    }
}

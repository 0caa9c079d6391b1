//! Service lifetimes and their caching strategies.

use std::sync::Arc;

use crate::error::DiResult;
use crate::id::ServiceId;
use crate::scope::ScopeRegistry;
use crate::value::AnyValue;

/// Reuse policy for resolved instances.
///
/// # Lifetime Characteristics
///
/// - **Transient**: fresh instance on every resolution, never cached
/// - **Scoped**: one instance per active scope frame
/// - **Singleton**: one instance per container, cached forever
///
/// # Examples
///
/// ```
/// use armature::{Kernel, shared};
///
/// let kernel = Kernel::new();
/// kernel.instance("Config", shared(42u32));
///
/// let a = kernel.get("Config").unwrap();
/// let b = kernel.get("Config").unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b)); // singleton identity
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// New instance per resolution, never cached.
    Transient,
    /// Single instance per scope frame, dropped when the frame ends.
    Scoped,
    /// Single instance per container, cached for the container lifetime.
    Singleton,
}

impl Lifetime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
            Lifetime::Singleton => "singleton",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage behavior behind a lifetime.
///
/// The kernel picks the strategy from the definition's lifetime after
/// instantiation and before returning the value.
pub(crate) trait LifetimeStrategy {
    fn store(&self, id: &ServiceId, instance: &AnyValue) -> DiResult<()>;
    fn has(&self, id: &ServiceId) -> bool;
    fn retrieve(&self, id: &ServiceId) -> Option<AnyValue>;
    fn clear(&self);
}

/// No caching at all.
pub(crate) struct TransientStrategy;

impl LifetimeStrategy for TransientStrategy {
    fn store(&self, _id: &ServiceId, _instance: &AnyValue) -> DiResult<()> {
        Ok(())
    }

    fn has(&self, _id: &ServiceId) -> bool {
        false
    }

    fn retrieve(&self, _id: &ServiceId) -> Option<AnyValue> {
        None
    }

    fn clear(&self) {}
}

/// Delegates to the shared singleton tier. First write wins.
pub(crate) struct SingletonStrategy {
    scopes: Arc<ScopeRegistry>,
}

impl SingletonStrategy {
    pub(crate) fn new(scopes: Arc<ScopeRegistry>) -> Self {
        Self { scopes }
    }
}

impl LifetimeStrategy for SingletonStrategy {
    fn store(&self, id: &ServiceId, instance: &AnyValue) -> DiResult<()> {
        self.scopes.set(id.clone(), instance.clone());
        Ok(())
    }

    fn has(&self, id: &ServiceId) -> bool {
        self.scopes.has_singleton(id)
    }

    fn retrieve(&self, id: &ServiceId) -> Option<AnyValue> {
        self.scopes.singleton(id)
    }

    fn clear(&self) {}
}

/// Delegates to the active scope frame.
pub(crate) struct ScopedStrategy {
    scopes: Arc<ScopeRegistry>,
}

impl ScopedStrategy {
    pub(crate) fn new(scopes: Arc<ScopeRegistry>) -> Self {
        Self { scopes }
    }
}

impl LifetimeStrategy for ScopedStrategy {
    fn store(&self, id: &ServiceId, instance: &AnyValue) -> DiResult<()> {
        self.scopes.set_scoped(id.clone(), instance.clone())
    }

    fn has(&self, id: &ServiceId) -> bool {
        self.scopes.scoped(id).is_some()
    }

    fn retrieve(&self, id: &ServiceId) -> Option<AnyValue> {
        self.scopes.scoped(id)
    }

    fn clear(&self) {
        let _ = self.scopes.end_scope();
    }
}

/// Selects the strategy backing a lifetime.
pub(crate) fn strategy_for(
    lifetime: Lifetime,
    scopes: &Arc<ScopeRegistry>,
) -> Box<dyn LifetimeStrategy> {
    match lifetime {
        Lifetime::Transient => Box::new(TransientStrategy),
        Lifetime::Singleton => Box::new(SingletonStrategy::new(Arc::clone(scopes))),
        Lifetime::Scoped => Box::new(ScopedStrategy::new(Arc::clone(scopes))),
    }
}

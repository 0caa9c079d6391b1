//! Per-resolution context.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::id::ServiceId;
use crate::value::ArgumentOverrides;

/// Carrier of one resolution request: target id, named overrides, parent
/// pointer, and depth.
///
/// Contexts form a tree along the call stack: each child resolution points
/// at the context that triggered it and carries `depth + 1`. Contexts are
/// never shared across independent top-level resolutions.
pub struct KernelContext {
    service: ServiceId,
    overrides: ArgumentOverrides,
    parent: Option<Arc<KernelContext>>,
    depth: usize,
    metadata: Mutex<HashMap<String, String>>,
}

impl KernelContext {
    /// Root context for a top-level resolution.
    pub(crate) fn root(service: ServiceId, overrides: ArgumentOverrides) -> Arc<Self> {
        Arc::new(Self {
            service,
            overrides,
            parent: None,
            depth: 0,
            metadata: Mutex::new(HashMap::new()),
        })
    }

    /// Child context triggered by `self`.
    pub(crate) fn child(
        self: &Arc<Self>,
        service: ServiceId,
        overrides: ArgumentOverrides,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            overrides,
            parent: Some(Arc::clone(self)),
            depth: self.depth + 1,
            metadata: Mutex::new(HashMap::new()),
        })
    }

    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    pub fn overrides(&self) -> &ArgumentOverrides {
        &self.overrides
    }

    pub fn parent(&self) -> Option<&Arc<KernelContext>> {
        self.parent.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Resolution chain, root first, ending at this context's service.
    pub fn chain(&self) -> Vec<ServiceId> {
        let mut chain = match &self.parent {
            Some(parent) => parent.chain(),
            None => Vec::new(),
        };
        chain.push(self.service.clone());
        chain
    }

    /// Whether `id` already appears anywhere on this context's chain.
    pub fn chain_contains(&self, id: &ServiceId) -> bool {
        if &self.service == id {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.chain_contains(id),
            None => false,
        }
    }

    /// Attaches a diagnostics note; stages use this for trace payload
    /// context.
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.lock().insert(key.into(), value.into());
    }

    pub fn metadata(&self) -> HashMap<String, String> {
        self.metadata.lock().clone()
    }
}

impl std::fmt::Debug for KernelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelContext")
            .field("service", &self.service)
            .field("depth", &self.depth)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_increases_along_chain() {
        let root = KernelContext::root("A".into(), ArgumentOverrides::new());
        let child = root.child("B".into(), ArgumentOverrides::new());
        let grandchild = child.child("C".into(), ArgumentOverrides::new());
        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
        assert_eq!(grandchild.depth(), 2);
        assert_eq!(
            grandchild.chain(),
            vec![ServiceId::new("A"), ServiceId::new("B"), ServiceId::new("C")]
        );
    }

    #[test]
    fn chain_containment() {
        let root = KernelContext::root("A".into(), ArgumentOverrides::new());
        let child = root.child("B".into(), ArgumentOverrides::new());
        assert!(child.chain_contains(&"A".into()));
        assert!(child.chain_contains(&"B".into()));
        assert!(!child.chain_contains(&"C".into()));
    }
}

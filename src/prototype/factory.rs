//! Prototype creation and the two-tier metadata cache.
//!
//! The factory derives a [`ServicePrototype`] from a class descriptor on
//! first reference and caches it in an in-memory LRU tier (L1). An optional
//! persistent tier (L2) keeps flat prototype dictionaries on disk, keyed by
//! class name and stamped with a schema version; a version mismatch discards
//! the file instead of trusting it.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::class::ClassRegistry;
use crate::error::{DiError, DiResult};
use crate::prototype::ServicePrototype;

/// Version tag embedded in the persistent tier. Bump when the prototype
/// structure changes; mismatched files are treated as absent.
pub const PROTOTYPE_SCHEMA_VERSION: u32 = 1;

/// Default L1 capacity.
pub const DEFAULT_PROTOTYPE_CAPACITY: usize = 1024;

const NIL: usize = usize::MAX;

struct LruNode {
    key: String,
    value: Arc<ServicePrototype>,
    prev: usize,
    next: usize,
}

/// O(1) LRU: slab-backed doubly-linked list plus a name index.
struct LruTier {
    map: HashMap<String, usize>,
    nodes: Vec<Option<LruNode>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    capacity: usize,
}

impl LruTier {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn detach(&mut self, index: usize) {
        let (prev, next) = {
            let node = self.nodes[index].as_ref().expect("detached node exists");
            (node.prev, node.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].as_mut().expect("prev node exists").next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].as_mut().expect("next node exists").prev = prev;
        }
    }

    fn attach_front(&mut self, index: usize) {
        {
            let node = self.nodes[index].as_mut().expect("attached node exists");
            node.prev = NIL;
            node.next = self.head;
        }
        if self.head != NIL {
            self.nodes[self.head].as_mut().expect("head exists").prev = index;
        }
        self.head = index;
        if self.tail == NIL {
            self.tail = index;
        }
    }

    /// Lookup; a hit becomes the most recently used entry.
    fn get(&mut self, key: &str) -> Option<Arc<ServicePrototype>> {
        let index = *self.map.get(key)?;
        self.detach(index);
        self.attach_front(index);
        Some(Arc::clone(
            &self.nodes[index].as_ref().expect("hit node exists").value,
        ))
    }

    fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace. Returns the entries evicted to restore capacity,
    /// least recently used first.
    fn insert(
        &mut self,
        key: String,
        value: Arc<ServicePrototype>,
    ) -> Vec<(String, Arc<ServicePrototype>)> {
        if let Some(&index) = self.map.get(&key) {
            self.nodes[index].as_mut().expect("node exists").value = value;
            self.detach(index);
            self.attach_front(index);
            return Vec::new();
        }

        let index = if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(LruNode {
                key: key.clone(),
                value,
                prev: NIL,
                next: NIL,
            });
            index
        } else {
            self.nodes.push(Some(LruNode {
                key: key.clone(),
                value,
                prev: NIL,
                next: NIL,
            }));
            self.nodes.len() - 1
        };
        self.map.insert(key, index);
        self.attach_front(index);

        let mut evicted = Vec::new();
        while self.map.len() > self.capacity {
            let victim = self.tail;
            if victim == NIL {
                break;
            }
            self.detach(victim);
            let node = self.nodes[victim].take().expect("victim exists");
            self.map.remove(&node.key);
            self.free.push(victim);
            evicted.push((node.key, node.value));
        }
        evicted
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &Arc<ServicePrototype>)> {
        self.map.iter().map(move |(key, &index)| {
            (
                key,
                &self.nodes[index].as_ref().expect("indexed node exists").value,
            )
        })
    }

    fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }
}

/// Persistent key-value tier, loaded once and flushed on demand.
struct PersistentTier {
    path: PathBuf,
    entries: Mutex<HashMap<String, Arc<ServicePrototype>>>,
    dirty: AtomicBool,
}

impl PersistentTier {
    fn open(path: PathBuf) -> Self {
        let entries = Self::load(&path);
        Self {
            path,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    fn load(path: &PathBuf) -> HashMap<String, Arc<ServicePrototype>> {
        let Ok(raw) = fs::read_to_string(path) else {
            return HashMap::new();
        };
        let Ok(document) = serde_json::from_str::<serde_json::Value>(&raw) else {
            debug!(target: "armature", path = %path.display(), "prototype cache unreadable, ignoring");
            return HashMap::new();
        };
        let schema = document.get("schema").and_then(|s| s.as_u64());
        if schema != Some(PROTOTYPE_SCHEMA_VERSION as u64) {
            debug!(
                target: "armature",
                path = %path.display(),
                found = ?schema,
                expected = PROTOTYPE_SCHEMA_VERSION,
                "prototype cache schema mismatch, discarding"
            );
            return HashMap::new();
        }
        let mut entries = HashMap::new();
        if let Some(classes) = document.get("classes").and_then(|c| c.as_object()) {
            for (name, flat) in classes {
                match ServicePrototype::from_flat(flat) {
                    Ok(proto) => {
                        entries.insert(name.clone(), Arc::new(proto));
                    }
                    Err(e) => {
                        debug!(target: "armature", class = %name, error = %e, "skipping corrupt cache entry");
                    }
                }
            }
        }
        entries
    }

    fn get(&self, key: &str) -> Option<Arc<ServicePrototype>> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: String, value: Arc<ServicePrototype>) {
        self.entries.lock().insert(key, value);
        self.dirty.store(true, Ordering::Release);
    }

    fn clear(&self) {
        self.entries.lock().clear();
        self.dirty.store(true, Ordering::Release);
    }
}

/// L1 occupancy report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub utilization: f64,
}

/// Creates and caches [`ServicePrototype`] values for described classes.
pub struct PrototypeFactory {
    classes: Arc<ClassRegistry>,
    l1: Mutex<LruTier>,
    l2: Option<PersistentTier>,
}

impl PrototypeFactory {
    pub fn new(classes: Arc<ClassRegistry>, capacity: usize) -> Self {
        Self {
            classes,
            l1: Mutex::new(LruTier::new(capacity)),
            l2: None,
        }
    }

    /// Enables the persistent tier at `path`. The file is loaded eagerly;
    /// schema mismatches leave the tier empty.
    pub fn with_persistence(classes: Arc<ClassRegistry>, capacity: usize, path: PathBuf) -> Self {
        Self {
            classes,
            l1: Mutex::new(LruTier::new(capacity)),
            l2: Some(PersistentTier::open(path)),
        }
    }

    /// Returns the prototype for `class`, creating and caching it on first
    /// reference.
    pub fn create_for(&self, class: &str) -> DiResult<Arc<ServicePrototype>> {
        if let Some(proto) = self.l1.lock().get(class) {
            trace!(target: "armature", class, tier = "l1", "prototype cache hit");
            return Ok(proto);
        }

        if let Some(l2) = &self.l2 {
            if let Some(proto) = l2.get(class) {
                trace!(target: "armature", class, tier = "l2", "prototype cache hit");
                self.promote(class.to_string(), Arc::clone(&proto));
                return Ok(proto);
            }
        }

        let descriptor = self.classes.get(class).ok_or_else(|| DiError::Prototype {
            class: class.to_string(),
            cause: "class is not described in the registry".to_string(),
        })?;
        let registry = Arc::clone(&self.classes);
        let proto = Arc::new(ServicePrototype::from_descriptor(&descriptor, &move |name| {
            registry.contains(name)
        }));
        debug!(target: "armature", class, "prototype created");
        self.promote(class.to_string(), Arc::clone(&proto));
        if let Some(l2) = &self.l2 {
            // A fresh prototype exists that the file does not have yet.
            l2.dirty.store(true, Ordering::Release);
        }
        Ok(proto)
    }

    /// Inserts into L1; evicted entries are written through to L2.
    fn promote(&self, class: String, proto: Arc<ServicePrototype>) {
        let evicted = self.l1.lock().insert(class, proto);
        if let Some(l2) = &self.l2 {
            for (key, value) in evicted {
                trace!(target: "armature", class = %key, "prototype evicted to l2");
                l2.put(key, value);
            }
        }
    }

    /// Empties both tiers.
    pub fn clear(&self) {
        self.l1.lock().clear();
        if let Some(l2) = &self.l2 {
            l2.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let l1 = self.l1.lock();
        let size = l1.len();
        let capacity = l1.capacity;
        let utilization = if capacity == 0 {
            0.0
        } else {
            size as f64 / capacity as f64
        };
        CacheStats {
            size,
            capacity,
            utilization,
        }
    }

    /// Persists the union of both tiers to the L2 path. No-op without a
    /// persistent tier.
    pub fn flush(&self) -> std::io::Result<()> {
        let Some(l2) = &self.l2 else {
            return Ok(());
        };
        let mut classes = serde_json::Map::new();
        for (key, value) in l2.entries.lock().iter() {
            classes.insert(key.clone(), value.to_flat());
        }
        for (key, value) in self.l1.lock().iter() {
            classes.insert(key.clone(), value.to_flat());
        }
        let document = serde_json::json!({
            "schema": PROTOTYPE_SCHEMA_VERSION,
            "classes": classes,
        });
        fs::write(&l2.path, document.to_string())?;
        l2.dirty.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for PrototypeFactory {
    fn drop(&mut self) {
        if let Some(l2) = &self.l2 {
            if l2.dirty.load(Ordering::Acquire) {
                if let Err(e) = self.flush() {
                    error!(target: "armature", error = %e, "prototype cache flush failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for PrototypeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("PrototypeFactory")
            .field("size", &stats.size)
            .field("capacity", &stats.capacity)
            .field("persistent", &self.l2.is_some())
            .finish()
    }
}

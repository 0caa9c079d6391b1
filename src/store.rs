//! Registration state: definitions, contextual rules, tags.
//!
//! The store holds what the resolver consumes and performs zero
//! construction. Registration takes an exclusive lock; resolution reads
//! take a shared lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::BoxError;
use crate::id::ServiceId;
use crate::kernel::ResolverContext;
use crate::lifetime::Lifetime;
use crate::value::{AnyValue, ArgumentOverrides, OverrideValue};

/// User factory: receives the container facade and the effective named
/// overrides, returns the built value.
pub type FactoryFn =
    Arc<dyn Fn(&ResolverContext<'_>, &ArgumentOverrides) -> Result<AnyValue, BoxError> + Send + Sync>;

/// What a definition maps its service id to.
///
/// `None` at the definition level means pure autowire: discovery falls
/// through to the autowire stage.
#[derive(Clone)]
pub enum Concrete {
    /// A described class to instantiate.
    Class(String),
    /// A factory to execute at resolution time.
    Factory(FactoryFn),
    /// An already-built value returned as-is.
    Value(AnyValue),
    /// Delegate to another service id.
    Alias(ServiceId),
}

impl Concrete {
    pub fn class(name: impl Into<String>) -> Self {
        Concrete::Class(name.into())
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&ResolverContext<'_>, &ArgumentOverrides) -> Result<AnyValue, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Concrete::Factory(Arc::new(factory))
    }

    pub fn value(value: AnyValue) -> Self {
        Concrete::Value(value)
    }

    pub fn alias(target: impl Into<ServiceId>) -> Self {
        Concrete::Alias(target.into())
    }
}

impl std::fmt::Debug for Concrete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Concrete::Class(name) => write!(f, "Concrete::Class({:?})", name),
            Concrete::Factory(_) => f.write_str("Concrete::Factory(..)"),
            Concrete::Value(_) => f.write_str("Concrete::Value(..)"),
            Concrete::Alias(target) => write!(f, "Concrete::Alias({:?})", target),
        }
    }
}

/// One registration: id, concrete, lifetime, and named argument overrides.
/// Tags live in the store's tag index, keyed by tag name.
#[derive(Clone, Debug)]
pub struct ServiceDefinition {
    pub id: ServiceId,
    pub concrete: Option<Concrete>,
    pub lifetime: Lifetime,
    pub arguments: ArgumentOverrides,
}

impl ServiceDefinition {
    pub fn new(id: impl Into<ServiceId>, concrete: Option<Concrete>, lifetime: Lifetime) -> Self {
        Self {
            id: id.into(),
            concrete,
            lifetime,
            arguments: ArgumentOverrides::new(),
        }
    }
}

/// Holds registrations consumed by the resolution engine.
pub struct DefinitionStore {
    definitions: RwLock<HashMap<ServiceId, ServiceDefinition>>,
    contextual: RwLock<HashMap<(ServiceId, ServiceId), Concrete>>,
    tags: RwLock<HashMap<String, Vec<ServiceId>>>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            contextual: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
        }
    }

    /// Upserts a definition. Duplicate ids are replaced wholesale (last
    /// write wins) with a diagnostic, never an error.
    pub fn bind(&self, definition: ServiceDefinition) {
        let mut definitions = self.definitions.write();
        let id = definition.id.clone();
        if definitions.insert(id.clone(), definition).is_some() {
            warn!(target: "armature", service = %id, "definition replaced (last write wins)");
        } else {
            debug!(target: "armature", service = %id, "service bound");
        }
    }

    /// Stores a named argument override on the definition, creating an
    /// autowire definition when none exists yet.
    pub fn with_argument(&self, id: impl Into<ServiceId>, name: impl Into<String>, value: OverrideValue) {
        let id = id.into();
        let mut definitions = self.definitions.write();
        let definition = definitions
            .entry(id.clone())
            .or_insert_with(|| ServiceDefinition::new(id, None, Lifetime::Transient));
        definition.arguments.insert(name, value);
    }

    /// Records a contextual rule: when `consumer` needs `need`, give
    /// `concrete`. A repeated (consumer, need) pair is replaced.
    pub fn set_contextual(&self, consumer: ServiceId, need: ServiceId, concrete: Concrete) {
        let mut contextual = self.contextual.write();
        if contextual
            .insert((consumer.clone(), need.clone()), concrete)
            .is_some()
        {
            warn!(
                target: "armature",
                consumer = %consumer,
                need = %need,
                "contextual binding replaced (last write wins)"
            );
        }
    }

    pub fn find_definition(&self, id: &ServiceId) -> Option<ServiceDefinition> {
        self.definitions.read().get(id).cloned()
    }

    /// Contextual lookup; only consulted when the resolution has a parent.
    pub fn find_contextual(&self, consumer: &ServiceId, need: &ServiceId) -> Option<Concrete> {
        self.contextual
            .read()
            .get(&(consumer.clone(), need.clone()))
            .cloned()
    }

    /// Tags a service. Duplicate (tag, id) pairs are ignored.
    pub fn tag<I, S>(&self, id: impl Into<ServiceId>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let mut map = self.tags.write();
        for tag in tags {
            let entry = map.entry(tag.into()).or_default();
            if !entry.contains(&id) {
                entry.push(id.clone());
            }
        }
    }

    /// Service ids carrying `tag`, in tagging order.
    pub fn tagged_by(&self, tag: &str) -> Vec<ServiceId> {
        self.tags.read().get(tag).cloned().unwrap_or_default()
    }

    /// All tags applied to `id`.
    pub fn tags_of(&self, id: &ServiceId) -> Vec<String> {
        let mut out: Vec<String> = self
            .tags
            .read()
            .iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(tag, _)| tag.clone())
            .collect();
        out.sort();
        out
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.definitions.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }

    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.definitions.read().keys().cloned().collect()
    }
}

impl Default for DefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// First step of a contextual rule; only `needs` is available, so a chain
/// cannot reach `give` without it.
pub struct ContextualBuilder<'s> {
    store: &'s DefinitionStore,
    consumer: ServiceId,
}

impl<'s> ContextualBuilder<'s> {
    pub(crate) fn new(store: &'s DefinitionStore, consumer: ServiceId) -> Self {
        Self { store, consumer }
    }

    /// Names the dependency the rule overrides.
    pub fn needs(self, need: impl Into<ServiceId>) -> ContextualNeed<'s> {
        ContextualNeed {
            store: self.store,
            consumer: self.consumer,
            need: need.into(),
        }
    }
}

/// Second step of a contextual rule. `give` consumes the builder, so each
/// chain records exactly one rule.
pub struct ContextualNeed<'s> {
    store: &'s DefinitionStore,
    consumer: ServiceId,
    need: ServiceId,
}

impl ContextualNeed<'_> {
    /// Terminal: writes the rule into the store.
    pub fn give(self, concrete: Concrete) {
        self.store.set_contextual(self.consumer, self.need, concrete);
    }
}

/// Chained definition builder. Accumulates locally and writes back into the
/// store only on the terminal [`register`](DefinitionBuilder::register).
pub struct DefinitionBuilder<'s> {
    store: &'s DefinitionStore,
    definition: ServiceDefinition,
    tags: Vec<String>,
}

impl<'s> DefinitionBuilder<'s> {
    pub(crate) fn new(store: &'s DefinitionStore, id: ServiceId) -> Self {
        Self {
            store,
            definition: ServiceDefinition::new(id, None, Lifetime::Transient),
            tags: Vec::new(),
        }
    }

    pub fn concrete(mut self, concrete: Concrete) -> Self {
        self.definition.concrete = Some(concrete);
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.definition.lifetime = lifetime;
        self
    }

    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::Scoped)
    }

    pub fn argument(mut self, name: impl Into<String>, value: AnyValue) -> Self {
        self.definition
            .arguments
            .insert(name, OverrideValue::One(value));
        self
    }

    pub fn argument_many(mut self, name: impl Into<String>, values: Vec<AnyValue>) -> Self {
        self.definition
            .arguments
            .insert(name, OverrideValue::Many(values));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Terminal: upserts the definition (and tags) into the store.
    pub fn register(self) {
        let id = self.definition.id.clone();
        self.store.bind(self.definition);
        if !self.tags.is_empty() {
            self.store.tag(id, self.tags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::shared;

    #[test]
    fn bind_is_last_write_wins() {
        let store = DefinitionStore::new();
        store.bind(ServiceDefinition::new("A", Some(Concrete::class("X")), Lifetime::Transient));
        store.bind(ServiceDefinition::new("A", Some(Concrete::class("Y")), Lifetime::Singleton));
        let def = store.find_definition(&"A".into()).unwrap();
        assert_eq!(def.lifetime, Lifetime::Singleton);
        match def.concrete {
            Some(Concrete::Class(name)) => assert_eq!(name, "Y"),
            other => panic!("unexpected concrete: {:?}", other),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn with_argument_creates_autowire_definition() {
        let store = DefinitionStore::new();
        store.with_argument("Repo", "dsn", OverrideValue::One(shared("sqlite:".to_string())));
        let def = store.find_definition(&"Repo".into()).unwrap();
        assert!(def.concrete.is_none());
        assert_eq!(def.lifetime, Lifetime::Transient);
        assert!(def.arguments.contains("dsn"));
    }

    #[test]
    fn contextual_rules_match_exact_pair() {
        let store = DefinitionStore::new();
        ContextualBuilder::new(&store, "Http".into())
            .needs("Logger")
            .give(Concrete::class("HttpLogger"));
        assert!(store.find_contextual(&"Http".into(), &"Logger".into()).is_some());
        assert!(store.find_contextual(&"Worker".into(), &"Logger".into()).is_none());
        assert!(store.find_contextual(&"Http".into(), &"Cache".into()).is_none());
    }

    #[test]
    fn tags_are_deduplicated_and_ordered() {
        let store = DefinitionStore::new();
        store.tag("A", ["repo", "boot"]);
        store.tag("B", ["repo"]);
        store.tag("A", ["repo"]);
        assert_eq!(store.tagged_by("repo"), vec![ServiceId::new("A"), ServiceId::new("B")]);
        assert_eq!(store.tags_of(&"A".into()), vec!["boot".to_string(), "repo".to_string()]);
        assert!(store.tagged_by("missing").is_empty());
    }

    #[test]
    fn builder_writes_on_register_only() {
        let store = DefinitionStore::new();
        let builder = DefinitionBuilder::new(&store, "Svc".into())
            .concrete(Concrete::value(shared(1u8)))
            .singleton()
            .tag("infra");
        assert!(!store.contains(&"Svc".into()));
        builder.register();
        assert!(store.contains(&"Svc".into()));
        assert_eq!(store.tagged_by("infra").len(), 1);
    }
}

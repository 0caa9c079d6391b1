//! The container kernel: registration DSL, resolution entry points,
//! lifecycle hooks, and diagnostics wiring.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, error, trace, warn};

use crate::class::{ClassDescriptor, ClassRegistry};
use crate::diagnostics::{PrototypeSummary, ServiceReport};
use crate::engine::context::KernelContext;
use crate::engine::trace::{ResolutionTrace, TraceObserver};
use crate::engine::{Engine, ResolutionState, StageOutcome};
use crate::error::{DiError, DiResult};
use crate::id::ServiceId;
use crate::injector::{Callable, Instantiator, InvocationContext, MethodInvoker, PropertyInjector};
use crate::lifetime::{strategy_for, Lifetime, LifetimeStrategy, TransientStrategy};
use crate::metrics::{MetricsEvent, MetricsSink};
use crate::observer::ResolutionTimeline;
use crate::policy::{PolicyDecision, PolicyEvaluator};
use crate::prototype::factory::{CacheStats, PrototypeFactory, DEFAULT_PROTOTYPE_CAPACITY};
use crate::prototype::ServicePrototype;
use crate::scope::ScopeRegistry;
use crate::store::{
    Concrete, ContextualBuilder, DefinitionBuilder, DefinitionStore, ServiceDefinition,
};
use crate::traits::Resolver;
use crate::value::{downcast, null_value, AnyValue, ArgumentOverrides, OverrideValue};

/// Recognized configuration options.
#[derive(Debug, Clone)]
pub struct KernelOptions {
    /// L1 size of the prototype cache.
    pub prototype_cache_capacity: usize,
    /// L2 location; `None` disables the persistent tier.
    pub prototype_cache_path: Option<PathBuf>,
    /// Reject autowire when no definition exists.
    pub strict_mode: bool,
    /// Last-line cap on the resolution tree depth.
    pub max_resolution_depth: usize,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            prototype_cache_capacity: DEFAULT_PROTOTYPE_CAPACITY,
            prototype_cache_path: None,
            strict_mode: false,
            max_resolution_depth: 256,
        }
    }
}

type ResolvingHook = Arc<dyn Fn(&ServiceId, &KernelContext) + Send + Sync>;
type ResolvedHook = Arc<dyn Fn(&ServiceId, &AnyValue) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ServiceId, &DiError) + Send + Sync>;

/// Per-service lifecycle hooks. Hook panics are contained and logged; they
/// never alter the resolution outcome.
#[derive(Default)]
struct HookRegistry {
    resolving: RwLock<HashMap<ServiceId, Vec<ResolvingHook>>>,
    resolved: RwLock<HashMap<ServiceId, Vec<ResolvedHook>>>,
    on_error: RwLock<HashMap<ServiceId, Vec<ErrorHook>>>,
}

impl HookRegistry {
    fn fire_resolving(&self, service: &ServiceId, ctx: &KernelContext) {
        if let Some(hooks) = self.resolving.read().get(service) {
            for hook in hooks {
                guard_sink("resolving-hook", || hook(service, ctx));
            }
        }
    }

    fn fire_resolved(&self, service: &ServiceId, value: &AnyValue) {
        if let Some(hooks) = self.resolved.read().get(service) {
            for hook in hooks {
                guard_sink("resolved-hook", || hook(service, value));
            }
        }
    }

    fn fire_error(&self, service: &ServiceId, error: &DiError) {
        if let Some(hooks) = self.on_error.read().get(service) {
            for hook in hooks {
                guard_sink("error-hook", || hook(service, error));
            }
        }
    }
}

/// Runs a diagnostics sink, containing panics.
fn guard_sink(label: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(target: "armature", sink = label, "diagnostics sink panicked; resolution unaffected");
    }
}

struct KernelInner {
    classes: Arc<ClassRegistry>,
    store: DefinitionStore,
    scopes: Arc<ScopeRegistry>,
    prototypes: PrototypeFactory,
    options: KernelOptions,
    policy: Option<Arc<dyn PolicyEvaluator>>,
    trace_observer: Option<Arc<dyn TraceObserver>>,
    timeline: Option<Arc<ResolutionTimeline>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    hooks: HookRegistry,
    booted: AtomicBool,
}

/// Configures and builds a [`Kernel`].
pub struct KernelBuilder {
    options: KernelOptions,
    policy: Option<Arc<dyn PolicyEvaluator>>,
    trace_observer: Option<Arc<dyn TraceObserver>>,
    timeline: Option<Arc<ResolutionTimeline>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl KernelBuilder {
    fn new() -> Self {
        Self {
            options: KernelOptions::default(),
            policy: None,
            trace_observer: None,
            timeline: None,
            metrics: None,
        }
    }

    pub fn prototype_cache_capacity(mut self, capacity: usize) -> Self {
        self.options.prototype_cache_capacity = capacity;
        self
    }

    pub fn prototype_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.prototype_cache_path = Some(path.into());
        self
    }

    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.options.strict_mode = strict;
        self
    }

    pub fn max_resolution_depth(mut self, depth: usize) -> Self {
        self.options.max_resolution_depth = depth;
        self
    }

    pub fn policy_evaluator(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn trace_observer(mut self, observer: Arc<dyn TraceObserver>) -> Self {
        self.trace_observer = Some(observer);
        self
    }

    pub fn timeline(mut self, timeline: Arc<ResolutionTimeline>) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn metrics_collector(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Kernel {
        let classes = Arc::new(ClassRegistry::new());
        let prototypes = match &self.options.prototype_cache_path {
            Some(path) => PrototypeFactory::with_persistence(
                Arc::clone(&classes),
                self.options.prototype_cache_capacity,
                path.clone(),
            ),
            None => PrototypeFactory::new(
                Arc::clone(&classes),
                self.options.prototype_cache_capacity,
            ),
        };
        debug!(
            target: "armature",
            capacity = self.options.prototype_cache_capacity,
            strict = self.options.strict_mode,
            max_depth = self.options.max_resolution_depth,
            "kernel created"
        );
        Kernel {
            inner: Arc::new(KernelInner {
                classes,
                store: DefinitionStore::new(),
                scopes: Arc::new(ScopeRegistry::new()),
                prototypes,
                options: self.options,
                policy: self.policy,
                trace_observer: self.trace_observer,
                timeline: self.timeline,
                metrics: self.metrics,
                hooks: HookRegistry::default(),
                booted: AtomicBool::new(false),
            }),
        }
    }
}

/// The container: composes the definition store, the class registry, the
/// prototype cache, the scope registry, and the resolution engine behind
/// one facade. Cloning is cheap and shares all state.
///
/// # Examples
///
/// ```
/// use armature::{ClassBuilder, Kernel, TypeDecl, shared};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Database { config: Arc<Config> }
///
/// let kernel = Kernel::new();
/// kernel.describe(
///     ClassBuilder::new("Config")
///         .constructs(|_| Ok(shared(Config { url: "postgres://localhost".into() })))
///         .build(),
/// );
/// kernel.describe(
///     ClassBuilder::new("Database")
///         .parameter("config", TypeDecl::named("Config"))
///         .constructs(|args| Ok(shared(Database { config: args.get::<Config>(0)? })))
///         .build(),
/// );
///
/// let db = kernel.get_as::<Database>("Database").unwrap();
/// assert_eq!(db.config.url, "postgres://localhost");
/// ```
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl Clone for Kernel {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// A kernel with default options and no diagnostics sinks.
    pub fn new() -> Self {
        KernelBuilder::new().build()
    }

    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    // ----- Registration surface -----

    /// Registers a class descriptor.
    pub fn describe(&self, descriptor: ClassDescriptor) {
        self.note_post_boot_registration("class", descriptor.name());
        self.inner.classes.register(descriptor);
    }

    /// Upserts a definition. `concrete` accepts a [`Concrete`] directly or
    /// `None` for pure autowire.
    pub fn bind(
        &self,
        id: impl Into<ServiceId>,
        concrete: impl Into<Option<Concrete>>,
        lifetime: Lifetime,
    ) {
        let id = id.into();
        self.note_post_boot_registration("definition", id.as_str());
        self.inner
            .store
            .bind(ServiceDefinition::new(id, concrete.into(), lifetime));
    }

    /// Binds with singleton lifetime.
    pub fn singleton(&self, id: impl Into<ServiceId>, concrete: impl Into<Option<Concrete>>) {
        self.bind(id, concrete, Lifetime::Singleton);
    }

    /// Binds with scoped lifetime.
    pub fn scoped(&self, id: impl Into<ServiceId>, concrete: impl Into<Option<Concrete>>) {
        self.bind(id, concrete, Lifetime::Scoped);
    }

    /// Stores an already-built value as a singleton.
    pub fn instance(&self, id: impl Into<ServiceId>, value: AnyValue) {
        self.bind(id, Concrete::Value(value), Lifetime::Singleton);
    }

    /// Chained definition builder; writes on its terminal `register`.
    pub fn define(&self, id: impl Into<ServiceId>) -> DefinitionBuilder<'_> {
        DefinitionBuilder::new(&self.inner.store, id.into())
    }

    /// Starts a contextual rule: when `consumer` needs X, give Y.
    pub fn when(&self, consumer: impl Into<ServiceId>) -> ContextualBuilder<'_> {
        ContextualBuilder::new(&self.inner.store, consumer.into())
    }

    /// Tags a service.
    pub fn tag<I, S>(&self, id: impl Into<ServiceId>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.store.tag(id, tags);
    }

    /// Service ids carrying `tag`.
    pub fn tagged_by(&self, tag: &str) -> Vec<ServiceId> {
        self.inner.store.tagged_by(tag)
    }

    /// Stores a named constructor-argument override on the definition,
    /// creating an autowire definition when none exists.
    pub fn with_argument(
        &self,
        id: impl Into<ServiceId>,
        name: impl Into<String>,
        value: AnyValue,
    ) {
        self.inner
            .store
            .with_argument(id, name, OverrideValue::One(value));
    }

    // ----- Lifecycle -----

    /// Closes the registration phase. Later registrations stay legal but
    /// are reported.
    pub fn boot(&self) {
        self.inner.booted.store(true, Ordering::Release);
        debug!(target: "armature", services = self.inner.store.len(), "kernel booted");
    }

    pub fn is_booted(&self) -> bool {
        self.inner.booted.load(Ordering::Acquire)
    }

    fn note_post_boot_registration(&self, what: &str, id: &str) {
        if self.is_booted() {
            warn!(target: "armature", kind = what, id, "registration after boot");
        }
    }

    /// Observes resolutions of `id` before discovery runs.
    pub fn on_resolving<F>(&self, id: impl Into<ServiceId>, hook: F)
    where
        F: Fn(&ServiceId, &KernelContext) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .resolving
            .write()
            .entry(id.into())
            .or_default()
            .push(Arc::new(hook));
    }

    /// Observes successful resolutions of `id`.
    pub fn on_resolved<F>(&self, id: impl Into<ServiceId>, hook: F)
    where
        F: Fn(&ServiceId, &AnyValue) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .resolved
            .write()
            .entry(id.into())
            .or_default()
            .push(Arc::new(hook));
    }

    /// Observes failures of top-level resolutions of `id`. Fires at most
    /// once per resolution tree.
    pub fn on_error<F>(&self, id: impl Into<ServiceId>, hook: F)
    where
        F: Fn(&ServiceId, &DiError) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .on_error
            .write()
            .entry(id.into())
            .or_default()
            .push(Arc::new(hook));
    }

    // ----- Resolution surface -----

    /// Resolves a service. Top-level entry: builds a root context with no
    /// parent and depth zero.
    pub fn get(&self, id: impl Into<ServiceId>) -> DiResult<AnyValue> {
        self.get_with(id, ArgumentOverrides::new())
    }

    /// Resolves with call-site named overrides.
    pub fn get_with(
        &self,
        id: impl Into<ServiceId>,
        overrides: ArgumentOverrides,
    ) -> DiResult<AnyValue> {
        let ctx = KernelContext::root(id.into(), overrides);
        self.resolve_context(&ctx)
    }

    /// Resolves and downcasts in one step.
    pub fn get_as<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>) -> DiResult<Arc<T>> {
        let id = id.into();
        let value = self.get(id.clone())?;
        downcast::<T>(&value).ok_or(DiError::TypeMismatch {
            service: id,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Resolves, returning `None` on any failure.
    pub fn try_get(&self, id: impl Into<ServiceId>) -> Option<AnyValue> {
        self.get(id).ok()
    }

    /// Normalizes and executes a callable, resolving its arguments through
    /// the container.
    pub fn call(&self, callable: Callable, overrides: ArgumentOverrides) -> DiResult<AnyValue> {
        self.call_traced(callable, overrides)
            .map(|invocation| invocation.result().cloned().unwrap_or_else(null_value))
    }

    /// Like [`call`](Kernel::call), returning the full invocation record.
    pub fn call_traced(
        &self,
        callable: Callable,
        overrides: ArgumentOverrides,
    ) -> DiResult<InvocationContext> {
        MethodInvoker::new(self).invoke(callable, &overrides, None)
    }

    /// Applies property and setter-method injection to an existing
    /// instance of the described class. Skips the policy gate.
    pub fn inject_into(&self, class: impl AsRef<str>, target: &AnyValue) -> DiResult<AnyValue> {
        let class = class.as_ref();
        let descriptor = self.inner.classes.get(class).ok_or_else(|| DiError::Prototype {
            class: class.to_string(),
            cause: "class is not described in the registry".to_string(),
        })?;
        let prototype = self.inner.prototypes.create_for(class)?;
        let ctx = KernelContext::root(ServiceId::new(class), ArgumentOverrides::new());
        let overrides = ArgumentOverrides::new();
        PropertyInjector::new(self).apply(&descriptor, &prototype, target, &overrides, &ctx)?;
        Instantiator::new(self).apply_injected_methods(
            &descriptor,
            &prototype,
            target,
            &overrides,
            &ctx,
        )?;
        Ok(Arc::clone(target))
    }

    /// Pushes a scope frame for the calling execution context.
    pub fn begin_scope(&self) {
        self.inner.scopes.begin_scope();
    }

    /// Pops the current scope frame.
    pub fn end_scope(&self) -> DiResult<()> {
        self.inner.scopes.end_scope()
    }

    /// Whether `id` could resolve: a definition exists or the id names a
    /// described class.
    pub fn contains(&self, id: impl Into<ServiceId>) -> bool {
        let id = id.into();
        self.inner.store.contains(&id) || self.inner.classes.contains(id.as_str())
    }

    /// Number of definitions in the store.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    // ----- Diagnostics surface -----

    /// Read-only report for one id; never constructs, never warms caches.
    pub fn inspect(&self, id: impl Into<ServiceId>) -> ServiceReport {
        let id = id.into();
        let definition = self.inner.store.find_definition(&id);
        let class_name = if self.inner.classes.contains(id.as_str()) {
            Some(id.as_str().to_string())
        } else {
            definition.as_ref().and_then(|d| match &d.concrete {
                Some(Concrete::Class(name)) => Some(name.clone()),
                _ => None,
            })
        };
        let prototype = match class_name {
            Some(name) => match self.inner.classes.get(&name) {
                Some(descriptor) => {
                    let classes = Arc::clone(&self.inner.classes);
                    Ok(PrototypeSummary::of(&ServicePrototype::from_descriptor(
                        &descriptor,
                        &move |n| classes.contains(n),
                    )))
                }
                None => Err(format!("class `{}` is not described", name)),
            },
            None => Err("no class associated with this id".to_string()),
        };
        ServiceReport {
            defined: definition.is_some(),
            cached: self.inner.scopes.has(&id),
            lifetime: definition.map(|d| d.lifetime),
            tags: self.inner.store.tags_of(&id),
            prototype,
            id,
        }
    }

    /// Prototype cache occupancy.
    pub fn prototype_stats(&self) -> CacheStats {
        self.inner.prototypes.stats()
    }

    // ----- Internal composition -----

    pub(crate) fn store(&self) -> &DefinitionStore {
        &self.inner.store
    }

    pub(crate) fn classes(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    pub(crate) fn prototypes(&self) -> &PrototypeFactory {
        &self.inner.prototypes
    }

    pub(crate) fn options(&self) -> &KernelOptions {
        &self.inner.options
    }

    /// Flushes the persistent prototype tier, if configured.
    pub fn flush_prototypes(&self) -> std::io::Result<()> {
        self.inner.prototypes.flush()
    }

    /// Drops all cached instances (singleton tier and this context's
    /// frames) and empties the prototype cache. Teardown and tests.
    pub fn reset_caches(&self) {
        self.inner.scopes.clear();
        self.inner.prototypes.clear();
    }

    pub(crate) fn emit_stage_metric(
        &self,
        service: &ServiceId,
        state: ResolutionState,
        duration: Duration,
        failure: Option<String>,
    ) {
        if let Some(metrics) = &self.inner.metrics {
            let event = MetricsEvent::stage(service.clone(), state, duration, failure);
            guard_sink("metrics", || metrics.record(event));
        }
    }

    fn emit_resolve_metric(&self, service: &ServiceId, duration: Duration, failure: Option<String>) {
        if let Some(metrics) = &self.inner.metrics {
            let event = MetricsEvent::resolve(service.clone(), duration, failure);
            guard_sink("metrics", || metrics.record(event));
        }
    }

    fn surrender_trace(&self, resolution: &ResolutionTrace) {
        if let Some(observer) = &self.inner.trace_observer {
            guard_sink("trace-observer", || observer.record(resolution));
        }
        if let Some(timeline) = &self.inner.timeline {
            guard_sink("timeline", || timeline.record(resolution));
        }
    }

    /// Resolution entry shared by top-level gets, child resolutions,
    /// delegates, and factories.
    pub(crate) fn resolve_context(&self, ctx: &Arc<KernelContext>) -> DiResult<AnyValue> {
        let result = self.resolve_guarded(ctx);
        // Error hooks fire for the top-level id only, once per tree.
        if ctx.parent().is_none() {
            if let Err(e) = &result {
                self.inner.hooks.fire_error(ctx.service(), e);
            }
        }
        result
    }

    fn resolve_guarded(&self, ctx: &Arc<KernelContext>) -> DiResult<AnyValue> {
        let service = ctx.service().clone();

        // Policy gate: before discovery, before any store or cache touch.
        if let Some(policy) = &self.inner.policy {
            if let PolicyDecision::Deny { reason } = policy.evaluate(&service, ctx) {
                return Err(DiError::PolicyBlocked { service, reason });
            }
        }

        // Delegation and factory cycles show up as a repeated id on the
        // parent chain.
        if let Some(parent) = ctx.parent() {
            if parent.chain_contains(&service) {
                let mut chain = parent.chain();
                chain.push(service.clone());
                return Err(DiError::Circular { chain });
            }
        }

        let limit = self.inner.options.max_resolution_depth;
        if ctx.depth() > limit {
            return Err(DiError::DepthExceeded {
                service,
                depth: ctx.depth(),
                limit,
            });
        }

        self.inner.hooks.fire_resolving(&service, ctx);
        trace!(target: "armature", service = %service, depth = ctx.depth(), "resolving");

        let started = Instant::now();
        let mut resolution = ResolutionTrace::new(service.clone());
        let lifetime = self
            .inner
            .store
            .find_definition(&service)
            .map(|d| d.lifetime)
            .unwrap_or(Lifetime::Transient);
        // A matching contextual rule makes this resolution consumer-specific:
        // it must neither read nor publish the plain id's cached instance.
        let contextual = ctx
            .parent()
            .map(|parent| {
                self.inner
                    .store
                    .find_contextual(parent.service(), &service)
                    .is_some()
            })
            .unwrap_or(false);
        let strategy: Box<dyn LifetimeStrategy> = if contextual {
            Box::new(TransientStrategy)
        } else {
            strategy_for(lifetime, &self.inner.scopes)
        };

        let outcome = match strategy.retrieve(&service) {
            Some(cached) => {
                resolution.record(
                    ResolutionState::Success,
                    StageOutcome::Hit,
                    Some("lifetime-cache".to_string()),
                );
                Ok(cached)
            }
            None => {
                let mut outcome = Engine::new(self).resolve(ctx, &mut resolution);
                if let Ok(value) = &outcome {
                    match strategy.store(&service, value) {
                        // Set-once: a racing winner's instance is the one
                        // every caller observes.
                        Ok(()) => {
                            if let Some(published) = strategy.retrieve(&service) {
                                outcome = Ok(published);
                            }
                        }
                        Err(e) => outcome = Err(e),
                    }
                }
                outcome
            }
        };

        self.emit_resolve_metric(
            &service,
            started.elapsed(),
            outcome.as_ref().err().map(|e| e.to_string()),
        );
        if let Ok(value) = &outcome {
            self.inner.hooks.fire_resolved(&service, value);
        }
        if ctx.parent().is_none() {
            self.surrender_trace(&resolution);
        }
        if let Err(e) = &outcome {
            trace!(target: "armature", service = %service, error = %e, "resolution failed");
        }
        outcome
    }
}

impl Resolver for Kernel {
    fn resolve_id(&self, id: &ServiceId) -> DiResult<AnyValue> {
        let ctx = KernelContext::root(id.clone(), ArgumentOverrides::new());
        self.resolve_context(&ctx)
    }

    fn knows(&self, id: &ServiceId) -> bool {
        self.contains(id.clone())
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("definitions", &self.inner.store.len())
            .field("classes", &self.inner.classes.len())
            .field("booted", &self.is_booted())
            .finish()
    }
}

/// Container facade handed to factories and callable bodies.
///
/// Carries the current resolution frame, so nested `get` calls extend the
/// parent chain and keep cycle detection and contextual rules working.
pub struct ResolverContext<'k> {
    kernel: &'k Kernel,
    frame: Arc<KernelContext>,
}

impl<'k> ResolverContext<'k> {
    pub(crate) fn new(kernel: &'k Kernel, frame: Arc<KernelContext>) -> Self {
        Self { kernel, frame }
    }

    pub fn kernel(&self) -> &Kernel {
        self.kernel
    }

    /// The resolution frame this facade is bound to.
    pub fn context(&self) -> &Arc<KernelContext> {
        &self.frame
    }

    /// Resolves a dependency as a child of the current frame.
    pub fn get(&self, id: impl Into<ServiceId>) -> DiResult<AnyValue> {
        let child = self.frame.child(id.into(), ArgumentOverrides::new());
        self.kernel.resolve_context(&child)
    }

    /// Resolves and downcasts in one step.
    pub fn get_as<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>) -> DiResult<Arc<T>> {
        let id = id.into();
        let value = self.get(id.clone())?;
        downcast::<T>(&value).ok_or(DiError::TypeMismatch {
            service: id,
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn try_get(&self, id: impl Into<ServiceId>) -> Option<AnyValue> {
        self.get(id).ok()
    }
}

impl Resolver for ResolverContext<'_> {
    fn resolve_id(&self, id: &ServiceId) -> DiResult<AnyValue> {
        let child = self.frame.child(id.clone(), ArgumentOverrides::new());
        self.kernel.resolve_context(&child)
    }

    fn knows(&self, id: &ServiceId) -> bool {
        self.kernel.contains(id.clone())
    }
}

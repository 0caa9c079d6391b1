//! # armature
//!
//! Deterministic, observable dependency injection runtime with
//! descriptor-driven wiring and a staged resolution pipeline.
//!
//! ## Features
//!
//! - **Staged resolution**: contextual lookup, definition lookup, and
//!   autowire run as an ordered state machine with an append-only trace
//! - **Descriptor-driven wiring**: classes are described once (constructor,
//!   properties, methods); autowiring recurses through those descriptors
//! - **Lifetimes**: Transient, Scoped, and Singleton with a LIFO scope stack
//! - **Contextual bindings**: "when X needs Y, give Z" rules that only match
//!   the consumer that triggered the resolution
//! - **Prototype cache**: structural metadata cached in an O(1) LRU tier
//!   with an optional persistent, schema-versioned tier
//! - **Diagnostics**: per-service inspection, resolution timelines, metrics
//!   events, and lifecycle hooks, all optional and all isolated from the
//!   resolution outcome
//!
//! ## Quick Start
//!
//! ```rust
//! use armature::{ClassBuilder, Kernel, TypeDecl, shared};
//! use std::sync::Arc;
//!
//! struct FileLogger { path: String }
//! struct HttpController { logger: Arc<FileLogger> }
//!
//! let kernel = Kernel::new();
//!
//! // Describe classes once; descriptors stand in for reflection.
//! kernel.describe(
//!     ClassBuilder::new("Logger")
//!         .constructs(|_| Ok(shared(FileLogger { path: "/var/log/app.log".into() })))
//!         .build(),
//! );
//! kernel.describe(
//!     ClassBuilder::new("HttpController")
//!         .parameter("logger", TypeDecl::named("Logger"))
//!         .constructs(|args| Ok(shared(HttpController { logger: args.get::<FileLogger>(0)? })))
//!         .build(),
//! );
//!
//! // No explicit binding needed: discovery falls through to autowire.
//! let controller = kernel.get_as::<HttpController>("HttpController").unwrap();
//! assert_eq!(controller.logger.path, "/var/log/app.log");
//! ```
//!
//! ## Lifetimes and Scopes
//!
//! ```rust
//! use armature::{Concrete, Kernel, shared};
//! use std::sync::Arc;
//!
//! let kernel = Kernel::new();
//! kernel.singleton("Config", Concrete::factory(|_, _| Ok(shared(42u32))));
//! kernel.scoped("RequestId", Concrete::factory(|_, _| Ok(shared(7u8))));
//!
//! // Singletons keep identity across calls.
//! let a = kernel.get("Config").unwrap();
//! let b = kernel.get("Config").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! // Scoped services keep identity inside one frame.
//! kernel.begin_scope();
//! let r1 = kernel.get("RequestId").unwrap();
//! let r2 = kernel.get("RequestId").unwrap();
//! assert!(Arc::ptr_eq(&r1, &r2));
//! kernel.end_scope().unwrap();
//! ```
//!
//! ## Contextual Bindings
//!
//! ```rust
//! use armature::{ClassBuilder, Concrete, Kernel, TypeDecl, shared};
//! use std::sync::Arc;
//!
//! struct Logger { channel: &'static str }
//! struct Controller { logger: Arc<Logger> }
//!
//! let kernel = Kernel::new();
//! kernel.describe(
//!     ClassBuilder::new("FileLogger")
//!         .constructs(|_| Ok(shared(Logger { channel: "file" })))
//!         .build(),
//! );
//! kernel.describe(
//!     ClassBuilder::new("HttpLogger")
//!         .constructs(|_| Ok(shared(Logger { channel: "http" })))
//!         .build(),
//! );
//! kernel.describe(
//!     ClassBuilder::new("Controller")
//!         .parameter("logger", TypeDecl::named("Logger"))
//!         .constructs(|args| Ok(shared(Controller { logger: args.get::<Logger>(0)? })))
//!         .build(),
//! );
//!
//! // The default for everyone...
//! kernel.bind("Logger", Concrete::class("FileLogger"), armature::Lifetime::Transient);
//! // ...except inside Controller.
//! kernel.when("Controller").needs("Logger").give(Concrete::class("HttpLogger"));
//!
//! let controller = kernel.get_as::<Controller>("Controller").unwrap();
//! assert_eq!(controller.logger.channel, "http");
//! ```

pub mod class;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod id;
pub mod injector;
pub mod kernel;
pub mod lifetime;
pub mod metrics;
pub mod observer;
pub mod policy;
pub mod prototype;
pub mod scope;
pub mod store;
pub mod traits;
pub mod value;

mod resolver;

pub use class::{
    ClassBuilder, ClassDescriptor, ClassRegistry, ConstructFn, InvokeFn, MethodDescriptor,
    ParameterDescriptor, PropertyDescriptor, SetterFn, TypeDecl,
};
pub use diagnostics::{PrototypeSummary, ServiceReport};
pub use engine::{
    KernelContext, ResolutionState, ResolutionTrace, StageOutcome, TraceObserver, TraceRecord,
};
pub use error::{BoxError, DiError, DiResult};
pub use id::ServiceId;
pub use injector::{Callable, InvocationContext, NormalizedTarget};
pub use kernel::{Kernel, KernelBuilder, KernelOptions, ResolverContext};
pub use lifetime::Lifetime;
pub use metrics::{MetricsCollector, MetricsEvent, MetricsSink, MetricsStatus, TimingStats};
pub use observer::{ResolutionTimeline, TracingObserver};
pub use policy::{PolicyDecision, PolicyEvaluator};
pub use prototype::factory::{
    CacheStats, PrototypeFactory, DEFAULT_PROTOTYPE_CAPACITY, PROTOTYPE_SCHEMA_VERSION,
};
pub use prototype::{
    MethodPrototype, ParameterPrototype, PropertyPrototype, ScalarValue, ServicePrototype,
};
pub use scope::ScopeRegistry;
pub use store::{
    Concrete, ContextualBuilder, ContextualNeed, DefinitionBuilder, DefinitionStore, FactoryFn,
    ServiceDefinition,
};
pub use traits::Resolver;
pub use value::{
    downcast, is_null, null_value, shared, AnyValue, ArgumentList, ArgumentOverrides, Null,
    OverrideValue,
};

use armature::{
    ClassBuilder, Concrete, DiError, Kernel, KernelContext, Lifetime, MetricsCollector,
    PolicyDecision, ResolutionTimeline, ResolutionTrace, ServiceId, TraceObserver, TypeDecl,
    shared,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn inspect_reports_definition_cache_lifetime_and_tags() {
    let kernel = Kernel::new();
    kernel.describe(
        ClassBuilder::new("Repo")
            .parameter_with_default(
                "retries",
                TypeDecl::named("int"),
                armature::ScalarValue::Int(3),
            )
            .constructs(|_| Ok(shared(())))
            .build(),
    );
    kernel.singleton("Repo", Concrete::class("Repo"));
    kernel.tag("Repo", ["storage", "boot"]);

    let before = kernel.inspect("Repo");
    assert!(before.defined);
    assert!(!before.cached);
    assert_eq!(before.lifetime, Some(Lifetime::Singleton));
    assert_eq!(before.tags, vec!["boot".to_string(), "storage".to_string()]);
    let summary = before.prototype.unwrap();
    assert_eq!(summary.class, "Repo");
    assert!(summary.instantiable);
    assert_eq!(summary.constructor_parameters, 1);

    kernel.get("Repo").unwrap();
    let after = kernel.inspect("Repo");
    assert!(after.cached);
}

#[test]
fn inspect_handles_unknown_ids_gracefully() {
    let kernel = Kernel::new();
    let report = kernel.inspect("Ghost");
    assert!(!report.defined);
    assert!(!report.cached);
    assert_eq!(report.lifetime, None);
    assert!(report.tags.is_empty());
    assert!(report.prototype.is_err());
}

#[test]
fn inspect_never_warms_the_prototype_cache() {
    let kernel = Kernel::new();
    kernel.describe(
        ClassBuilder::new("Repo")
            .constructs(|_| Ok(shared(())))
            .build(),
    );

    kernel.inspect("Repo");
    assert_eq!(kernel.prototype_stats().size, 0);
}

#[test]
fn timeline_receives_one_trace_per_top_level_resolve() {
    let timeline = Arc::new(ResolutionTimeline::new());
    let kernel = Kernel::builder().timeline(Arc::clone(&timeline)).build();
    kernel.instance("Config", shared(1u8));

    kernel.get("Config").unwrap();
    kernel.get("Missing").unwrap_err();

    let traces = timeline.traces();
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].service().as_str(), "Config");
    assert_eq!(traces[1].service().as_str(), "Missing");
}

#[test]
fn custom_trace_observer_is_called_once_per_tree() {
    struct Counting {
        seen: Mutex<Vec<String>>,
    }
    impl TraceObserver for Counting {
        fn record(&self, trace: &ResolutionTrace) {
            self.seen.lock().push(trace.service().to_string());
        }
    }

    let observer = Arc::new(Counting {
        seen: Mutex::new(Vec::new()),
    });
    let kernel = Kernel::builder()
        .trace_observer(Arc::clone(&observer) as Arc<dyn TraceObserver>)
        .build();

    kernel.describe(ClassBuilder::new("Leaf").constructs(|_| Ok(shared(()))).build());
    kernel.describe(
        ClassBuilder::new("Root")
            .parameter("leaf", TypeDecl::named("Leaf"))
            .constructs(|args| {
                let _ = args.raw(0);
                Ok(shared(()))
            })
            .build(),
    );

    kernel.get("Root").unwrap();

    // The child resolution of Leaf does not surrender its own trace.
    assert_eq!(*observer.seen.lock(), vec!["Root".to_string()]);
}

#[test]
fn metrics_collector_sees_resolves_and_stages() {
    let metrics = Arc::new(MetricsCollector::new());
    let kernel = Kernel::builder()
        .metrics_collector(Arc::clone(&metrics) as Arc<dyn armature::MetricsSink>)
        .build();
    kernel.instance("Config", shared(1u8));

    kernel.get("Config").unwrap();

    let counters = metrics.counters();
    assert_eq!(counters.get("resolve"), Some(&1));
    assert_eq!(counters.get("stage.contextual_lookup"), Some(&1));
    assert_eq!(counters.get("stage.definition_lookup"), Some(&1));
    let stats = metrics.timing_stats(&ServiceId::new("Config")).unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.error_count, 0);

    // Failures are counted too.
    kernel.get("Missing").unwrap_err();
    let stats = metrics.timing_stats(&ServiceId::new("Missing")).unwrap();
    assert_eq!(stats.error_count, 1);
    assert!(!metrics.slowest(2).is_empty());
}

#[test]
fn policy_veto_blocks_before_any_work() {
    let built = Arc::new(AtomicU32::new(0));
    let built_clone = Arc::clone(&built);

    let kernel = Kernel::builder()
        .policy_evaluator(Arc::new(|service: &ServiceId, _: &KernelContext| {
            if service.as_str() == "Blocked" {
                PolicyDecision::deny("not allowed here")
            } else {
                PolicyDecision::Allow
            }
        }))
        .build();
    kernel.describe(
        ClassBuilder::new("Blocked")
            .constructs(move |_| {
                built_clone.fetch_add(1, Ordering::SeqCst);
                Ok(shared(()))
            })
            .build(),
    );
    kernel.singleton("Blocked", Concrete::class("Blocked"));

    match kernel.get("Blocked").unwrap_err() {
        DiError::PolicyBlocked { service, reason } => {
            assert_eq!(service.as_str(), "Blocked");
            assert_eq!(reason, "not allowed here");
        }
        other => panic!("expected PolicyBlocked, got {:?}", other),
    }

    // No construction, no prototype fetch, no cached instance.
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert_eq!(kernel.prototype_stats().size, 0);
    assert!(!kernel.inspect("Blocked").cached);
}

#[test]
fn policy_gate_applies_to_child_resolutions() {
    let kernel = Kernel::builder()
        .policy_evaluator(Arc::new(|service: &ServiceId, _: &KernelContext| {
            if service.as_str() == "Secret" {
                PolicyDecision::deny("classified")
            } else {
                PolicyDecision::Allow
            }
        }))
        .build();
    kernel.instance("Secret", shared(42u8));
    kernel.bind(
        "Leaky",
        Concrete::factory(|r, _| Ok(r.get("Secret")?)),
        Lifetime::Transient,
    );

    assert!(matches!(
        kernel.get("Leaky").unwrap_err(),
        DiError::PolicyBlocked { .. }
    ));
}

#[test]
fn lifecycle_hooks_observe_their_service() {
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let kernel = Kernel::new();
    kernel.instance("Config", shared(1u8));

    let sink = Arc::clone(&events);
    kernel.on_resolving("Config", move |service, _| {
        sink.lock().push(format!("resolving {}", service));
    });
    let sink = Arc::clone(&events);
    kernel.on_resolved("Config", move |service, _| {
        sink.lock().push(format!("resolved {}", service));
    });

    kernel.get("Config").unwrap();

    assert_eq!(
        *events.lock(),
        vec!["resolving Config".to_string(), "resolved Config".to_string()]
    );
}

#[test]
fn error_hooks_fire_once_for_the_whole_tree() {
    let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let kernel = Kernel::new();
    // Root resolves a missing child: the failure belongs to the tree root.
    kernel.bind(
        "Root",
        Concrete::factory(|r, _| Ok(r.get("MissingChild")?)),
        Lifetime::Transient,
    );

    let sink = Arc::clone(&fired);
    kernel.on_error("Root", move |service, error| {
        sink.lock().push(format!("{}: {}", service, error));
    });
    let sink = Arc::clone(&fired);
    kernel.on_error("MissingChild", move |service, _| {
        sink.lock().push(format!("child hook for {}", service));
    });

    kernel.get("Root").unwrap_err();

    let fired = fired.lock();
    assert_eq!(fired.len(), 1);
    assert!(fired[0].starts_with("Root:"));
}

#[test]
fn panicking_sinks_never_change_the_outcome() {
    struct Exploding;
    impl TraceObserver for Exploding {
        fn record(&self, _trace: &ResolutionTrace) {
            panic!("observer bug");
        }
    }

    let kernel = Kernel::builder()
        .trace_observer(Arc::new(Exploding))
        .build();
    kernel.instance("Config", shared(7u8));

    let value = kernel.get_as::<u8>("Config").unwrap();
    assert_eq!(*value, 7);
}

#[test]
fn panicking_hooks_never_change_the_outcome() {
    let kernel = Kernel::new();
    kernel.instance("Config", shared(7u8));
    kernel.on_resolving("Config", |_, _| panic!("hook bug"));

    assert_eq!(*kernel.get_as::<u8>("Config").unwrap(), 7);
}

#[test]
fn tagged_by_lists_services_in_registration_order() {
    let kernel = Kernel::new();
    kernel.instance("A", shared(1u8));
    kernel.instance("B", shared(2u8));
    kernel.tag("A", ["handler"]);
    kernel.tag("B", ["handler"]);

    let tagged = kernel.tagged_by("handler");
    assert_eq!(tagged, vec![ServiceId::new("A"), ServiceId::new("B")]);
}

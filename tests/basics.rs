use armature::{ClassBuilder, Concrete, DiError, Kernel, Lifetime, shared};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Service {
    id: u32,
}

fn counting_factory() -> (Arc<AtomicU32>, Concrete) {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = Arc::clone(&counter);
    let concrete = Concrete::factory(move |_, _| {
        Ok(shared(Service {
            id: counter_clone.fetch_add(1, Ordering::SeqCst),
        }))
    });
    (counter, concrete)
}

#[test]
fn singleton_identity_across_calls() {
    let kernel = Kernel::new();
    let (counter, concrete) = counting_factory();
    kernel.singleton("Service", concrete);

    let a = kernel.get("Service").unwrap();
    let b = kernel.get("Service").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn transient_produces_distinct_instances() {
    let kernel = Kernel::new();
    let (counter, concrete) = counting_factory();
    kernel.bind("Service", concrete, Lifetime::Transient);

    let a = kernel.get_as::<Service>("Service").unwrap();
    let b = kernel.get_as::<Service>("Service").unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn instance_returns_the_stored_value() {
    let kernel = Kernel::new();
    kernel.instance("Port", shared(8080u16));

    let port = kernel.get_as::<u16>("Port").unwrap();
    assert_eq!(*port, 8080);

    let again = kernel.get("Port").unwrap();
    assert!(Arc::ptr_eq(&(kernel.get("Port").unwrap()), &again));
}

#[test]
fn alias_delegates_to_target() {
    let kernel = Kernel::new();
    kernel.instance("ConcreteMailer", shared("smtp".to_string()));
    kernel.bind("Mailer", Concrete::alias("ConcreteMailer"), Lifetime::Transient);

    let mailer = kernel.get_as::<String>("Mailer").unwrap();
    assert_eq!(mailer.as_str(), "smtp");
}

#[test]
fn alias_preserves_target_identity() {
    let kernel = Kernel::new();
    let (_, concrete) = counting_factory();
    kernel.singleton("Impl", concrete);
    kernel.bind("Contract", Concrete::alias("Impl"), Lifetime::Transient);

    let direct = kernel.get("Impl").unwrap();
    let aliased = kernel.get("Contract").unwrap();
    assert!(Arc::ptr_eq(&direct, &aliased));
}

#[test]
fn duplicate_bind_last_write_wins() {
    let kernel = Kernel::new();
    kernel.instance("Value", shared(1u8));
    kernel.instance("Value", shared(2u8));

    assert_eq!(*kernel.get_as::<u8>("Value").unwrap(), 2);
    assert_eq!(kernel.len(), 1);
}

#[test]
fn missing_service_is_not_found() {
    let kernel = Kernel::new();
    let err = kernel.get("Nothing").unwrap_err();
    match err {
        DiError::NotFound { service, trace } => {
            assert_eq!(service.as_str(), "Nothing");
            assert!(!trace.is_empty());
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert!(kernel.try_get("Nothing").is_none());
}

#[test]
fn get_as_reports_type_mismatch() {
    let kernel = Kernel::new();
    kernel.instance("Port", shared(8080u16));

    let err = kernel.get_as::<String>("Port").unwrap_err();
    assert!(matches!(err, DiError::TypeMismatch { .. }));
}

#[test]
fn strict_mode_rejects_undefined_autowire() {
    let kernel = Kernel::builder().strict_mode(true).build();
    kernel.describe(
        ClassBuilder::new("Widget")
            .constructs(|_| Ok(shared(Service { id: 0 })))
            .build(),
    );

    // Described but not bound: strict mode refuses to autowire it.
    assert!(matches!(
        kernel.get("Widget").unwrap_err(),
        DiError::NotFound { .. }
    ));

    // A definition with a null concrete opts the class back in.
    kernel.bind("Widget", None, Lifetime::Transient);
    assert!(kernel.get("Widget").is_ok());
}

#[test]
fn factory_receives_call_site_overrides() {
    use armature::ArgumentOverrides;

    let kernel = Kernel::new();
    kernel.bind(
        "Greeting",
        Concrete::factory(|_, overrides| {
            let name = match overrides.get("name") {
                Some(armature::OverrideValue::One(value)) => {
                    armature::downcast::<String>(value).unwrap().to_string()
                }
                _ => "world".to_string(),
            };
            Ok(shared(format!("hello {}", name)))
        }),
        Lifetime::Transient,
    );

    let plain = kernel.get_as::<String>("Greeting").unwrap();
    assert_eq!(plain.as_str(), "hello world");

    let named = kernel
        .get_with(
            "Greeting",
            ArgumentOverrides::new().with("name", shared("ada".to_string())),
        )
        .unwrap();
    assert_eq!(armature::downcast::<String>(&named).unwrap().as_str(), "hello ada");
}

#[test]
fn factory_error_is_wrapped_with_service() {
    let kernel = Kernel::new();
    kernel.bind(
        "Flaky",
        Concrete::factory(|_, _| Err("disk on fire".into())),
        Lifetime::Transient,
    );

    match kernel.get("Flaky").unwrap_err() {
        DiError::Factory { service, cause, .. } => {
            assert_eq!(service.as_str(), "Flaky");
            assert!(cause.contains("disk on fire"));
        }
        other => panic!("expected Factory error, got {:?}", other),
    }
}

#[test]
fn contains_covers_definitions_and_described_classes() {
    let kernel = Kernel::new();
    assert!(kernel.is_empty());

    kernel.instance("Bound", shared(()));
    kernel.describe(
        ClassBuilder::new("Described")
            .constructs(|_| Ok(shared(())))
            .build(),
    );

    assert!(kernel.contains("Bound"));
    assert!(kernel.contains("Described"));
    assert!(!kernel.contains("Unknown"));
    assert_eq!(kernel.len(), 1);
}

#[test]
fn registration_after_boot_is_allowed() {
    let kernel = Kernel::new();
    kernel.instance("Early", shared(1u8));
    kernel.boot();
    assert!(kernel.is_booted());

    // Allowed, but reported through the diagnostics log.
    kernel.instance("Late", shared(2u8));
    assert_eq!(*kernel.get_as::<u8>("Late").unwrap(), 2);
}

#[test]
fn definition_builder_registers_on_terminal_call() {
    let kernel = Kernel::new();
    kernel
        .define("Repo")
        .concrete(Concrete::factory(|_, _| Ok(shared(Service { id: 7 }))))
        .singleton()
        .tag("storage")
        .register();

    assert_eq!(kernel.get_as::<Service>("Repo").unwrap().id, 7);
    assert_eq!(kernel.tagged_by("storage").len(), 1);
}

#[test]
fn resolver_trait_surface() {
    use armature::Resolver;

    let kernel = Kernel::new();
    kernel.instance("Port", shared(8080u16));

    fn read_port<R: Resolver>(resolver: &R) -> u16 {
        *resolver.get_as::<u16>("Port").unwrap()
    }

    assert_eq!(read_port(&kernel), 8080);
    assert!(kernel.knows(&"Port".into()));
}

use armature::{
    ClassBuilder, Kernel, ResolutionState, ResolutionTimeline, StageOutcome, TypeDecl, shared,
};
use parking_lot::Mutex;
use std::sync::Arc;

struct C;
struct B {
    c: Arc<C>,
}
struct A {
    b: Arc<B>,
}

fn describe_chain(kernel: &Kernel) {
    kernel.describe(ClassBuilder::new("C").constructs(|_| Ok(shared(C))).build());
    kernel.describe(
        ClassBuilder::new("B")
            .parameter("c", TypeDecl::named("C"))
            .constructs(|args| Ok(shared(B { c: args.get::<C>(0)? })))
            .build(),
    );
    kernel.describe(
        ClassBuilder::new("A")
            .parameter("b", TypeDecl::named("B"))
            .constructs(|args| Ok(shared(A { b: args.get::<B>(0)? })))
            .build(),
    );
}

#[test]
fn autowire_chain_builds_the_whole_tree() {
    let kernel = Kernel::new();
    describe_chain(&kernel);

    let a = kernel.get_as::<A>("A").unwrap();
    // The chain is wired leaves-first; touching the leaf proves it.
    let _: &C = &a.b.c;
}

#[test]
fn autowire_without_definition_is_transient() {
    let kernel = Kernel::new();
    describe_chain(&kernel);

    let first = kernel.get("A").unwrap();
    let second = kernel.get("A").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn autowire_trace_has_the_canonical_shape() {
    let timeline = Arc::new(ResolutionTimeline::new());
    let kernel = Kernel::builder().timeline(Arc::clone(&timeline)).build();
    describe_chain(&kernel);

    kernel.get("A").unwrap();

    let trace = timeline.last().unwrap();
    assert_eq!(trace.service().as_str(), "A");
    assert_eq!(
        trace.outcomes(),
        vec![
            (ResolutionState::ContextualLookup, StageOutcome::Miss),
            (ResolutionState::DefinitionLookup, StageOutcome::Miss),
            (ResolutionState::Autowire, StageOutcome::Hit),
            (ResolutionState::Evaluate, StageOutcome::Hit),
            (ResolutionState::Instantiate, StageOutcome::Hit),
            (ResolutionState::Success, StageOutcome::Hit),
        ]
    );

    // Children follow the same shape when resolved top-level.
    timeline.clear();
    kernel.get("B").unwrap();
    let trace = timeline.last().unwrap();
    assert_eq!(
        trace.outcomes(),
        vec![
            (ResolutionState::ContextualLookup, StageOutcome::Miss),
            (ResolutionState::DefinitionLookup, StageOutcome::Miss),
            (ResolutionState::Autowire, StageOutcome::Hit),
            (ResolutionState::Evaluate, StageOutcome::Hit),
            (ResolutionState::Instantiate, StageOutcome::Hit),
            (ResolutionState::Success, StageOutcome::Hit),
        ]
    );
}

#[test]
fn trace_is_reproducible_for_a_fixed_store() {
    let timeline = Arc::new(ResolutionTimeline::new());
    let kernel = Kernel::builder().timeline(Arc::clone(&timeline)).build();
    describe_chain(&kernel);

    kernel.get("A").unwrap();
    kernel.get("A").unwrap();

    let traces = timeline.traces();
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].outcomes(), traces[1].outcomes());
}

#[test]
fn child_depth_and_parent_follow_the_chain() {
    let kernel = Kernel::new();
    describe_chain(&kernel);

    let seen: Arc<Mutex<Vec<(String, usize, Option<String>)>>> = Arc::new(Mutex::new(Vec::new()));
    for id in ["A", "B", "C"] {
        let seen = Arc::clone(&seen);
        kernel.on_resolving(id, move |service, ctx| {
            seen.lock().push((
                service.to_string(),
                ctx.depth(),
                ctx.parent().map(|p| p.service().to_string()),
            ));
        });
    }

    kernel.get("A").unwrap();

    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![
            ("A".to_string(), 0, None),
            ("B".to_string(), 1, Some("A".to_string())),
            ("C".to_string(), 2, Some("B".to_string())),
        ]
    );
}

#[test]
fn only_top_level_traces_are_surrendered() {
    let timeline = Arc::new(ResolutionTimeline::new());
    let kernel = Kernel::builder().timeline(Arc::clone(&timeline)).build();
    describe_chain(&kernel);

    kernel.get("A").unwrap();

    // One record for the tree, not one per child resolution.
    assert_eq!(timeline.len(), 1);
}

#[test]
fn undescribed_interface_fails_not_instantiable_without_strict_mode() {
    use armature::{Concrete, DiError, Lifetime};

    let kernel = Kernel::new();
    kernel.describe(ClassBuilder::new("Contract").not_instantiable().build());
    kernel.bind("Contract", Concrete::class("Contract"), Lifetime::Transient);

    assert!(matches!(
        kernel.get("Contract").unwrap_err(),
        DiError::NotInstantiable { .. }
    ));

    // Pure autowire of the described-but-abstract class fails the same way.
    let kernel = Kernel::new();
    kernel.describe(ClassBuilder::new("Contract").not_instantiable().build());
    assert!(matches!(
        kernel.get("Contract").unwrap_err(),
        DiError::NotInstantiable { .. }
    ));
}

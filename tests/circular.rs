use armature::{
    Concrete, DiError, Kernel, Lifetime, ResolutionTimeline, ServiceId, StageOutcome, shared,
};
use std::sync::Arc;

#[test]
fn factory_cycle_is_detected_with_full_chain() {
    let kernel = Kernel::new();
    kernel.bind(
        "X",
        Concrete::factory(|r, _| Ok(r.get("Y")?)),
        Lifetime::Transient,
    );
    kernel.bind(
        "Y",
        Concrete::factory(|r, _| Ok(r.get("X")?)),
        Lifetime::Transient,
    );

    match kernel.get("X").unwrap_err() {
        DiError::Circular { chain } => {
            assert_eq!(
                chain,
                vec![ServiceId::new("X"), ServiceId::new("Y"), ServiceId::new("X")]
            );
        }
        other => panic!("expected Circular, got {:?}", other),
    }
}

#[test]
fn alias_cycle_is_detected() {
    let kernel = Kernel::new();
    kernel.bind("A", Concrete::alias("B"), Lifetime::Transient);
    kernel.bind("B", Concrete::alias("A"), Lifetime::Transient);

    match kernel.get("A").unwrap_err() {
        DiError::Circular { chain } => {
            assert_eq!(chain.first().unwrap().as_str(), "A");
            assert_eq!(chain.last().unwrap().as_str(), "A");
            assert_eq!(chain.len(), 3);
        }
        other => panic!("expected Circular, got {:?}", other),
    }
}

#[test]
fn self_alias_is_the_shortest_cycle() {
    let kernel = Kernel::new();
    kernel.bind("Echo", Concrete::alias("Echo"), Lifetime::Transient);

    match kernel.get("Echo").unwrap_err() {
        DiError::Circular { chain } => {
            assert_eq!(chain, vec![ServiceId::new("Echo"), ServiceId::new("Echo")]);
        }
        other => panic!("expected Circular, got {:?}", other),
    }
}

#[test]
fn failed_resolution_trace_terminates_with_error() {
    let timeline = Arc::new(ResolutionTimeline::new());
    let kernel = Kernel::builder().timeline(Arc::clone(&timeline)).build();
    kernel.bind(
        "X",
        Concrete::factory(|r, _| Ok(r.get("Y")?)),
        Lifetime::Transient,
    );
    kernel.bind(
        "Y",
        Concrete::factory(|r, _| Ok(r.get("X")?)),
        Lifetime::Transient,
    );

    kernel.get("X").unwrap_err();

    let trace = timeline.last().unwrap();
    let terminal = trace.terminal().unwrap();
    assert_eq!(terminal.outcome, StageOutcome::Error);
    assert!(terminal
        .payload
        .as_deref()
        .unwrap()
        .contains("circular dependency"));
}

#[test]
fn depth_cap_stops_runaway_chains() {
    let kernel = Kernel::builder().max_resolution_depth(8).build();
    for i in 0..32u32 {
        let next = format!("Link{}", i + 1);
        kernel.bind(
            format!("Link{}", i).as_str(),
            Concrete::factory(move |r, _| Ok(r.get(next.as_str())?)),
            Lifetime::Transient,
        );
    }
    kernel.instance("Link32", shared(()));

    match kernel.get("Link0").unwrap_err() {
        DiError::DepthExceeded { depth, limit, .. } => {
            assert_eq!(limit, 8);
            assert!(depth > limit);
        }
        other => panic!("expected DepthExceeded, got {:?}", other),
    }
}

#[test]
fn deep_chains_under_the_cap_resolve() {
    let kernel = Kernel::new();
    for i in 0..32u32 {
        let next = format!("Link{}", i + 1);
        kernel.bind(
            format!("Link{}", i).as_str(),
            Concrete::factory(move |r, _| Ok(r.get(next.as_str())?)),
            Lifetime::Transient,
        );
    }
    kernel.instance("Link32", shared(1234u32));

    let value = kernel.get_as::<u32>("Link0").unwrap();
    assert_eq!(*value, 1234);
}

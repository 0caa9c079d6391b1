//! The finite-state resolution engine.
//!
//! One resolution walks the discovery states in table order — contextual
//! lookup, definition lookup, autowire — until a stage yields a candidate,
//! then evaluates the candidate and instantiates class candidates. The
//! engine never branches on state inline: it iterates the ordered stage
//! table, and a tiny controller validates every transition.

pub mod context;
pub mod trace;

use std::sync::Arc;
use std::time::Instant;

use crate::error::{DiError, DiResult};
use crate::id::ServiceId;
use crate::injector::Instantiator;
use crate::kernel::{Kernel, ResolverContext};
use crate::store::{Concrete, FactoryFn};
use crate::value::{AnyValue, ArgumentOverrides};

pub use context::KernelContext;
pub use trace::{ResolutionState, ResolutionTrace, StageOutcome, TraceObserver, TraceRecord};

/// Discovery product: what a stage handed the pipeline.
pub(crate) enum Candidate {
    /// A finished value (instance or literal).
    Value(AnyValue),
    /// A factory to execute.
    Factory(FactoryFn),
    /// Delegate to another service id.
    Delegate(ServiceId),
    /// A class name, instantiation deferred.
    ClassRef(String),
}

impl Candidate {
    pub(crate) fn from_concrete(concrete: Concrete) -> Self {
        match concrete {
            Concrete::Class(name) => Candidate::ClassRef(name),
            Concrete::Factory(factory) => Candidate::Factory(factory),
            Concrete::Value(value) => Candidate::Value(value),
            Concrete::Alias(target) => Candidate::Delegate(target),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Candidate::Value(_) => "value",
            Candidate::Factory(_) => "factory",
            Candidate::Delegate(_) => "delegate",
            Candidate::ClassRef(_) => "class",
        }
    }
}

/// Result of candidate evaluation: a finished value, or a class left for
/// the instantiate state.
pub(crate) enum Evaluated {
    Value(AnyValue),
    Class(String),
}

impl Evaluated {
    fn into_candidate(self) -> Candidate {
        match self {
            Evaluated::Value(value) => Candidate::Value(value),
            Evaluated::Class(name) => Candidate::ClassRef(name),
        }
    }
}

/// Ordered successor of a state, or `None` past `Success`/`NotFound`.
pub(crate) fn next_state_after(state: ResolutionState) -> Option<ResolutionState> {
    match state {
        ResolutionState::ContextualLookup => Some(ResolutionState::DefinitionLookup),
        ResolutionState::DefinitionLookup => Some(ResolutionState::Autowire),
        ResolutionState::Autowire => Some(ResolutionState::Evaluate),
        ResolutionState::Evaluate => Some(ResolutionState::Instantiate),
        ResolutionState::Instantiate => Some(ResolutionState::Success),
        ResolutionState::Success | ResolutionState::NotFound => None,
    }
}

/// Enforces legal transitions. An illegal transition indicates a bug in a
/// stage handler, not user error.
pub(crate) struct PipelineController {
    current: Option<ResolutionState>,
}

impl PipelineController {
    pub(crate) fn new() -> Self {
        Self { current: None }
    }

    pub(crate) fn advance(&mut self, to: ResolutionState) -> DiResult<()> {
        let legal = match (self.current, to) {
            // Any state may terminate in NotFound.
            (_, ResolutionState::NotFound) => true,
            (None, ResolutionState::ContextualLookup) => true,
            (Some(from), to) if from.is_discovery() && to.is_discovery() => {
                next_state_after(from) == Some(to)
            }
            (Some(from), ResolutionState::Evaluate) => from.is_discovery(),
            (Some(ResolutionState::Evaluate), ResolutionState::Instantiate) => true,
            (Some(ResolutionState::Instantiate), ResolutionState::Success) => true,
            _ => false,
        };
        if !legal {
            return Err(DiError::IllegalTransition {
                from: self.current,
                to,
            });
        }
        self.current = Some(to);
        Ok(())
    }

    #[cfg(test)]
    fn current(&self) -> Option<ResolutionState> {
        self.current
    }
}

type DiscoveryHandler = for<'a, 'k> fn(
    &'a Engine<'k>,
    &'a Arc<KernelContext>,
    &'a mut ResolutionTrace,
) -> DiResult<Option<Candidate>>;

/// Discovery stages bound to their handlers, in state order.
const DISCOVERY_STAGES: &[(ResolutionState, DiscoveryHandler)] = &[
    (ResolutionState::ContextualLookup, contextual_lookup),
    (ResolutionState::DefinitionLookup, definition_lookup),
    (ResolutionState::Autowire, autowire),
];

/// If the resolution has a parent, consult the contextual rules for
/// (parent, current). A hit is evaluated immediately in place.
fn contextual_lookup(
    engine: &Engine<'_>,
    ctx: &Arc<KernelContext>,
    trace: &mut ResolutionTrace,
) -> DiResult<Option<Candidate>> {
    let Some(parent) = ctx.parent() else {
        return Ok(None);
    };
    let Some(concrete) = engine
        .kernel
        .store()
        .find_contextual(parent.service(), ctx.service())
    else {
        return Ok(None);
    };
    ctx.set_metadata("contextual_consumer", parent.service().as_str());
    let candidate = Candidate::from_concrete(concrete);
    let evaluated = engine.evaluate_candidate(candidate, ctx, trace)?;
    Ok(Some(evaluated.into_candidate()))
}

/// Yield the definition's concrete; a null concrete defers to autowire.
fn definition_lookup(
    engine: &Engine<'_>,
    ctx: &Arc<KernelContext>,
    _trace: &mut ResolutionTrace,
) -> DiResult<Option<Candidate>> {
    Ok(engine
        .kernel
        .store()
        .find_definition(ctx.service())
        .and_then(|definition| definition.concrete.map(Candidate::from_concrete)))
}

/// Yield the service id itself as a class candidate when a descriptor
/// exists. Strict mode rejects autowire for undefined services.
fn autowire(
    engine: &Engine<'_>,
    ctx: &Arc<KernelContext>,
    _trace: &mut ResolutionTrace,
) -> DiResult<Option<Candidate>> {
    let id = ctx.service();
    if engine.kernel.options().strict_mode && !engine.kernel.store().contains(id) {
        return Ok(None);
    }
    if engine.kernel.classes().contains(id.as_str()) {
        Ok(Some(Candidate::ClassRef(id.as_str().to_string())))
    } else {
        Ok(None)
    }
}

/// Drives one resolution through the pipeline.
pub(crate) struct Engine<'k> {
    kernel: &'k Kernel,
}

impl<'k> Engine<'k> {
    pub(crate) fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    /// Runs the full pipeline for `ctx`, appending to `trace`.
    pub(crate) fn resolve(
        &self,
        ctx: &Arc<KernelContext>,
        trace: &mut ResolutionTrace,
    ) -> DiResult<AnyValue> {
        let mut pipeline = PipelineController::new();
        let mut candidate = None;

        for (state, handler) in DISCOVERY_STAGES {
            pipeline.advance(*state)?;
            trace.record(*state, StageOutcome::Start, None);
            let started = Instant::now();
            match handler(self, ctx, trace) {
                Ok(Some(found)) => {
                    trace.record(*state, StageOutcome::Hit, Some(found.kind().to_string()));
                    self.kernel
                        .emit_stage_metric(ctx.service(), *state, started.elapsed(), None);
                    candidate = Some(found);
                    break;
                }
                Ok(None) => {
                    trace.record(*state, StageOutcome::Miss, None);
                    self.kernel
                        .emit_stage_metric(ctx.service(), *state, started.elapsed(), None);
                }
                Err(e) => {
                    trace.record(*state, StageOutcome::Error, Some(e.to_string()));
                    self.kernel.emit_stage_metric(
                        ctx.service(),
                        *state,
                        started.elapsed(),
                        Some(e.to_string()),
                    );
                    return Err(e);
                }
            }
        }

        let Some(candidate) = candidate else {
            pipeline.advance(ResolutionState::NotFound)?;
            trace.record(
                ResolutionState::NotFound,
                StageOutcome::Error,
                Some("no candidate discovered".to_string()),
            );
            return Err(DiError::NotFound {
                service: ctx.service().clone(),
                trace: Box::new(trace.clone()),
            });
        };

        pipeline.advance(ResolutionState::Evaluate)?;
        trace.record(ResolutionState::Evaluate, StageOutcome::Start, None);
        let started = Instant::now();
        let evaluated = match self.evaluate_candidate(candidate, ctx, trace) {
            Ok(evaluated) => {
                trace.record(ResolutionState::Evaluate, StageOutcome::Hit, None);
                self.kernel.emit_stage_metric(
                    ctx.service(),
                    ResolutionState::Evaluate,
                    started.elapsed(),
                    None,
                );
                evaluated
            }
            Err(e) => {
                trace.record(
                    ResolutionState::Evaluate,
                    StageOutcome::Error,
                    Some(e.to_string()),
                );
                self.kernel.emit_stage_metric(
                    ctx.service(),
                    ResolutionState::Evaluate,
                    started.elapsed(),
                    Some(e.to_string()),
                );
                return Err(e);
            }
        };

        pipeline.advance(ResolutionState::Instantiate)?;
        trace.record(ResolutionState::Instantiate, StageOutcome::Start, None);
        let started = Instant::now();
        let value = match evaluated {
            Evaluated::Value(value) => value,
            Evaluated::Class(class) => {
                match Instantiator::new(self.kernel).build(&class, ctx) {
                    Ok(value) => value,
                    Err(e) => {
                        trace.record(
                            ResolutionState::Instantiate,
                            StageOutcome::Error,
                            Some(e.to_string()),
                        );
                        self.kernel.emit_stage_metric(
                            ctx.service(),
                            ResolutionState::Instantiate,
                            started.elapsed(),
                            Some(e.to_string()),
                        );
                        return Err(e);
                    }
                }
            }
        };
        trace.record(ResolutionState::Instantiate, StageOutcome::Hit, None);
        self.kernel.emit_stage_metric(
            ctx.service(),
            ResolutionState::Instantiate,
            started.elapsed(),
            None,
        );

        pipeline.advance(ResolutionState::Success)?;
        trace.record(ResolutionState::Success, StageOutcome::Hit, None);
        Ok(value)
    }

    /// Turns a candidate into a finished value or a class name.
    ///
    /// Factories receive the container facade and the effective overrides;
    /// delegates spawn a child resolution through the kernel entry.
    pub(crate) fn evaluate_candidate(
        &self,
        candidate: Candidate,
        ctx: &Arc<KernelContext>,
        trace: &ResolutionTrace,
    ) -> DiResult<Evaluated> {
        match candidate {
            Candidate::Value(value) => Ok(Evaluated::Value(value)),
            Candidate::ClassRef(name) => Ok(Evaluated::Class(name)),
            Candidate::Factory(factory) => {
                let overrides = self.effective_overrides(ctx);
                let resolver = ResolverContext::new(self.kernel, Arc::clone(ctx));
                match factory(&resolver, &overrides) {
                    Ok(value) => Ok(Evaluated::Value(value)),
                    Err(e) => match e.downcast::<DiError>() {
                        // Resolution errors from nested gets pass through
                        // untouched, so cycles keep their chains.
                        Ok(inner) => Err(*inner),
                        Err(other) => Err(DiError::Factory {
                            service: ctx.service().clone(),
                            cause: other.to_string(),
                            trace: Box::new(trace.clone()),
                        }),
                    },
                }
            }
            Candidate::Delegate(target) => {
                let child = ctx.child(target, ArgumentOverrides::new());
                self.kernel.resolve_context(&child).map(Evaluated::Value)
            }
        }
    }

    /// Definition-stored named arguments, overlaid by the context's
    /// call-site overrides.
    pub(crate) fn effective_overrides(&self, ctx: &Arc<KernelContext>) -> ArgumentOverrides {
        match self.kernel.store().find_definition(ctx.service()) {
            Some(definition) => ctx.overrides().merged_over(&definition.arguments),
            None => ctx.overrides().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_accepts_canonical_path() {
        let mut pipeline = PipelineController::new();
        for state in [
            ResolutionState::ContextualLookup,
            ResolutionState::DefinitionLookup,
            ResolutionState::Autowire,
            ResolutionState::Evaluate,
            ResolutionState::Instantiate,
            ResolutionState::Success,
        ] {
            pipeline.advance(state).unwrap();
        }
        assert_eq!(pipeline.current(), Some(ResolutionState::Success));
    }

    #[test]
    fn pipeline_accepts_discovery_short_circuit() {
        let mut pipeline = PipelineController::new();
        pipeline.advance(ResolutionState::ContextualLookup).unwrap();
        pipeline.advance(ResolutionState::Evaluate).unwrap();
        pipeline.advance(ResolutionState::Instantiate).unwrap();
        pipeline.advance(ResolutionState::Success).unwrap();
    }

    #[test]
    fn pipeline_allows_not_found_from_any_state() {
        let mut pipeline = PipelineController::new();
        pipeline.advance(ResolutionState::NotFound).unwrap();

        let mut pipeline = PipelineController::new();
        pipeline.advance(ResolutionState::ContextualLookup).unwrap();
        pipeline.advance(ResolutionState::DefinitionLookup).unwrap();
        pipeline.advance(ResolutionState::NotFound).unwrap();
    }

    #[test]
    fn pipeline_rejects_skipped_states() {
        let mut pipeline = PipelineController::new();
        pipeline.advance(ResolutionState::ContextualLookup).unwrap();
        let err = pipeline.advance(ResolutionState::Instantiate).unwrap_err();
        assert!(matches!(err, DiError::IllegalTransition { .. }));

        let mut pipeline = PipelineController::new();
        let err = pipeline.advance(ResolutionState::Evaluate).unwrap_err();
        assert!(matches!(err, DiError::IllegalTransition { .. }));
    }

    #[test]
    fn state_order_is_fixed() {
        assert_eq!(
            next_state_after(ResolutionState::ContextualLookup),
            Some(ResolutionState::DefinitionLookup)
        );
        assert_eq!(
            next_state_after(ResolutionState::Autowire),
            Some(ResolutionState::Evaluate)
        );
        assert_eq!(next_state_after(ResolutionState::Success), None);
        assert_eq!(next_state_after(ResolutionState::NotFound), None);
    }
}

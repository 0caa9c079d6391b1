//! Error taxonomy for registration and resolution.
//!
//! Every surfaced resolution error names the offending service; terminal
//! pipeline failures additionally carry the recorded [`ResolutionTrace`].
//! Failures inside diagnostics sinks are logged and swallowed, never raised.

use thiserror::Error;

use crate::engine::trace::ResolutionTrace;
use crate::engine::ResolutionState;
use crate::id::ServiceId;

/// Boxed error type accepted from user code (factories, constructors,
/// setters, method bodies). A [`DiError`] travelling through a factory is
/// propagated unchanged; anything else is wrapped.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;

fn format_chain(chain: &[ServiceId]) -> String {
    chain
        .iter()
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Container errors.
///
/// The variants mirror the failure modes of the resolution pipeline:
/// discovery exhaustion, construction failures, scope misuse, policy vetoes,
/// and registration-time shape errors.
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// All discovery stages missed and autowire was impossible.
    #[error("service not found: {service}")]
    NotFound {
        service: ServiceId,
        trace: Box<ResolutionTrace>,
    },

    /// The candidate is a class that cannot be constructed (interface,
    /// abstract, or no registered constructor).
    #[error("class `{class}` is not instantiable (resolving {service})")]
    NotInstantiable { service: ServiceId, class: String },

    /// A parameter had no override, no resolvable type, no default, and does
    /// not allow null.
    #[error("cannot resolve parameter `{parameter}` of `{owner}`")]
    UnresolvableParameter { owner: String, parameter: String },

    /// Attempted injection into an immutable property.
    #[error("property `{property}` of `{class}` is read-only")]
    ReadonlyProperty { class: String, property: String },

    /// The parent chain already contains the requested service.
    #[error("circular dependency: {}", format_chain(.chain))]
    Circular { chain: Vec<ServiceId> },

    /// Resolution depth exceeded the configured cap.
    #[error("resolution depth {depth} exceeds limit {limit} (resolving {service})")]
    DepthExceeded {
        service: ServiceId,
        depth: usize,
        limit: usize,
    },

    /// The policy gate vetoed the resolution before discovery ran.
    #[error("resolution of {service} blocked by policy: {reason}")]
    PolicyBlocked { service: ServiceId, reason: String },

    /// Prototype extraction or cache load failed.
    #[error("prototype for class `{class}` unavailable: {cause}")]
    Prototype { class: String, cause: String },

    /// A user factory raised; the cause is preserved as text alongside the
    /// trace recorded up to the failure.
    #[error("factory for {service} failed: {cause}")]
    Factory {
        service: ServiceId,
        cause: String,
        trace: Box<ResolutionTrace>,
    },

    /// A constructor or setter closure raised.
    #[error("construction of `{class}` failed: {cause}")]
    Construction { class: String, cause: String },

    /// A normalized callable raised during invocation.
    #[error("invoking `{target}` failed: {cause}")]
    Invocation { target: String, cause: String },

    /// The resolved value could not be downcast to the requested type.
    #[error("type mismatch for {service}: expected {expected}")]
    TypeMismatch {
        service: ServiceId,
        expected: &'static str,
    },

    /// A scoped service was stored or requested with no active scope frame.
    #[error("no active scope while resolving {service}")]
    NoActiveScope { service: ServiceId },

    /// `end_scope` was called with an empty scope stack.
    #[error("scope stack underflow: end_scope without a matching begin_scope")]
    ScopeUnderflow,

    /// A registration-time shape error (bad callable string, missing setter,
    /// unknown method). Raised to the registering caller; resolver state is
    /// untouched.
    #[error("invalid registration: {message}")]
    Registration { message: String },

    /// The pipeline controller observed an illegal state transition. This
    /// indicates a bug in a stage handler, not user error.
    #[error("illegal pipeline transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: Option<ResolutionState>,
        to: ResolutionState,
    },
}

impl DiError {
    /// Registration-shape error helper.
    pub(crate) fn registration(message: impl Into<String>) -> Self {
        DiError::Registration {
            message: message.into(),
        }
    }
}

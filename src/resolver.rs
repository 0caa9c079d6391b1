//! Turns a parameter list into an ordered argument vector.

use std::sync::Arc;

use crate::engine::context::KernelContext;
use crate::error::{DiError, DiResult};
use crate::id::ServiceId;
use crate::kernel::Kernel;
use crate::prototype::ParameterPrototype;
use crate::value::{null_value, AnyValue, ArgumentList, ArgumentOverrides, OverrideValue};

/// Resolves constructor and method parameters by recursing through the
/// engine.
///
/// Per parameter, in order: named override verbatim, child resolution of
/// the declared type when it names a described class or a bound service,
/// the declared default, null when allowed; otherwise the parameter is
/// unresolvable. Arguments are emitted in declared order; overrides match
/// by name, never by position.
pub(crate) struct DependencyResolver<'k> {
    kernel: &'k Kernel,
}

impl<'k> DependencyResolver<'k> {
    pub(crate) fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    /// A type name is resolvable when it names a described class or a bound
    /// service.
    pub(crate) fn resolvable(&self, type_name: &str) -> bool {
        self.kernel.classes().contains(type_name)
            || self.kernel.store().contains(&ServiceId::new(type_name))
    }

    pub(crate) fn resolve_arguments(
        &self,
        owner: &str,
        parameters: &[ParameterPrototype],
        overrides: &ArgumentOverrides,
        ctx: &Arc<KernelContext>,
    ) -> DiResult<ArgumentList> {
        let mut arguments: Vec<AnyValue> = Vec::with_capacity(parameters.len());

        for parameter in parameters {
            if parameter.is_variadic() {
                // A variadic override spreads; absent override yields an
                // empty tail, which is not an error.
                match overrides.get(parameter.name()) {
                    Some(OverrideValue::One(value)) => arguments.push(value.clone()),
                    Some(OverrideValue::Many(values)) => arguments.extend(values.iter().cloned()),
                    None => {}
                }
                continue;
            }

            if let Some(value) = overrides.get(parameter.name()) {
                match value {
                    OverrideValue::One(value) => arguments.push(value.clone()),
                    // A list override on a non-variadic parameter is passed
                    // through as a single list value.
                    OverrideValue::Many(values) => {
                        arguments.push(crate::value::shared(values.clone()))
                    }
                }
                continue;
            }

            if let Some(type_name) = parameter.type_name() {
                if self.resolvable(type_name) {
                    let child = ctx.child(ServiceId::new(type_name), ArgumentOverrides::new());
                    arguments.push(self.kernel.resolve_context(&child)?);
                    continue;
                }
            }

            if let Some(default) = parameter.default() {
                arguments.push(default.to_value());
                continue;
            }

            if parameter.allows_null() {
                arguments.push(null_value());
                continue;
            }

            return Err(DiError::UnresolvableParameter {
                owner: owner.to_string(),
                parameter: parameter.name().to_string(),
            });
        }

        Ok(ArgumentList::new(arguments))
    }
}

//! Construction, property injection, and callable invocation.

use std::sync::Arc;

use crate::class::{ClassDescriptor, ParameterDescriptor};
use crate::engine::context::KernelContext;
use crate::engine::Engine;
use crate::error::{BoxError, DiError, DiResult};
use crate::id::ServiceId;
use crate::kernel::{Kernel, ResolverContext};
use crate::prototype::{ParameterPrototype, ServicePrototype};
use crate::resolver::DependencyResolver;
use crate::value::{null_value, shared, AnyValue, ArgumentList, ArgumentOverrides, OverrideValue};

fn user_error(class: &str, error: BoxError) -> DiError {
    match error.downcast::<DiError>() {
        Ok(inner) => *inner,
        Err(other) => DiError::Construction {
            class: class.to_string(),
            cause: other.to_string(),
        },
    }
}

/// Builds class instances: argument resolution, construction, then property
/// and setter-method injection.
pub(crate) struct Instantiator<'k> {
    kernel: &'k Kernel,
}

impl<'k> Instantiator<'k> {
    pub(crate) fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    pub(crate) fn build(&self, class: &str, ctx: &Arc<KernelContext>) -> DiResult<AnyValue> {
        let prototype = self.kernel.prototypes().create_for(class)?;
        if !prototype.is_instantiable() {
            return Err(DiError::NotInstantiable {
                service: ctx.service().clone(),
                class: class.to_string(),
            });
        }
        let descriptor = self.kernel.classes().get(class).ok_or_else(|| DiError::Prototype {
            class: class.to_string(),
            cause: "class descriptor disappeared from the registry".to_string(),
        })?;
        let constructor = descriptor
            .constructor
            .as_ref()
            .ok_or_else(|| DiError::NotInstantiable {
                service: ctx.service().clone(),
                class: class.to_string(),
            })?;

        let overrides = Engine::new(self.kernel).effective_overrides(ctx);
        let parameters = prototype
            .constructor()
            .map(|c| c.parameters())
            .unwrap_or(&[]);
        let arguments = if parameters.is_empty() {
            ArgumentList::empty()
        } else {
            DependencyResolver::new(self.kernel).resolve_arguments(
                class,
                parameters,
                &overrides,
                ctx,
            )?
        };

        let instance =
            (constructor.construct)(arguments).map_err(|e| user_error(class, e))?;

        PropertyInjector::new(self.kernel).apply(&descriptor, &prototype, &instance, &overrides, ctx)?;
        self.apply_injected_methods(&descriptor, &prototype, &instance, &overrides, ctx)?;

        Ok(instance)
    }

    /// Invokes setter-style injected methods right after construction.
    pub(crate) fn apply_injected_methods(
        &self,
        descriptor: &ClassDescriptor,
        prototype: &ServicePrototype,
        instance: &AnyValue,
        overrides: &ArgumentOverrides,
        ctx: &Arc<KernelContext>,
    ) -> DiResult<()> {
        for method in prototype.methods() {
            let target = format!("{}::{}", prototype.class(), method.name());
            let md = descriptor.method(method.name()).ok_or_else(|| {
                DiError::registration(format!("method `{}` is not described", target))
            })?;
            let arguments = DependencyResolver::new(self.kernel).resolve_arguments(
                &target,
                method.parameters(),
                overrides,
                ctx,
            )?;
            (md.invoke)(instance, arguments).map_err(|e| match e.downcast::<DiError>() {
                Ok(inner) => *inner,
                Err(other) => DiError::Invocation {
                    target: target.clone(),
                    cause: other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}

/// Applies property injection to an existing instance.
///
/// All writes are planned before any is applied: a read-only violation or an
/// unresolvable required property leaves the target untouched.
pub(crate) struct PropertyInjector<'k> {
    kernel: &'k Kernel,
}

impl<'k> PropertyInjector<'k> {
    pub(crate) fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    pub(crate) fn apply(
        &self,
        descriptor: &ClassDescriptor,
        prototype: &ServicePrototype,
        target: &AnyValue,
        overrides: &ArgumentOverrides,
        ctx: &Arc<KernelContext>,
    ) -> DiResult<()> {
        let properties = prototype.properties();
        if properties.is_empty() {
            return Ok(());
        }

        // Fail before mutating anything.
        for property in properties {
            if property.readonly() {
                return Err(DiError::ReadonlyProperty {
                    class: prototype.class().to_string(),
                    property: property.name().to_string(),
                });
            }
        }

        let resolver = DependencyResolver::new(self.kernel);
        let mut writes: Vec<(&str, AnyValue)> = Vec::new();
        for property in properties {
            if let Some(value) = overrides.get(property.name()) {
                let value = match value {
                    OverrideValue::One(value) => value.clone(),
                    OverrideValue::Many(values) => shared(values.clone()),
                };
                writes.push((property.name(), value));
                continue;
            }
            if let Some(type_name) = property.type_name() {
                if resolver.resolvable(type_name) {
                    let child = ctx.child(ServiceId::new(type_name), ArgumentOverrides::new());
                    writes.push((property.name(), self.kernel.resolve_context(&child)?));
                    continue;
                }
            }
            if property.has_default() {
                // Defaults stand; injection does not overwrite them.
                continue;
            }
            if property.nullable() {
                writes.push((property.name(), null_value()));
                continue;
            }
            return Err(DiError::UnresolvableParameter {
                owner: property.owner().to_string(),
                parameter: property.name().to_string(),
            });
        }

        for (name, value) in writes {
            let setter = descriptor
                .property(name)
                .and_then(|p| p.setter.clone())
                .ok_or_else(|| {
                    DiError::registration(format!(
                        "property `{}::{}` is injected but has no setter",
                        prototype.class(),
                        name
                    ))
                })?;
            setter(target, value).map_err(|e| user_error(prototype.class(), e))?;
        }
        Ok(())
    }
}

type ClosureBody =
    Arc<dyn Fn(&ResolverContext<'_>, ArgumentList) -> Result<AnyValue, BoxError> + Send + Sync>;

/// A callable accepted by [`Kernel::call`](crate::Kernel::call).
///
/// String and pair forms name a described class whose instance is resolved
/// through the container; bound forms carry their instance; plain closures
/// carry their own parameter descriptors, since Rust cannot reflect over a
/// closure.
#[derive(Clone)]
pub enum Callable {
    /// `Class@method`: resolve the class, then invoke the method.
    ClassMethod { class: String, method: String },
    /// An already-built instance plus a described method.
    Bound {
        class: String,
        instance: AnyValue,
        method: String,
    },
    /// A closure with explicit parameter descriptors.
    Function {
        name: String,
        parameters: Vec<ParameterDescriptor>,
        body: ClosureBody,
    },
}

impl Callable {
    /// Parses the `Class@method` string form.
    pub fn at_string(reference: &str) -> DiResult<Self> {
        match reference.split_once('@') {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Callable::ClassMethod {
                    class: class.to_string(),
                    method: method.to_string(),
                })
            }
            _ => Err(DiError::registration(format!(
                "`{}` is not a valid Class@method reference",
                reference
            ))),
        }
    }

    pub fn class_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Callable::ClassMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn bound(
        class: impl Into<String>,
        instance: AnyValue,
        method: impl Into<String>,
    ) -> Self {
        Callable::Bound {
            class: class.into(),
            instance,
            method: method.into(),
        }
    }

    pub fn function<F>(
        name: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
        body: F,
    ) -> Self
    where
        F: Fn(&ResolverContext<'_>, ArgumentList) -> Result<AnyValue, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Callable::Function {
            name: name.into(),
            parameters,
            body: Arc::new(body),
        }
    }

    /// Display form used as the original invocation target.
    pub fn display(&self) -> String {
        match self {
            Callable::ClassMethod { class, method } => format!("{}@{}", class, method),
            Callable::Bound { class, method, .. } => format!("{}@{}", class, method),
            Callable::Function { name, .. } => name.clone(),
        }
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callable({})", self.display())
    }
}

/// Normalized invocation target.
#[derive(Clone)]
pub struct NormalizedTarget {
    pub class: String,
    pub method: String,
    pub(crate) instance: AnyValue,
}

impl std::fmt::Debug for NormalizedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NormalizedTarget({}@{})", self.class, self.method)
    }
}

/// Immutable record of one invocation, produced by copy-with-updates.
#[derive(Clone, Debug)]
pub struct InvocationContext {
    original: String,
    normalized: Option<NormalizedTarget>,
    arguments: Option<ArgumentList>,
    result: Option<AnyValue>,
}

impl InvocationContext {
    fn new(original: String) -> Self {
        Self {
            original,
            normalized: None,
            arguments: None,
            result: None,
        }
    }

    fn with_normalized(mut self, normalized: NormalizedTarget) -> Self {
        self.normalized = Some(normalized);
        self
    }

    fn with_arguments(mut self, arguments: ArgumentList) -> Self {
        self.arguments = Some(arguments);
        self
    }

    fn with_result(mut self, result: AnyValue) -> Self {
        self.result = Some(result);
        self
    }

    pub fn original_target(&self) -> &str {
        &self.original
    }

    pub fn normalized_target(&self) -> Option<&NormalizedTarget> {
        self.normalized.as_ref()
    }

    /// The normalized target when set, the original otherwise.
    pub fn effective_target(&self) -> String {
        match &self.normalized {
            Some(target) => format!("{}@{}", target.class, target.method),
            None => self.original.clone(),
        }
    }

    pub fn arguments(&self) -> Option<&ArgumentList> {
        self.arguments.as_ref()
    }

    pub fn result(&self) -> Option<&AnyValue> {
        self.result.as_ref()
    }
}

/// Normalizes and executes callables.
pub(crate) struct MethodInvoker<'k> {
    kernel: &'k Kernel,
}

impl<'k> MethodInvoker<'k> {
    pub(crate) fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    pub(crate) fn invoke(
        &self,
        callable: Callable,
        overrides: &ArgumentOverrides,
        parent: Option<&Arc<KernelContext>>,
    ) -> DiResult<InvocationContext> {
        let invocation = InvocationContext::new(callable.display());
        match callable {
            Callable::ClassMethod { class, method } => {
                let ctx = self.context_for(&class, parent);
                let instance = self.kernel.resolve_context(&ctx)?;
                self.invoke_method(invocation, class, instance, method, overrides, parent)
            }
            Callable::Bound {
                class,
                instance,
                method,
            } => self.invoke_method(invocation, class, instance, method, overrides, parent),
            Callable::Function {
                name,
                parameters,
                body,
            } => {
                let parameters = self.normalize_parameters(&parameters);
                let ctx = self.context_for(&name, parent);
                let arguments = DependencyResolver::new(self.kernel).resolve_arguments(
                    &name,
                    &parameters,
                    overrides,
                    &ctx,
                )?;
                let invocation = invocation.with_arguments(arguments.clone());
                let resolver = ResolverContext::new(self.kernel, Arc::clone(&ctx));
                let result = body(&resolver, arguments).map_err(|e| {
                    match e.downcast::<DiError>() {
                        Ok(inner) => *inner,
                        Err(other) => DiError::Invocation {
                            target: name.clone(),
                            cause: other.to_string(),
                        },
                    }
                })?;
                Ok(invocation.with_result(result))
            }
        }
    }

    fn invoke_method(
        &self,
        invocation: InvocationContext,
        class: String,
        instance: AnyValue,
        method: String,
        overrides: &ArgumentOverrides,
        parent: Option<&Arc<KernelContext>>,
    ) -> DiResult<InvocationContext> {
        let target = format!("{}@{}", class, method);
        let descriptor = self
            .kernel
            .classes()
            .get(&class)
            .ok_or_else(|| DiError::registration(format!("class `{}` is not described", class)))?;
        let md = descriptor
            .method(&method)
            .ok_or_else(|| {
                DiError::registration(format!("method `{}` is not described", target))
            })?;
        let parameters = self.normalize_parameters(&md.parameters);
        let ctx = self.context_for(&target, parent);
        let arguments = DependencyResolver::new(self.kernel).resolve_arguments(
            &target,
            &parameters,
            overrides,
            &ctx,
        )?;
        let invocation = invocation
            .with_normalized(NormalizedTarget {
                class: class.clone(),
                method: method.clone(),
                instance: instance.clone(),
            })
            .with_arguments(arguments.clone());
        let result = (md.invoke)(&instance, arguments).map_err(|e| {
            match e.downcast::<DiError>() {
                Ok(inner) => *inner,
                Err(other) => DiError::Invocation {
                    target: target.clone(),
                    cause: other.to_string(),
                },
            }
        })?;
        Ok(invocation.with_result(result))
    }

    fn normalize_parameters(&self, parameters: &[ParameterDescriptor]) -> Vec<ParameterPrototype> {
        let classes = self.kernel.classes();
        parameters
            .iter()
            .map(|p| ParameterPrototype::from_descriptor(p, &|name| classes.contains(name)))
            .collect()
    }

    fn context_for(&self, target: &str, parent: Option<&Arc<KernelContext>>) -> Arc<KernelContext> {
        match parent {
            Some(parent) => parent.child(ServiceId::new(target), ArgumentOverrides::new()),
            None => KernelContext::root(ServiceId::new(target), ArgumentOverrides::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_string_parsing() {
        assert!(Callable::at_string("Mailer@send").is_ok());
        assert!(Callable::at_string("Mailer").is_err());
        assert!(Callable::at_string("@send").is_err());
        assert!(Callable::at_string("Mailer@").is_err());
    }

    #[test]
    fn invocation_context_effective_target() {
        let ctx = InvocationContext::new("Mailer@send".to_string());
        assert_eq!(ctx.effective_target(), "Mailer@send");
        let ctx = ctx.with_normalized(NormalizedTarget {
            class: "SmtpMailer".to_string(),
            method: "send".to_string(),
            instance: shared(()),
        });
        assert_eq!(ctx.effective_target(), "SmtpMailer@send");
        assert_eq!(ctx.original_target(), "Mailer@send");
    }
}

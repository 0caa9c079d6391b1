//! Class descriptors: the runtime's stand-in for reflection.
//!
//! Rust has no runtime reflection over arbitrary types, so registrants
//! describe each constructible class once: its constructor parameters plus a
//! construct closure, its injectable properties (with setter closures), and
//! its invokable methods. The prototype factory derives cached, serializable
//! metadata from these descriptors; the closures stay here and are looked up
//! at instantiation time.
//!
//! Autowiring only applies to described classes; "class exists" means "a
//! descriptor is registered".

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::BoxError;
use crate::prototype::ScalarValue;
use crate::value::{AnyValue, ArgumentList};

/// Constructs an instance from an ordered argument vector.
pub type ConstructFn = Arc<dyn Fn(ArgumentList) -> Result<AnyValue, BoxError> + Send + Sync>;

/// Writes a resolved value into a property of the target instance. The
/// target downcasts internally and typically uses interior mutability.
pub type SetterFn = Arc<dyn Fn(&AnyValue, AnyValue) -> Result<(), BoxError> + Send + Sync>;

/// Invokes a method on the target instance with an argument vector.
pub type InvokeFn = Arc<dyn Fn(&AnyValue, ArgumentList) -> Result<AnyValue, BoxError> + Send + Sync>;

/// A parameter or property type declaration, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDecl {
    /// No declaration. Treated as nullable.
    None,
    /// A single named type.
    Named { name: String, nullable: bool },
    /// A union of named members; the member `"null"` marks nullability.
    Union(Vec<String>),
    /// An intersection of named members.
    Intersection(Vec<String>),
}

impl TypeDecl {
    pub fn named(name: impl Into<String>) -> Self {
        TypeDecl::Named {
            name: name.into(),
            nullable: false,
        }
    }

    pub fn nullable(name: impl Into<String>) -> Self {
        TypeDecl::Named {
            name: name.into(),
            nullable: true,
        }
    }

    pub fn union<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDecl::Union(members.into_iter().map(Into::into).collect())
    }

    pub fn intersection<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDecl::Intersection(members.into_iter().map(Into::into).collect())
    }

    /// Whether the declaration admits null.
    pub(crate) fn allows_null(&self) -> bool {
        match self {
            TypeDecl::None => true,
            TypeDecl::Named { nullable, .. } => *nullable,
            TypeDecl::Union(members) => members.iter().any(|m| m == "null"),
            TypeDecl::Intersection(_) => false,
        }
    }
}

/// Describes one constructor or method parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    pub(crate) name: String,
    pub(crate) type_decl: TypeDecl,
    pub(crate) default: Option<ScalarValue>,
    pub(crate) variadic: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, type_decl: TypeDecl) -> Self {
        Self {
            name: name.into(),
            type_decl,
            default: None,
            variadic: false,
        }
    }

    pub fn with_default(mut self, default: ScalarValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("type_decl", &self.type_decl)
            .field("variadic", &self.variadic)
            .finish()
    }
}

/// Describes an injectable property.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub(crate) name: String,
    pub(crate) type_decl: TypeDecl,
    pub(crate) has_default: bool,
    pub(crate) readonly: bool,
    pub(crate) injected: bool,
    pub(crate) setter: Option<SetterFn>,
}

impl PropertyDescriptor {
    /// A property participating in injection, written through `setter`.
    pub fn injected<F>(name: impl Into<String>, type_decl: TypeDecl, setter: F) -> Self
    where
        F: Fn(&AnyValue, AnyValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_decl,
            has_default: false,
            readonly: false,
            injected: true,
            setter: Some(Arc::new(setter)),
        }
    }

    /// An injected property that cannot be written; injection attempts raise
    /// a read-only error.
    pub fn readonly(name: impl Into<String>, type_decl: TypeDecl) -> Self {
        Self {
            name: name.into(),
            type_decl,
            has_default: false,
            readonly: true,
            injected: true,
            setter: None,
        }
    }

    /// Marks the property as carrying a default value; injection skips it
    /// when no override and no resolvable type applies.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("readonly", &self.readonly)
            .field("injected", &self.injected)
            .finish()
    }
}

/// Describes an invokable method.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub(crate) name: String,
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) injected: bool,
    pub(crate) invoke: InvokeFn,
}

impl MethodDescriptor {
    pub fn new<F>(
        name: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&AnyValue, ArgumentList) -> Result<AnyValue, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters,
            injected: false,
            invoke: Arc::new(invoke),
        }
    }

    /// Marks the method as setter-style injected: it is invoked with
    /// resolved arguments right after construction.
    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .field("injected", &self.injected)
            .finish()
    }
}

pub(crate) struct ConstructorDescriptor {
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) construct: ConstructFn,
}

/// Complete structural description of a class.
///
/// Built with [`ClassBuilder`]; a descriptor without a construct closure is
/// not instantiable (an interface or abstract class).
pub struct ClassDescriptor {
    pub(crate) name: String,
    pub(crate) instantiable: bool,
    pub(crate) constructor: Option<ConstructorDescriptor>,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    pub(crate) fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub(crate) fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

impl std::fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("instantiable", &self.instantiable)
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Fluent builder for [`ClassDescriptor`].
///
/// # Examples
///
/// ```
/// use armature::{ClassBuilder, TypeDecl, shared};
///
/// struct Logger;
/// struct Controller { logger: std::sync::Arc<Logger> }
///
/// let descriptor = ClassBuilder::new("Controller")
///     .parameter("logger", TypeDecl::named("Logger"))
///     .constructs(|args| {
///         Ok(shared(Controller { logger: args.get::<Logger>(0)? }))
///     })
///     .build();
/// assert!(descriptor.is_instantiable());
/// ```
pub struct ClassBuilder {
    name: String,
    instantiable: bool,
    parameters: Vec<ParameterDescriptor>,
    construct: Option<ConstructFn>,
    properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instantiable: true,
            parameters: Vec::new(),
            construct: None,
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Marks the class as an interface or abstract type: resolvable only
    /// through a binding, never constructed directly.
    pub fn not_instantiable(mut self) -> Self {
        self.instantiable = false;
        self
    }

    /// Appends a required constructor parameter.
    pub fn parameter(mut self, name: impl Into<String>, type_decl: TypeDecl) -> Self {
        self.parameters.push(ParameterDescriptor::new(name, type_decl));
        self
    }

    /// Appends a constructor parameter with a default value.
    pub fn parameter_with_default(
        mut self,
        name: impl Into<String>,
        type_decl: TypeDecl,
        default: ScalarValue,
    ) -> Self {
        self.parameters
            .push(ParameterDescriptor::new(name, type_decl).with_default(default));
        self
    }

    /// Appends a trailing variadic parameter.
    pub fn variadic_parameter(mut self, name: impl Into<String>, type_decl: TypeDecl) -> Self {
        self.parameters
            .push(ParameterDescriptor::new(name, type_decl).variadic());
        self
    }

    /// Appends a pre-built parameter descriptor.
    pub fn parameter_descriptor(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the construct closure receiving the resolved argument vector.
    pub fn constructs<F>(mut self, construct: F) -> Self
    where
        F: Fn(ArgumentList) -> Result<AnyValue, BoxError> + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(construct));
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> ClassDescriptor {
        let constructor = self.construct.map(|construct| ConstructorDescriptor {
            parameters: self.parameters,
            construct,
        });
        // A class without a construct closure cannot be built, whatever the
        // builder was told.
        let instantiable = self.instantiable && constructor.is_some();
        ClassDescriptor {
            name: self.name,
            instantiable,
            constructor,
            properties: self.properties,
            methods: self.methods,
        }
    }
}

/// Registry of class descriptors, shared by the prototype factory, the
/// instantiator, and the autowire stage.
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, Arc<ClassDescriptor>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a descriptor. Re-describing a class replaces the previous
    /// descriptor (last write wins).
    pub fn register(&self, descriptor: ClassDescriptor) {
        let mut classes = self.classes.write();
        let name = descriptor.name.clone();
        if classes.insert(name.clone(), Arc::new(descriptor)).is_some() {
            warn!(target: "armature", class = %name, "class descriptor replaced");
        } else {
            debug!(target: "armature", class = %name, "class described");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.classes.read().keys().cloned().collect()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::shared;

    #[test]
    fn builder_without_construct_is_not_instantiable() {
        let descriptor = ClassBuilder::new("Contract").build();
        assert!(!descriptor.is_instantiable());
        assert!(descriptor.constructor.is_none());
    }

    #[test]
    fn explicit_not_instantiable_wins() {
        let descriptor = ClassBuilder::new("Abstract")
            .constructs(|_| Ok(shared(())))
            .not_instantiable()
            .build();
        assert!(!descriptor.is_instantiable());
    }

    #[test]
    fn registry_replaces_on_redescription() {
        let registry = ClassRegistry::new();
        registry.register(ClassBuilder::new("A").constructs(|_| Ok(shared(1u8))).build());
        registry.register(ClassBuilder::new("A").build());
        assert!(!registry.get("A").unwrap().is_instantiable());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn type_decl_nullability() {
        assert!(TypeDecl::None.allows_null());
        assert!(TypeDecl::nullable("Logger").allows_null());
        assert!(!TypeDecl::named("Logger").allows_null());
        assert!(TypeDecl::union(["Logger", "null"]).allows_null());
        assert!(!TypeDecl::intersection(["A", "B"]).allows_null());
    }
}

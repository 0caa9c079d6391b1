//! Immutable structural metadata about classes.
//!
//! Prototypes are derived once from a [`ClassDescriptor`](crate::class::ClassDescriptor),
//! cached by the [`PrototypeFactory`](factory::PrototypeFactory), and round-trip
//! losslessly through a flat JSON form for the persistent cache tier. They
//! carry structure only; construct/setter/invoke closures stay in the class
//! registry.

pub mod factory;

use serde::{Deserialize, Serialize};

use crate::class::{ClassDescriptor, ParameterDescriptor, TypeDecl};
use crate::error::DiError;
use crate::value::{null_value, shared, AnyValue};

/// Serializable scalar used for parameter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// Materializes the scalar as a dynamic value.
    pub fn to_value(&self) -> AnyValue {
        match self {
            ScalarValue::Null => null_value(),
            ScalarValue::Bool(b) => shared(*b),
            ScalarValue::Int(i) => shared(*i),
            ScalarValue::Float(f) => shared(*f),
            ScalarValue::Str(s) => shared(s.clone()),
        }
    }
}

/// Normalizes a type declaration to a single name.
///
/// Policy:
/// 1. no declaration -> `None`
/// 2. single named type -> that name
/// 3. union: drop `null`, order class-existing members before the rest
///    (declaration order preserved within each group), take the first
/// 4. intersection: first named member
pub(crate) fn normalize_type(
    decl: &TypeDecl,
    class_exists: &dyn Fn(&str) -> bool,
) -> Option<String> {
    match decl {
        TypeDecl::None => None,
        TypeDecl::Named { name, .. } => Some(name.clone()),
        TypeDecl::Union(members) => {
            let mut classes = Vec::new();
            let mut others = Vec::new();
            for member in members {
                if member == "null" {
                    continue;
                }
                if class_exists(member) {
                    classes.push(member.clone());
                } else {
                    others.push(member.clone());
                }
            }
            classes.into_iter().chain(others).next()
        }
        TypeDecl::Intersection(members) => members.first().cloned(),
    }
}

/// Structural description of one parameter. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPrototype {
    name: String,
    type_name: Option<String>,
    allows_null: bool,
    variadic: bool,
    default: Option<ScalarValue>,
}

impl ParameterPrototype {
    pub(crate) fn from_descriptor(
        descriptor: &ParameterDescriptor,
        class_exists: &dyn Fn(&str) -> bool,
    ) -> Self {
        Self {
            name: descriptor.name.clone(),
            type_name: normalize_type(&descriptor.type_decl, class_exists),
            allows_null: descriptor.type_decl.allows_null(),
            variadic: descriptor.variadic,
            default: descriptor.default.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized type name, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn allows_null(&self) -> bool {
        self.allows_null
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default(&self) -> Option<&ScalarValue> {
        self.default.as_ref()
    }

    /// A parameter is required when it has no default and rejects null.
    pub fn required(&self) -> bool {
        !self.has_default() && !self.allows_null
    }
}

/// Structural description of one injectable property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPrototype {
    name: String,
    type_name: Option<String>,
    nullable: bool,
    has_default: bool,
    readonly: bool,
    owner: String,
}

impl PropertyPrototype {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Owning class name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn required(&self) -> bool {
        !self.has_default && !self.nullable
    }
}

/// Structural description of a method: its name and ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodPrototype {
    name: String,
    parameters: Vec<ParameterPrototype>,
}

impl MethodPrototype {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterPrototype] {
        &self.parameters
    }
}

/// Complete structural metadata for a class: one optional constructor,
/// injected properties, and injected (setter-style) methods.
///
/// Immutable after creation; the factory caches and persists these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePrototype {
    class: String,
    instantiable: bool,
    constructor: Option<MethodPrototype>,
    properties: Vec<PropertyPrototype>,
    methods: Vec<MethodPrototype>,
}

impl ServicePrototype {
    /// Derives a prototype from a class descriptor, normalizing every type
    /// declaration against the given class-existence predicate.
    pub(crate) fn from_descriptor(
        descriptor: &ClassDescriptor,
        class_exists: &dyn Fn(&str) -> bool,
    ) -> Self {
        let constructor = descriptor.constructor.as_ref().map(|ctor| MethodPrototype {
            name: "__construct".to_string(),
            parameters: ctor
                .parameters
                .iter()
                .map(|p| ParameterPrototype::from_descriptor(p, class_exists))
                .collect(),
        });
        let properties = descriptor
            .properties
            .iter()
            .filter(|p| p.injected)
            .map(|p| PropertyPrototype {
                name: p.name.clone(),
                type_name: normalize_type(&p.type_decl, class_exists),
                nullable: p.type_decl.allows_null(),
                has_default: p.has_default,
                readonly: p.readonly,
                owner: descriptor.name.clone(),
            })
            .collect();
        let methods = descriptor
            .methods
            .iter()
            .filter(|m| m.injected)
            .map(|m| MethodPrototype {
                name: m.name.clone(),
                parameters: m
                    .parameters
                    .iter()
                    .map(|p| ParameterPrototype::from_descriptor(p, class_exists))
                    .collect(),
            })
            .collect();
        Self {
            class: descriptor.name.clone(),
            instantiable: descriptor.instantiable,
            constructor,
            properties,
            methods,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    pub fn constructor(&self) -> Option<&MethodPrototype> {
        self.constructor.as_ref()
    }

    /// Injected properties.
    pub fn properties(&self) -> &[PropertyPrototype] {
        &self.properties
    }

    /// Injected setter-style methods.
    pub fn methods(&self) -> &[MethodPrototype] {
        &self.methods
    }

    /// Flat dictionary form used by the persistent cache tier.
    pub fn to_flat(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("prototype serialization is infallible")
    }

    /// Restores a prototype from its flat form. Exact inverse of
    /// [`to_flat`](Self::to_flat).
    pub fn from_flat(flat: &serde_json::Value) -> Result<Self, DiError> {
        serde_json::from_value(flat.clone()).map_err(|e| DiError::Prototype {
            class: flat
                .get("class")
                .and_then(|c| c.as_str())
                .unwrap_or("<unknown>")
                .to_string(),
            cause: e.to_string(),
        })
    }
}

//! Dynamic value representation shared across the container.
//!
//! Services, literals, argument overrides, and factory results all travel as
//! type-erased `Arc` values. Registrants downcast at the edges (constructor
//! closures, setters, call sites); the resolution pipeline itself never needs
//! to know concrete types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BoxError;

/// Type-erased, thread-safe value handle.
///
/// Every resolved service, literal binding, and injected argument is an
/// `AnyValue`. Cloning is an `Arc` clone.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Marker standing in for an absent value.
///
/// Nullable parameters and properties that fall through every other
/// resolution step receive `Arc<Null>`. Consumers test with [`is_null`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null;

/// Wraps a concrete value into an [`AnyValue`].
#[inline]
pub fn shared<T: Send + Sync + 'static>(value: T) -> AnyValue {
    Arc::new(value)
}

/// Produces the canonical null value.
#[inline]
pub fn null_value() -> AnyValue {
    Arc::new(Null)
}

/// Returns true when `value` is the null marker.
#[inline]
pub fn is_null(value: &AnyValue) -> bool {
    value.is::<Null>()
}

/// Attempts to downcast an [`AnyValue`] to a concrete type.
#[inline]
pub fn downcast<T: Send + Sync + 'static>(value: &AnyValue) -> Option<Arc<T>> {
    Arc::clone(value).downcast::<T>().ok()
}

/// Ordered argument vector handed to constructor and method closures.
///
/// Arguments appear in declared parameter order. Variadic parameters occupy
/// the tail, reachable through [`ArgumentList::tail`].
///
/// # Examples
///
/// ```
/// use armature::{ArgumentList, shared};
///
/// let args = ArgumentList::new(vec![shared("dsn".to_string()), shared(5usize)]);
/// let dsn = args.get::<String>(0).unwrap();
/// let pool = args.get::<usize>(1).unwrap();
/// assert_eq!(dsn.as_str(), "dsn");
/// assert_eq!(*pool, 5);
/// ```
#[derive(Clone, Default)]
pub struct ArgumentList {
    values: Vec<AnyValue>,
}

impl ArgumentList {
    pub fn new(values: Vec<AnyValue>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`, if present.
    pub fn raw(&self, index: usize) -> Option<&AnyValue> {
        self.values.get(index)
    }

    /// Typed access for constructor closures.
    ///
    /// Fails with a descriptive message when the index is out of range or the
    /// stored value has a different type; the failure is surfaced as a
    /// construction error by the instantiator.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, BoxError> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| format!("argument {} is missing", index))?;
        downcast::<T>(value).ok_or_else(|| {
            format!(
                "argument {} is not a {}",
                index,
                std::any::type_name::<T>()
            )
            .into()
        })
    }

    /// True when the argument at `index` is the null marker.
    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).map(is_null).unwrap_or(false)
    }

    /// Remaining arguments starting at `from`; the variadic tail.
    pub fn tail(&self, from: usize) -> &[AnyValue] {
        if from >= self.values.len() {
            &[]
        } else {
            &self.values[from..]
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnyValue> {
        self.values.iter()
    }
}

impl std::fmt::Debug for ArgumentList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentList")
            .field("len", &self.values.len())
            .finish()
    }
}

impl From<Vec<AnyValue>> for ArgumentList {
    fn from(values: Vec<AnyValue>) -> Self {
        Self::new(values)
    }
}

/// A named override value: a single argument, or a spreadable list for
/// variadic parameters.
#[derive(Clone)]
pub enum OverrideValue {
    One(AnyValue),
    Many(Vec<AnyValue>),
}

impl std::fmt::Debug for OverrideValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverrideValue::One(_) => f.write_str("OverrideValue::One(..)"),
            OverrideValue::Many(values) => write!(f, "OverrideValue::Many({})", values.len()),
        }
    }
}

/// Named argument overrides, matched by parameter name, never by position.
///
/// # Examples
///
/// ```
/// use armature::{ArgumentOverrides, shared};
///
/// let overrides = ArgumentOverrides::new().with("dsn", shared("postgres://db".to_string()));
/// assert!(overrides.contains("dsn"));
/// assert!(!overrides.contains("timeout"));
/// ```
#[derive(Clone, Default)]
pub struct ArgumentOverrides {
    entries: HashMap<String, OverrideValue>,
}

impl ArgumentOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single-valued override.
    pub fn with(mut self, name: impl Into<String>, value: AnyValue) -> Self {
        self.entries.insert(name.into(), OverrideValue::One(value));
        self
    }

    /// Adds a spreadable override for a variadic parameter.
    pub fn with_many(mut self, name: impl Into<String>, values: Vec<AnyValue>) -> Self {
        self.entries.insert(name.into(), OverrideValue::Many(values));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: OverrideValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&OverrideValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layers `self` over `base`: entries in `self` win on name collision.
    pub fn merged_over(&self, base: &ArgumentOverrides) -> ArgumentOverrides {
        let mut entries = base.entries.clone();
        for (name, value) in &self.entries {
            entries.insert(name.clone(), value.clone());
        }
        ArgumentOverrides { entries }
    }
}

impl std::fmt::Debug for ArgumentOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentOverrides")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

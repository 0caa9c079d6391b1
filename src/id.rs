//! Service identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Canonical identifier for a service: a class name or an alias.
///
/// Comparison is byte-exact; no normalization or case folding is applied.
/// Cloning is cheap (shared string storage).
///
/// # Examples
///
/// ```
/// use armature::ServiceId;
///
/// let id = ServiceId::new("App\\Logger");
/// assert_eq!(id.as_str(), "App\\Logger");
/// assert_eq!(id, ServiceId::from("App\\Logger"));
/// assert_ne!(id, ServiceId::from("app\\logger"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({:?})", &*self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(Arc::from(id.as_str()))
    }
}

impl From<&ServiceId> for ServiceId {
    fn from(id: &ServiceId) -> Self {
        id.clone()
    }
}

impl From<&String> for ServiceId {
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash/Eq delegate to the string content, so `&str` lookups against
// `HashMap<ServiceId, _>` are sound.
impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

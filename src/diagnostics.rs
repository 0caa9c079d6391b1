//! Inspection report types.

use crate::id::ServiceId;
use crate::lifetime::Lifetime;
use crate::prototype::ServicePrototype;

/// Condensed prototype description for reports.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeSummary {
    pub class: String,
    pub instantiable: bool,
    pub constructor_parameters: usize,
    pub injected_properties: usize,
    pub injected_methods: usize,
}

impl PrototypeSummary {
    pub(crate) fn of(prototype: &ServicePrototype) -> Self {
        Self {
            class: prototype.class().to_string(),
            instantiable: prototype.is_instantiable(),
            constructor_parameters: prototype
                .constructor()
                .map(|c| c.parameters().len())
                .unwrap_or(0),
            injected_properties: prototype.properties().len(),
            injected_methods: prototype.methods().len(),
        }
    }
}

/// What [`Kernel::inspect`](crate::Kernel::inspect) reports for one id.
///
/// Inspection is read-only: nothing is constructed and no cache is warmed.
/// A prototype failure lands in the `prototype` field instead of raising.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub id: ServiceId,
    /// A definition exists in the store.
    pub defined: bool,
    /// An instance is held by the singleton tier or an active scope frame.
    pub cached: bool,
    pub lifetime: Option<Lifetime>,
    pub tags: Vec<String>,
    pub prototype: Result<PrototypeSummary, String>,
}

//! Resolution trait implemented by the kernel and by the facade handed to
//! factories, so user code can stay generic over where a value comes from.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::id::ServiceId;
use crate::value::{downcast, AnyValue};

/// Anything that can resolve service ids.
pub trait Resolver {
    /// Resolves `id` to a value.
    fn resolve_id(&self, id: &ServiceId) -> DiResult<AnyValue>;

    /// Whether `id` could resolve without attempting it.
    fn knows(&self, id: &ServiceId) -> bool;

    /// Resolves `id`, accepting anything convertible into a [`ServiceId`].
    fn get(&self, id: impl Into<ServiceId>) -> DiResult<AnyValue>
    where
        Self: Sized,
    {
        self.resolve_id(&id.into())
    }

    /// Resolves and downcasts in one step.
    fn get_as<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>) -> DiResult<Arc<T>>
    where
        Self: Sized,
    {
        let id = id.into();
        let value = self.resolve_id(&id)?;
        downcast::<T>(&value).ok_or(DiError::TypeMismatch {
            service: id,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Resolves, returning `None` on any failure.
    fn try_get(&self, id: impl Into<ServiceId>) -> Option<AnyValue>
    where
        Self: Sized,
    {
        self.resolve_id(&id.into()).ok()
    }
}

#![forbid(unsafe_code)]

//! Per-instance component dependency registry.
//!
//! A [`Component`] is a named, constructible piece of state that can be
//! attached to an observed instance exactly once. Registration writes the
//! constructed value through the observed surface, so it is tracked,
//! wrapped, and reported like any other write; re-registering returns the
//! existing instance.

use crate::error::{Result, RuntimeError};
use crate::observer::ObservedHandle;

/// A registrable component type.
pub trait Component {
    /// Property name under which the component instance is stored,
    /// conventionally the lowercased type name (e.g. `"position"`).
    const NAME: &'static str;

    /// Build the component's initial value. Must be an object or array
    /// literal.
    fn construct() -> vigil_core::Literal;
}

/// Component operations scoped to one observed instance.
pub struct Dependency<'a> {
    handle: &'a ObservedHandle,
}

impl<'a> Dependency<'a> {
    #[must_use]
    pub fn for_handle(handle: &'a ObservedHandle) -> Self {
        Self { handle }
    }

    /// Whether `C` has been registered on this instance.
    #[must_use]
    pub fn exists<C: Component>(&self) -> bool {
        self.handle
            .state()
            .components
            .borrow()
            .contains_key(&(self.handle.id(), C::NAME))
    }

    /// The registered instance of `C`, if any.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<ObservedHandle> {
        let id = self
            .handle
            .state()
            .components
            .borrow()
            .get(&(self.handle.id(), C::NAME))
            .copied()?;
        Some(ObservedHandle::from_parts(
            std::rc::Rc::clone(self.handle.state()),
            id,
        ))
    }

    /// Register `C` on this instance, constructing and attaching it on
    /// first call; later calls return the existing instance.
    pub fn register<C: Component>(&self) -> Result<ObservedHandle> {
        if let Some(existing) = self.get::<C>() {
            return Ok(existing);
        }
        self.handle.set(C::NAME, C::construct())?;
        let state = self.handle.state();
        let child_id = state
            .graph
            .borrow()
            .get(self.handle.id(), C::NAME)?
            .and_then(vigil_core::Value::as_ref_id)
            .ok_or(RuntimeError::InvalidComponent { name: C::NAME })?;
        state
            .components
            .borrow_mut()
            .insert((self.handle.id(), C::NAME), child_id);
        tracing::debug!(component = C::NAME, "registered component");
        Ok(ObservedHandle::from_parts(std::rc::Rc::clone(state), child_id))
    }
}

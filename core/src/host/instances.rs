//! Instance registry: the arena of handles standing in for host objects on
//! the engine side.
//!
//! Live bindings (`handle → instance`) are dropped by [`InstanceRegistry::clear`]
//! at the start of every query or load. Object identity (`object → handle`) is
//! remembered weakly for the life of the registry, so an object that is still
//! alive gets its old handle back when it is externalized again.

use std::collections::HashMap;
use std::sync::Weak;

use tracing::trace;

use crate::error::PolarError;
use crate::term::InstanceId;
use super::{HostObject, Instance};

/// Source of fresh handles, normally the engine.
pub trait HandleAllocator {
    /// `None` when no further handle can be issued.
    fn allocate_handle(&mut self) -> Option<InstanceId>;
}

#[derive(Default)]
pub struct InstanceRegistry {
    bound: HashMap<InstanceId, Instance>,
    known: HashMap<usize, (Weak<dyn HostObject>, InstanceId)>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        InstanceRegistry::default()
    }

    /// Ask the allocator for a fresh handle.
    pub fn allocate(&mut self, allocator: &mut dyn HandleAllocator) -> Result<InstanceId, PolarError> {
        let id = allocator.allocate_handle().ok_or(PolarError::EngineExhausted)?;
        trace!(instance_id = id, "handle allocated");
        Ok(id)
    }

    /// Bind `instance` under `id`, replacing any previous binding.
    pub fn bind(&mut self, id: InstanceId, instance: Instance) {
        self.known.insert(instance.addr(), (instance.downgrade(), id));
        self.bound.insert(id, instance);
    }

    /// Bind `instance` under an engine-chosen `id` that must be unused.
    pub fn bind_new(&mut self, id: InstanceId, instance: Instance) -> Result<(), PolarError> {
        if self.is_bound(id) {
            return Err(PolarError::HandleAlreadyBound(id));
        }
        self.bind(id, instance);
        Ok(())
    }

    pub fn is_bound(&self, id: InstanceId) -> bool {
        self.bound.contains_key(&id)
    }

    pub fn resolve(&self, id: InstanceId) -> Result<Instance, PolarError> {
        self.bound
            .get(&id)
            .cloned()
            .ok_or(PolarError::UnboundHandle(id))
    }

    /// The handle previously given to this very object, if it is still alive.
    pub fn handle_of(&self, instance: &Instance) -> Option<InstanceId> {
        let (weak, id) = self.known.get(&instance.addr())?;
        let alive = weak.upgrade().map(Instance::from_arc)?;
        if alive.ptr_eq(instance) {
            Some(*id)
        } else {
            None
        }
    }

    /// Handle for `instance`, reusing its earlier handle when there is one.
    pub fn externalize(
        &mut self,
        allocator: &mut dyn HandleAllocator,
        instance: &Instance,
    ) -> Result<InstanceId, PolarError> {
        let id = match self.handle_of(instance) {
            Some(id) => id,
            None => self.allocate(allocator)?,
        };
        self.bind(id, instance.clone());
        Ok(id)
    }

    /// Drop every live binding.
    pub fn clear(&mut self) {
        self.bound.clear();
        self.known.retain(|_, (weak, _)| weak.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Record;

    /// Counts up from 1, optionally running dry after `limit` handles.
    struct Counter {
        next: InstanceId,
        limit: Option<InstanceId>,
    }

    impl Counter {
        fn new() -> Self {
            Counter { next: 1, limit: None }
        }
    }

    impl HandleAllocator for Counter {
        fn allocate_handle(&mut self) -> Option<InstanceId> {
            if self.limit.is_some_and(|l| self.next > l) {
                return None;
            }
            let id = self.next;
            self.next += 1;
            Some(id)
        }
    }

    fn record() -> Instance {
        Instance::new(Record::new("R", &[]))
    }

    #[test]
    fn resolve_returns_same_reference() {
        let mut reg = InstanceRegistry::new();
        let mut alloc = Counter::new();
        let v = record();
        let h = reg.allocate(&mut alloc).unwrap();
        reg.bind(h, v.clone());
        assert!(reg.resolve(h).unwrap().ptr_eq(&v));
    }

    #[test]
    fn externalize_is_stable() {
        let mut reg = InstanceRegistry::new();
        let mut alloc = Counter::new();
        let v = record();
        let a = reg.externalize(&mut alloc, &v).unwrap();
        let b = reg.externalize(&mut alloc, &v).unwrap();
        assert_eq!(a, b);
        let other = reg.externalize(&mut alloc, &record()).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn handle_survives_clear_while_object_alive() {
        let mut reg = InstanceRegistry::new();
        let mut alloc = Counter::new();
        let v = record();
        let a = reg.externalize(&mut alloc, &v).unwrap();
        reg.clear();
        assert!(reg.resolve(a).is_err());
        let b = reg.externalize(&mut alloc, &v).unwrap();
        assert_eq!(a, b);
        assert!(reg.resolve(b).unwrap().ptr_eq(&v));
    }

    #[test]
    fn unbound_handle_is_an_error() {
        let reg = InstanceRegistry::new();
        assert!(matches!(reg.resolve(42), Err(PolarError::UnboundHandle(42))));
    }

    #[test]
    fn bind_new_rejects_used_handle() {
        let mut reg = InstanceRegistry::new();
        reg.bind_new(5, record()).unwrap();
        assert!(matches!(
            reg.bind_new(5, record()),
            Err(PolarError::HandleAlreadyBound(5))
        ));
    }

    #[test]
    fn exhausted_allocator() {
        let mut reg = InstanceRegistry::new();
        let mut alloc = Counter { next: 1, limit: Some(1) };
        reg.externalize(&mut alloc, &record()).unwrap();
        assert!(matches!(
            reg.externalize(&mut alloc, &record()),
            Err(PolarError::EngineExhausted)
        ));
    }

    #[test]
    fn clear_empties_bindings() {
        let mut reg = InstanceRegistry::new();
        let mut alloc = Counter::new();
        reg.externalize(&mut alloc, &record()).unwrap();
        assert_eq!(reg.len(), 1);
        reg.clear();
        assert!(reg.is_empty());
    }
}

//! Class registry: class names rules may mention, mapped to the host class
//! they stand for and how to construct it.
//!
//! The registry is shared by every `Polar` built from it (pass the same
//! `Arc<ClassRegistry>`). Registration is expected to finish before
//! concurrent querying begins; lookups only take the read lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::PolarError;
use super::{Fields, Instance};

pub type ConstructorFn = Arc<dyn Fn(Fields) -> Result<Instance, String> + Send + Sync>;


// ---------------------------------------------------------------------------
// HostClass
// ---------------------------------------------------------------------------

/// A host class as seen by the bridge: an id matching the entries of
/// `HostObject::class_path`, an optional default constructor, and a table of
/// class-level methods that named constructors resolve against.
pub struct HostClass {
    id: String,
    default_constructor: Option<ConstructorFn>,
    class_methods: RwLock<HashMap<String, ConstructorFn>>,
}

impl HostClass {
    pub fn new(id: &str) -> Self {
        HostClass {
            id: id.to_string(),
            default_constructor: None,
            class_methods: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Fields) -> Result<Instance, String> + Send + Sync + 'static,
    {
        self.default_constructor = Some(Arc::new(f));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add or replace a class method. Visible to named constructors even
    /// after the class has been registered.
    pub fn define_class_method<F>(&self, name: &str, f: F)
    where
        F: Fn(Fields) -> Result<Instance, String> + Send + Sync + 'static,
    {
        self.class_methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(f));
    }

    pub fn class_method(&self, name: &str) -> Option<ConstructorFn> {
        self.class_methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("id", &self.id)
            .field("has_default_constructor", &self.default_constructor.is_some())
            .finish()
    }
}

/// How instances of a registered class are built from literal fields.
#[derive(Clone)]
pub enum Constructor {
    Function(ConstructorFn),
    /// Name of a class method, looked up on the host class at call time.
    Method(String),
}

impl Constructor {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Fields) -> Result<Instance, String> + Send + Sync + 'static,
    {
        Constructor::Function(Arc::new(f))
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Function(_) => f.write_str("Function(..)"),
            Constructor::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub name: String,
    pub class: Arc<HostClass>,
    pub constructor: Option<Constructor>,
}


// ---------------------------------------------------------------------------
// ClassRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ClassRegistry {
    entries: RwLock<HashMap<String, Arc<ClassEntry>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(ClassRegistry::new())
    }

    /// Register `class` under `name`, replacing any previous entry.
    pub fn register(&self, name: &str, class: Arc<HostClass>, constructor: Option<Constructor>) {
        info!(class = name, host_class = class.id(), "class registered");
        let entry = ClassEntry {
            name: name.to_string(),
            class,
            constructor,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(entry));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Build an instance of the class registered as `name` from `fields`.
    pub fn construct(&self, name: &str, fields: Fields) -> Result<Instance, PolarError> {
        let entry = self
            .get(name)
            .ok_or_else(|| PolarError::UnregisteredClass(name.to_string()))?;

        let failed = |cause: String| PolarError::InstanceConstructionFailed {
            class_name: name.to_string(),
            cause,
        };

        let constructor = match &entry.constructor {
            Some(Constructor::Function(f)) => f.clone(),
            Some(Constructor::Method(method)) => entry
                .class
                .class_method(method)
                .ok_or_else(|| failed(format!("class has no method '{}'", method)))?,
            None => entry
                .class
                .default_constructor
                .clone()
                .ok_or_else(|| failed("class has no constructor".into()))?,
        };

        constructor(fields).map_err(failed)
    }

    /// Whether `instance` is an instance of the class registered as `name`.
    /// Unregistered names never match.
    pub fn is_subtype_of(&self, instance: &Instance, name: &str) -> bool {
        match self.get(name) {
            Some(entry) => instance.class_path().iter().any(|c| c == entry.class.id()),
            None => false,
        }
    }

    /// True iff `left` is strictly closer to `instance`'s concrete class than
    /// `right` in its class linearization. Unregistered names, or classes
    /// outside the linearization, compare as not more specific.
    pub fn compare_specificity(&self, instance: &Instance, left: &str, right: &str) -> bool {
        let (left, right) = match (self.get(left), self.get(right)) {
            (Some(l), Some(r)) => (l, r),
            _ => return false,
        };
        let path = instance.class_path();
        let position = |id: &str| path.iter().position(|c| c == id);
        match (position(left.class.id()), position(right.class.id())) {
            (Some(l), Some(r)) => l < r,
            _ => false,
        }
    }
}

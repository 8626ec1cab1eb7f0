//! Host-side values and the capability interface host objects expose to
//! rules.
//!
//! Rules never see native references. A host object is reached through the
//! [`HostObject`] trait: it reports its class linearization, answers
//! attribute lookups with either a value or an invocable [`Method`], and may
//! define equality for `ExternalUnify`.

pub mod calls;
pub mod classes;
pub mod instances;
pub mod record;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

pub use calls::{CallStep, CallTable};
pub use classes::{ClassEntry, ClassRegistry, Constructor, HostClass};
pub use instances::{HandleAllocator, InstanceRegistry};
pub use record::Record;

/// Named constructor arguments decoded from an instance literal.
pub type Fields = BTreeMap<String, HostValue>;

/// One solution of a query: variable name → host value.
pub type Bindings = BTreeMap<String, HostValue>;


// ---------------------------------------------------------------------------
// HostObject / Instance
// ---------------------------------------------------------------------------

/// Capability interface for any host object that can be externalized.
pub trait HostObject: Any + fmt::Debug + Send + Sync {
    /// Ancestor linearization of the concrete class, most specific first.
    /// The first entry is the object's own class id.
    fn class_path(&self) -> Vec<String>;

    /// Look up a member by name. `None` means the member does not exist,
    /// which rules observe as "no values" rather than an error.
    fn attribute(&self, name: &str) -> Option<Member>;

    /// Host-defined equality. Objects without one are only equal to
    /// themselves.
    fn equals(&self, other: &dyn HostObject) -> bool {
        let _ = other;
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// A shared reference to a host object.
#[derive(Clone)]
pub struct Instance(Arc<dyn HostObject>);

impl Instance {
    pub fn new<T: HostObject>(object: T) -> Self {
        Instance(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn HostObject>) -> Self {
        Instance(object)
    }

    /// Same allocation, regardless of host equality.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn HostObject> {
        Arc::downgrade(&self.0)
    }

    pub fn class_path(&self) -> Vec<String> {
        self.0.class_path()
    }

    pub fn attribute(&self, name: &str) -> Option<Member> {
        self.0.attribute(name)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn object(&self) -> &dyn HostObject {
        self.0.as_ref()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.equals(other.object())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}


// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Result of an attribute lookup.
#[derive(Debug, Clone)]
pub enum Member {
    /// A plain attribute; its current value is the only value produced.
    Value(HostValue),
    /// Something invocable with the call's arguments.
    Method(Method),
}

type MethodFn = dyn Fn(Vec<HostValue>) -> Result<Output, String> + Send + Sync;

#[derive(Clone)]
pub struct Method(Arc<MethodFn>);

impl Method {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<Output, String> + Send + Sync + 'static,
    {
        Method(Arc::new(f))
    }

    pub fn invoke(&self, args: Vec<HostValue>) -> Result<Output, String> {
        (self.0)(args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method(..)")
    }
}

/// What a method invocation produced.
pub enum Output {
    /// Nothing; the call yields no values.
    None,
    /// A single value, including lists and dictionaries.
    Value(HostValue),
    /// A lazily consumed sequence, in production order.
    Values(Box<dyn Iterator<Item = HostValue> + Send>),
}

impl Output {
    pub fn values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = HostValue>,
        I::IntoIter: Send + 'static,
    {
        Output::Values(Box::new(values.into_iter()))
    }
}

impl From<HostValue> for Output {
    fn from(value: HostValue) -> Self {
        Output::Value(value)
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::None => f.write_str("None"),
            Output::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Output::Values(_) => f.write_str("Values(..)"),
        }
    }
}


// ---------------------------------------------------------------------------
// HostValue / Predicate / Variable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    List(Vec<HostValue>),
    Dictionary(BTreeMap<String, HostValue>),
    Instance(Instance),
    Predicate(Predicate),
    /// Only meaningful when building a query.
    Variable(Variable),
}

impl HostValue {
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            HostValue::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Integer(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Integer(v.into())
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Boolean(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, HostValue>> for HostValue {
    fn from(v: BTreeMap<String, HostValue>) -> Self {
        HostValue::Dictionary(v)
    }
}

impl From<Instance> for HostValue {
    fn from(v: Instance) -> Self {
        HostValue::Instance(v)
    }
}

impl From<Predicate> for HostValue {
    fn from(v: Predicate) -> Self {
        HostValue::Predicate(v)
    }
}

impl From<Variable> for HostValue {
    fn from(v: Variable) -> Self {
        HostValue::Variable(v)
    }
}

/// `name(args, ...)`. Also the shape of a top-level query.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub name: String,
    pub args: Vec<HostValue>,
}

impl Predicate {
    pub fn new(name: &str, args: Vec<HostValue>) -> Self {
        Predicate {
            name: name.to_string(),
            args,
        }
    }
}

/// An unbound variable, used to ask the knowledge base for bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable(pub String);

impl Variable {
    pub fn new(name: &str) -> Self {
        Variable(name.to_string())
    }
}

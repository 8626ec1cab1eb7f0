//! Engine wire values.
//!
//! A [`Term`] is what crosses the engine boundary. Its JSON shape is
//! `{"id": 0, "offset": 0, "value": {"Integer": 1}}`; `id` and `offset` are
//! engine bookkeeping and are zero for host-built terms.

pub mod codec;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::Codec;

/// Opaque identifier of one externalized host object.
pub type InstanceId = u64;

/// Identifier the engine uses to correlate a question with its answer.
pub type CallId = u64;


// ---------------------------------------------------------------------------
// Term / Value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub offset: usize,
    pub value: Value,
}

impl Term {
    pub fn new(value: Value) -> Self {
        Term { id: 0, offset: 0, value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    List(Vec<Term>),
    Dictionary(Dictionary),
    ExternalInstance(ExternalInstance),
    InstanceLiteral(InstanceLiteral),
    Call(Call),
    Symbol(Symbol),
}

impl Value {
    /// Tag name as it appears on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Dictionary(_) => "Dictionary",
            Value::ExternalInstance(_) => "ExternalInstance",
            Value::InstanceLiteral(_) => "InstanceLiteral",
            Value::Call(_) => "Call",
            Value::Symbol(_) => "Symbol",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dictionary {
    pub fields: BTreeMap<String, Term>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalInstance {
    pub instance_id: InstanceId,
}

/// A class tag plus fields, not yet materialized as a host object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceLiteral {
    pub tag: String,
    pub fields: Dictionary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    pub args: Vec<Term>,
}

/// An unbound variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(name.to_string())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


// ---------------------------------------------------------------------------
// Display (rule-language rendering, used in logs and the CLI)
// ---------------------------------------------------------------------------

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Dictionary(d) => write!(f, "{}", d),
            Value::ExternalInstance(e) => write!(f, "^{{id: {}}}", e.instance_id),
            Value::InstanceLiteral(lit) => write!(f, "{}{}", lit.tag, lit.fields),
            Value::Call(call) => {
                write!(f, "{}(", call.name)?;
                write_joined(f, &call.args)?;
                write!(f, ")")
            }
            Value::Symbol(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Term]) -> fmt::Result {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

//! Parsed rules, goals and the knowledge base they are stored in.

use std::collections::HashMap;
use std::sync::Arc;

use crate::term::{Call, Dictionary, InstanceLiteral, Symbol, Term, Value};


// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

/// One thing a rule body or query asks the machine to prove.
#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    /// Prove a predicate through the rules defining it.
    Call(Call),
    Unify(Term, Term),
    Compare(Comparison, Term, Term),
    /// `term matches Class`
    Matches(Term, String),
    /// `target.attribute(args)`; the value is unified with `result`.
    Lookup {
        target: Term,
        attribute: String,
        args: Vec<Term>,
        result: Symbol,
    },
    /// `new Class{...}`; the new handle is bound to `result`.
    Make {
        literal: InstanceLiteral,
        result: Symbol,
    },
    Debug(String),
    /// Alternatives, tried left to right.
    Or(Vec<Vec<Goal>>),
}

impl Goal {
    fn map_terms(&self, f: &impl Fn(&Term) -> Term, s: &impl Fn(&Symbol) -> Symbol) -> Goal {
        match self {
            Goal::Call(call) => Goal::Call(map_call(call, f)),
            Goal::Unify(a, b) => Goal::Unify(f(a), f(b)),
            Goal::Compare(op, a, b) => Goal::Compare(*op, f(a), f(b)),
            Goal::Matches(t, class) => Goal::Matches(f(t), class.clone()),
            Goal::Lookup { target, attribute, args, result } => Goal::Lookup {
                target: f(target),
                attribute: attribute.clone(),
                args: args.iter().map(f).collect(),
                result: s(result),
            },
            Goal::Make { literal, result } => Goal::Make {
                literal: InstanceLiteral {
                    tag: literal.tag.clone(),
                    fields: map_dict(&literal.fields, f),
                },
                result: s(result),
            },
            Goal::Debug(msg) => Goal::Debug(msg.clone()),
            Goal::Or(branches) => Goal::Or(
                branches
                    .iter()
                    .map(|goals| goals.iter().map(|g| g.map_terms(f, s)).collect())
                    .collect(),
            ),
        }
    }
}

fn map_call(call: &Call, f: &impl Fn(&Term) -> Term) -> Call {
    Call {
        name: call.name.clone(),
        args: call.args.iter().map(f).collect(),
    }
}

fn map_dict(dict: &Dictionary, f: &impl Fn(&Term) -> Term) -> Dictionary {
    Dictionary {
        fields: dict.fields.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
    }
}

/// Rewrite every variable inside `term` with `rename`.
pub fn rename_term(term: &Term, rename: &impl Fn(&Symbol) -> Symbol) -> Term {
    let value = match &term.value {
        Value::Symbol(sym) => Value::Symbol(rename(sym)),
        Value::List(items) => Value::List(items.iter().map(|t| rename_term(t, rename)).collect()),
        Value::Dictionary(dict) => Value::Dictionary(map_dict(dict, &|t| rename_term(t, rename))),
        Value::InstanceLiteral(lit) => Value::InstanceLiteral(InstanceLiteral {
            tag: lit.tag.clone(),
            fields: map_dict(&lit.fields, &|t| rename_term(t, rename)),
        }),
        Value::Call(call) => Value::Call(map_call(call, &|t| rename_term(t, rename))),
        other => other.clone(),
    };
    Term { id: term.id, offset: term.offset, value }
}

/// Every variable name in `term`, in order of first appearance.
pub fn collect_vars(term: &Term, out: &mut Vec<String>) {
    match &term.value {
        Value::Symbol(Symbol(name)) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Value::List(items) => items.iter().for_each(|t| collect_vars(t, out)),
        Value::Dictionary(dict) => dict.fields.values().for_each(|t| collect_vars(t, out)),
        Value::InstanceLiteral(lit) => lit.fields.fields.values().for_each(|t| collect_vars(t, out)),
        Value::Call(call) => call.args.iter().for_each(|t| collect_vars(t, out)),
        _ => {}
    }
}


// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub term: Term,
    /// Class the argument must be an instance of.
    pub specializer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Goal>,
}

impl Rule {
    /// A copy whose variables are all suffixed with `#n`, so each use of
    /// the rule gets its own bindings.
    pub fn instantiate(&self, n: u64) -> Rule {
        let rename = |sym: &Symbol| Symbol(format!("{}#{}", sym.0, n));
        let term = |t: &Term| rename_term(t, &rename);
        Rule {
            name: self.name.clone(),
            params: self
                .params
                .iter()
                .map(|p| Param {
                    term: term(&p.term),
                    specializer: p.specializer.clone(),
                })
                .collect(),
            body: self.body.iter().map(|g| g.map_terms(&term, &rename)).collect(),
        }
    }
}

/// An inline `?=` query and the variables it mentions.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBody {
    pub goals: Vec<Goal>,
    pub vars: Vec<String>,
}

/// Result of parsing a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub rules: Vec<Rule>,
    pub queries: Vec<QueryBody>,
}


// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct KnowledgeBase {
    rules: HashMap<String, Vec<Arc<Rule>>>,
}

impl KnowledgeBase {
    pub fn add(&mut self, rule: Rule) {
        self.rules
            .entry(rule.name.clone())
            .or_default()
            .push(Arc::new(rule));
    }

    /// Rules for `name` taking `arity` arguments, in definition order.
    pub fn rules_for(&self, name: &str, arity: usize) -> Vec<Arc<Rule>> {
        self.rules
            .get(name)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|r| r.params.len() == arity)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! In-process rule engine.
//!
//! Implements [`Engine`] for a small rule language: rules with optional
//! class specializers on their parameters, conjunction, disjunction,
//! comparisons, `matches`, dot lookups, `new` and `debug`. Host objects are
//! only ever seen through handles; every question about them is turned into
//! an event for the bridge.
//!
//! ```text
//! allow(actor: User, "read", doc: Document) := doc.owner = actor.name;
//! ?= allow(new User{name: "ann"}, "read", new Document{owner: "ann"});
//! ```

pub mod lexer;
pub mod parser;
pub mod program;
pub mod vm;

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::engine::{Engine, EngineResult, LoadId, QueryEvent, QueryId};
use crate::error::ErrorPayload;
use crate::host::HandleAllocator;
use crate::term::{CallId, InstanceId, Term, Value};
use program::{collect_vars, Goal, KnowledgeBase, QueryBody};
use vm::{next_handle, Vm};

#[derive(Debug, Default)]
pub struct LocalEngine {
    kb: KnowledgeBase,
    queries: HashMap<QueryId, Vm>,
    loads: HashMap<LoadId, VecDeque<QueryBody>>,
    next_query: QueryId,
    next_load: LoadId,
    /// Last handle issued, to the host or to `new`.
    handles: InstanceId,
}

impl LocalEngine {
    pub fn new() -> Self {
        LocalEngine::default()
    }

    /// Number of rules loaded so far.
    pub fn rule_count(&self) -> usize {
        self.kb.len()
    }

    /// Number of queries not yet freed.
    pub fn open_queries(&self) -> usize {
        self.queries.len()
    }

    /// Number of loads still holding inline queries.
    pub fn open_loads(&self) -> usize {
        self.loads.len()
    }

    fn start(&mut self, body: QueryBody) -> QueryId {
        self.next_query += 1;
        self.queries.insert(self.next_query, Vm::new(body.goals, body.vars));
        self.next_query
    }

    fn query(&mut self, query: QueryId) -> EngineResult<&mut Vm> {
        self.queries
            .get_mut(&query)
            .ok_or_else(|| ErrorPayload::runtime("UnknownQuery", format!("no query {}", query)))
    }
}

impl HandleAllocator for LocalEngine {
    fn allocate_handle(&mut self) -> Option<InstanceId> {
        next_handle(&mut self.handles)
    }
}

impl Engine for LocalEngine {
    fn new_query_from_term(&mut self, term: Term) -> EngineResult<QueryId> {
        let mut vars = Vec::new();
        collect_vars(&term, &mut vars);
        let call = match term.value {
            Value::Call(call) => call,
            other => {
                return Err(ErrorPayload::runtime(
                    "TypeError",
                    format!("query must be a predicate, got {}", other),
                ))
            }
        };
        Ok(self.start(QueryBody {
            goals: vec![Goal::Call(call)],
            vars,
        }))
    }

    fn new_query_from_source(&mut self, source: &str) -> EngineResult<QueryId> {
        let body = parser::parse_query(source).map_err(ErrorPayload::Parse)?;
        Ok(self.start(body))
    }

    fn next_event(&mut self, query: QueryId) -> EngineResult<QueryEvent> {
        let vm = self
            .queries
            .get_mut(&query)
            .ok_or_else(|| ErrorPayload::runtime("UnknownQuery", format!("no query {}", query)))?;
        let event = vm.next_event(&self.kb, &mut self.handles)?;
        trace!(query, event = event.kind(), "engine event");
        Ok(event)
    }

    fn call_result(&mut self, query: QueryId, call_id: CallId, value: Option<Term>) -> EngineResult<()> {
        self.query(query)?.call_result(call_id, value)
    }

    fn question_result(&mut self, query: QueryId, call_id: CallId, answer: bool) -> EngineResult<()> {
        self.query(query)?.question_result(call_id, answer)
    }

    fn debug_command(&mut self, query: QueryId, command: Term) -> EngineResult<()> {
        trace!(query, command = %command, "debug command");
        self.query(query)?.debug_command()
    }

    fn free_query(&mut self, query: QueryId) {
        self.queries.remove(&query);
    }

    fn new_load(&mut self, source: &str) -> EngineResult<LoadId> {
        let program = parser::parse_program(source).map_err(ErrorPayload::Parse)?;
        debug!(
            rules = program.rules.len(),
            inline_queries = program.queries.len(),
            "source parsed"
        );
        for rule in program.rules {
            self.kb.add(rule);
        }
        self.next_load += 1;
        self.loads.insert(self.next_load, program.queries.into());
        Ok(self.next_load)
    }

    fn advance_load(&mut self, load: LoadId) -> EngineResult<Option<QueryId>> {
        let next = self
            .loads
            .get_mut(&load)
            .ok_or_else(|| ErrorPayload::runtime("UnknownLoad", format!("no load {}", load)))?
            .pop_front();
        match next {
            Some(body) => Ok(Some(self.start(body))),
            None => {
                self.loads.remove(&load);
                Ok(None)
            }
        }
    }

    fn free_load(&mut self, load: LoadId) {
        self.loads.remove(&load);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::term::{Call, ExternalInstance, Symbol};

    fn call(name: &str, args: Vec<Value>) -> Term {
        Term::new(Value::Call(Call {
            name: name.into(),
            args: args.into_iter().map(Term::new).collect(),
        }))
    }

    fn ext(id: InstanceId) -> Value {
        Value::ExternalInstance(ExternalInstance { instance_id: id })
    }

    fn drain(engine: &mut LocalEngine, q: QueryId) -> Vec<QueryEvent> {
        let mut events = Vec::new();
        loop {
            let ev = engine.next_event(q).unwrap();
            if ev == QueryEvent::Done {
                return events;
            }
            events.push(ev);
        }
    }

    #[test]
    fn load_then_query_by_term() {
        let mut engine = LocalEngine::new();
        let load = engine.new_load("f(x) := x = 1;").unwrap();
        assert_eq!(engine.advance_load(load).unwrap(), None);
        assert_eq!(engine.rule_count(), 1);

        let q = engine.new_query_from_term(call("f", vec![Value::Integer(1)])).unwrap();
        let events = drain(&mut engine, q);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], QueryEvent::Result { bindings } if bindings.is_empty()));

        let q = engine.new_query_from_term(call("f", vec![Value::Integer(2)])).unwrap();
        assert!(drain(&mut engine, q).is_empty());
    }

    #[test]
    fn variables_in_term_queries_are_reported() {
        let mut engine = LocalEngine::new();
        engine.new_load("f(1); f(2);").unwrap();
        let q = engine
            .new_query_from_term(call("f", vec![Value::Symbol(Symbol::new("x"))]))
            .unwrap();
        assert_eq!(drain(&mut engine, q).len(), 2);
    }

    #[test]
    fn parse_errors_carry_positions() {
        let mut engine = LocalEngine::new();
        let err = engine.new_load("f(x) := x = \"oops;").unwrap_err();
        assert_eq!(
            err,
            ErrorPayload::Parse(ParseError::InvalidTokenCharacter {
                token: "\"oops;".into(),
                c: '\0',
                pos: 12,
            })
        );
        assert_eq!(engine.rule_count(), 0);
    }

    #[test]
    fn inline_queries_are_handed_out_one_at_a_time() {
        let mut engine = LocalEngine::new();
        let load = engine.new_load("f(1); ?= f(1); ?= f(2);").unwrap();
        let first = engine.advance_load(load).unwrap().unwrap();
        assert_eq!(drain(&mut engine, first).len(), 1);
        let second = engine.advance_load(load).unwrap().unwrap();
        assert!(drain(&mut engine, second).is_empty());
        assert_eq!(engine.advance_load(load).unwrap(), None);
        assert_eq!(engine.open_loads(), 0);
    }

    #[test]
    fn free_load_drops_pending_inline_queries() {
        let mut engine = LocalEngine::new();
        let load = engine.new_load("f(1); ?= f(2); ?= f(1);").unwrap();
        engine.advance_load(load).unwrap().unwrap();
        assert_eq!(engine.open_loads(), 1);
        engine.free_load(load);
        assert_eq!(engine.open_loads(), 0);
        engine.free_load(load);
        assert!(engine.advance_load(load).is_err());
    }

    #[test]
    fn specialized_rules_ask_isa_then_specificity() {
        let mut engine = LocalEngine::new();
        engine
            .new_load("g(_x: A, y) := y = 1; g(_x: C, y) := y = 3; g(_x, y) := y = 0;")
            .unwrap();
        let q = engine
            .new_query_from_term(call("g", vec![ext(7), Value::Symbol(Symbol::new("y"))]))
            .unwrap();

        // Both specializers hold.
        for expected in ["A", "C"] {
            match engine.next_event(q).unwrap() {
                QueryEvent::ExternalIsa { call_id, instance_id, class_tag } => {
                    assert_eq!(instance_id, 7);
                    assert_eq!(class_tag, expected);
                    engine.question_result(q, call_id, true).unwrap();
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        // C is more specific than A.
        match engine.next_event(q).unwrap() {
            QueryEvent::ExternalIsSubSpecializer { call_id, left_class_tag, right_class_tag, .. } => {
                assert_eq!((left_class_tag.as_str(), right_class_tag.as_str()), ("C", "A"));
                engine.question_result(q, call_id, true).unwrap();
            }
            other => panic!("unexpected {:?}", other),
        }
        let ys: Vec<Value> = drain(&mut engine, q)
            .into_iter()
            .map(|ev| match ev {
                QueryEvent::Result { bindings } => bindings["y"].value.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(ys, vec![Value::Integer(3), Value::Integer(1), Value::Integer(0)]);
    }

    #[test]
    fn distinct_instances_ask_unify() {
        let mut engine = LocalEngine::new();
        engine.new_load("same(x, x);").unwrap();
        let q = engine.new_query_from_term(call("same", vec![ext(1), ext(2)])).unwrap();
        match engine.next_event(q).unwrap() {
            QueryEvent::ExternalUnify { call_id, left_instance_id, right_instance_id } => {
                assert_eq!((left_instance_id, right_instance_id), (2, 1));
                engine.question_result(q, call_id, false).unwrap();
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(engine.next_event(q).unwrap(), QueryEvent::Done);
    }

    #[test]
    fn debug_waits_for_a_command() {
        let mut engine = LocalEngine::new();
        let q = engine.new_query_from_source("debug(\"stop here\")").unwrap();
        assert_eq!(
            engine.next_event(q).unwrap(),
            QueryEvent::Debug { message: "stop here".into() }
        );
        assert!(engine.next_event(q).is_err());
        engine
            .debug_command(q, Term::new(Value::String("continue".into())))
            .unwrap();
        assert!(matches!(engine.next_event(q).unwrap(), QueryEvent::Result { .. }));
    }

    #[test]
    fn handles_shared_with_new() {
        let mut engine = LocalEngine::new();
        assert_eq!(engine.allocate_handle(), Some(1));
        let q = engine.new_query_from_source("x = new Foo{}").unwrap();
        assert!(matches!(
            engine.next_event(q).unwrap(),
            QueryEvent::MakeExternal { instance_id: 2, .. }
        ));
        assert_eq!(engine.allocate_handle(), Some(3));
    }

    #[test]
    fn free_query_forgets_it() {
        let mut engine = LocalEngine::new();
        let q = engine.new_query_from_source("1 = 1").unwrap();
        assert_eq!(engine.open_queries(), 1);
        engine.free_query(q);
        assert_eq!(engine.open_queries(), 0);
        assert!(engine.next_event(q).is_err());
        engine.free_query(q);
    }

    #[test]
    fn non_call_term_is_rejected() {
        let mut engine = LocalEngine::new();
        assert!(engine.new_query_from_term(Term::new(Value::Integer(1))).is_err());
    }
}

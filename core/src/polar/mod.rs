//! The host-facing entry point.
//!
//! A [`Polar`] owns one engine, the instance registry for that engine's
//! handles, and a queue of pending policy sources. The class registry is
//! shared: every `Polar` built from the same `Arc<ClassRegistry>` sees the
//! same classes.
//!
//! Queued sources are loaded lazily, right before the next query (or on an
//! explicit [`Polar::load_queued`]). Inline `?=` queries in a source must
//! each produce at least one result or the load fails.

pub mod debug;
pub mod query;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::engine::{Engine, LoadId, LocalEngine};
use crate::error::PolarError;
use crate::host::{
    Bindings, ClassRegistry, Constructor, HostClass, HostValue, InstanceRegistry, Predicate,
};
use crate::term::{Codec, Term, Value};

pub use debug::{ContinueDebugger, DebugHook, StdinDebugger};
pub use query::{Query, QueryState};

/// Every solution of a query, collected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub results: Vec<Bindings>,
    /// At least one solution was found.
    pub success: bool,
}

impl QueryResult {
    pub fn new(results: Vec<Bindings>) -> Self {
        QueryResult {
            success: !results.is_empty(),
            results,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LoadItem {
    File(PathBuf),
    Source(String),
}

impl fmt::Display for LoadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadItem::File(path) => write!(f, "{}", path.display()),
            LoadItem::Source(_) => f.write_str("<string>"),
        }
    }
}


// ---------------------------------------------------------------------------
// Polar
// ---------------------------------------------------------------------------

pub struct Polar<E: Engine = LocalEngine> {
    engine: E,
    classes: Arc<ClassRegistry>,
    instances: InstanceRegistry,
    queue: Vec<LoadItem>,
    debugger: Box<dyn DebugHook>,
}

impl Polar<LocalEngine> {
    /// A bridge over a fresh in-process engine.
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        Polar::with_engine(LocalEngine::new(), classes)
    }
}

impl<E: Engine> Polar<E> {
    pub fn with_engine(engine: E, classes: Arc<ClassRegistry>) -> Self {
        Polar {
            engine,
            classes,
            instances: InstanceRegistry::new(),
            queue: Vec::new(),
            debugger: Box::new(StdinDebugger),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    /// Register a class in the shared registry.
    pub fn register_class(&self, name: &str, class: Arc<HostClass>, constructor: Option<Constructor>) {
        self.classes.register(name, class, constructor);
    }

    pub fn set_debug_hook(&mut self, hook: Box<dyn DebugHook>) {
        self.debugger = hook;
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Queue a policy file. Only `.pol` and `.polar` files are accepted, and
    /// a path already in the queue is not queued twice.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), PolarError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pol") | Some("polar") => {}
            _ => {
                return Err(PolarError::Api(format!(
                    "policy files must have a .pol or .polar extension: {}",
                    path.display()
                )))
            }
        }
        if !path.exists() {
            return Err(PolarError::Api(format!("could not find file: {}", path.display())));
        }
        let item = LoadItem::File(path.to_path_buf());
        if !self.queue.contains(&item) {
            info!(file = %path.display(), "policy file queued");
            self.queue.push(item);
        }
        Ok(())
    }

    /// Queue policy source text.
    pub fn load_str(&mut self, source: &str) {
        self.queue.push(LoadItem::Source(source.to_string()));
    }

    /// Number of sources waiting to be loaded.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Load every queued source in order. A source that fails is dropped
    /// from the queue and its error returned; later sources stay queued.
    pub fn load_queued(&mut self) -> Result<(), PolarError> {
        while !self.queue.is_empty() {
            let item = self.queue.remove(0);
            let source = match &item {
                LoadItem::File(path) => fs::read_to_string(path).map_err(|source| PolarError::Io {
                    path: path.clone(),
                    source,
                })?,
                LoadItem::Source(text) => text.clone(),
            };
            info!(source = %item, "loading policy");
            self.load_source(&source)?;
        }
        Ok(())
    }

    fn load_source(&mut self, source: &str) -> Result<(), PolarError> {
        self.instances.clear();
        let load = self.engine.new_load(source)?;
        let result = self.run_inline_queries(load);
        self.engine.free_load(load);
        result
    }

    fn run_inline_queries(&mut self, load: LoadId) -> Result<(), PolarError> {
        let mut index = 0;
        while let Some(id) = self.engine.advance_load(load)? {
            index += 1;
            let mut succeeded = false;
            for result in Query::new(self, id) {
                result?;
                succeeded = true;
            }
            if !succeeded {
                return Err(PolarError::InlineQueryFailed(format!(
                    "inline query #{} produced no results",
                    index
                )));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Querying
    // -----------------------------------------------------------------------

    /// Start a query for `predicate`, loading queued sources first.
    pub fn query_iter(&mut self, predicate: &Predicate) -> Result<Query<'_, E>, PolarError> {
        self.load_queued()?;
        self.instances.clear();
        let call = self.codec().predicate_to_call(predicate)?;
        let id = self.engine.new_query_from_term(Term::new(Value::Call(call)))?;
        Ok(Query::new(self, id))
    }

    /// Start a query written in the rule language.
    pub fn query_str(&mut self, source: &str) -> Result<Query<'_, E>, PolarError> {
        self.load_queued()?;
        self.instances.clear();
        let id = self.engine.new_query_from_source(source)?;
        Ok(Query::new(self, id))
    }

    /// Collect every solution of `predicate`.
    pub fn query(&mut self, predicate: &Predicate) -> Result<QueryResult, PolarError> {
        let results = self.query_iter(predicate)?.collect::<Result<Vec<_>, _>>()?;
        Ok(QueryResult::new(results))
    }

    /// Stop after the first solution.
    pub fn query_single(&mut self, predicate: &Predicate) -> Result<QueryResult, PolarError> {
        let first = self.query_iter(predicate)?.next().transpose()?;
        Ok(QueryResult::new(first.into_iter().collect()))
    }

    /// `allow(actor, action, resource)` has at least one solution.
    pub fn is_allowed(
        &mut self,
        actor: impl Into<HostValue>,
        action: impl Into<HostValue>,
        resource: impl Into<HostValue>,
    ) -> Result<bool, PolarError> {
        let predicate = Predicate::new("allow", vec![actor.into(), action.into(), resource.into()]);
        Ok(self.query_single(&predicate)?.success)
    }

    /// Forget every rule, handle and queued source. Registered classes are
    /// kept.
    pub fn clear(&mut self)
    where
        E: Default,
    {
        self.engine = E::default();
        self.instances = InstanceRegistry::new();
        self.queue.clear();
        info!("bridge cleared");
    }

    pub(crate) fn codec(&mut self) -> Codec<'_> {
        Codec::new(&mut self.instances, &self.classes, &mut self.engine)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::engine::mock::{MockEngine, Response};
    use crate::engine::QueryEvent;
    use crate::error::{ErrorPayload, ParseError};
    use crate::host::{Instance, Output, Record, Variable};
    use crate::term::{Dictionary, InstanceLiteral};

    fn registry() -> Arc<ClassRegistry> {
        let classes = ClassRegistry::shared();
        classes.register("A", Arc::new(Record::class("A", &[], &[])), None);
        classes.register("B", Arc::new(Record::class("B", &["A"], &[])), None);
        classes.register("Point", Arc::new(Record::class("Point", &[], &["x"])), None);
        classes
    }

    fn mock(events: Vec<QueryEvent>) -> Polar<MockEngine> {
        let mut polar = Polar::with_engine(MockEngine::with_script(events), registry());
        polar.set_debug_hook(Box::new(ContinueDebugger));
        polar
    }

    fn event(value: serde_json::Value) -> QueryEvent {
        serde_json::from_value(value).unwrap()
    }

    fn b_instance() -> Instance {
        Instance::new(Record::new("B", &["A"]))
    }

    #[test]
    fn isa_and_specificity_are_answered_from_the_class_path() {
        let mut polar = mock(vec![
            event(json!({ "ExternalIsa": { "call_id": 1, "instance_id": 1, "class_tag": "A" } })),
            event(json!({ "ExternalIsa": { "call_id": 2, "instance_id": 1, "class_tag": "Point" } })),
            event(json!({ "ExternalIsSubSpecializer": {
                "call_id": 3, "instance_id": 1, "left_class_tag": "B", "right_class_tag": "A"
            } })),
            event(json!({ "Result": { "bindings": {} } })),
        ]);
        let result = polar
            .query(&Predicate::new("f", vec![b_instance().into()]))
            .unwrap();
        assert!(result.success);
        assert_eq!(
            polar.engine().responses,
            vec![
                Response::Question { call_id: 1, answer: true },
                Response::Question { call_id: 2, answer: false },
                Response::Question { call_id: 3, answer: true },
            ]
        );
    }

    #[test]
    fn external_call_is_opened_once_and_drained() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let target = Instance::new(Record::new("A", &[]).with_method("pair", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Output::values(vec![HostValue::from(1), HostValue::from(2)]))
        }));
        let call = json!({ "ExternalCall": {
            "call_id": 7, "instance_id": 1, "attribute": "pair", "args": []
        } });
        let mut polar = mock(vec![event(call.clone()), event(call.clone()), event(call)]);
        polar.query(&Predicate::new("f", vec![target.into()])).unwrap();

        let values: Vec<Option<Value>> = polar
            .engine()
            .responses
            .iter()
            .map(|r| match r {
                Response::Call { call_id: 7, value } => value.as_ref().map(|t| t.value.clone()),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![Some(Value::Integer(1)), Some(Value::Integer(2)), None]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_member_answers_no_value() {
        let mut polar = mock(vec![event(json!({ "ExternalCall": {
            "call_id": 1, "instance_id": 1, "attribute": "nope", "args": []
        } }))]);
        polar.query(&Predicate::new("f", vec![b_instance().into()])).unwrap();
        assert_eq!(
            polar.engine().responses,
            vec![Response::Call { call_id: 1, value: None }]
        );
    }

    #[test]
    fn make_external_then_call_on_it() {
        let mut fields = Dictionary::default();
        fields.fields.insert("x".into(), Term::new(Value::Integer(4)));
        let mut polar = mock(vec![
            QueryEvent::MakeExternal {
                instance_id: 50,
                instance: InstanceLiteral { tag: "Point".into(), fields },
            },
            event(json!({ "ExternalCall": {
                "call_id": 1, "instance_id": 50, "attribute": "x", "args": []
            } })),
        ]);
        polar.query(&Predicate::new("f", vec![])).unwrap();
        assert_eq!(
            polar.engine().responses,
            vec![Response::Call { call_id: 1, value: Some(Term::new(Value::Integer(4))) }]
        );
    }

    #[test]
    fn make_external_on_bound_handle_fails_the_query() {
        let literal = InstanceLiteral { tag: "A".into(), fields: Dictionary::default() };
        let make = QueryEvent::MakeExternal { instance_id: 9, instance: literal };
        let mut polar = mock(vec![make.clone(), make]);
        let mut query = polar.query_iter(&Predicate::new("f", vec![])).unwrap();
        assert!(matches!(query.next(), Some(Err(PolarError::HandleAlreadyBound(9)))));
        assert_eq!(query.state(), QueryState::Failed);
        assert!(query.next().is_none());
    }

    #[test]
    fn unknown_handle_is_an_error() {
        let mut polar = mock(vec![event(json!({
            "ExternalIsa": { "call_id": 1, "instance_id": 99, "class_tag": "A" }
        }))]);
        let err = polar.query(&Predicate::new("f", vec![])).unwrap_err();
        assert!(matches!(err, PolarError::UnboundHandle(99)));
    }

    #[test]
    fn unify_uses_host_equality() {
        let mut polar = mock(vec![event(json!({ "ExternalUnify": {
            "call_id": 1, "left_instance_id": 1, "right_instance_id": 2
        } }))]);
        let a = Instance::new(Record::new("P", &[]).with_field("x", 1));
        let b = Instance::new(Record::new("P", &[]).with_field("x", 1));
        polar.query(&Predicate::new("f", vec![a.into(), b.into()])).unwrap();
        assert_eq!(
            polar.engine().responses,
            vec![Response::Question { call_id: 1, answer: true }]
        );
    }

    #[test]
    fn engine_errors_surface_with_their_kind() {
        let mut polar = mock(vec![]);
        polar
            .engine
            .script
            .push_back(Err(ErrorPayload::Parse(ParseError::InvalidToken { pos: 3 })));
        let err = polar.query(&Predicate::new("f", vec![])).unwrap_err();
        assert!(matches!(err, PolarError::Parse(ParseError::InvalidToken { pos: 3 })));
    }

    #[test]
    fn debug_event_forwards_the_hook_command() {
        let mut polar = mock(vec![QueryEvent::Debug { message: "paused".into() }]);
        polar.query(&Predicate::new("f", vec![])).unwrap();
        assert_eq!(
            polar.engine().responses,
            vec![Response::Debug(Term::new(Value::String("continue".into())))]
        );
    }

    #[test]
    fn result_with_unbound_variable_is_an_error() {
        let mut polar = mock(vec![event(json!({ "Result": { "bindings": {
            "x": { "value": { "Symbol": "y" } }
        } } }))]);
        let err = polar.query(&Predicate::new("f", vec![])).unwrap_err();
        assert!(matches!(err, PolarError::UnboundVariable(name) if name == "y"));
    }

    #[test]
    fn dropping_a_query_frees_it() {
        let mut polar = mock(vec![
            event(json!({ "Result": { "bindings": {} } })),
            event(json!({ "Result": { "bindings": {} } })),
        ]);
        let result = polar.query_single(&Predicate::new("f", vec![])).unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(polar.engine().freed, vec![1]);
    }

    #[test]
    fn query_arguments_are_encoded() {
        let mut polar = mock(vec![]);
        polar
            .query(&Predicate::new("f", vec![1.into(), Variable::new("x").into()]))
            .unwrap();
        assert_eq!(polar.engine().queries[0].to_string(), "f(1, x)");
    }

    #[test]
    fn handles_exhausted() {
        let mut polar = mock(vec![]);
        polar.engine.handle_limit = Some(0);
        let err = polar
            .query(&Predicate::new("f", vec![b_instance().into()]))
            .unwrap_err();
        assert!(matches!(err, PolarError::EngineExhausted));
    }

    #[test]
    fn inline_query_without_results_fails_the_load() {
        let mut polar = mock(vec![]);
        polar.engine.inline_queries = 1;
        polar.load_str("?= f(1);");
        let err = polar.load_queued().unwrap_err();
        assert!(matches!(err, PolarError::InlineQueryFailed(_)));
        assert_eq!(polar.queued(), 0);
        assert_eq!(polar.engine().freed_loads, vec![1]);
    }

    #[test]
    fn failed_inline_query_releases_the_load() {
        let mut polar = Polar::new(registry());
        polar.load_str("f(1); ?= f(2); ?= f(1);");
        assert!(matches!(polar.load_queued(), Err(PolarError::InlineQueryFailed(_))));
        assert_eq!(polar.engine().open_loads(), 0);
        assert_eq!(polar.engine().open_queries(), 0);
    }

    #[test]
    fn load_file_checks_extension_and_existence() {
        let mut polar = mock(vec![]);
        assert!(matches!(polar.load_file("rules.txt"), Err(PolarError::Api(_))));
        assert!(matches!(polar.load_file("/no/such/file.polar"), Err(PolarError::Api(_))));
    }

    #[test]
    fn load_file_queues_once() {
        let path = std::env::temp_dir().join(format!("polar-host-{}.polar", std::process::id()));
        fs::write(&path, "f(1);").unwrap();
        let mut polar = mock(vec![]);
        polar.load_file(&path).unwrap();
        polar.load_file(&path).unwrap();
        assert_eq!(polar.queued(), 1);
        polar.load_queued().unwrap();
        assert_eq!(polar.engine().sources, vec!["f(1);".to_string()]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn sources_load_before_the_next_query() {
        let mut polar = mock(vec![]);
        polar.load_str("a(1);");
        polar.load_str("b(2);");
        polar.query(&Predicate::new("a", vec![])).unwrap();
        assert_eq!(polar.engine().sources, vec!["a(1);", "b(2);"]);
        assert_eq!(polar.queued(), 0);
    }

    #[test]
    fn clear_keeps_classes() {
        let mut polar = Polar::new(registry());
        polar.load_str("f(1);");
        polar.load_queued().unwrap();
        assert_eq!(polar.engine().rule_count(), 1);
        polar.load_str("g(1);");
        polar.clear();
        assert_eq!(polar.engine().rule_count(), 0);
        assert_eq!(polar.queued(), 0);
        assert!(polar.classes().contains("Point"));
    }
}

//! The boundary with the rule engine.
//!
//! The bridge only ever talks to an engine through [`Engine`]: create a
//! query, pull one [`QueryEvent`] at a time, and push the answer to each
//! question back before pulling again. Failures carry the engine's
//! structured [`ErrorPayload`].
//!
//! [`local::LocalEngine`] is an in-process implementation of this boundary.

pub mod local;
pub mod mock;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ErrorPayload;
use crate::host::HandleAllocator;
use crate::term::{CallId, InstanceId, InstanceLiteral, Term};

pub use local::LocalEngine;

pub type QueryId = u64;
pub type LoadId = u64;
pub type EngineResult<T> = Result<T, ErrorPayload>;


// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One step of a query, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryEvent {
    /// No further events; the query is finished.
    Done,
    /// Build a host instance and bind it under the given handle.
    MakeExternal {
        instance_id: InstanceId,
        instance: InstanceLiteral,
    },
    /// Produce the next value of `attribute` on the instance.
    ExternalCall {
        call_id: CallId,
        instance_id: InstanceId,
        attribute: String,
        args: Vec<Term>,
    },
    ExternalIsa {
        call_id: CallId,
        instance_id: InstanceId,
        class_tag: String,
    },
    ExternalIsSubSpecializer {
        call_id: CallId,
        instance_id: InstanceId,
        left_class_tag: String,
        right_class_tag: String,
    },
    ExternalUnify {
        call_id: CallId,
        left_instance_id: InstanceId,
        right_instance_id: InstanceId,
    },
    Debug {
        message: String,
    },
    /// One solution.
    Result {
        bindings: BTreeMap<String, Term>,
    },
}

impl QueryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryEvent::Done => "Done",
            QueryEvent::MakeExternal { .. } => "MakeExternal",
            QueryEvent::ExternalCall { .. } => "ExternalCall",
            QueryEvent::ExternalIsa { .. } => "ExternalIsa",
            QueryEvent::ExternalIsSubSpecializer { .. } => "ExternalIsSubSpecializer",
            QueryEvent::ExternalUnify { .. } => "ExternalUnify",
            QueryEvent::Debug { .. } => "Debug",
            QueryEvent::Result { .. } => "Result",
        }
    }
}


// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Event protocol of a rule engine. Requests and responses strictly
/// alternate: after an event that asks a question, the matching result
/// must be reported before `next_event` is called again.
pub trait Engine: HandleAllocator {
    /// Start a query for a `Call` term.
    fn new_query_from_term(&mut self, term: Term) -> EngineResult<QueryId>;

    /// Start a query from rule-language source.
    fn new_query_from_source(&mut self, source: &str) -> EngineResult<QueryId>;

    fn next_event(&mut self, query: QueryId) -> EngineResult<QueryEvent>;

    /// Answer an `ExternalCall`; `None` means no (further) value.
    fn call_result(&mut self, query: QueryId, call_id: CallId, value: Option<Term>) -> EngineResult<()>;

    /// Answer an `ExternalIsa`, `ExternalIsSubSpecializer` or `ExternalUnify`.
    fn question_result(&mut self, query: QueryId, call_id: CallId, answer: bool) -> EngineResult<()>;

    /// Answer a `Debug` event with the operator's command.
    fn debug_command(&mut self, query: QueryId, command: Term) -> EngineResult<()>;

    /// Release a query. Unknown ids are ignored.
    fn free_query(&mut self, query: QueryId);

    /// Parse `source` into the knowledge base.
    fn new_load(&mut self, source: &str) -> EngineResult<LoadId>;

    /// Next inline query embedded in the loaded source, if any.
    fn advance_load(&mut self, load: LoadId) -> EngineResult<Option<QueryId>>;

    /// Release a load and any inline queries it has not handed out.
    /// Unknown ids are ignored.
    fn free_load(&mut self, load: LoadId);
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn done_is_a_bare_string() {
        let ev: QueryEvent = serde_json::from_value(json!("Done")).unwrap();
        assert_eq!(ev, QueryEvent::Done);
        assert_eq!(serde_json::to_value(&ev).unwrap(), json!("Done"));
    }

    #[test]
    fn external_call_from_wire() {
        let ev: QueryEvent = serde_json::from_value(json!({
            "ExternalCall": {
                "call_id": 3,
                "instance_id": 1,
                "attribute": "name",
                "args": [{ "value": { "Integer": 1 } }]
            }
        }))
        .unwrap();
        match ev {
            QueryEvent::ExternalCall { call_id, attribute, args, .. } => {
                assert_eq!(call_id, 3);
                assert_eq!(attribute, "name");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sub_specializer_field_names() {
        let ev = QueryEvent::ExternalIsSubSpecializer {
            call_id: 1,
            instance_id: 2,
            left_class_tag: "C".into(),
            right_class_tag: "A".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["ExternalIsSubSpecializer"]["left_class_tag"], "C");
        assert_eq!(ev.kind(), "ExternalIsSubSpecializer");
    }

    #[test]
    fn result_bindings_from_wire() {
        let ev: QueryEvent = serde_json::from_value(json!({
            "Result": { "bindings": { "x": { "value": { "String": "a" } } } }
        }))
        .unwrap();
        match ev {
            QueryEvent::Result { bindings } => assert!(bindings.contains_key("x")),
            other => panic!("unexpected {:?}", other),
        }
    }
}

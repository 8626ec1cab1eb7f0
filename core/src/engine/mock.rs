//! Scripted engine for testing the query loop.
//!
//! Hands out pre-loaded events in order and records every answer the bridge
//! sends back, so tests can assert on the exact conversation.

use std::collections::VecDeque;

use crate::engine::{Engine, EngineResult, LoadId, QueryEvent, QueryId};
use crate::host::HandleAllocator;
use crate::term::{CallId, InstanceId, Term};

/// One answer the bridge gave the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Call { call_id: CallId, value: Option<Term> },
    Question { call_id: CallId, answer: bool },
    Debug(Term),
}

#[derive(Debug, Default)]
pub struct MockEngine {
    /// Events served to `next_event`, in order. An empty script serves `Done`.
    pub script: VecDeque<EngineResult<QueryEvent>>,
    /// Every answer received, in order.
    pub responses: Vec<Response>,
    /// Query terms received through `new_query_from_term`.
    pub queries: Vec<Term>,
    /// Sources received through `new_load` and `new_query_from_source`.
    pub sources: Vec<String>,
    pub freed: Vec<QueryId>,
    pub freed_loads: Vec<LoadId>,
    /// How many inline queries each load yields.
    pub inline_queries: usize,
    /// Handles beyond this are refused.
    pub handle_limit: Option<InstanceId>,
    next_query: QueryId,
    next_handle: InstanceId,
    inline_left: usize,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine::default()
    }

    pub fn with_script(events: Vec<QueryEvent>) -> Self {
        let mut engine = MockEngine::new();
        engine.script = events.into_iter().map(Ok).collect();
        engine
    }

    pub fn push(&mut self, event: QueryEvent) {
        self.script.push_back(Ok(event));
    }

    fn start(&mut self) -> QueryId {
        self.next_query += 1;
        self.next_query
    }
}

impl HandleAllocator for MockEngine {
    fn allocate_handle(&mut self) -> Option<InstanceId> {
        if self.handle_limit.is_some_and(|limit| self.next_handle >= limit) {
            return None;
        }
        self.next_handle += 1;
        Some(self.next_handle)
    }
}

impl Engine for MockEngine {
    fn new_query_from_term(&mut self, term: Term) -> EngineResult<QueryId> {
        self.queries.push(term);
        Ok(self.start())
    }

    fn new_query_from_source(&mut self, source: &str) -> EngineResult<QueryId> {
        self.sources.push(source.to_string());
        Ok(self.start())
    }

    fn next_event(&mut self, _query: QueryId) -> EngineResult<QueryEvent> {
        self.script.pop_front().unwrap_or(Ok(QueryEvent::Done))
    }

    fn call_result(&mut self, _query: QueryId, call_id: CallId, value: Option<Term>) -> EngineResult<()> {
        self.responses.push(Response::Call { call_id, value });
        Ok(())
    }

    fn question_result(&mut self, _query: QueryId, call_id: CallId, answer: bool) -> EngineResult<()> {
        self.responses.push(Response::Question { call_id, answer });
        Ok(())
    }

    fn debug_command(&mut self, _query: QueryId, command: Term) -> EngineResult<()> {
        self.responses.push(Response::Debug(command));
        Ok(())
    }

    fn free_query(&mut self, query: QueryId) {
        self.freed.push(query);
    }

    fn new_load(&mut self, source: &str) -> EngineResult<LoadId> {
        self.sources.push(source.to_string());
        self.inline_left = self.inline_queries;
        Ok(1)
    }

    fn advance_load(&mut self, _load: LoadId) -> EngineResult<Option<QueryId>> {
        if self.inline_left == 0 {
            return Ok(None);
        }
        self.inline_left -= 1;
        Ok(Some(self.start()))
    }

    fn free_load(&mut self, load: LoadId) {
        self.inline_left = 0;
        self.freed_loads.push(load);
    }
}

//! The query loop: pulls engine events, answers them with host knowledge,
//! and yields one set of bindings per `Result` event.

use tracing::{debug, warn};

use crate::engine::{Engine, QueryEvent, QueryId};
use crate::error::PolarError;
use crate::host::calls::open_call;
use crate::host::{Bindings, CallStep, CallTable, HostValue};
use crate::term::{CallId, Codec, InstanceId, Term};
use super::Polar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Running,
    /// The engine reported `Done`.
    Done,
    /// An error ended the query.
    Failed,
}

/// A running query. Iterating drives the engine; each item is one solution.
/// The engine query is freed when this is dropped.
pub struct Query<'p, E: Engine> {
    polar: &'p mut Polar<E>,
    id: QueryId,
    calls: CallTable,
    state: QueryState,
}

impl<'p, E: Engine> Query<'p, E> {
    pub(crate) fn new(polar: &'p mut Polar<E>, id: QueryId) -> Self {
        Query {
            polar,
            id,
            calls: CallTable::new(),
            state: QueryState::Running,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Pull events until the next solution or the end of the query.
    fn next_result(&mut self) -> Result<Option<Bindings>, PolarError> {
        loop {
            let event = self.polar.engine.next_event(self.id)?;
            debug!(query = self.id, event = event.kind(), "engine event");
            match event {
                QueryEvent::Done => return Ok(None),
                QueryEvent::Result { bindings } => {
                    let mut codec = self.polar.codec();
                    let mut out = Bindings::new();
                    for (name, term) in &bindings {
                        out.insert(name.clone(), codec.to_host(term)?);
                    }
                    return Ok(Some(out));
                }
                QueryEvent::MakeExternal { instance_id, instance } => {
                    self.polar.codec().make_instance(&instance, Some(instance_id))?;
                }
                QueryEvent::ExternalCall { call_id, instance_id, attribute, args } => {
                    self.external_call(call_id, instance_id, &attribute, &args)?;
                }
                QueryEvent::ExternalIsa { call_id, instance_id, class_tag } => {
                    let instance = self.polar.instances.resolve(instance_id)?;
                    let answer = self.polar.classes.is_subtype_of(&instance, &class_tag);
                    debug!(call_id, instance_id, class_tag = %class_tag, answer, "isa");
                    self.polar.engine.question_result(self.id, call_id, answer)?;
                }
                QueryEvent::ExternalIsSubSpecializer {
                    call_id,
                    instance_id,
                    left_class_tag,
                    right_class_tag,
                } => {
                    let instance = self.polar.instances.resolve(instance_id)?;
                    let answer = self.polar.classes.compare_specificity(
                        &instance,
                        &left_class_tag,
                        &right_class_tag,
                    );
                    debug!(call_id, instance_id, answer, "specificity");
                    self.polar.engine.question_result(self.id, call_id, answer)?;
                }
                QueryEvent::ExternalUnify { call_id, left_instance_id, right_instance_id } => {
                    let left = self.polar.instances.resolve(left_instance_id)?;
                    let right = self.polar.instances.resolve(right_instance_id)?;
                    let answer = left == right;
                    debug!(call_id, left_instance_id, right_instance_id, answer, "unify");
                    self.polar.engine.question_result(self.id, call_id, answer)?;
                }
                QueryEvent::Debug { message } => {
                    let command = self
                        .polar
                        .debugger
                        .on_debug(&message)
                        .map_err(PolarError::Debugger)?;
                    let term = self.polar.codec().to_term(&HostValue::String(command))?;
                    self.polar.engine.debug_command(self.id, term)?;
                }
            }
        }
    }

    /// Answer one `ExternalCall` with the next value of its sequence.
    fn external_call(
        &mut self,
        call_id: CallId,
        instance_id: InstanceId,
        attribute: &str,
        args: &[Term],
    ) -> Result<(), PolarError> {
        let polar = &mut *self.polar;
        let classes = polar.classes.clone();
        let step = self.calls.next_value(call_id, || {
            let instance = polar.instances.resolve(instance_id)?;
            let args = Codec::new(&mut polar.instances, &classes, &mut polar.engine)
                .args_to_host(args)?;
            open_call(&instance, attribute, args)
        })?;
        debug!(call_id, instance_id, attribute, ?step, "external call");
        let value = match step {
            CallStep::Value(value) => Some(polar.codec().to_term(&value)?),
            CallStep::Exhausted | CallStep::Absent => None,
        };
        polar.engine.call_result(self.id, call_id, value)?;
        Ok(())
    }
}

impl<'p, E: Engine> Iterator for Query<'p, E> {
    type Item = Result<Bindings, PolarError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != QueryState::Running {
            return None;
        }
        match self.next_result() {
            Ok(Some(bindings)) => Some(Ok(bindings)),
            Ok(None) => {
                self.state = QueryState::Done;
                None
            }
            Err(err) => {
                warn!(query = self.id, error = %err, "query failed");
                self.state = QueryState::Failed;
                Some(Err(err))
            }
        }
    }
}

impl<'p, E: Engine> Drop for Query<'p, E> {
    fn drop(&mut self) {
        self.polar.engine.free_query(self.id);
    }
}

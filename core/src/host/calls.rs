//! Call state table: one lazily advanced value sequence per external call.
//!
//! The first reference to a `call_id` resolves the member and normalizes
//! whatever it produces into a forward-only iterator. Later references pull
//! the next element. Once the sequence runs dry the entry becomes
//! `Exhausted` for good; the member is never resolved or invoked again.

use std::collections::HashMap;
use std::iter;

use tracing::trace;

use crate::error::PolarError;
use crate::term::CallId;
use super::{HostValue, Instance, Member, Output};

type Values = Box<dyn Iterator<Item = HostValue> + Send>;

/// What opening a call produced.
pub enum CallSource {
    /// The member does not exist on the target.
    Absent,
    Values(Values),
}

/// Outcome of one pull.
#[derive(Debug, Clone, PartialEq)]
pub enum CallStep {
    Value(HostValue),
    /// The sequence has no more values.
    Exhausted,
    /// The member does not exist; no values were ever produced.
    Absent,
}

enum CallState {
    Producing(Values),
    Exhausted,
    Absent,
}

#[derive(Default)]
pub struct CallTable {
    calls: HashMap<CallId, CallState>,
}

impl CallTable {
    pub fn new() -> Self {
        CallTable::default()
    }

    /// Pull the next value for `call_id`, running `open` only the first
    /// time this id is seen.
    pub fn next_value<F>(&mut self, call_id: CallId, open: F) -> Result<CallStep, PolarError>
    where
        F: FnOnce() -> Result<CallSource, PolarError>,
    {
        if !self.calls.contains_key(&call_id) {
            let state = match open()? {
                CallSource::Absent => CallState::Absent,
                CallSource::Values(values) => CallState::Producing(values),
            };
            self.calls.insert(call_id, state);
        }

        let state = match self.calls.get_mut(&call_id) {
            Some(state) => state,
            None => return Ok(CallStep::Exhausted),
        };
        let step = match state {
            CallState::Absent => CallStep::Absent,
            CallState::Exhausted => CallStep::Exhausted,
            CallState::Producing(values) => match values.next() {
                Some(value) => CallStep::Value(value),
                None => {
                    *state = CallState::Exhausted;
                    CallStep::Exhausted
                }
            },
        };
        trace!(call_id, ?step, "call advanced");
        Ok(step)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

/// Resolve `attribute` on `instance` and normalize the result into a value
/// sequence. Plain attributes and single results produce one value, an
/// empty output produces none, and `Output::Values` is consumed lazily.
pub fn open_call(
    instance: &Instance,
    attribute: &str,
    args: Vec<HostValue>,
) -> Result<CallSource, PolarError> {
    let output = match instance.attribute(attribute) {
        None => return Ok(CallSource::Absent),
        Some(Member::Value(value)) => Output::Value(value),
        Some(Member::Method(method)) => {
            method
                .invoke(args)
                .map_err(|cause| PolarError::ExternalCallFailed {
                    attribute: attribute.to_string(),
                    cause,
                })?
        }
    };
    let values: Values = match output {
        Output::None => Box::new(iter::empty()),
        Output::Value(value) => Box::new(iter::once(value)),
        Output::Values(values) => values,
    };
    Ok(CallSource::Values(values))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::host::Record;

    fn counted_pair(count: Arc<AtomicUsize>) -> Instance {
        Instance::new(Record::new("Gen", &[]).with_method("pair", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Output::values(vec![HostValue::from("a"), HostValue::from("b")]))
        }))
    }

    #[test]
    fn pulls_values_in_order_then_exhausts() {
        let count = Arc::new(AtomicUsize::new(0));
        let target = counted_pair(count.clone());
        let mut table = CallTable::new();
        let mut pull = || table.next_value(1, || open_call(&target, "pair", vec![])).unwrap();

        assert_eq!(pull(), CallStep::Value("a".into()));
        assert_eq!(pull(), CallStep::Value("b".into()));
        assert_eq!(pull(), CallStep::Exhausted);
        assert_eq!(pull(), CallStep::Exhausted);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_call_ids_are_independent() {
        let count = Arc::new(AtomicUsize::new(0));
        let target = counted_pair(count.clone());
        let mut table = CallTable::new();
        let first = table.next_value(1, || open_call(&target, "pair", vec![])).unwrap();
        let second = table.next_value(2, || open_call(&target, "pair", vec![])).unwrap();
        assert_eq!(first, CallStep::Value("a".into()));
        assert_eq!(second, CallStep::Value("a".into()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn absent_member_is_not_an_error() {
        let target = Instance::new(Record::new("R", &[]));
        let mut table = CallTable::new();
        let step = table.next_value(9, || open_call(&target, "missing", vec![])).unwrap();
        assert_eq!(step, CallStep::Absent);
        let again = table.next_value(9, || panic!("must not reopen")).unwrap();
        assert_eq!(again, CallStep::Absent);
    }

    #[test]
    fn plain_attribute_yields_once() {
        let target = Instance::new(Record::new("R", &[]).with_field("x", 3));
        let mut table = CallTable::new();
        assert_eq!(
            table.next_value(1, || open_call(&target, "x", vec![])).unwrap(),
            CallStep::Value(HostValue::Integer(3))
        );
        assert_eq!(
            table.next_value(1, || open_call(&target, "x", vec![])).unwrap(),
            CallStep::Exhausted
        );
    }

    #[test]
    fn list_result_is_one_value() {
        let target = Instance::new(
            Record::new("R", &[]).with_method("xs", |_| Ok(Output::Value(HostValue::from(vec![1i64, 2])))),
        );
        let mut table = CallTable::new();
        let step = table.next_value(1, || open_call(&target, "xs", vec![])).unwrap();
        assert_eq!(step, CallStep::Value(HostValue::from(vec![1i64, 2])));
    }

    #[test]
    fn none_output_is_empty() {
        let target = Instance::new(Record::new("R", &[]).with_method("nothing", |_| Ok(Output::None)));
        let mut table = CallTable::new();
        let step = table.next_value(1, || open_call(&target, "nothing", vec![])).unwrap();
        assert_eq!(step, CallStep::Exhausted);
    }

    #[test]
    fn arguments_reach_the_method() {
        let target = Instance::new(Record::new("R", &[]).with_method("add", |args| {
            let sum: i64 = args.iter().filter_map(HostValue::as_i64).sum();
            Ok(Output::Value(sum.into()))
        }));
        let mut table = CallTable::new();
        let step = table
            .next_value(1, || open_call(&target, "add", vec![2.into(), 5.into()]))
            .unwrap();
        assert_eq!(step, CallStep::Value(HostValue::Integer(7)));
    }

    #[test]
    fn method_error_is_wrapped() {
        let target =
            Instance::new(Record::new("R", &[]).with_method("boom", |_| Err("kaboom".into())));
        let mut table = CallTable::new();
        let err = table
            .next_value(1, || open_call(&target, "boom", vec![]))
            .unwrap_err();
        assert!(matches!(err, PolarError::ExternalCallFailed { attribute, .. } if attribute == "boom"));
    }
}

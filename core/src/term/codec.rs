//! Term codec: host values to engine terms and back.
//!
//! Primitive values map directly to their tag. Anything else crossing to
//! the engine is externalized through the instance registry, and comes back
//! as the very same host object.

use tracing::trace;

use crate::error::PolarError;
use crate::host::{
    ClassRegistry, Fields, HandleAllocator, HostValue, Instance, InstanceRegistry, Predicate,
};
use super::{Call, Dictionary, ExternalInstance, InstanceId, InstanceLiteral, Symbol, Term, Value};

pub struct Codec<'a> {
    instances: &'a mut InstanceRegistry,
    classes: &'a ClassRegistry,
    allocator: &'a mut dyn HandleAllocator,
}

impl<'a> Codec<'a> {
    pub fn new(
        instances: &'a mut InstanceRegistry,
        classes: &'a ClassRegistry,
        allocator: &'a mut dyn HandleAllocator,
    ) -> Self {
        Codec {
            instances,
            classes,
            allocator,
        }
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    pub fn to_host(&mut self, term: &Term) -> Result<HostValue, PolarError> {
        let value = match &term.value {
            Value::Integer(i) => HostValue::Integer(*i),
            Value::Float(f) => HostValue::Float(*f),
            Value::Boolean(b) => HostValue::Boolean(*b),
            Value::String(s) => HostValue::String(s.clone()),
            Value::List(items) => HostValue::List(
                items
                    .iter()
                    .map(|t| self.to_host(t))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Dictionary(dict) => HostValue::Dictionary(self.decode_fields(dict)?),
            Value::ExternalInstance(ExternalInstance { instance_id }) => {
                HostValue::Instance(self.instances.resolve(*instance_id)?)
            }
            Value::InstanceLiteral(literal) => {
                HostValue::Instance(self.make_instance(literal, None)?)
            }
            Value::Call(call) => HostValue::Predicate(Predicate {
                name: call.name.clone(),
                args: call
                    .args
                    .iter()
                    .map(|t| self.to_host(t))
                    .collect::<Result<_, _>>()?,
            }),
            Value::Symbol(Symbol(name)) => return Err(PolarError::UnboundVariable(name.clone())),
        };
        Ok(value)
    }

    pub fn args_to_host(&mut self, args: &[Term]) -> Result<Vec<HostValue>, PolarError> {
        args.iter().map(|t| self.to_host(t)).collect()
    }

    fn decode_fields(&mut self, dict: &Dictionary) -> Result<Fields, PolarError> {
        dict.fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.to_host(v)?)))
            .collect()
    }

    /// Materialize an instance literal. With `id`, the instance is bound
    /// under that engine-chosen handle, which must be unused; otherwise it
    /// is externalized under a fresh one.
    pub fn make_instance(
        &mut self,
        literal: &InstanceLiteral,
        id: Option<InstanceId>,
    ) -> Result<Instance, PolarError> {
        if let Some(id) = id {
            if self.instances.is_bound(id) {
                return Err(PolarError::HandleAlreadyBound(id));
            }
        }
        let fields = self.decode_fields(&literal.fields)?;
        let instance = self.classes.construct(&literal.tag, fields)?;
        match id {
            Some(id) => self.instances.bind_new(id, instance.clone())?,
            None => {
                self.instances.externalize(&mut *self.allocator, &instance)?;
            }
        }
        trace!(class = %literal.tag, "instance materialized");
        Ok(instance)
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    pub fn to_term(&mut self, value: &HostValue) -> Result<Term, PolarError> {
        let value = match value {
            HostValue::Integer(i) => Value::Integer(*i),
            HostValue::Float(f) => Value::Float(*f),
            HostValue::Boolean(b) => Value::Boolean(*b),
            HostValue::String(s) => Value::String(s.clone()),
            HostValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.to_term(v))
                    .collect::<Result<_, _>>()?,
            ),
            HostValue::Dictionary(map) => {
                let mut dict = Dictionary::default();
                for (k, v) in map {
                    dict.fields.insert(k.clone(), self.to_term(v)?);
                }
                Value::Dictionary(dict)
            }
            HostValue::Predicate(p) => Value::Call(self.predicate_to_call(p)?),
            HostValue::Variable(v) => Value::Symbol(Symbol(v.0.clone())),
            HostValue::Instance(instance) => {
                let instance_id = self.instances.externalize(&mut *self.allocator, instance)?;
                Value::ExternalInstance(ExternalInstance { instance_id })
            }
        };
        Ok(Term::new(value))
    }

    pub fn predicate_to_call(&mut self, predicate: &Predicate) -> Result<Call, PolarError> {
        Ok(Call {
            name: predicate.name.clone(),
            args: predicate
                .args
                .iter()
                .map(|v| self.to_term(v))
                .collect::<Result<_, _>>()?,
        })
    }
}

//! Dynamic host objects.
//!
//! A [`Record`] is a host object whose class, ancestors, fields and methods
//! are data rather than a Rust type. Config-declared classes and the CLI use
//! it; so do tests that need a quick object graph.

use std::any::Any;
use std::collections::BTreeMap;

use super::{Fields, HostClass, HostObject, HostValue, Instance, Member, Method, Output};

#[derive(Debug, Clone)]
pub struct Record {
    class_path: Vec<String>,
    fields: BTreeMap<String, HostValue>,
    methods: BTreeMap<String, Method>,
}

impl Record {
    /// A record of class `class` whose ancestors are `parents`, most
    /// specific first.
    pub fn new(class: &str, parents: &[&str]) -> Self {
        let mut class_path = vec![class.to_string()];
        class_path.extend(parents.iter().map(|p| p.to_string()));
        Record {
            class_path,
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<HostValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<Output, String> + Send + Sync + 'static,
    {
        self.methods.insert(name.to_string(), Method::new(f));
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_path[0]
    }

    pub fn field(&self, name: &str) -> Option<&HostValue> {
        self.fields.get(name)
    }

    /// A `HostClass` whose default constructor builds records, requiring
    /// every name in `required` to be present among the literal's fields.
    pub fn class(id: &str, parents: &[&str], required: &[&str]) -> HostClass {
        let class: String = id.to_string();
        let parents: Vec<String> = parents.iter().map(|p| p.to_string()).collect();
        let required: Vec<String> = required.iter().map(|r| r.to_string()).collect();
        HostClass::new(id).with_constructor(move |fields| {
            if let Some(missing) = required.iter().find(|r| !fields.contains_key(*r)) {
                return Err(format!("missing required field '{}'", missing));
            }
            let parent_refs: Vec<&str> = parents.iter().map(|p| p.as_str()).collect();
            Ok(Instance::new(Record::new(&class, &parent_refs).with_fields(fields)))
        })
    }
}

impl HostObject for Record {
    fn class_path(&self) -> Vec<String> {
        self.class_path.clone()
    }

    fn attribute(&self, name: &str) -> Option<Member> {
        if let Some(value) = self.fields.get(name) {
            return Some(Member::Value(value.clone()));
        }
        self.methods.get(name).cloned().map(Member::Method)
    }

    /// Records compare by class and fields.
    fn equals(&self, other: &dyn HostObject) -> bool {
        match other.as_any().downcast_ref::<Record>() {
            Some(other) => self.class_path == other.class_path && self.fields == other.fields,
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

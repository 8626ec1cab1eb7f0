//! Host bridge for an embedded rule engine.
//!
//! The engine evaluates rules and knows nothing about host objects. It asks
//! the host through events (attribute lookups, class tests, specializer
//! ordering, equality) and the bridge answers them from the class and
//! instance registries. [`Polar`] ties it together; [`LocalEngine`] is the
//! in-process engine used by default.

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod polar;
pub mod term;

pub use config::BridgeConfig;
pub use engine::{Engine, LocalEngine, QueryEvent};
pub use error::{ErrorPayload, ParseError, PolarError};
pub use host::{
    Bindings, ClassRegistry, Constructor, HostClass, HostObject, HostValue, Instance, Member,
    Output, Predicate, Record, Variable,
};
pub use polar::{Polar, Query, QueryResult};

//! Error taxonomy for the bridge.
//!
//! Engine failures arrive as a structured [`ErrorPayload`] whose outer tag
//! (`Parse`, `Runtime`, `Operational`) selects the [`PolarError`] kind.
//! Bridge-local conditions (unbound handles, unregistered classes, ...) are
//! raised directly by the registries and the query loop.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::term::InstanceId;


// ---------------------------------------------------------------------------
// Engine payloads
// ---------------------------------------------------------------------------

/// Errors raised while reading rule source. Positions are byte offsets into
/// the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ParseError {
    #[error("integer overflow at position {pos}: '{token}'")]
    IntegerOverflow { token: String, pos: usize },

    #[error("invalid character {c:?} in token '{token}' at position {pos}")]
    InvalidTokenCharacter { token: String, c: char, pos: usize },

    #[error("invalid token at position {pos}")]
    InvalidToken { pos: usize },

    #[error("unexpected end of input at position {pos}")]
    UnrecognizedEOF { pos: usize },

    #[error("unrecognized token '{token}' at position {pos}")]
    UnrecognizedToken { token: String, pos: usize },

    #[error("extra token '{token}' at position {pos}")]
    ExtraToken { token: String, pos: usize },
}

impl ParseError {
    /// Byte offset of the offending token or character.
    pub fn pos(&self) -> usize {
        match self {
            ParseError::IntegerOverflow { pos, .. }
            | ParseError::InvalidTokenCharacter { pos, .. }
            | ParseError::InvalidToken { pos }
            | ParseError::UnrecognizedEOF { pos }
            | ParseError::UnrecognizedToken { pos, .. }
            | ParseError::ExtraToken { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalError {
    Unknown,
}

/// The structured error an engine reports for a failed boundary call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorPayload {
    Parse(ParseError),
    Runtime(serde_json::Value),
    Operational(OperationalError),
}

impl ErrorPayload {
    /// Convenience for engines reporting a runtime failure with a message.
    pub fn runtime(kind: &str, msg: impl Into<String>) -> Self {
        ErrorPayload::Runtime(serde_json::json!({ kind: { "msg": msg.into() } }))
    }
}


// ---------------------------------------------------------------------------
// PolarError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PolarError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("runtime error: {0}")]
    Runtime(serde_json::Value),

    #[error("unknown internal error: {0}")]
    Unknown(String),

    #[error("unregistered instance handle {0}")]
    UnboundHandle(InstanceId),

    #[error("instance handle {0} is already bound")]
    HandleAlreadyBound(InstanceId),

    #[error("variable '{0}' is unbound; make sure it is set before it reaches the host")]
    UnboundVariable(String),

    #[error("class '{0}' has not been registered")]
    UnregisteredClass(String),

    #[error("error creating instance of class {class_name}: {cause}")]
    InstanceConstructionFailed { class_name: String, cause: String },

    #[error("external call to '{attribute}' failed: {cause}")]
    ExternalCallFailed { attribute: String, cause: String },

    #[error("engine could not allocate a new instance handle")]
    EngineExhausted,

    #[error("inline query failed: {0}")]
    InlineQueryFailed(String),

    #[error("{0}")]
    Api(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("debugger input failed: {0}")]
    Debugger(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl From<ErrorPayload> for PolarError {
    fn from(payload: ErrorPayload) -> Self {
        match payload {
            ErrorPayload::Parse(e) => PolarError::Parse(e),
            ErrorPayload::Runtime(data) => PolarError::Runtime(data),
            ErrorPayload::Operational(OperationalError::Unknown) => {
                PolarError::Unknown("engine aborted; see console".into())
            }
        }
    }
}

impl PolarError {
    pub fn is_parse(&self) -> bool {
        matches!(self, PolarError::Parse(_))
    }
}

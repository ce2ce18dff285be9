use thiserror::Error;

/// Errors raised while parsing names that come from outside the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown pattern: {0}")]
    UnknownPattern(String),

    #[error("unknown transport kind: {0}")]
    UnknownTransport(String),
}

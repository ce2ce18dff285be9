//! Error types for the simulation engine.

use meshsim_types::{ParseError, Pattern};
use thiserror::Error;

/// Failure of an outbound call between simulated nodes.
///
/// Never escapes a hop: the invoker turns it into a `500` end event and a
/// descriptive response string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{destination} is unreachable: {reason}")]
    Unreachable { destination: String, reason: String },

    #[error("no node named {node} in the {pattern} topology")]
    UnknownNode { pattern: Pattern, node: String },

    #[error("transport is shut down")]
    Unavailable { destination: String },
}

impl TransportError {
    /// Node the failed call was addressed to.
    pub fn destination(&self) -> &str {
        match self {
            TransportError::Unreachable { destination, .. } => destination,
            TransportError::UnknownNode { node, .. } => node,
            TransportError::Unavailable { destination } => destination,
        }
    }

    /// Why the call failed, without the destination.
    pub fn reason(&self) -> String {
        match self {
            TransportError::Unreachable { reason, .. } => reason.clone(),
            TransportError::UnknownNode { pattern, .. } => {
                format!("no such node in the {} topology", pattern)
            }
            TransportError::Unavailable { .. } => "transport is shut down".to_string(),
        }
    }
}

/// Errors from building or configuring a simulator.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no policy registered for pattern {0}")]
    UnknownPattern(Pattern),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("tracing initialization failed: {0}")]
    Tracing(String),
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for SimError {
    fn from(e: config::ConfigError) -> Self {
        SimError::Config(e.to_string())
    }
}

/// Result type for simulator construction and configuration.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_names_destination() {
        let err = TransportError::Unreachable {
            destination: "service-b".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.destination(), "service-b");
        assert_eq!(err.to_string(), "service-b is unreachable: connection refused");
        assert_eq!(err.reason(), "connection refused");

        let unknown = TransportError::UnknownNode {
            pattern: Pattern::Knot,
            node: "knot-service-Z".into(),
        };
        assert_eq!(unknown.destination(), "knot-service-Z");
        assert_eq!(
            unknown.to_string(),
            "no node named knot-service-Z in the knot topology"
        );
    }

    #[test]
    fn parse_errors_convert() {
        let err: SimError = ParseError::UnknownPattern("mesh".into()).into();
        assert_eq!(err.to_string(), "unknown pattern: mesh");
    }
}

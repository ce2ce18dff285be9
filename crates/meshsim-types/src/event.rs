//! Trace events emitted for every hop.
//!
//! Each hop produces exactly two events: a start event when the hop is
//! entered and an end event once its work, including nested calls, is done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::TraceContext;
use crate::error::ParseError;

/// HTTP-style status code attached to trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// Interim code logged when a hop starts.
    pub const PROCESSING: StatusCode = StatusCode(102);
    pub const OK: StatusCode = StatusCode(200);
    pub const INTERNAL_ERROR: StatusCode = StatusCode(500);

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_error(self) -> bool {
        self.0 >= 500
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a hop reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Synchronous request/response call.
    #[serde(rename = "GET")]
    Request,
    /// Asynchronous event hand-off.
    #[serde(rename = "EVENT")]
    Event,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Request => "GET",
            TransportKind::Event => "EVENT",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" | "REQUEST" => Ok(TransportKind::Request),
            "EVENT" => Ok(TransportKind::Event),
            _ => Err(ParseError::UnknownTransport(s.to_string())),
        }
    }
}

/// Which half of a hop an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopPhase {
    Start,
    End,
}

/// A record of one hop starting or finishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Node executing the hop
    pub source: String,

    /// Node the hop targets (absent for terminal nodes)
    pub destination: Option<String>,

    /// Logical operation name
    pub operation: String,

    pub transport: TransportKind,

    /// Request payload received by the hop
    pub request: String,

    /// Status code (interim or absent on start, final on end)
    pub status: Option<StatusCode>,

    /// Response payload (absent on start)
    pub response: Option<String>,

    pub phase: HopPhase,

    pub recorded_at: DateTime<Utc>,

    /// Full context of the hop
    pub context: TraceContext,
}

impl TraceEvent {
    /// Event marking the start of a hop.
    pub fn start(
        source: impl Into<String>,
        destination: Option<String>,
        operation: impl Into<String>,
        transport: TransportKind,
        request: impl Into<String>,
        status: Option<StatusCode>,
        context: TraceContext,
    ) -> Self {
        Self {
            source: source.into(),
            destination,
            operation: operation.into(),
            transport,
            request: request.into(),
            status,
            response: None,
            phase: HopPhase::Start,
            recorded_at: Utc::now(),
            context,
        }
    }

    /// Matching end event for this hop.
    pub fn finish(&self, status: StatusCode, response: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            response: Some(response.into()),
            phase: HopPhase::End,
            recorded_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn is_start(&self) -> bool {
        self.phase == HopPhase::Start
    }

    pub fn is_end(&self) -> bool {
        self.phase == HopPhase::End
    }
}

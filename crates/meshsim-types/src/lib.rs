//! meshsim Types - Core types for trace propagation simulation
//!
//! Every simulated request forms a tree of hops. Each hop is described by a
//! [`TraceContext`] and produces a pair of [`TraceEvent`]s: one when the hop
//! starts and one when it ends.
//!
//! ## Key Concepts
//!
//! - **TraceContext**: trace id, span id, parent span id and depth of one hop
//! - **TraceHeaders**: the wire form of a context carried between nodes
//! - **TraceEvent**: a start or end record handed to an event sink
//! - **Pattern**: the named topology shapes the engine can traverse

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod context;
pub mod error;
pub mod event;
pub mod headers;
pub mod ids;
pub mod pattern;

pub use context::TraceContext;
pub use error::ParseError;
pub use event::{HopPhase, StatusCode, TraceEvent, TransportKind};
pub use headers::{TraceHeaders, DEPTH_HEADER, SPAN_ID_HEADER, TRACE_ID_HEADER};
pub use ids::{IdSource, SequentialIds, SpanId, TraceId, UuidIds};
pub use pattern::Pattern;

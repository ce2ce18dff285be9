//! meshsim Engine - Trace propagation through simulated service topologies
//!
//! The engine walks fixed call-graph shapes that exhibit microservice
//! anti-patterns and records a start and an end [`TraceEvent`] for every hop.
//!
//! ## Architecture
//!
//! ```text
//! Simulator ──► Engine ──► TopologyPolicy::plan
//!                 │
//!                 ▼
//!              Invoker ──► EventSink
//!                 │
//!                 ▼
//!             Transport ──► Engine::handle (callee node)
//! ```
//!
//! Failures of delegated calls never escape a hop: they become `500` end
//! events and a `"Failed to reach ..."` response.
//!
//! [`TraceEvent`]: meshsim_types::TraceEvent

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod consistency;
pub mod engine;
pub mod error;
pub mod invoker;
pub mod simulator;
pub mod sink;
pub mod telemetry;
pub mod topology;
pub mod transport;

pub use config::{ChattyMode, LoggingConfig, SimulatorConfig};
pub use consistency::{EventualConsistency, SimulatedDatabase, STALE_RESPONSE, WRITE_ACCEPTED_RESPONSE};
pub use engine::Engine;
pub use error::{Result, SimError, TransportError};
pub use invoker::{Hop, Invoker, OpenHop};
pub use simulator::{SimulationOutcome, Simulator, SimulatorBuilder};
pub use sink::{
    read_events, CompositeSink, EventSink, FileEventSink, MemoryEventSink, TracingEventSink,
};
pub use telemetry::init_tracing;
pub use topology::{Topology, TopologyPolicy, MAX_DEPTH_RESPONSE};
pub use transport::{CallRequest, LocalTransport, Transport};

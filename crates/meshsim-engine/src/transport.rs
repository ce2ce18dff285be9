//! Outbound calls between simulated nodes.

use async_trait::async_trait;
use meshsim_types::{Pattern, TraceHeaders};
use std::collections::HashMap;
use std::sync::Weak;
use tracing::debug;

use crate::engine::Engine;
use crate::error::TransportError;

/// A call from one hop to a named node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Topology the destination node belongs to
    pub pattern: Pattern,
    pub destination: String,
    /// Request payload
    pub input: String,
    /// Trace headers for the callee
    pub headers: TraceHeaders,
}

/// Delivers calls to nodes and returns their response payload.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: CallRequest) -> Result<String, TransportError>;
}

/// In-process transport routing calls straight back into the engine.
///
/// Nodes registered with [`LocalTransport::with_faults`] behave as if
/// unreachable.
pub struct LocalTransport {
    engine: Weak<Engine>,
    faults: HashMap<(Pattern, String), String>,
}

impl LocalTransport {
    pub fn new(engine: Weak<Engine>) -> Self {
        Self {
            engine,
            faults: HashMap::new(),
        }
    }

    pub fn with_faults(mut self, faults: HashMap<(Pattern, String), String>) -> Self {
        self.faults.extend(faults);
        self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn call(&self, request: CallRequest) -> Result<String, TransportError> {
        if let Some(reason) = self
            .faults
            .get(&(request.pattern, request.destination.clone()))
        {
            debug!(
                pattern = %request.pattern,
                destination = %request.destination,
                "Injected transport failure"
            );
            return Err(TransportError::Unreachable {
                destination: request.destination,
                reason: reason.clone(),
            });
        }

        let engine = self.engine.upgrade().ok_or_else(|| TransportError::Unavailable {
            destination: request.destination.clone(),
        })?;

        engine
            .handle(
                request.pattern,
                &request.destination,
                request.input,
                &request.headers,
            )
            .await
    }
}

use meshsim_types::{Pattern, TraceContext};
use std::time::Duration;

use super::{HopPlan, TopologyPolicy};

/// A single terminal node answering after a fixed delay.
#[derive(Debug, Clone)]
pub struct SingleHopPolicy {
    pattern: Pattern,
    node: &'static str,
    destination: Option<&'static str>,
    operation: &'static str,
    response: &'static str,
    latency: Duration,
}

impl SingleHopPolicy {
    pub fn nano_service(latency: Duration) -> Self {
        Self {
            pattern: Pattern::NanoService,
            node: "nano-service",
            destination: None,
            operation: "nanoService",
            response: "Nano service executed a simple task.",
            latency,
        }
    }

    /// Blocking call to a database.
    pub fn sync_overuse(latency: Duration) -> Self {
        Self {
            pattern: Pattern::SyncOveruse,
            node: "sync-overuse-service",
            destination: Some("database"),
            operation: "syncCallOveruse",
            response: "Synchronous Call Overuse detected!",
            latency,
        }
    }

    /// Gateway doing all the backend's work inline.
    pub fn gateway_overuse(latency: Duration) -> Self {
        Self {
            pattern: Pattern::GatewayOveruse,
            node: "api-gateway",
            destination: Some("backend-service"),
            operation: "apiGatewayOveruse",
            response: "API Gateway overloaded!",
            latency,
        }
    }
}

impl TopologyPolicy for SingleHopPolicy {
    fn pattern(&self) -> Pattern {
        self.pattern
    }

    fn entry_nodes(&self) -> Vec<String> {
        vec![self.node.to_string()]
    }

    fn plan(&self, node: &str, _ctx: &TraceContext) -> Option<HopPlan> {
        if node != self.node {
            return None;
        }
        let plan = HopPlan::respond(self.operation, self.response).after(self.latency);
        Some(match self.destination {
            Some(destination) => plan.to(destination),
            None => plan,
        })
    }
}

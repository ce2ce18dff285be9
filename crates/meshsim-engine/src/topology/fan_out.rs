use meshsim_types::{Pattern, TraceContext};
use std::time::Duration;

use super::{Aggregate, Dispatch, HopAction, HopPlan, TopologyPolicy};

const MAIN: &str = "fan-out-main-service";

/// One origin calling every downstream node concurrently.
#[derive(Debug, Clone)]
pub struct FanOutPolicy {
    downstream: Vec<String>,
    latency: Duration,
}

impl FanOutPolicy {
    pub fn new(downstream: Vec<String>, latency: Duration) -> Self {
        Self {
            downstream,
            latency,
        }
    }
}

impl TopologyPolicy for FanOutPolicy {
    fn pattern(&self) -> Pattern {
        Pattern::FanOut
    }

    fn entry_nodes(&self) -> Vec<String> {
        vec![MAIN.to_string()]
    }

    fn plan(&self, node: &str, _ctx: &TraceContext) -> Option<HopPlan> {
        if node == MAIN {
            return Some(
                HopPlan::new(
                    "executeFanOut",
                    HopAction::Scatter {
                        targets: self.downstream.clone(),
                        dispatch: Dispatch::Concurrent,
                        client_operation: Some("invokeDownstreamService".to_string()),
                        aggregate: Aggregate::Prefixed("Fan-out responses: ".to_string()),
                    },
                )
                .to("fan-out-multiple-services"),
            );
        }
        if !self.downstream.iter().any(|d| d == node) {
            return None;
        }
        Some(
            HopPlan::respond(
                "processDownstreamService",
                format!("{} processed the request.", node),
            )
            .after(self.latency),
        )
    }
}

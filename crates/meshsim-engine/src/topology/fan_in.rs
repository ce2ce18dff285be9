use meshsim_types::{Pattern, TraceContext};
use std::time::Duration;

use super::{HopAction, HopPlan, TopologyPolicy};

const OVERLOADED: &str = "fan-in-overloaded-service";

/// Independent upstreams all hitting one slow node.
#[derive(Debug, Clone)]
pub struct FanInPolicy {
    upstreams: Vec<String>,
    latency: Duration,
}

impl FanInPolicy {
    pub fn new(upstreams: Vec<String>, latency: Duration) -> Self {
        Self { upstreams, latency }
    }
}

impl TopologyPolicy for FanInPolicy {
    fn pattern(&self) -> Pattern {
        Pattern::FanIn
    }

    fn entry_nodes(&self) -> Vec<String> {
        self.upstreams.clone()
    }

    fn plan(&self, node: &str, _ctx: &TraceContext) -> Option<HopPlan> {
        if node == OVERLOADED {
            return Some(
                HopPlan::respond(
                    "processOverloadedService",
                    "Overloaded service processed the request.",
                )
                .after(self.latency),
            );
        }
        if !self.upstreams.iter().any(|u| u == node) {
            return None;
        }
        Some(
            HopPlan::new(
                "invokeOverloadedService",
                HopAction::Forward {
                    next: OVERLOADED.to_string(),
                },
            )
            .to(OVERLOADED),
        )
    }
}

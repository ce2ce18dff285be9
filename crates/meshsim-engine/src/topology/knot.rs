use meshsim_types::{Pattern, TraceContext};

use super::{Aggregate, Dispatch, HopAction, HopPlan, TopologyPolicy};

const MEMBERS: [&str; 3] = ["knot-service-A", "knot-service-B", "knot-service-C"];
const OPERATION: &str = "knotProcessing";

/// Three tightly coupled nodes, each calling both of the others in turn.
#[derive(Debug, Clone)]
pub struct KnotPolicy {
    max_depth: u32,
}

impl KnotPolicy {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// The two nodes `node` calls, in call order.
    fn edges(index: usize) -> Vec<String> {
        (1..MEMBERS.len())
            .map(|offset| MEMBERS[(index + offset) % MEMBERS.len()].to_string())
            .collect()
    }
}

impl TopologyPolicy for KnotPolicy {
    fn pattern(&self) -> Pattern {
        Pattern::Knot
    }

    fn entry_nodes(&self) -> Vec<String> {
        vec![MEMBERS[0].to_string()]
    }

    fn plan(&self, node: &str, ctx: &TraceContext) -> Option<HopPlan> {
        let index = MEMBERS.iter().position(|m| *m == node)?;
        if self.depth_exceeded(ctx.depth) {
            return Some(HopPlan::depth_exceeded(OPERATION));
        }
        let targets = Self::edges(index);
        let label = targets.join(",");
        Some(
            HopPlan::new(
                OPERATION,
                HopAction::Scatter {
                    targets,
                    dispatch: Dispatch::Sequential,
                    client_operation: None,
                    aggregate: Aggregate::Distinct,
                },
            )
            .to(label),
        )
    }

    fn depth_exceeded(&self, depth: u32) -> bool {
        depth >= self.max_depth
    }
}

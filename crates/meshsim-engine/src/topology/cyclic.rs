use meshsim_types::{Pattern, TraceContext};

use super::{HopAction, HopPlan, TopologyPolicy};

const OPERATION: &str = "invokeCyclicService";

/// Ring `cyclic-service-A -> B -> ... -> A`, cut off at the depth bound.
#[derive(Debug, Clone)]
pub struct CyclicPolicy {
    members: Vec<String>,
    max_depth: u32,
}

impl CyclicPolicy {
    /// `members` is clamped to the letters `A..=Z`.
    pub fn new(members: usize, max_depth: u32) -> Self {
        let members = (b'A'..=b'Z')
            .take(members.clamp(2, 26))
            .map(|letter| format!("cyclic-service-{}", letter as char))
            .collect();
        Self { members, max_depth }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }
}

impl TopologyPolicy for CyclicPolicy {
    fn pattern(&self) -> Pattern {
        Pattern::Cyclic
    }

    fn entry_nodes(&self) -> Vec<String> {
        self.members[..1].to_vec()
    }

    fn plan(&self, node: &str, ctx: &TraceContext) -> Option<HopPlan> {
        let index = self.members.iter().position(|m| m == node)?;
        if self.depth_exceeded(ctx.depth) {
            return Some(HopPlan::depth_exceeded(OPERATION));
        }
        let next = self.members[(index + 1) % self.members.len()].clone();
        Some(HopPlan::new(OPERATION, HopAction::Forward { next: next.clone() }).to(next))
    }

    fn depth_exceeded(&self, depth: u32) -> bool {
        depth >= self.max_depth
    }
}

use meshsim_types::{Pattern, TraceContext};

use super::{HopAction, HopPlan, TopologyPolicy};

const START: &str = "long-chain-start-service";
const END: &str = "long-chain-end-service";

/// Linear chain: start, `middle1..`, end. Every node forwards to its successor.
#[derive(Debug, Clone)]
pub struct LongChainPolicy {
    /// Forwarding nodes, start included
    intermediaries: usize,
}

impl LongChainPolicy {
    pub fn new(intermediaries: usize) -> Self {
        Self {
            intermediaries: intermediaries.max(1),
        }
    }

    /// Node names in call order, end node last.
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes = Vec::with_capacity(self.intermediaries + 1);
        nodes.push(START.to_string());
        nodes.extend((1..self.intermediaries).map(middle));
        nodes.push(END.to_string());
        nodes
    }

    fn successor(&self, node: &str) -> Option<String> {
        let nodes = self.nodes();
        let index = nodes.iter().position(|n| n == node)?;
        nodes.get(index + 1).cloned()
    }
}

fn middle(index: usize) -> String {
    format!("long-chain-middle{}-service", index)
}

impl TopologyPolicy for LongChainPolicy {
    fn pattern(&self) -> Pattern {
        Pattern::LongChain
    }

    fn entry_nodes(&self) -> Vec<String> {
        vec![START.to_string()]
    }

    fn plan(&self, node: &str, _ctx: &TraceContext) -> Option<HopPlan> {
        if node == END {
            return Some(HopPlan::respond(
                "finalizeLongChain",
                "Final service processed the request.",
            ));
        }

        let next = self.successor(node)?;
        let operation = if node == START {
            "initiateLongChain".to_string()
        } else {
            let short = node
                .trim_start_matches("long-chain-")
                .trim_end_matches("-service");
            format!("process{}", short)
        };
        Some(HopPlan::new(operation, HopAction::Forward { next: next.clone() }).to(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_types::SequentialIds;

    #[test]
    fn default_chain_has_five_middles() {
        let nodes = LongChainPolicy::new(6).nodes();
        assert_eq!(nodes.len(), 7);
        assert_eq!(nodes[0], START);
        assert_eq!(nodes[5], "long-chain-middle5-service");
        assert_eq!(nodes[6], END);
    }

    #[test]
    fn middles_forward_to_their_successor() {
        let policy = LongChainPolicy::new(3);
        let ctx = TraceContext::new_root(&SequentialIds::new("c"), None, None);

        let plan = policy.plan("long-chain-middle1-service", &ctx).unwrap();
        assert_eq!(plan.operation, "processmiddle1");
        assert_eq!(
            plan.action,
            HopAction::Forward {
                next: "long-chain-middle2-service".into()
            }
        );

        let plan = policy.plan("long-chain-middle2-service", &ctx).unwrap();
        assert_eq!(plan.destination.as_deref(), Some(END));

        assert!(policy.plan("long-chain-middle3-service", &ctx).is_none());
    }

    #[test]
    fn single_intermediary_goes_straight_to_end() {
        let policy = LongChainPolicy::new(1);
        let ctx = TraceContext::new_root(&SequentialIds::new("c"), None, None);
        let plan = policy.plan(START, &ctx).unwrap();
        assert_eq!(plan.operation, "initiateLongChain");
        assert_eq!(plan.destination.as_deref(), Some(END));
    }
}

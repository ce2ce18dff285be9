//! Topology policies: who calls whom for each pattern.
//!
//! A policy never performs a call itself. Given the node being entered and
//! its trace context, it returns a [`HopPlan`] describing what the hop does;
//! the engine carries the plan out.

mod chain;
mod chatty;
mod cyclic;
mod fan_in;
mod fan_out;
mod knot;
mod single;

pub use chain::LongChainPolicy;
pub use chatty::ChattyPolicy;
pub use cyclic::CyclicPolicy;
pub use fan_in::FanInPolicy;
pub use fan_out::FanOutPolicy;
pub use knot::KnotPolicy;
pub use single::SingleHopPolicy;

use meshsim_types::{Pattern, TraceContext, TransportKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SimulatorConfig;

/// Response of a node that refuses to recurse past the depth bound.
pub const MAX_DEPTH_RESPONSE: &str = "Max recursion depth reached.";

/// What a node does when entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopPlan {
    pub operation: String,
    /// Label recorded as the hop's destination
    pub destination: Option<String>,
    pub transport: TransportKind,
    pub action: HopAction,
}

impl HopPlan {
    pub fn new(operation: impl Into<String>, action: HopAction) -> Self {
        Self {
            operation: operation.into(),
            destination: None,
            transport: TransportKind::Request,
            action,
        }
    }

    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Terminal plan answering `response` after `latency`.
    pub fn respond(operation: impl Into<String>, response: impl Into<String>) -> Self {
        Self::new(
            operation,
            HopAction::Respond {
                response: response.into(),
                latency: Duration::ZERO,
            },
        )
    }

    pub fn after(mut self, delay: Duration) -> Self {
        if let HopAction::Respond { latency, .. } = &mut self.action {
            *latency = delay;
        }
        self
    }

    /// Terminal plan for a node entered at or past the depth bound.
    pub fn depth_exceeded(operation: impl Into<String>) -> Self {
        Self::respond(operation, MAX_DEPTH_RESPONSE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopAction {
    /// Answer locally.
    Respond { response: String, latency: Duration },

    /// Call one successor and pass its response back.
    Forward { next: String },

    /// Call several successors and combine their responses.
    Scatter {
        targets: Vec<String>,
        dispatch: Dispatch,
        /// When set, every call gets its own client hop with this operation.
        /// Otherwise calls leave from this hop, and a failed call ends it
        /// with `500`.
        client_operation: Option<String>,
        aggregate: Aggregate,
    },

    /// Run a series of client hops, each fed the previous response.
    Relay {
        legs: Vec<RelayLeg>,
        client_operation: String,
    },
}

const DISTINCT_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sequential,
    Concurrent,
}

/// How scattered responses are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// Join every response in target order with `", "` after a prefix.
    Prefixed(String),
    /// Drop repeated responses and join the rest with `" | "`. Responses
    /// that are themselves distinct joins are flattened first.
    Distinct,
}

impl Aggregate {
    pub fn combine(&self, responses: Vec<String>) -> String {
        match self {
            Aggregate::Prefixed(prefix) => format!("{}{}", prefix, responses.join(", ")),
            Aggregate::Distinct => {
                let mut distinct: Vec<String> = Vec::with_capacity(responses.len());
                for part in responses.iter().flat_map(|r| r.split(DISTINCT_SEPARATOR)) {
                    if !distinct.iter().any(|d| d == part) {
                        distinct.push(part.to_string());
                    }
                }
                distinct.join(DISTINCT_SEPARATOR)
            }
        }
    }
}

/// One exchange of a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayLeg {
    /// Node recorded as the caller of this exchange
    pub source: String,
    pub target: LegTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegTarget {
    /// Call the node.
    Node(String),
    /// No callee left; answer with the message.
    End(String),
}

/// Node set and edge rule of one pattern.
pub trait TopologyPolicy: Send + Sync {
    fn pattern(&self) -> Pattern;

    /// Nodes a simulation run enters, in order.
    fn entry_nodes(&self) -> Vec<String>;

    /// Plan for entering `node` with `ctx`, or `None` if the node is not part
    /// of this topology.
    fn plan(&self, node: &str, ctx: &TraceContext) -> Option<HopPlan>;

    /// Whether a hop at `depth` is past the bound. Unbounded by default.
    fn depth_exceeded(&self, _depth: u32) -> bool {
        false
    }
}

/// Every pattern's policy, built once from configuration.
pub struct Topology {
    policies: HashMap<Pattern, Arc<dyn TopologyPolicy>>,
}

impl Topology {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let single = &config.single_hop;
        let policies: Vec<Arc<dyn TopologyPolicy>> = vec![
            Arc::new(LongChainPolicy::new(config.long_chain.intermediaries)),
            Arc::new(CyclicPolicy::new(config.cyclic.members, config.max_depth)),
            Arc::new(KnotPolicy::new(config.max_depth)),
            Arc::new(FanInPolicy::new(
                config.fan_in.upstreams.clone(),
                config.fan_in.latency(),
            )),
            Arc::new(FanOutPolicy::new(
                config.fan_out.downstream.clone(),
                config.fan_out.latency(),
            )),
            Arc::new(ChattyPolicy::from_config(&config.chatty)),
            Arc::new(SingleHopPolicy::nano_service(Duration::from_millis(
                single.nano_latency_ms,
            ))),
            Arc::new(SingleHopPolicy::sync_overuse(Duration::from_millis(
                single.sync_overuse_latency_ms,
            ))),
            Arc::new(SingleHopPolicy::gateway_overuse(Duration::from_millis(
                single.gateway_latency_ms,
            ))),
        ];

        Self {
            policies: policies.into_iter().map(|p| (p.pattern(), p)).collect(),
        }
    }

    pub fn policy(&self, pattern: Pattern) -> Option<Arc<dyn TopologyPolicy>> {
        self.policies.get(&pattern).cloned()
    }

    pub fn patterns(&self) -> Vec<Pattern> {
        Pattern::ALL
            .into_iter()
            .filter(|p| self.policies.contains_key(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_has_a_policy() {
        let topology = Topology::from_config(&SimulatorConfig::default());
        assert_eq!(topology.patterns(), Pattern::ALL.to_vec());
        for pattern in Pattern::ALL {
            let policy = topology.policy(pattern).unwrap();
            assert_eq!(policy.pattern(), pattern);
            assert!(!policy.entry_nodes().is_empty());
        }
    }

    #[test]
    fn test_prefixed_keeps_order() {
        let combined = Aggregate::Prefixed("Fan-out responses: ".into())
            .combine(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(combined, "Fan-out responses: a, b, a");
    }

    #[test]
    fn test_distinct_drops_repeats() {
        let combined = Aggregate::Distinct.combine(vec![
            MAX_DEPTH_RESPONSE.into(),
            "Failed to reach knot-service-C: down".into(),
            MAX_DEPTH_RESPONSE.into(),
        ]);
        assert_eq!(
            combined,
            "Max recursion depth reached. | Failed to reach knot-service-C: down"
        );
    }

    #[test]
    fn test_distinct_flattens_nested_joins() {
        let combined = Aggregate::Distinct.combine(vec![
            "down | Max recursion depth reached.".into(),
            "down".into(),
        ]);
        assert_eq!(combined, "down | Max recursion depth reached.");
    }

    #[test]
    fn test_after_only_delays_responses() {
        let plan = HopPlan::new("op", HopAction::Forward { next: "b".into() })
            .after(Duration::from_secs(1));
        assert_eq!(plan.action, HopAction::Forward { next: "b".into() });

        let plan = HopPlan::respond("op", "done").after(Duration::from_secs(1));
        assert!(matches!(
            plan.action,
            HopAction::Respond { latency, .. } if latency == Duration::from_secs(1)
        ));
    }
}

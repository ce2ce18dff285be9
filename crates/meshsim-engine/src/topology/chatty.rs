use meshsim_types::{Pattern, TraceContext};

use super::{HopAction, HopPlan, LegTarget, RelayLeg, TopologyPolicy};
use crate::config::{ChattyConfig, ChattyMode};

const PREFIX: &str = "chatty-service-";

/// Excessive back-and-forth driven by `chatty-service-0`.
///
/// In `walk` mode every exchange moves one service further along
/// `chatty-service-0..n`; in `counterpart` mode `chatty-service-0` keeps
/// calling `chatty-service-1`.
#[derive(Debug, Clone)]
pub struct ChattyPolicy {
    mode: ChattyMode,
    services: usize,
    rounds: usize,
}

fn service(index: usize) -> String {
    format!("{}{}", PREFIX, index)
}

impl ChattyPolicy {
    pub fn from_config(config: &ChattyConfig) -> Self {
        Self {
            mode: config.mode,
            services: config.services.max(2),
            rounds: config.rounds.max(1),
        }
    }

    fn legs(&self) -> Vec<RelayLeg> {
        match self.mode {
            ChattyMode::Walk => (0..self.services)
                .map(|i| {
                    let source = service(i);
                    let target = if i + 1 < self.services {
                        LegTarget::Node(service(i + 1))
                    } else {
                        LegTarget::End(format!(
                            "{} reached the end of the chatty interaction.",
                            source
                        ))
                    };
                    RelayLeg { source, target }
                })
                .collect(),
            ChattyMode::Counterpart => (0..self.rounds)
                .map(|_| RelayLeg {
                    source: service(0),
                    target: LegTarget::Node(service(1)),
                })
                .collect(),
        }
    }

    /// Callee index, if `node` is a service this mode ever calls.
    fn callee_index(&self, node: &str) -> Option<usize> {
        let index: usize = node.strip_prefix(PREFIX)?.parse().ok()?;
        let last = match self.mode {
            ChattyMode::Walk => self.services - 1,
            ChattyMode::Counterpart => 1,
        };
        (1..=last).contains(&index).then_some(index)
    }
}

impl TopologyPolicy for ChattyPolicy {
    fn pattern(&self) -> Pattern {
        Pattern::Chatty
    }

    fn entry_nodes(&self) -> Vec<String> {
        vec![service(0)]
    }

    fn plan(&self, node: &str, _ctx: &TraceContext) -> Option<HopPlan> {
        if node == service(0) {
            return Some(
                HopPlan::new(
                    "startChattyInteraction",
                    HopAction::Relay {
                        legs: self.legs(),
                        client_operation: "invokeChattyService".to_string(),
                    },
                )
                .to(service(1)),
            );
        }

        let index = self.callee_index(node)?;
        let plan = HopPlan::respond(
            "processChattyService",
            format!("{} processed the request.", node),
        );
        match self.mode {
            ChattyMode::Walk if index + 1 < self.services => Some(plan.to(service(index + 1))),
            _ => Some(plan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_types::SequentialIds;

    fn policy(mode: ChattyMode, services: usize, rounds: usize) -> ChattyPolicy {
        ChattyPolicy::from_config(&ChattyConfig {
            mode,
            services,
            rounds,
        })
    }

    #[test]
    fn walk_ends_without_a_callee() {
        let legs = policy(ChattyMode::Walk, 3, 1).legs();
        assert_eq!(legs.len(), 3);
        assert_eq!(legs[0].target, LegTarget::Node("chatty-service-1".into()));
        assert_eq!(
            legs[2].target,
            LegTarget::End("chatty-service-2 reached the end of the chatty interaction.".into())
        );
    }

    #[test]
    fn counterpart_repeats_one_edge() {
        let legs = policy(ChattyMode::Counterpart, 15, 4).legs();
        assert_eq!(legs.len(), 4);
        assert!(legs
            .iter()
            .all(|l| l.source == "chatty-service-0"
                && l.target == LegTarget::Node("chatty-service-1".into())));
    }

    #[test]
    fn callees_outside_the_walk_are_unknown() {
        let policy = policy(ChattyMode::Walk, 3, 1);
        let ctx = TraceContext::new_root(&SequentialIds::new("c"), None, None);

        let plan = policy.plan("chatty-service-1", &ctx).unwrap();
        assert_eq!(plan.destination.as_deref(), Some("chatty-service-2"));
        let plan = policy.plan("chatty-service-2", &ctx).unwrap();
        assert!(plan.destination.is_none());

        assert!(policy.plan("chatty-service-3", &ctx).is_none());
        assert!(policy.plan("chatty-service-x", &ctx).is_none());
    }
}

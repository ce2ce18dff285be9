//! Named topology shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A fixed call-graph shape modelling a microservice anti-pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// Excessive intermediaries before the request is processed
    LongChain,
    /// A → B → C → A
    Cyclic,
    /// Densely connected cluster, each node calling two others
    Knot,
    /// Many upstreams calling one overloaded service
    FanIn,
    /// One service calling many downstream services
    FanOut,
    /// Excessive back-and-forth between services
    Chatty,
    /// A service too small to be useful
    NanoService,
    /// Long blocking call to a backing store
    SyncOveruse,
    /// Gateway doing long-running work itself
    #[serde(rename = "api-gateway-overuse")]
    GatewayOveruse,
}

impl Pattern {
    pub const ALL: [Pattern; 9] = [
        Pattern::LongChain,
        Pattern::Cyclic,
        Pattern::Knot,
        Pattern::FanIn,
        Pattern::FanOut,
        Pattern::Chatty,
        Pattern::NanoService,
        Pattern::SyncOveruse,
        Pattern::GatewayOveruse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::LongChain => "long-chain",
            Pattern::Cyclic => "cyclic",
            Pattern::Knot => "knot",
            Pattern::FanIn => "fan-in",
            Pattern::FanOut => "fan-out",
            Pattern::Chatty => "chatty",
            Pattern::NanoService => "nano-service",
            Pattern::SyncOveruse => "sync-overuse",
            Pattern::GatewayOveruse => "api-gateway-overuse",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "long-chain" | "long-service-chain" => Ok(Pattern::LongChain),
            "cyclic" | "cyclic-dependency" => Ok(Pattern::Cyclic),
            "knot" => Ok(Pattern::Knot),
            "fan-in" => Ok(Pattern::FanIn),
            "fan-out" => Ok(Pattern::FanOut),
            "chatty" | "chatty-services" => Ok(Pattern::Chatty),
            "nano-service" | "nano" => Ok(Pattern::NanoService),
            "sync-overuse" | "sync-call-overuse" => Ok(Pattern::SyncOveruse),
            "api-gateway-overuse" | "gateway-overuse" | "api-gateway" => {
                Ok(Pattern::GatewayOveruse)
            }
            _ => Err(ParseError::UnknownPattern(s.to_string())),
        }
    }
}

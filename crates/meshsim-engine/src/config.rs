//! Configuration for the simulator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SimError};

/// Smallest fan-out width that still demonstrates the overload.
pub const MIN_FAN_OUT: usize = 4;

/// Main simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Depth at which cycle-bounded patterns stop recursing
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Log start events with an interim `102` status
    #[serde(default = "default_true")]
    pub include_status_codes: bool,

    #[serde(default)]
    pub long_chain: LongChainConfig,

    #[serde(default)]
    pub cyclic: CyclicConfig,

    #[serde(default)]
    pub fan_in: FanInConfig,

    #[serde(default)]
    pub fan_out: FanOutConfig,

    #[serde(default)]
    pub chatty: ChattyConfig,

    #[serde(default)]
    pub single_hop: SingleHopConfig,

    #[serde(default)]
    pub consistency: ConsistencyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            include_status_codes: true,
            long_chain: LongChainConfig::default(),
            cyclic: CyclicConfig::default(),
            fan_in: FanInConfig::default(),
            fan_out: FanOutConfig::default(),
            chatty: ChattyConfig::default(),
            single_hop: SingleHopConfig::default(),
            consistency: ConsistencyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Long service chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongChainConfig {
    /// Forwarding nodes before the end node (the start node included)
    #[serde(default = "default_intermediaries")]
    pub intermediaries: usize,
}

impl Default for LongChainConfig {
    fn default() -> Self {
        Self {
            intermediaries: default_intermediaries(),
        }
    }
}

/// Cyclic dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclicConfig {
    /// Nodes in the cycle, named `cyclic-service-A`, `-B`, ...
    #[serde(default = "default_cycle_members")]
    pub members: usize,
}

impl Default for CyclicConfig {
    fn default() -> Self {
        Self {
            members: default_cycle_members(),
        }
    }
}

/// Fan-in overload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanInConfig {
    #[serde(default = "default_fan_in_upstreams")]
    pub upstreams: Vec<String>,

    /// Processing delay of the overloaded service
    #[serde(default = "default_fan_in_latency")]
    pub latency_ms: u64,
}

impl FanInConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl Default for FanInConfig {
    fn default() -> Self {
        Self {
            upstreams: default_fan_in_upstreams(),
            latency_ms: default_fan_in_latency(),
        }
    }
}

/// Fan-out overload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutConfig {
    #[serde(default = "default_fan_out_downstream")]
    pub downstream: Vec<String>,

    /// Processing delay of each downstream service
    #[serde(default = "default_fan_out_latency")]
    pub latency_ms: u64,
}

impl FanOutConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            downstream: default_fan_out_downstream(),
            latency_ms: default_fan_out_latency(),
        }
    }
}

/// How chatty services exchange messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChattyMode {
    /// Walk a list of uniquely named services
    Walk,
    /// Call the same counterpart over and over
    Counterpart,
}

/// Chatty services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChattyConfig {
    #[serde(default = "default_chatty_mode")]
    pub mode: ChattyMode,

    /// Services walked in `walk` mode
    #[serde(default = "default_chatty_threshold")]
    pub services: usize,

    /// Exchanges sent in `counterpart` mode
    #[serde(default = "default_chatty_threshold")]
    pub rounds: usize,
}

impl Default for ChattyConfig {
    fn default() -> Self {
        Self {
            mode: default_chatty_mode(),
            services: default_chatty_threshold(),
            rounds: default_chatty_threshold(),
        }
    }
}

/// Latencies of the single-hop patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleHopConfig {
    #[serde(default)]
    pub nano_latency_ms: u64,

    #[serde(default = "default_sync_overuse_latency")]
    pub sync_overuse_latency_ms: u64,

    #[serde(default = "default_gateway_latency")]
    pub gateway_latency_ms: u64,
}

impl Default for SingleHopConfig {
    fn default() -> Self {
        Self {
            nano_latency_ms: 0,
            sync_overuse_latency_ms: default_sync_overuse_latency(),
            gateway_latency_ms: default_gateway_latency(),
        }
    }
}

/// Eventual consistency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    /// Delay before a write becomes visible
    #[serde(default = "default_write_delay")]
    pub write_delay_ms: u64,
}

impl ConsistencyConfig {
    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            write_delay_ms: default_write_delay(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

fn default_intermediaries() -> usize {
    6
}

fn default_cycle_members() -> usize {
    3
}

fn default_fan_in_upstreams() -> Vec<String> {
    ["fan-in-service-a", "fan-in-service-b", "fan-in-service-c"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_fan_in_latency() -> u64 {
    1000
}

fn default_fan_out_downstream() -> Vec<String> {
    ["service-a", "service-b", "service-c", "service-d"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_fan_out_latency() -> u64 {
    500
}

fn default_chatty_mode() -> ChattyMode {
    ChattyMode::Walk
}

fn default_chatty_threshold() -> usize {
    15
}

fn default_sync_overuse_latency() -> u64 {
    5000
}

fn default_gateway_latency() -> u64 {
    3000
}

fn default_write_delay() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SimulatorConfig {
    /// Load configuration from defaults, an optional file and `MESHSIM__*` variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SimulatorConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MESHSIM")
                .separator("__")
                .try_parsing(true),
        );

        let config: SimulatorConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Same shapes with every simulated delay removed.
    pub fn without_latency() -> Self {
        let mut config = Self::default();
        config.fan_in.latency_ms = 0;
        config.fan_out.latency_ms = 0;
        config.single_hop = SingleHopConfig {
            nano_latency_ms: 0,
            sync_overuse_latency_ms: 0,
            gateway_latency_ms: 0,
        };
        config.consistency.write_delay_ms = 0;
        config
    }

    /// Reject shapes the topologies cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(SimError::Config("max_depth must be at least 1".into()));
        }
        if self.long_chain.intermediaries == 0 {
            return Err(SimError::Config(
                "long_chain.intermediaries must be at least 1".into(),
            ));
        }
        if !(2..=26).contains(&self.cyclic.members) {
            return Err(SimError::Config(format!(
                "cyclic.members must be between 2 and 26, got {}",
                self.cyclic.members
            )));
        }
        if self.fan_in.upstreams.is_empty() {
            return Err(SimError::Config("fan_in.upstreams must not be empty".into()));
        }
        if self.fan_out.downstream.len() < MIN_FAN_OUT {
            return Err(SimError::Config(format!(
                "fan_out.downstream needs at least {} services, got {}",
                MIN_FAN_OUT,
                self.fan_out.downstream.len()
            )));
        }
        if has_duplicates(&self.fan_out.downstream) || has_duplicates(&self.fan_in.upstreams) {
            return Err(SimError::Config("node names must be unique".into()));
        }
        match self.chatty.mode {
            ChattyMode::Walk if self.chatty.services < 2 => Err(SimError::Config(
                "chatty.services must be at least 2".into(),
            )),
            ChattyMode::Counterpart if self.chatty.rounds == 0 => {
                Err(SimError::Config("chatty.rounds must be at least 1".into()))
            }
            _ => Ok(()),
        }
    }
}

fn has_duplicates(names: &[String]) -> bool {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    sorted.windows(2).any(|w| w[0] == w[1])
}

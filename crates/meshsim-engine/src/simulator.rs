//! Simulator façade and builder.

use futures::future::join_all;
use meshsim_types::{IdSource, Pattern, SpanId, TraceContext, TraceHeaders, TraceId, UuidIds};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::SimulatorConfig;
use crate::consistency::{EventualConsistency, SimulatedDatabase};
use crate::engine::Engine;
use crate::error::{Result, SimError, TransportError};
use crate::invoker::failure_response;
use crate::sink::{EventSink, TracingEventSink};

/// Result of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub response: String,
    pub trace_id: TraceId,
}

/// Root context of a request arriving with optional inbound headers.
///
/// The inbound trace id is kept, the inbound span becomes the parent and an
/// inbound depth is the starting depth (`0` when absent or malformed).
pub(crate) fn root_context(ids: &dyn IdSource, inbound: Option<&TraceHeaders>) -> TraceContext {
    match inbound {
        Some(headers) => TraceContext::new_root(
            ids,
            headers.trace_id.clone().map(TraceId),
            headers.span_id.clone().map(SpanId),
        )
        .with_depth(headers.depth_or_default()),
        None => TraceContext::new_root(ids, None, None),
    }
}

/// Builder for [`Simulator`].
pub struct SimulatorBuilder {
    config: SimulatorConfig,
    sink: Option<Arc<dyn EventSink>>,
    ids: Option<Arc<dyn IdSource>>,
    faults: HashMap<(Pattern, String), String>,
}

impl SimulatorBuilder {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            sink: None,
            ids: None,
            faults: HashMap::new(),
        }
    }

    /// Where trace events go. Defaults to [`TracingEventSink`].
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Identifier source. Defaults to UUID v4.
    pub fn ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Make every call to `node` of `pattern` fail with `reason`.
    pub fn unreachable(
        mut self,
        pattern: Pattern,
        node: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.faults.insert((pattern, node.into()), reason.into());
        self
    }

    pub fn build(self) -> Result<Simulator> {
        self.config.validate()?;

        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingEventSink));
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidIds));
        let engine = Engine::new(&self.config, sink, ids, self.faults);
        let consistency = EventualConsistency::new(
            engine.invoker().clone(),
            Arc::new(SimulatedDatabase::new()),
            self.config.consistency.write_delay(),
        );

        Ok(Simulator {
            config: self.config,
            engine,
            consistency,
        })
    }
}

/// Entry point for running patterns.
pub struct Simulator {
    config: SimulatorConfig,
    engine: Arc<Engine>,
    consistency: EventualConsistency,
}

impl Simulator {
    pub fn builder(config: SimulatorConfig) -> SimulatorBuilder {
        SimulatorBuilder::new(config)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn eventual_consistency(&self) -> &EventualConsistency {
        &self.consistency
    }

    /// Run `pattern` with `input`, optionally continuing an inbound trace.
    ///
    /// Patterns with several entry nodes run them concurrently as sibling
    /// top-level hops of one trace and join their responses as
    /// `"{node}: {response}"` separated by `"; "`.
    #[instrument(skip(self, input, inbound), fields(pattern = %pattern))]
    pub async fn run(
        &self,
        pattern: Pattern,
        input: &str,
        inbound: Option<&TraceHeaders>,
    ) -> Result<SimulationOutcome> {
        let policy = self
            .engine
            .topology()
            .policy(pattern)
            .ok_or(SimError::UnknownPattern(pattern))?;
        let ids = self.engine.invoker().ids();
        let root = root_context(ids, inbound);
        let trace_id = root.trace_id.clone();

        let entries = policy.entry_nodes();
        let contexts: Vec<TraceContext> = entries
            .iter()
            .enumerate()
            .map(|(i, _)| {
                if i == 0 {
                    root.clone()
                } else {
                    TraceContext::new_root(
                        ids,
                        Some(trace_id.clone()),
                        root.parent_span_id.clone(),
                    )
                    .with_depth(root.depth)
                }
            })
            .collect();

        let runs: Vec<_> = entries
            .iter()
            .zip(contexts)
            .map(|(node, ctx)| self.engine.enter(pattern, node, input.to_string(), ctx))
            .collect();
        let responses: Vec<String> = join_all(runs)
            .await
            .into_iter()
            .map(|result| result.unwrap_or_else(|err: TransportError| failure_response(&err)))
            .collect();

        let response = if entries.len() == 1 {
            responses.into_iter().next().unwrap_or_default()
        } else {
            entries
                .iter()
                .zip(responses)
                .map(|(node, response)| format!("{}: {}", node, response))
                .collect::<Vec<_>>()
                .join("; ")
        };

        info!(trace_id = %trace_id, response = %response, "Simulation finished");
        Ok(SimulationOutcome { response, trace_id })
    }

    /// Deliver a call to one node, as a transport would.
    pub async fn handle(
        &self,
        pattern: Pattern,
        node: &str,
        input: &str,
        headers: &TraceHeaders,
    ) -> std::result::Result<String, TransportError> {
        self.engine
            .handle(pattern, node, input.to_string(), headers)
            .await
    }

    /// Accept an eventual-consistency write.
    pub fn write(&self, input: &str, inbound: Option<&TraceHeaders>) -> String {
        self.consistency.write(input, inbound)
    }

    /// Read the eventual-consistency database.
    pub async fn read(&self, inbound: Option<&TraceHeaders>) -> String {
        self.consistency.read(inbound).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_types::SequentialIds;

    #[test]
    fn root_context_continues_inbound_headers() {
        let ids = SequentialIds::new("r");
        let headers = TraceHeaders::new()
            .with_trace_id("trace-x")
            .with_span_id("span-x")
            .with_depth(2);

        let ctx = root_context(&ids, Some(&headers));
        assert_eq!(ctx.trace_id.as_str(), "trace-x");
        assert_eq!(ctx.parent_span_id.as_ref().map(|s| s.as_str()), Some("span-x"));
        assert_eq!(ctx.depth, 2);

        let ctx = root_context(&ids, Some(&TraceHeaders::new().with_depth("deep")));
        assert_eq!(ctx.depth, 0);
        assert!(ctx.is_root());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = SimulatorConfig::without_latency();
        config.max_depth = 0;
        assert!(matches!(
            Simulator::builder(config).build(),
            Err(SimError::Config(_))
        ));
    }
}

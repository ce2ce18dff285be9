//! Topology traversal.
//!
//! The engine turns a node's [`HopPlan`] into hops. Delegated calls leave
//! through the [`Transport`](crate::transport::Transport) and re-enter via
//! [`Engine::handle`], so traversal recurses through boxed futures.

use futures::future::{join_all, BoxFuture, FutureExt};
use meshsim_types::{IdSource, Pattern, TraceContext, TraceHeaders};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::SimulatorConfig;
use crate::error::TransportError;
use crate::invoker::{failure_response, Hop, Invoker};
use crate::sink::EventSink;
use crate::topology::{
    Dispatch, HopAction, HopPlan, LegTarget, Topology, TopologyPolicy, MAX_DEPTH_RESPONSE,
};
use crate::transport::LocalTransport;

/// Executes topology policies hop by hop.
pub struct Engine {
    invoker: Invoker,
    topology: Topology,
}

impl Engine {
    /// Build an engine whose transport loops back into itself.
    ///
    /// Calls to a node listed in `faults` fail with the given reason.
    pub fn new(
        config: &SimulatorConfig,
        sink: Arc<dyn EventSink>,
        ids: Arc<dyn IdSource>,
        faults: HashMap<(Pattern, String), String>,
    ) -> Arc<Self> {
        let topology = Topology::from_config(config);
        let include_status_codes = config.include_status_codes;
        Arc::new_cyclic(|engine| {
            let transport = Arc::new(LocalTransport::new(engine.clone()).with_faults(faults));
            Engine {
                invoker: Invoker::new(sink, ids, transport, include_status_codes),
                topology,
            }
        })
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Deliver a call carrying `headers` to `node`.
    #[instrument(level = "debug", skip(self, input, headers), fields(pattern = %pattern))]
    pub async fn handle(
        &self,
        pattern: Pattern,
        node: &str,
        input: String,
        headers: &TraceHeaders,
    ) -> Result<String, TransportError> {
        let ctx = TraceContext::continue_from(headers, self.invoker.ids());
        self.enter(pattern, node, input, ctx).await
    }

    /// Execute `node` as one hop under `ctx`.
    pub async fn enter(
        &self,
        pattern: Pattern,
        node: &str,
        input: String,
        ctx: TraceContext,
    ) -> Result<String, TransportError> {
        let unknown = || TransportError::UnknownNode {
            pattern,
            node: node.to_string(),
        };
        let policy = self.topology.policy(pattern).ok_or_else(unknown)?;
        let plan = policy.plan(node, &ctx).ok_or_else(unknown)?;
        Ok(self
            .execute(pattern, policy.as_ref(), node, plan, input, ctx)
            .await)
    }

    fn execute<'a>(
        &'a self,
        pattern: Pattern,
        policy: &'a dyn TopologyPolicy,
        node: &'a str,
        plan: HopPlan,
        input: String,
        ctx: TraceContext,
    ) -> BoxFuture<'a, String> {
        async move {
            let hop = Hop::new(node, plan.operation, input.clone(), ctx.clone())
                .to_opt(plan.destination)
                .via(plan.transport);

            match plan.action {
                HopAction::Respond { response, latency } => {
                    self.invoker
                        .run(hop, async move {
                            if !latency.is_zero() {
                                tokio::time::sleep(latency).await;
                            }
                            Ok(response)
                        })
                        .await
                }

                HopAction::Forward { next } => {
                    if policy.depth_exceeded(ctx.depth.saturating_add(1)) {
                        debug!(node, next = %next, depth = ctx.depth, "Depth bound reached, not forwarding");
                        return self
                            .invoker
                            .run(hop, async { Ok(MAX_DEPTH_RESPONSE.to_string()) })
                            .await;
                    }
                    self.invoker
                        .run(hop, self.invoker.call(pattern, &next, &input, &ctx))
                        .await
                }

                HopAction::Scatter {
                    targets,
                    dispatch,
                    client_operation,
                    aggregate,
                } => {
                    let open = self.invoker.begin(hop);
                    let calls: Vec<_> = targets
                        .iter()
                        .map(|target| {
                            self.reach(
                                pattern,
                                policy,
                                node,
                                target,
                                client_operation.as_deref(),
                                &input,
                                &ctx,
                            )
                        })
                        .collect();
                    let outcomes = match dispatch {
                        Dispatch::Sequential => {
                            let mut outcomes = Vec::with_capacity(calls.len());
                            for call in calls {
                                outcomes.push(call.await);
                            }
                            outcomes
                        }
                        Dispatch::Concurrent => join_all(calls).await,
                    };
                    let failed = outcomes.iter().any(Result::is_err);
                    let responses = outcomes.into_iter().map(|outcome| match outcome {
                        Ok(response) | Err(response) => response,
                    });
                    let combined = aggregate.combine(responses.collect());
                    if failed {
                        open.fail(combined)
                    } else {
                        open.succeed(combined)
                    }
                }

                HopAction::Relay {
                    legs,
                    client_operation,
                } => {
                    let open = self.invoker.begin(hop);
                    let mut response = input;
                    for leg in &legs {
                        let leg_ctx = self.invoker.child_of(&ctx);
                        let leg_hop = Hop::new(
                            &leg.source,
                            &client_operation,
                            response.clone(),
                            leg_ctx.clone(),
                        );
                        let next = match &leg.target {
                            LegTarget::Node(target) => {
                                self.invoker
                                    .run(
                                        leg_hop.to(target),
                                        self.invoker.call(pattern, target, &response, &leg_ctx),
                                    )
                                    .await
                            }
                            LegTarget::End(message) => {
                                let message = message.clone();
                                self.invoker.run(leg_hop, async { Ok(message) }).await
                            }
                        };
                        response = next;
                    }
                    open.succeed(response)
                }
            }
        }
        .boxed()
    }

    /// One scattered call from `source` to `target`.
    ///
    /// With a client operation the call gets a hop of its own; otherwise it
    /// is issued straight from the caller's hop. `Err` carries the failure
    /// message of a direct call, which fails the caller's hop.
    #[allow(clippy::too_many_arguments)]
    async fn reach(
        &self,
        pattern: Pattern,
        policy: &dyn TopologyPolicy,
        source: &str,
        target: &str,
        client_operation: Option<&str>,
        input: &str,
        ctx: &TraceContext,
    ) -> Result<String, String> {
        if policy.depth_exceeded(ctx.depth.saturating_add(1)) {
            debug!(source, target, depth = ctx.depth, "Depth bound reached, not calling");
            return Ok(MAX_DEPTH_RESPONSE.to_string());
        }

        match client_operation {
            Some(operation) => {
                let client_ctx = self.invoker.child_of(ctx);
                let hop = Hop::new(source, operation, input, client_ctx.clone()).to(target);
                Ok(self
                    .invoker
                    .run(hop, self.invoker.call(pattern, target, input, &client_ctx))
                    .await)
            }
            None => self
                .invoker
                .call(pattern, target, input, ctx)
                .await
                .map_err(|err| {
                    warn!(source, span_id = %ctx.span_id, error = %err, "Delegated call failed");
                    failure_response(&err)
                }),
        }
    }
}

//! Execution of single hops.
//!
//! The invoker is the boundary where failures stop: a failed delegated call
//! becomes a `500` end event and a descriptive response string, never an
//! error returned to the caller.

use meshsim_types::{
    IdSource, Pattern, StatusCode, TraceContext, TraceEvent, TraceHeaders, TransportKind,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::sink::EventSink;
use crate::transport::{CallRequest, Transport};

/// Description of one hop about to be executed.
#[derive(Debug, Clone)]
pub struct Hop {
    pub source: String,
    pub destination: Option<String>,
    pub operation: String,
    pub transport: TransportKind,
    pub request: String,
    pub context: TraceContext,
}

impl Hop {
    /// Request/response hop from `source`.
    pub fn new(
        source: impl Into<String>,
        operation: impl Into<String>,
        request: impl Into<String>,
        context: TraceContext,
    ) -> Self {
        Self {
            source: source.into(),
            destination: None,
            operation: operation.into(),
            transport: TransportKind::Request,
            request: request.into(),
            context,
        }
    }

    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn to_opt(mut self, destination: Option<String>) -> Self {
        self.destination = destination;
        self
    }

    pub fn via(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }
}

/// A hop whose start event has been recorded and whose end event is pending.
#[must_use = "a started hop must be finished to record its end event"]
pub struct OpenHop {
    start: TraceEvent,
    sink: Arc<dyn EventSink>,
}

impl OpenHop {
    pub fn context(&self) -> &TraceContext {
        &self.start.context
    }

    /// Record the end event under a different source, destination and operation.
    ///
    /// Used when completion is observed by another node than the one that
    /// started the hop. The trace context is unchanged.
    pub fn relabel(
        mut self,
        source: impl Into<String>,
        destination: Option<String>,
        operation: impl Into<String>,
    ) -> Self {
        self.start.source = source.into();
        self.start.destination = destination;
        self.start.operation = operation.into();
        self
    }

    /// Record a `200` end event and hand back the response.
    pub fn succeed(self, response: String) -> String {
        self.finish(StatusCode::OK, response)
    }

    /// Record a `500` end event and hand back the failure message.
    pub fn fail(self, message: String) -> String {
        self.finish(StatusCode::INTERNAL_ERROR, message)
    }

    fn finish(self, status: StatusCode, response: String) -> String {
        let end = self.start.finish(status, response.clone());
        debug!(
            source = %end.source,
            operation = %end.operation,
            span_id = %end.context.span_id,
            status = status.as_u16(),
            "Hop finished"
        );
        self.sink.record(end);
        response
    }
}

/// Executes hops: records start and end events around the hop body.
#[derive(Clone)]
pub struct Invoker {
    sink: Arc<dyn EventSink>,
    ids: Arc<dyn IdSource>,
    transport: Arc<dyn Transport>,
    include_status_codes: bool,
}

impl Invoker {
    pub fn new(
        sink: Arc<dyn EventSink>,
        ids: Arc<dyn IdSource>,
        transport: Arc<dyn Transport>,
        include_status_codes: bool,
    ) -> Self {
        Self {
            sink,
            ids,
            transport,
            include_status_codes,
        }
    }

    pub fn ids(&self) -> &dyn IdSource {
        self.ids.as_ref()
    }

    /// Context of an in-process hop caused by `parent`.
    pub fn child_of(&self, parent: &TraceContext) -> TraceContext {
        TraceContext::child(parent, self.ids.as_ref())
    }

    /// Record the start event of `hop`.
    pub fn begin(&self, hop: Hop) -> OpenHop {
        let status = self.include_status_codes.then_some(StatusCode::PROCESSING);
        let start = TraceEvent::start(
            hop.source,
            hop.destination,
            hop.operation,
            hop.transport,
            hop.request,
            status,
            hop.context,
        );
        debug!(
            source = %start.source,
            destination = start.destination.as_deref().unwrap_or("-"),
            operation = %start.operation,
            trace_id = %start.context.trace_id,
            span_id = %start.context.span_id,
            depth = start.context.depth,
            "Hop started"
        );
        self.sink.record(start.clone());
        OpenHop {
            start,
            sink: self.sink.clone(),
        }
    }

    /// Run one hop to completion.
    ///
    /// A failed body degrades to `"Failed to reach {destination}: {reason}"`,
    /// recorded with status `500` and returned like any other response.
    pub async fn run<F>(&self, hop: Hop, body: F) -> String
    where
        F: Future<Output = Result<String, TransportError>>,
    {
        let open = self.begin(hop);
        match body.await {
            Ok(response) => open.succeed(response),
            Err(err) => {
                let message = failure_response(&err);
                warn!(
                    destination = %err.destination(),
                    span_id = %open.context().span_id,
                    error = %err,
                    "Delegated call failed"
                );
                open.fail(message)
            }
        }
    }

    /// Issue a call from the hop described by `caller` to `destination`.
    pub async fn call(
        &self,
        pattern: Pattern,
        destination: &str,
        input: &str,
        caller: &TraceContext,
    ) -> Result<String, TransportError> {
        self.transport
            .call(CallRequest {
                pattern,
                destination: destination.to_string(),
                input: input.to_string(),
                headers: TraceHeaders::for_callee(caller),
            })
            .await
    }
}

/// Response payload standing in for a failed call.
pub fn failure_response(err: &TransportError) -> String {
    format!("Failed to reach {}: {}", err.destination(), err.reason())
}

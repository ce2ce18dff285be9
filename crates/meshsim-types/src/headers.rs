//! Trace headers exchanged between simulated nodes.
//!
//! Headers are kept as raw strings: inbound values come from outside the
//! engine and are only interpreted when a [`TraceContext`] is built from them.

use serde::{Deserialize, Serialize};

use crate::context::TraceContext;

/// Header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "trace_id";

/// Header carrying the caller's span id.
pub const SPAN_ID_HEADER: &str = "span_id";

/// Header carrying the hop depth of cycle-bounded patterns.
pub const DEPTH_HEADER: &str = "depth";

/// Wire form of a trace context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// Span id of the caller; becomes the parent span of the receiving hop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
}

impl TraceHeaders {
    /// Empty headers: the receiver starts a new trace.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    pub fn with_depth(mut self, depth: impl ToString) -> Self {
        self.depth = Some(depth.to_string());
        self
    }

    /// Collect trace headers from arbitrary name/value pairs.
    ///
    /// Names are matched case-insensitively and unrelated headers are ignored.
    /// Blank values count as absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::default();
        for (name, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            let name = name.as_ref();
            if name.eq_ignore_ascii_case(TRACE_ID_HEADER) {
                headers.trace_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(SPAN_ID_HEADER) {
                headers.span_id = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(DEPTH_HEADER) {
                headers.depth = Some(value.to_string());
            }
        }
        headers
    }

    /// Headers a hop sends to the node it calls.
    pub fn for_callee(caller: &TraceContext) -> Self {
        Self {
            trace_id: Some(caller.trace_id.0.clone()),
            span_id: Some(caller.span_id.0.clone()),
            depth: Some(caller.depth.saturating_add(1).to_string()),
        }
    }

    /// Depth header as a number, or `None` when absent or malformed.
    pub fn parsed_depth(&self) -> Option<u32> {
        self.depth.as_deref().and_then(|d| d.trim().parse().ok())
    }

    /// Depth header as a number, falling back to `0`.
    pub fn depth_or_default(&self) -> u32 {
        self.parsed_depth().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.span_id.is_none() && self.depth.is_none()
    }
}

//! Trace context threaded through every hop.

use serde::{Deserialize, Serialize};

use crate::headers::TraceHeaders;
use crate::ids::{IdSource, SpanId, TraceId};

/// Identifiers describing one hop within a request tree.
///
/// The trace id never changes below the root, every hop gets a fresh span id,
/// and the parent span id is always the span of the immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    /// Hop counter, incremented once per delegated call.
    pub depth: u32,
}

impl TraceContext {
    /// Root context of a request tree.
    ///
    /// An inbound trace id continues an existing trace; otherwise a new one is
    /// minted. The span id is always fresh.
    pub fn new_root(
        ids: &dyn IdSource,
        inbound_trace_id: Option<TraceId>,
        inbound_parent_span_id: Option<SpanId>,
    ) -> Self {
        Self {
            trace_id: inbound_trace_id.unwrap_or_else(|| ids.trace_id()),
            span_id: ids.span_id(),
            parent_span_id: inbound_parent_span_id,
            depth: 0,
        }
    }

    /// Context of a hop caused by `parent` within the same process.
    pub fn child(parent: &TraceContext, ids: &dyn IdSource) -> Self {
        Self {
            trace_id: parent.trace_id.clone(),
            span_id: ids.span_id(),
            parent_span_id: Some(parent.span_id.clone()),
            depth: parent.depth.saturating_add(1),
        }
    }

    /// Context of a hop receiving a call carrying `headers`.
    ///
    /// Missing trace ids start a new trace; a malformed depth counts as `0`.
    pub fn continue_from(headers: &TraceHeaders, ids: &dyn IdSource) -> Self {
        Self {
            trace_id: headers
                .trace_id
                .clone()
                .map(TraceId)
                .unwrap_or_else(|| ids.trace_id()),
            span_id: ids.span_id(),
            parent_span_id: headers.span_id.clone().map(SpanId),
            depth: headers.depth_or_default(),
        }
    }

    /// Same context at an explicit depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0 && self.parent_span_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{SequentialIds, UuidIds};
    use proptest::prelude::*;

    #[test]
    fn root_mints_trace_and_span() {
        let ids = SequentialIds::new("r");
        let root = TraceContext::new_root(&ids, None, None);

        assert_eq!(root.trace_id, TraceId::from("r-1"));
        assert_eq!(root.span_id, SpanId::from("r-2"));
        assert!(root.parent_span_id.is_none());
        assert_eq!(root.depth, 0);
        assert!(root.is_root());
    }

    #[test]
    fn root_continues_inbound_trace() {
        let ids = SequentialIds::new("r");
        let root = TraceContext::new_root(
            &ids,
            Some(TraceId::from("upstream")),
            Some(SpanId::from("caller")),
        );

        assert_eq!(root.trace_id.as_str(), "upstream");
        assert_eq!(root.parent_span_id, Some(SpanId::from("caller")));
        assert_ne!(root.span_id.as_str(), "caller");
        assert!(!root.is_root());
    }

    #[test]
    fn child_links_to_parent() {
        let ids = UuidIds;
        let root = TraceContext::new_root(&ids, None, None);
        let child = TraceContext::child(&root, &ids);

        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id.as_ref(), Some(&root.span_id));
        assert_ne!(child.span_id, root.span_id);
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn continue_from_matches_child() {
        let ids = SequentialIds::new("c");
        let caller = TraceContext::new_root(&ids, None, None).with_depth(2);
        let headers = TraceHeaders::for_callee(&caller);
        let callee = TraceContext::continue_from(&headers, &ids);

        assert_eq!(callee.trace_id, caller.trace_id);
        assert_eq!(callee.parent_span_id, Some(caller.span_id.clone()));
        assert_eq!(callee.depth, 3);
    }

    #[test]
    fn child_depth_saturates() {
        let ids = SequentialIds::new("m");
        let deep = TraceContext::new_root(&ids, None, None).with_depth(u32::MAX);
        let child = TraceContext::child(&deep, &ids);
        assert_eq!(child.depth, u32::MAX);
        assert_eq!(child.parent_span_id, Some(deep.span_id.clone()));
    }

    #[test]
    fn continue_from_empty_headers_starts_trace() {
        let ids = SequentialIds::new("e");
        let ctx = TraceContext::continue_from(&TraceHeaders::new(), &ids);
        assert!(ctx.is_root());
    }

    proptest! {
        #[test]
        fn chain_of_children_keeps_trace_and_links(len in 1usize..64) {
            let ids = SequentialIds::new("p");
            let mut contexts = vec![TraceContext::new_root(&ids, None, None)];
            for _ in 0..len {
                let next = TraceContext::child(contexts.last().unwrap(), &ids);
                contexts.push(next);
            }

            for pair in contexts.windows(2) {
                prop_assert_eq!(&pair[1].trace_id, &pair[0].trace_id);
                prop_assert_eq!(pair[1].parent_span_id.as_ref(), Some(&pair[0].span_id));
                prop_assert_eq!(pair[1].depth, pair[0].depth + 1);
            }

            let mut spans: Vec<_> = contexts.iter().map(|c| c.span_id.clone()).collect();
            spans.sort();
            spans.dedup();
            prop_assert_eq!(spans.len(), contexts.len());
        }
    }
}

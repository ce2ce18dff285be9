//! Shape of the hop tree produced by each pattern.

use meshsim_engine::{ChattyMode, MemoryEventSink, Simulator, SimulatorConfig, MAX_DEPTH_RESPONSE};
use meshsim_types::{HopPhase, Pattern, SequentialIds, StatusCode, TraceEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn simulator(config: SimulatorConfig) -> (Simulator, Arc<MemoryEventSink>) {
    let sink = Arc::new(MemoryEventSink::new());
    let sim = Simulator::builder(config)
        .sink(sink.clone())
        .ids(Arc::new(SequentialIds::new("id")))
        .build()
        .unwrap();
    (sim, sink)
}

fn starts(events: &[TraceEvent]) -> Vec<TraceEvent> {
    events
        .iter()
        .filter(|e| e.phase == HopPhase::Start)
        .cloned()
        .collect()
}

#[tokio::test]
async fn cycle_terminates_after_three_hops() {
    let (sim, sink) = simulator(SimulatorConfig::without_latency());
    let outcome = sim.run(Pattern::Cyclic, "test", None).await.unwrap();

    assert_eq!(outcome.response, MAX_DEPTH_RESPONSE);
    let hops = starts(&sink.events());
    let sources: Vec<&str> = hops.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(
        sources,
        vec!["cyclic-service-A", "cyclic-service-B", "cyclic-service-C"]
    );
    let depths: Vec<u32> = hops.iter().map(|e| e.context.depth).collect();
    assert_eq!(depths, vec![0, 1, 2]);

    // A -> B -> C: each hop's parent is exactly its caller.
    assert!(hops[0].context.parent_span_id.is_none());
    assert_eq!(hops[1].context.parent_span_id, Some(hops[0].context.span_id.clone()));
    assert_eq!(hops[2].context.parent_span_id, Some(hops[1].context.span_id.clone()));
}

#[tokio::test]
async fn knot_calls_both_neighbours_until_the_bound() {
    let (sim, sink) = simulator(SimulatorConfig::without_latency());
    let outcome = sim.run(Pattern::Knot, "test", None).await.unwrap();

    assert_eq!(outcome.response, MAX_DEPTH_RESPONSE);
    let hops = starts(&sink.events());
    assert_eq!(hops.len(), 7);
    assert!(hops.iter().all(|e| e.operation == "knotProcessing"));
    assert_eq!(
        hops[0].destination.as_deref(),
        Some("knot-service-B,knot-service-C")
    );

    // A -> B -> (C, A) then A -> C -> (A, B), depth first.
    let sources: Vec<&str> = hops.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(
        sources,
        vec![
            "knot-service-A",
            "knot-service-B",
            "knot-service-C",
            "knot-service-A",
            "knot-service-C",
            "knot-service-A",
            "knot-service-B",
        ]
    );
    assert_eq!(hops.iter().filter(|e| e.context.depth == 2).count(), 4);

    // Depth-first order: B and C at depth 1 are called by the root A, and
    // each depth-2 hop is called by the depth-1 hop started before it.
    let parent = |i: usize| hops[i].context.parent_span_id.clone();
    let span = |i: usize| Some(hops[i].context.span_id.clone());
    assert_eq!(parent(0), None);
    assert_eq!(parent(1), span(0));
    assert_eq!(parent(2), span(1));
    assert_eq!(parent(3), span(1));
    assert_eq!(parent(4), span(0));
    assert_eq!(parent(5), span(4));
    assert_eq!(parent(6), span(4));
}

#[tokio::test]
async fn knot_fails_the_hop_behind_a_failed_edge() {
    let sink = Arc::new(MemoryEventSink::new());
    let sim = Simulator::builder(SimulatorConfig::without_latency())
        .sink(sink.clone())
        .unreachable(Pattern::Knot, "knot-service-C", "timed out")
        .build()
        .unwrap();

    let outcome = sim.run(Pattern::Knot, "test", None).await.unwrap();
    assert_eq!(
        outcome.response,
        "Failed to reach knot-service-C: timed out | Max recursion depth reached."
    );

    // A(0) -> B(1) -> {C unreachable, A(2)}, then A(0) -> C unreachable.
    let events = sink.events();
    assert_eq!(events.len(), 6);
    let failed: Vec<(&str, u32)> = events
        .iter()
        .filter(|e| e.status == Some(StatusCode::INTERNAL_ERROR))
        .map(|e| (e.source.as_str(), e.context.depth))
        .collect();
    assert_eq!(failed, vec![("knot-service-B", 1), ("knot-service-A", 0)]);

    let inner = events
        .iter()
        .find(|e| e.phase == HopPhase::End && e.context.depth == 2)
        .unwrap();
    assert_eq!(inner.status, Some(StatusCode::OK));
    assert_eq!(inner.response.as_deref(), Some(MAX_DEPTH_RESPONSE));
}

#[tokio::test(start_paused = true)]
async fn fan_out_is_bounded_by_the_slowest_call() {
    let (sim, sink) = simulator(SimulatorConfig::default());

    let started = Instant::now();
    let outcome = sim.run(Pattern::FanOut, "test", None).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "{:?}", elapsed);
    assert_eq!(
        outcome.response,
        "Fan-out responses: service-a processed the request., \
         service-b processed the request., service-c processed the request., \
         service-d processed the request."
    );

    let events = sink.events();
    let hops = starts(&events);
    assert_eq!(hops.len(), 9);

    let origin = &hops[0];
    assert_eq!(origin.operation, "executeFanOut");
    assert_eq!(origin.destination.as_deref(), Some("fan-out-multiple-services"));

    let clients: Vec<&TraceEvent> = hops
        .iter()
        .filter(|e| e.operation == "invokeDownstreamService")
        .collect();
    assert_eq!(clients.len(), 4);
    assert!(clients
        .iter()
        .all(|c| c.context.parent_span_id.as_ref() == Some(&origin.context.span_id)));

    for leaf in hops
        .iter()
        .filter(|e| e.operation == "processDownstreamService")
    {
        let client = clients
            .iter()
            .find(|c| c.destination.as_deref() == Some(leaf.source.as_str()))
            .unwrap();
        assert_eq!(leaf.context.parent_span_id.as_ref(), Some(&client.context.span_id));
    }

    // Origin finishes last.
    let last = events.last().unwrap();
    assert_eq!(last.context.span_id, origin.context.span_id);
    assert_eq!(last.phase, HopPhase::End);
}

#[tokio::test]
async fn fan_out_reports_unreachable_downstream() {
    let sink = Arc::new(MemoryEventSink::new());
    let sim = Simulator::builder(SimulatorConfig::without_latency())
        .sink(sink.clone())
        .unreachable(Pattern::FanOut, "service-c", "down")
        .build()
        .unwrap();

    let outcome = sim.run(Pattern::FanOut, "test", None).await.unwrap();
    assert_eq!(
        outcome.response,
        "Fan-out responses: service-a processed the request., \
         service-b processed the request., Failed to reach service-c: down, \
         service-d processed the request."
    );

    let failed: Vec<TraceEvent> = sink
        .events()
        .into_iter()
        .filter(|e| e.status == Some(StatusCode::INTERNAL_ERROR))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source, "fan-out-main-service");
    assert_eq!(failed[0].destination.as_deref(), Some("service-c"));
}

#[tokio::test(start_paused = true)]
async fn fan_in_upstreams_share_the_trace() {
    let (sim, sink) = simulator(SimulatorConfig::default());

    let started = Instant::now();
    let outcome = sim.run(Pattern::FanIn, "test", None).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(2000));

    assert_eq!(
        outcome.response,
        "fan-in-service-a: Overloaded service processed the request.; \
         fan-in-service-b: Overloaded service processed the request.; \
         fan-in-service-c: Overloaded service processed the request."
    );

    let hops = starts(&sink.events_for_trace(&outcome.trace_id));
    assert_eq!(hops.len(), 6);
    let upstreams: Vec<&TraceEvent> = hops
        .iter()
        .filter(|e| e.operation == "invokeOverloadedService")
        .collect();
    assert_eq!(upstreams.len(), 3);
    assert!(upstreams
        .iter()
        .all(|u| u.context.depth == 0 && u.context.parent_span_id.is_none()));

    let overloaded = hops
        .iter()
        .filter(|e| e.source == "fan-in-overloaded-service")
        .count();
    assert_eq!(overloaded, 3);
}

#[tokio::test]
async fn chatty_walk_feeds_each_response_forward() {
    let mut config = SimulatorConfig::without_latency();
    config.chatty.services = 4;
    let (sim, sink) = simulator(config);

    let outcome = sim.run(Pattern::Chatty, "test", None).await.unwrap();
    assert_eq!(
        outcome.response,
        "chatty-service-3 reached the end of the chatty interaction."
    );

    let hops = starts(&sink.events());
    assert_eq!(hops.len(), 8);
    assert_eq!(hops[0].operation, "startChattyInteraction");

    let legs: Vec<&TraceEvent> = hops
        .iter()
        .filter(|e| e.operation == "invokeChattyService")
        .collect();
    assert_eq!(legs.len(), 4);
    assert_eq!(legs[0].request, "test");
    assert_eq!(legs[1].request, "chatty-service-1 processed the request.");
    assert_eq!(legs[3].source, "chatty-service-3");
    assert!(legs[3].destination.is_none());
    assert!(legs
        .iter()
        .all(|l| l.context.parent_span_id.as_ref() == Some(&hops[0].context.span_id)));
}

#[tokio::test]
async fn chatty_counterpart_repeats_the_same_call() {
    let mut config = SimulatorConfig::without_latency();
    config.chatty.mode = ChattyMode::Counterpart;
    config.chatty.rounds = 3;
    let (sim, sink) = simulator(config);

    let outcome = sim.run(Pattern::Chatty, "test", None).await.unwrap();
    assert_eq!(outcome.response, "chatty-service-1 processed the request.");

    let hops = starts(&sink.events());
    assert_eq!(hops.len(), 7);
    let served = hops
        .iter()
        .filter(|e| e.source == "chatty-service-1" && e.operation == "processChattyService")
        .count();
    assert_eq!(served, 3);
}

#[tokio::test(start_paused = true)]
async fn single_hop_patterns_block_then_answer() {
    let (sim, sink) = simulator(SimulatorConfig::default());

    let started = Instant::now();
    let outcome = sim.run(Pattern::SyncOveruse, "test", None).await.unwrap();
    assert_eq!(outcome.response, "Synchronous Call Overuse detected!");
    assert!(started.elapsed() >= Duration::from_secs(5));

    let outcome = sim.run(Pattern::GatewayOveruse, "test", None).await.unwrap();
    assert_eq!(outcome.response, "API Gateway overloaded!");

    let events = sink.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].source, "sync-overuse-service");
    assert_eq!(events[0].destination.as_deref(), Some("database"));
    assert_eq!(events[2].source, "api-gateway");
    assert_eq!(events[2].destination.as_deref(), Some("backend-service"));
}

//! Event-time windowing through a running topology - fully deterministic,
//! driven by record timestamps rather than the wall clock.

use rillsql::rillsql::sql::ast::{WindowKind, WindowSpec};
use rillsql::rillsql::sql::execution::types::{FieldValue, StreamData};
use rillsql::rillsql::stream::{StreamConfig, StreamEnvelope, Topology, TriggerMode};
use std::collections::HashMap;
use tokio::sync::mpsc;

fn event(stream: &str, ts: i64) -> StreamData {
    let mut message = HashMap::new();
    message.insert("v".to_string(), FieldValue::Integer(ts));
    StreamData::record(stream, message, ts)
}

fn window_values(data: StreamData, emitter: &str) -> Vec<i64> {
    match data {
        StreamData::Window(set) => set
            .records_for(emitter)
            .unwrap_or(&[])
            .iter()
            .map(|r| match r.field("v") {
                Some(FieldValue::Integer(v)) => v,
                other => panic!("unexpected field: {:?}", other),
            })
            .collect(),
        other => panic!("expected window data, got {:?}", other),
    }
}

// The topology is handed back alongside the sink: dropping it would drop
// the cancel sender, which the operators treat as shutdown.
async fn run_window(
    spec: WindowSpec,
    mode: TriggerMode,
    events: Vec<StreamData>,
) -> (Topology, mpsc::Receiver<StreamEnvelope>) {
    let mut topology = Topology::new("window-test", StreamConfig::default());
    topology.add_window("win", spec, mode).unwrap();
    let sink = topology.add_sink("win", "sink").unwrap();
    let source = topology.source("win").unwrap();
    topology.start().unwrap();
    for data in events {
        source.send(StreamEnvelope::new(data, "src")).await.unwrap();
    }
    (topology, sink)
}

fn single_stream(name: &str) -> TriggerMode {
    TriggerMode::EventTime {
        late_tolerance_ms: 0,
        streams: vec![name.to_string()],
    }
}

#[tokio::test]
async fn test_tumbling_out_of_order_within_tolerance() {
    let mode = TriggerMode::EventTime {
        late_tolerance_ms: 50,
        streams: vec!["s".to_string()],
    };
    // 90 arrives after 120 but before the watermark passes the 100ms
    // boundary, so it still lands in the first window.
    let events = vec![event("s", 80), event("s", 120), event("s", 90), event("s", 160)];
    let (topology, mut sink) =
        run_window(WindowSpec::new(WindowKind::Tumbling, 100), mode, events).await;

    let envelope = sink.recv().await.unwrap();
    // Sorted by event time despite arrival order.
    assert_eq!(window_values(envelope.data, "s"), vec![80, 90]);
    topology.cancel();
}

#[tokio::test]
async fn test_hopping_windows_overlap() {
    let events = vec![event("s", 50), event("s", 150), event("s", 250), event("s", 350)];
    let (topology, mut sink) = run_window(
        WindowSpec::with_interval(WindowKind::Hopping, 200, 100),
        single_stream("s"),
        events,
    )
    .await;

    // Each record appears in every 200ms window covering it.
    let expected: [&[i64]; 3] = [&[50], &[50, 150], &[50, 150, 250]];
    for want in expected {
        let envelope = sink.recv().await.unwrap();
        assert_eq!(window_values(envelope.data, "s"), want);
    }
    topology.cancel();
}

#[tokio::test]
async fn test_sliding_triggers_per_event() {
    let events = vec![event("s", 100), event("s", 150), event("s", 250)];
    let (topology, mut sink) = run_window(
        WindowSpec::new(WindowKind::Sliding, 100),
        single_stream("s"),
        events,
    )
    .await;

    let expected: [&[i64]; 3] = [&[100], &[100, 150], &[100, 150, 250]];
    for want in expected {
        let envelope = sink.recv().await.unwrap();
        assert_eq!(window_values(envelope.data, "s"), want);
    }
    topology.cancel();
}

#[tokio::test]
async fn test_session_closes_on_confirmed_gap() {
    // Gap timeout 100ms: the jump from 150 to 400 ends the first session
    // at 250, confirmed once the watermark reaches it.
    let events = vec![event("s", 100), event("s", 150), event("s", 400)];
    let (topology, mut sink) = run_window(
        WindowSpec::with_interval(WindowKind::Session, 1000, 100),
        single_stream("s"),
        events,
    )
    .await;

    let envelope = sink.recv().await.unwrap();
    assert_eq!(window_values(envelope.data, "s"), vec![100, 150]);
    topology.cancel();
}

#[tokio::test]
async fn test_watermark_waits_for_the_slowest_stream() {
    let mode = TriggerMode::EventTime {
        late_tolerance_ms: 0,
        streams: vec!["a".to_string(), "b".to_string()],
    };
    let events = vec![event("a", 120), event("b", 90), event("b", 250)];
    let (topology, mut sink) =
        run_window(WindowSpec::new(WindowKind::Tumbling, 100), mode, events).await;

    // Nothing may trigger until both streams have reported; the watermark
    // then sits at min(120, 250) = 120, flushing only the first window.
    let envelope = sink.recv().await.unwrap();
    assert_eq!(window_values(envelope.data.clone(), "b"), vec![90]);
    match envelope.data {
        StreamData::Window(set) => assert!(set.records_for("a").is_none()),
        other => panic!("expected window data, got {:?}", other),
    }
    topology.cancel();
}

#[tokio::test]
async fn test_late_event_beyond_tolerance_joins_next_window() {
    let events = vec![
        event("s", 80),
        event("s", 150),
        // Late for the first window: the watermark already passed 100.
        event("s", 90),
        event("s", 220),
    ];
    let (topology, mut sink) = run_window(
        WindowSpec::new(WindowKind::Tumbling, 100),
        single_stream("s"),
        events,
    )
    .await;

    let first = sink.recv().await.unwrap();
    assert_eq!(window_values(first.data, "s"), vec![80]);
    let second = sink.recv().await.unwrap();
    assert_eq!(window_values(second.data, "s"), vec![90, 150]);
    topology.cancel();
}

#[tokio::test]
async fn test_processing_time_construction_smoke() {
    // Processing-time windows depend on the wall clock; keep runtime
    // coverage to wiring and teardown.
    let mut topology = Topology::new("proc-window", StreamConfig::default());
    topology
        .add_window(
            "win",
            WindowSpec::new(WindowKind::Tumbling, 50),
            TriggerMode::ProcessingTime,
        )
        .unwrap();
    let _sink = topology.add_sink("win", "sink").unwrap();
    let source = topology.source("win").unwrap();
    topology.start().unwrap();
    source
        .send(StreamEnvelope::new(
            event("s", chrono::Utc::now().timestamp_millis()),
            "src",
        ))
        .await
        .unwrap();
    topology.cancel();
    topology.wait().await;
}

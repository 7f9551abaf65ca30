//! Integration tests for element startup, shutdown and failure handling

mod common;

use bytes::Bytes;
use common::builders::{numbered, RecordFileBuilder};
use common::mock_helpers::CollectingSink;
use common::{test_context, test_timeout, unique_uri};
use std::io::Cursor;
use std::time::{Duration, Instant};
use swtrigger::config::SourceConfig;
use swtrigger::pipeline::{
    ConvertingSource, ElementConnection, ElementHandle, ElementState, FanoutBalancedSink,
    InboxSource, MessageType, PassThrough, PipelineElement, PipelineError, PipelineResult,
    ProcessingElement, RecordConverter, RecordFileSource,
};

fn wait_until_finished(handle: &ElementHandle) {
    let deadline = Instant::now() + test_timeout();
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "'{}' did not finish", handle.name());
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_state_runs_from_created_to_terminated() {
    let inbox = InboxSource::new(8);
    let feed = inbox.connection();
    let sink = CollectingSink::default();
    let element = ProcessingElement::new(Box::new(PipelineElement::new(
        "lifecycle",
        inbox,
        PassThrough,
        sink.clone(),
    )));
    assert_eq!(element.state(), ElementState::Created);
    assert_eq!(element.name(), "lifecycle");

    let handle = element.spawn().unwrap();
    feed.queue_work_item(vec![numbered(1)]).unwrap();
    feed.no_more_data().unwrap();

    wait_until_finished(&handle);
    assert_eq!(handle.state(), ElementState::Terminated);
    let stats = handle.join().unwrap();
    assert_eq!(stats.process_items, 1);
    assert_eq!(stats.end_items, 1);
    assert!(!sink.is_connected());
}

#[test]
fn test_terminate_through_inbox() {
    let sink = CollectingSink::default();
    let element = PipelineElement::new("idle", InboxSource::new(8), PassThrough, sink.clone());
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    let stats = handle.terminate_and_join().unwrap();
    assert_eq!(stats.exit_requests, 1);
    assert!(sink.messages().is_empty());
    assert!(!sink.is_connected());
}

#[test]
fn test_terminate_through_router_sink() {
    // The source never ends on its own schedule: the sink stops taking
    // input after one queued message and nobody pulls.
    let file = RecordFileBuilder::new().numbered(10).build();
    let source = ConvertingSource::new(
        RecordFileSource::new(Cursor::new(file), &SourceConfig::default()),
        RecordConverter,
    );
    let sink = FanoutBalancedSink::new(test_context(), unique_uri("exit-router")).with_high_water_mark(1);
    let element = PipelineElement::new("stalled", source, PassThrough, sink);
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    let stats = handle.terminate_and_join().unwrap();
    assert_eq!(stats.exit_requests, 1);
    assert!(stats.process_items <= 1);
    assert_eq!(stats.end_items, 0);
}

#[test]
fn test_terminate_while_waiting_for_expected_clients() {
    // The source has ended; the element now only listens to its sink.
    let inbox = InboxSource::new(8);
    let feed = inbox.connection();
    let sink = FanoutBalancedSink::new(test_context(), unique_uri("exit-ended")).with_expected_clients(1);
    let element = PipelineElement::new("ended", inbox, PassThrough, sink);
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    feed.no_more_data().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let stats = handle.terminate_and_join().unwrap();
    assert_eq!(stats.exit_requests, 1);
    assert!(stats.end_items <= 1);
}

#[test]
fn test_terminate_at_high_water_mark_with_inbox() {
    // One queued message fills the sink; the second item stays in the inbox.
    let inbox = InboxSource::new(8);
    let feed = inbox.connection();
    let sink = FanoutBalancedSink::new(test_context(), unique_uri("exit-full")).with_high_water_mark(1);
    let element = PipelineElement::new("full", inbox, PassThrough, sink);
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    feed.queue_work_item(vec![numbered(0)]).unwrap();
    feed.queue_work_item(vec![numbered(1)]).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let stats = handle.terminate_and_join().unwrap();
    assert_eq!(stats.exit_requests, 1);
    assert!(stats.process_items <= 1);
    assert_eq!(stats.end_items, 0);
}

#[test]
fn test_terminate_after_finish_only_joins() {
    let inbox = InboxSource::new(4);
    inbox.connection().no_more_data().unwrap();
    let element = PipelineElement::new("done", inbox, PassThrough, CollectingSink::default());
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    wait_until_finished(&handle);
    let stats = handle.terminate_and_join().unwrap();
    assert_eq!(stats.exit_requests, 0);
    assert_eq!(stats.end_items, 1);
}

#[test]
fn test_truncated_input_fails_element() {
    let file = RecordFileBuilder::new()
        .numbered(3)
        .raw(&[40, 0, 0, 0, 1, 2])
        .build();
    let source = ConvertingSource::new(
        RecordFileSource::new(Cursor::new(file), &SourceConfig::default()),
        RecordConverter,
    );
    let sink = CollectingSink::default();
    let element = PipelineElement::new("truncated", source, PassThrough, sink.clone());
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    let err = handle.join().unwrap_err();
    assert!(matches!(err, PipelineError::ProtocolViolation(_)), "got {}", err);

    // Records before the damage got through; the sink was still closed.
    let delivered: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|m| m.kind == MessageType::Process)
        .collect();
    assert_eq!(delivered.len(), 3);
    assert!(!sink.is_connected());
}

#[test]
fn test_failing_processor_stops_element() {
    let inbox = InboxSource::new(8);
    let feed = inbox.connection();
    let reject = |_record: Bytes| -> PipelineResult<Vec<Bytes>> {
        Err(PipelineError::protocol("record rejected"))
    };
    let element = PipelineElement::new("rejecting", inbox, reject, CollectingSink::default());
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    feed.queue_work_item(vec![numbered(0)]).unwrap();
    let err = handle.join().unwrap_err();
    assert_eq!(err.to_string(), "Protocol violation: record rejected");
}

#[test]
fn test_panicking_processor_is_reported() {
    let inbox = InboxSource::new(8);
    let feed = inbox.connection();
    let explode = |_record: Bytes| -> PipelineResult<Vec<Bytes>> { panic!("processor exploded") };
    let element = PipelineElement::new("exploding", inbox, explode, CollectingSink::default());
    let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

    feed.queue_work_item(vec![numbered(0)]).unwrap();
    match handle.join() {
        Err(PipelineError::Panicked(name)) => assert_eq!(name, "exploding"),
        other => panic!("expected a panic report, got {:?}", other.map(|s| s.total())),
    }
}

//! End-to-end behaviour of the conversation relay against stub collaborators.
//!
//! All tests run on a paused clock, so timings are deterministic.

mod common;

use common::{Harness, ScriptedAi, SinkEvent};
use parley_core::backend::AiCallError;
use parley_core::config::{DEFAULT_FALLBACK_MESSAGE, DispatchConfig};
use parley_core::conversation::{CorrespondentId, IncomingMessage};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn assert_near(actual_ms: u64, expected_ms: u64) {
    assert!(
        actual_ms.abs_diff(expected_ms) <= 20,
        "expected ~{expected_ms}ms, got {actual_ms}ms"
    );
}

fn reply_events(harness: &Harness) -> Vec<SinkEvent> {
    harness
        .sink
        .events()
        .into_iter()
        .filter(|event| !matches!(event, SinkEvent::Read(_)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_burst_collapses_into_one_dispatch() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::from_millis(100)));

    harness.send("A", "a").await;
    harness.sleep_until_ms(100).await;
    harness.send("A", "b").await;
    harness.sleep_until_ms(200).await;
    harness.send("A", "c").await;
    harness.relay.shutdown().await;

    let calls = harness.ai.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text, "a\nb\nc");
    assert_near(harness.elapsed_ms(calls[0].at), 500);
    assert_eq!(harness.sink.texts(), vec!["reply to: a\nb\nc".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_gap_produces_separate_dispatches() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::from_millis(100)));

    harness.send("A", "a").await;
    harness.sleep_until_ms(500).await;
    harness.send("A", "b").await;
    harness.relay.shutdown().await;

    let texts: Vec<String> = harness.ai.calls().into_iter().map(|call| call.text).collect();
    assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        harness.sink.texts(),
        vec!["reply to: a".to_string(), "reply to: b".to_string()]
    );
    assert_eq!(harness.ai.peak_per_sender(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_reply_is_discarded() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::from_secs(2)));

    harness.send("A", "first").await;
    // The first dispatch is waiting on the AI when the second message lands.
    harness.sleep_until_ms(1000).await;
    harness.send("A", "second").await;
    harness.relay.shutdown().await;

    let texts: Vec<String> = harness.ai.calls().into_iter().map(|call| call.text).collect();
    assert_eq!(texts, vec!["first".to_string(), "first\nsecond".to_string()]);
    assert_eq!(harness.ai.peak_per_sender(), 1);

    // Nothing from the stale reply reached the sink.
    assert_eq!(harness.sink.texts(), vec!["reply to: first\nsecond".to_string()]);

    // Both inputs are in history exactly once; the stale reply is not.
    assert_eq!(
        harness.history.transcript("A"),
        vec![
            ("first".to_string(), true),
            ("second".to_string(), true),
            ("reply to: first\nsecond".to_string(), false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_admission_bounds_concurrent_ai_calls() {
    let config = DispatchConfig {
        max_concurrent_calls: 3,
        ..DispatchConfig::default()
    };
    let harness = Harness::new(config, ScriptedAi::echo(Duration::from_secs(1)));

    for i in 0..8 {
        harness.send(&format!("sender-{i}"), "hello").await;
    }
    harness.relay.shutdown().await;

    assert_eq!(harness.ai.calls().len(), 8);
    assert_eq!(harness.ai.peak_total(), 3);
    assert_eq!(harness.sink.texts().len(), 8);

    let stats = harness.relay.stats().await;
    assert_eq!(stats.sessions, 8);
    assert_eq!(stats.in_flight_calls, 0);
    assert_eq!(stats.call_capacity, 3);
}

#[tokio::test(start_paused = true)]
async fn test_bubble_triplets_never_interleave_across_senders() {
    let ai = ScriptedAi::new(Duration::from_millis(200), |sender, _| {
        Ok(format!("{sender} one\n\n{sender} two\n\n{sender} three"))
    });
    let harness = Harness::new(DispatchConfig::default(), ai);

    harness.send("A", "hi").await;
    harness.send("B", "hi").await;
    harness.relay.shutdown().await;

    let events = reply_events(&harness);
    assert_eq!(events.len(), 18);
    for triplet in events.chunks(3) {
        let owner = triplet[0].sender().to_string();
        assert_eq!(triplet[0], SinkEvent::TypingOn(owner.clone()));
        assert!(matches!(&triplet[1], SinkEvent::Text(sender, _) if *sender == owner));
        assert_eq!(triplet[2], SinkEvent::TypingOff(owner));
    }
    assert_eq!(harness.sink.peak_concurrent_calls(), 1);

    // Each sender's bubbles arrive in reply order.
    let a_texts: Vec<String> = events
        .iter()
        .filter_map(|event| match event {
            SinkEvent::Text(sender, text) if sender == "A" => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(a_texts, vec!["A one", "A two", "A three"]);
}

#[tokio::test(start_paused = true)]
async fn test_read_receipt_waits_for_open_triplet() {
    let ai = ScriptedAi::new(Duration::from_millis(200), |sender, _| {
        Ok(match sender {
            "A" => "A1\n\nA2\n\nA3".to_string(),
            _ => "B1".to_string(),
        })
    });
    let harness = Harness::new(DispatchConfig::default(), ai);

    harness.send("A", "hi").await;
    // A's bubbles are being delivered from 500ms onward.
    harness.sleep_until_ms(1500).await;
    harness.send("B", "hey").await;
    harness.relay.shutdown().await;

    let events = harness.sink.events();
    let mut open: Option<String> = None;
    for event in &events {
        match event {
            SinkEvent::TypingOn(sender) => {
                assert_eq!(open, None, "triplet opened inside another: {events:?}");
                open = Some(sender.clone());
            }
            SinkEvent::TypingOff(sender) => {
                assert_eq!(open.as_deref(), Some(sender.as_str()));
                open = None;
            }
            SinkEvent::Read(sender) => {
                assert_eq!(open, None, "Read({sender}) inside an open triplet: {events:?}");
            }
            SinkEvent::Text(..) => {}
        }
    }

    let read_b = events
        .iter()
        .position(|event| *event == SinkEvent::Read("B".into()))
        .unwrap();
    assert_eq!(events[read_b - 1], SinkEvent::TypingOff("A".into()));
    assert!(matches!(events[read_b + 1], SinkEvent::TypingOn(_)));
    assert_eq!(harness.sink.peak_concurrent_calls(), 1);
    assert_eq!(harness.sink.texts().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_two_message_burst_end_to_end() {
    let ai = ScriptedAi::new(Duration::from_secs(1), |_, _| {
        Ok("Hey!\n\nYes, I'm here.".to_string())
    });
    let harness = Harness::new(DispatchConfig::default(), ai);

    harness.send("A", "hi").await;
    harness.sleep_until_ms(100).await;
    harness.send("A", "still there?").await;
    harness.relay.shutdown().await;

    let calls = harness.ai.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text, "hi\nstill there?");
    assert_eq!(calls[0].context_len, 2);
    assert_near(harness.elapsed_ms(calls[0].at), 400);

    let events = harness.sink.timed_events();
    let kinds: Vec<SinkEvent> = events.iter().map(|(_, event)| event.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            SinkEvent::Read("A".into()),
            SinkEvent::TypingOn("A".into()),
            SinkEvent::Text("A".into(), "Hey!".into()),
            SinkEvent::TypingOff("A".into()),
            SinkEvent::TypingOn("A".into()),
            SinkEvent::Text("A".into(), "Yes, I'm here.".into()),
            SinkEvent::TypingOff("A".into()),
        ]
    );
    assert_near(harness.elapsed_ms(events[0].0), 400);
    assert_near(harness.elapsed_ms(events[1].0), 1400);
    assert_near(harness.elapsed_ms(events[2].0), 2400);
    assert_near(harness.elapsed_ms(events[5].0), 3400);

    assert_eq!(
        harness.history.transcript("A"),
        vec![
            ("hi".to_string(), true),
            ("still there?".to_string(), true),
            ("Hey!".to_string(), false),
            ("Yes, I'm here.".to_string(), false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_typing_delay_grows_with_bubble_length() {
    let long = "x".repeat(250);
    let reply = format!("ok\n\n{long}");
    let ai = ScriptedAi::new(Duration::ZERO, move |_, _| Ok(reply.clone()));
    let harness = Harness::new(DispatchConfig::default(), ai);

    harness.send("A", "go").await;
    harness.relay.shutdown().await;

    let events = harness.sink.timed_events();
    let typing_starts: Vec<_> = events
        .iter()
        .filter(|(_, event)| matches!(event, SinkEvent::TypingOn(_)))
        .map(|(at, _)| *at)
        .collect();
    let sends: Vec<_> = events
        .iter()
        .filter(|(_, event)| matches!(event, SinkEvent::Text(..)))
        .map(|(at, _)| *at)
        .collect();

    assert_eq!(sends.len(), 2);
    let short_delay = sends[0].duration_since(typing_starts[0]).as_millis() as u64;
    let long_delay = sends[1].duration_since(typing_starts[1]).as_millis() as u64;
    assert_near(short_delay, 1000);
    assert_near(long_delay, 3000);
}

#[tokio::test(start_paused = true)]
async fn test_ai_failure_sends_fallback() {
    let ai = ScriptedAi::new(Duration::from_millis(100), |_, _| {
        Err(AiCallError::Transport("connection refused".to_string()))
    });
    let harness = Harness::new(DispatchConfig::default(), ai);

    harness.send("A", "hello?").await;
    harness.relay.shutdown().await;

    assert_eq!(harness.sink.texts(), vec![DEFAULT_FALLBACK_MESSAGE.to_string()]);
    assert_eq!(harness.history.transcript("A"), vec![("hello?".to_string(), true)]);
}

#[tokio::test(start_paused = true)]
async fn test_blank_reply_counts_as_failure() {
    let ai = ScriptedAi::new(Duration::ZERO, |_, _| Ok("  \n\n \n".to_string()));
    let harness = Harness::new(DispatchConfig::default(), ai);

    harness.send("A", "hello?").await;
    harness.relay.shutdown().await;

    assert_eq!(harness.sink.texts(), vec![DEFAULT_FALLBACK_MESSAGE.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_ai_call_times_out_into_fallback() {
    let config = DispatchConfig {
        ai_call_timeout_ms: Some(500),
        fallback_message: "one moment".to_string(),
        ..DispatchConfig::default()
    };
    let harness = Harness::new(config, ScriptedAi::echo(Duration::from_secs(10)));

    harness.send("A", "hi").await;
    harness.relay.shutdown().await;

    let events = harness.sink.timed_events();
    let (sent_at, text) = events
        .iter()
        .find_map(|(at, event)| match event {
            SinkEvent::Text(_, text) => Some((*at, text.clone())),
            _ => None,
        })
        .expect("fallback bubble");
    assert_eq!(text, "one moment");
    // 300ms debounce, 500ms timeout, 1s typing delay.
    assert_near(harness.elapsed_ms(sent_at), 1800);
}

#[tokio::test(start_paused = true)]
async fn test_previous_turns_are_sent_as_context() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::ZERO));

    harness.send("A", "hi").await;
    harness.sleep_until_ms(5000).await;
    harness.send("A", "again").await;
    harness.relay.shutdown().await;

    let context: Vec<usize> = harness.ai.calls().iter().map(|call| call.context_len).collect();
    assert_eq!(context, vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_replayed_event_is_ignored() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::ZERO));

    harness
        .relay
        .on_incoming_message(IncomingMessage::new("A", "hi", 7))
        .await;
    harness
        .relay
        .on_incoming_message(IncomingMessage::new("A", "hi", 7))
        .await;
    harness.relay.shutdown().await;

    assert_eq!(harness.ai.calls().len(), 1);
    assert_eq!(harness.ai.calls()[0].text, "hi");
    assert_eq!(harness.history.transcript("A").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reset_session_drops_pending_messages() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::ZERO));
    let sender = CorrespondentId::from("A");

    harness.send("A", "hi").await;
    harness.sleep_until_ms(100).await;
    assert!(harness.relay.reset_session(&sender).await);
    assert!(!harness.relay.reset_session(&sender).await);
    harness.relay.shutdown().await;

    assert!(harness.ai.calls().is_empty());
    assert!(harness.sink.events().is_empty());
    assert!(harness.relay.session_snapshot(&sender).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_session_snapshot_tracks_armed_timer() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::ZERO));
    let sender = CorrespondentId::from("A");

    harness.send("A", "one").await;
    harness.send("A", "two").await;

    let snapshot = harness
        .relay
        .session_snapshot(&sender)
        .await
        .expect("session exists");
    assert_eq!(snapshot.pending, 2);
    assert_eq!(snapshot.generation, 2);
    assert!(snapshot.timer_armed);
    assert!(!snapshot.dispatch_active);

    harness.relay.shutdown().await;
    let snapshot = harness.relay.session_snapshot(&sender).await.unwrap();
    assert_eq!(snapshot.pending, 0);
    assert!(!snapshot.dispatch_active);
}

#[tokio::test(start_paused = true)]
async fn test_run_drains_stream_and_in_flight_work() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::from_millis(100)));
    let events = vec![
        harness.event("A", "one"),
        harness.event("B", "hello"),
        harness.event("A", "two"),
    ];

    harness
        .relay
        .run(futures::stream::iter(events), CancellationToken::new())
        .await;

    let mut texts = harness.sink.texts();
    texts.sort();
    assert_eq!(
        texts,
        vec!["reply to: hello".to_string(), "reply to: one\ntwo".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_cancellation() {
    let harness = Harness::new(DispatchConfig::default(), ScriptedAi::echo(Duration::ZERO));
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    harness
        .relay
        .run(futures::stream::pending::<IncomingMessage>(), shutdown)
        .await;

    assert!(harness.sink.events().is_empty());
}

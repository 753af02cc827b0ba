// Integration tests for the transcription session lifecycle
//
// These tests drive the manager with a scripted provider and verify start,
// audio routing, finalization and abnormal close.

mod support;

use anyhow::Result;
use dictation_gateway::session::SessionId;
use dictation_gateway::transport::{ClientMessage, CloseCode};
use std::time::Duration;
use support::{eventually, harness, settle};

#[tokio::test]
async fn test_results_are_delivered_in_order_on_stop() -> Result<()> {
    let h = harness();
    let id = SessionId::new("s1");
    h.clients.connect(&id);

    h.manager.start(&id).await?;
    assert_eq!(h.provider.open_count(), 1);

    let stream = h.provider.stream(0);
    stream.events.on_result("A");
    stream.events.on_result("B");

    h.manager.request_stop(&id).await;
    assert_eq!(stream.close_count(), 1);
    stream.events.on_completed();

    eventually("final transcript", || h.clients.closes(&id).len() == 1).await;

    assert_eq!(h.clients.messages(&id), vec![ClientMessage::transcript("AB")]);
    assert_eq!(h.clients.raw_messages(&id), vec![r#"{"transcript":"AB"}"#]);
    assert_eq!(h.clients.closes(&id), vec![CloseCode::Normal]);
    assert_eq!(h.manager.registry().active_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_many_fragments_concatenate_exactly() -> Result<()> {
    let h = harness();
    let id = SessionId::new("long");
    h.clients.connect(&id);
    h.manager.start(&id).await?;

    let stream = h.provider.stream(0);
    let fragments: Vec<String> = (0..200).map(|i| format!("{}。", i)).collect();
    for fragment in &fragments {
        stream.events.on_result(fragment.as_str());
    }

    h.manager.request_stop(&id).await;
    stream.events.on_completed();

    eventually("final transcript", || !h.clients.messages(&id).is_empty()).await;
    assert_eq!(
        h.clients.messages(&id),
        vec![ClientMessage::transcript(fragments.concat())]
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_transcript_is_still_delivered() -> Result<()> {
    let h = harness();
    let id = SessionId::new("silent");
    h.clients.connect(&id);
    h.manager.start(&id).await?;

    h.manager.request_stop(&id).await;
    h.provider.stream(0).events.on_completed();

    eventually("close", || h.clients.closes(&id).len() == 1).await;
    assert_eq!(h.clients.messages(&id), vec![ClientMessage::transcript("")]);
    Ok(())
}

#[tokio::test]
async fn test_finalization_happens_once() -> Result<()> {
    let h = harness();
    let id = SessionId::new("twice");
    h.clients.connect(&id);
    h.manager.start(&id).await?;

    let stream = h.provider.stream(0);
    stream.events.on_result("done");

    h.manager.request_stop(&id).await;
    h.manager.request_stop(&id).await;
    stream.events.on_completed();
    stream.events.on_completed();

    eventually("close", || h.clients.closes(&id).len() == 1).await;
    settle().await;

    assert_eq!(stream.close_count(), 1);
    assert_eq!(h.clients.messages(&id).len(), 1);
    assert_eq!(h.clients.closes(&id), vec![CloseCode::Normal]);

    // Late stop after finalization is a no-op
    h.manager.request_stop(&id).await;
    assert_eq!(stream.close_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_audio_is_forwarded_to_live_stream() -> Result<()> {
    let h = harness();
    let id = SessionId::new("audio");
    h.clients.connect(&id);
    h.manager.start(&id).await?;

    h.manager.route_audio(&id, vec![1; 3200]);
    h.manager.route_audio(&id, vec![2; 3200]);

    let audio = h.provider.stream(0).audio();
    assert_eq!(audio.len(), 2);
    assert_eq!(audio[0], vec![1; 3200]);
    assert_eq!(audio[1], vec![2; 3200]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_session_operations_are_noops() -> Result<()> {
    let h = harness();
    let id = SessionId::new("ghost");
    h.clients.connect(&id);

    h.manager.route_audio(&id, vec![0; 3200]);
    h.manager.request_stop(&id).await;
    h.manager.abnormal_close(&id).await;
    settle().await;

    assert_eq!(h.provider.attempts(), 0);
    assert!(h.clients.messages(&id).is_empty());
    assert!(h.clients.closes(&id).is_empty());
    assert!(h.manager.transcript(&id).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_start_is_idempotent() -> Result<()> {
    let h = harness();
    let id = SessionId::new("dup");

    h.manager.start(&id).await?;
    h.manager.start(&id).await?;

    assert_eq!(h.provider.attempts(), 1);
    assert_eq!(h.manager.registry().active_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_start_failure_propagates() {
    let h = harness();
    let id = SessionId::new("down");
    h.provider.fail_next_opens(1);

    let result = h.manager.start(&id).await;

    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("scripted failure"));
    assert_eq!(h.manager.registry().active_count(), 0);
}

#[tokio::test]
async fn test_carry_over_seeds_transcript() -> Result<()> {
    let h = harness();
    let id = SessionId::new("seeded");
    h.manager.start_with(&id, "前回の".to_string()).await?;

    h.provider.stream(0).events.on_result("続き");

    let mut transcript = None;
    for _ in 0..100 {
        transcript = h.manager.transcript(&id).await;
        if transcript.as_deref() == Some("前回の続き") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(transcript.as_deref(), Some("前回の続き"));
    Ok(())
}

#[tokio::test]
async fn test_completion_without_stop_is_ignored() -> Result<()> {
    let h = harness();
    let id = SessionId::new("spurious");
    h.clients.connect(&id);
    h.manager.start(&id).await?;

    h.provider.stream(0).events.on_completed();
    settle().await;

    assert!(h.clients.messages(&id).is_empty());
    assert!(h.clients.closes(&id).is_empty());
    assert!(h.manager.registry().contains(&id));
    Ok(())
}

#[tokio::test]
async fn test_abnormal_close_releases_everything_silently() -> Result<()> {
    let h = harness();
    let id = SessionId::new("dropped");
    h.clients.connect(&id);
    h.manager.start(&id).await?;

    let stream = h.provider.stream(0);
    stream.events.on_result("lost");

    h.clients.disconnect(&id);
    h.manager.abnormal_close(&id).await;

    assert_eq!(stream.close_count(), 1);
    assert_eq!(h.manager.registry().active_count(), 0);
    assert!(!h.manager.registry().is_recovering(&id));

    // Events from the released stream change nothing
    stream.events.on_completed();
    h.manager.route_audio(&id, vec![0; 3200]);
    settle().await;

    assert!(stream.audio().is_empty());
    assert!(h.clients.messages(&id).is_empty());
    assert!(h.clients.closes(&id).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_send_failure_is_swallowed() -> Result<()> {
    let h = harness();
    let id = SessionId::new("broken-pipe");
    h.clients.connect(&id);
    h.manager.start(&id).await?;
    h.clients.fail_sends();

    let stream = h.provider.stream(0);
    stream.events.on_result("x");
    h.manager.request_stop(&id).await;
    stream.events.on_completed();

    eventually("close after failed send", || h.clients.closes(&id).len() == 1).await;
    assert_eq!(h.manager.registry().active_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_sessions_are_isolated() -> Result<()> {
    let h = harness();
    let a = SessionId::new("a");
    let b = SessionId::new("b");
    h.clients.connect(&a);
    h.clients.connect(&b);
    h.manager.start(&a).await?;
    h.manager.start(&b).await?;

    h.provider.stream(0).events.on_result("alpha");
    h.provider.stream(1).events.on_result("beta");

    h.manager.request_stop(&a).await;
    h.provider.stream(0).events.on_completed();

    eventually("a finalized", || h.clients.closes(&a).len() == 1).await;
    assert_eq!(h.clients.messages(&a), vec![ClientMessage::transcript("alpha")]);
    assert!(h.clients.messages(&b).is_empty());
    assert!(h.manager.registry().contains(&b));
    Ok(())
}

//! Long-poll synchronization waiter.
//!
//! Reloads the conversation fresh on every iteration and peeks for new
//! answers or unseen notes. On a hit, the pre-mutation state is frozen for
//! rendering, seen flags are flipped and persisted, and the payload is
//! returned. Concurrent waiters on one conversation are not serialized;
//! interleaved peek/mark cycles are a known hazard of the storage model.

use std::io;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::model::{Conversation, Note};
use super::status::{AnswerDelta, collect_new_answers, collect_new_notes};
use super::store::ConversationStore;

/// Default long-poll timeout (ms) when the caller does not pass one.
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Fixed suspend interval between reload attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Terminal state of one wait call.
#[derive(Debug)]
pub struct WaitOutcome {
    pub answers: Vec<AnswerDelta>,
    pub notes: Vec<Note>,
    /// Frozen snapshot from before seen flags were flipped; this is what
    /// the delivery payload is rendered from.
    pub conversation: Conversation,
    /// Timeout is not an error, just a flagged empty delivery.
    pub timed_out: bool,
}

/// Block until the conversation has a new answer or unseen note, or the
/// timeout elapses. The shutdown token unblocks in-flight waiters during
/// graceful shutdown; a transport-level cancel simply drops the future.
pub async fn wait_for_activity(
    store: &ConversationStore,
    id: &str,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> io::Result<WaitOutcome> {
    let start = Instant::now();

    while start.elapsed() < timeout {
        let mut conversation = store.load(id)?;
        let answers = collect_new_answers(&mut conversation, false);
        let notes = collect_new_notes(&mut conversation, false);

        if !answers.is_empty() || !notes.is_empty() {
            let snapshot = conversation.clone();
            collect_new_answers(&mut conversation, true);
            collect_new_notes(&mut conversation, true);
            store.save(id, &conversation)?;

            return Ok(WaitOutcome {
                answers,
                notes,
                conversation: snapshot,
                timed_out: false,
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    // Timed out (or shutting down): current status, nothing delivered.
    let conversation = store.load(id)?;
    Ok(WaitOutcome {
        answers: Vec::new(),
        notes: Vec::new(),
        conversation,
        timed_out: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::model::Note;
    use crate::conversation::parser::parse_chunk;
    use crate::markers::MarkerTable;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> ConversationStore {
        ConversationStore::new(dir.join("data"), Arc::new(MarkerTable::default())).unwrap()
    }

    #[tokio::test]
    async fn test_timeout_elapses_fully() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let shutdown = CancellationToken::new();

        let start = Instant::now();
        let outcome = wait_for_activity(&store, "demo", Duration::from_millis(800), &shutdown)
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(outcome.answers.is_empty());
        // returns after ~the timeout, not immediately
        assert!(start.elapsed() >= Duration::from_millis(750));
        assert!(start.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_existing_new_answer_returns_first_pass() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let shutdown = CancellationToken::new();

        let parsed = parse_chunk("**q1**: Pick?\n[A] Yes").unwrap();
        let (_, mut conv) = store.append_questions("demo", vec![parsed]).unwrap();
        conv.questions[0].options[0].checked = true;
        store.save("demo", &conv).unwrap();

        let start = Instant::now();
        let outcome = wait_for_activity(&store, "demo", Duration::from_secs(30), &shutdown)
            .await
            .unwrap();

        assert!(!outcome.timed_out);
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(outcome.answers.len(), 1);
        assert_eq!(outcome.answers[0].selected[0].id, "A");

        // the returned snapshot predates the seen-flag mutation
        assert!(!outcome.conversation.questions[0].options[0].seen);

        // but the persisted document is marked seen
        let reloaded = store.load("demo").unwrap();
        assert!(reloaded.questions[0].options[0].seen);
        let second = wait_for_activity(&store, "demo", Duration::from_millis(600), &shutdown)
            .await
            .unwrap();
        assert!(second.timed_out);
    }

    #[tokio::test]
    async fn test_unseen_note_wakes_waiter() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let shutdown = CancellationToken::new();

        store
            .append_note("demo", Note::from_text("\\idea poke the waiter"))
            .unwrap();

        let outcome = wait_for_activity(&store, "demo", Duration::from_secs(30), &shutdown)
            .await
            .unwrap();

        assert!(!outcome.timed_out);
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.notes[0].category, "idea");

        let reloaded = store.load("demo").unwrap();
        assert!(reloaded.notes[0].seen);
    }

    #[tokio::test]
    async fn test_answer_arriving_mid_wait_is_picked_up() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let shutdown = CancellationToken::new();

        let parsed = parse_chunk("**q1**: Pick?\n[A] Yes").unwrap();
        store.append_questions("demo", vec![parsed]).unwrap();

        let answering_store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut conv = answering_store.load("demo").unwrap();
            conv.questions[0].options[0].checked = true;
            answering_store.save("demo", &conv).unwrap();
        });

        let outcome = wait_for_activity(&store, "demo", Duration::from_secs(30), &shutdown)
            .await
            .unwrap();
        assert!(!outcome.timed_out);
        assert_eq!(outcome.answers.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancellation_unblocks_waiter() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let outcome = wait_for_activity(&store, "demo", Duration::from_secs(300), &shutdown)
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}

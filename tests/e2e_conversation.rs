//! End-to-end conversation tests.
//!
//! Two in-process peers backed by scripted completion backends exchange
//! wire strings through the orchestrator; transcripts land in a memory or
//! file sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use efficode::completion::{ChatMessage, CompletionBackend, CompletionError};
use efficode::conversation::{AbortReason, CancelFlag, Conversation, ConversationState};
use efficode::peer::{Peer, PeerRole, Persona};
use efficode::transcript::{FileSink, MemorySink, TranscriptRecord, TranscriptSink};

/// Scripted backend: numbered replies, optional failure or cancellation on
/// a given call (1-based).
#[derive(Clone)]
struct Scripted {
    name: &'static str,
    calls: Arc<AtomicUsize>,
    fail_on: Option<usize>,
    cancel_on: Option<(usize, CancelFlag)>,
    padding: usize,
}

impl Scripted {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on: None,
            cancel_on: None,
            padding: 0,
        }
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    fn cancelling_on(mut self, call: usize, flag: CancelFlag) -> Self {
        self.cancel_on = Some((call, flag));
        self
    }

    fn padded(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionBackend for Scripted {
    fn complete(&self, _history: &[ChatMessage]) -> Result<String, CompletionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(CompletionError::Timeout);
        }
        if let Some((at, flag)) = &self.cancel_on {
            if *at == call {
                flag.cancel();
            }
        }
        Ok(format!("{} reply {}{}", self.name, call, " and so on".repeat(self.padding)))
    }
}

fn sage(backend: Scripted) -> Peer {
    Peer::new(Persona::new("Sage", PeerRole::Questioner), backend)
}

fn lens(backend: Scripted) -> Peer {
    Peer::new(Persona::new("Lens", PeerRole::Answerer), backend)
}

/// Test three rounds produce seven turns and finish DONE
#[test]
fn test_three_rounds_yield_seven_turns() {
    let sink = MemorySink::new();
    let questions = Scripted::new("Sage");
    let answers = Scripted::new("Lens");

    let outcome = Conversation::new(sage(questions.clone()), lens(answers.clone()), sink.clone())
        .with_max_rounds(3)
        .run(Some("tides"));

    assert_eq!(outcome.state, ConversationState::Done);
    assert!(outcome.abort_reason.is_none());
    assert_eq!(outcome.transcript.len(), 7);
    assert!(outcome.persisted);

    let senders: Vec<_> = outcome.transcript.iter().map(|t| t.sender.as_str()).collect();
    assert_eq!(senders, ["operator", "Sage", "Lens", "Sage", "Lens", "Sage", "Lens"]);
    assert_eq!(
        outcome.transcript.turns()[0].display_content(),
        "Let's explore and think about 'tides'"
    );

    // seed + two follow-ups for the questioner, one answer per round
    assert_eq!(questions.calls(), 3);
    assert_eq!(answers.calls(), 3);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mode, "exploration");
    assert_eq!(records[0].messages.len(), 7);
    assert_eq!(records[0].agent1.name, "Sage");
}

/// Test the questioner leads even when given second
#[test]
fn test_questioner_leads_regardless_of_order() {
    let outcome = Conversation::new(
        lens(Scripted::new("Lens")),
        sage(Scripted::new("Sage")),
        MemorySink::new(),
    )
    .with_max_rounds(1)
    .run(None);

    let senders: Vec<_> = outcome.transcript.iter().map(|t| t.sender.as_str()).collect();
    assert_eq!(senders, ["operator", "Sage", "Lens"]);
}

/// Test a failing answerer aborts with the partial transcript kept
#[test]
fn test_peer_failure_keeps_partial_transcript() {
    let sink = MemorySink::new();
    let outcome = Conversation::new(
        sage(Scripted::new("Sage")),
        lens(Scripted::new("Lens").failing_on(2)),
        sink.clone(),
    )
    .with_max_rounds(5)
    .run(None);

    assert_eq!(outcome.state, ConversationState::Aborted);
    assert_eq!(outcome.abort_reason, Some(AbortReason::PeerUnresponsive));
    // seed, Q1, A1, Q2
    assert_eq!(outcome.transcript.len(), 4);
    assert!(outcome.persisted);
    assert_eq!(sink.records()[0].messages.len(), 4);
}

/// Test cancellation is honoured at the next turn boundary and still persists
#[test]
fn test_cancellation_flushes_transcript() {
    let cancel = CancelFlag::new();
    let sink = MemorySink::new();
    let answers = Scripted::new("Lens");

    let outcome = Conversation::new(
        sage(Scripted::new("Sage").cancelling_on(2, cancel.clone())),
        lens(answers.clone()),
        sink.clone(),
    )
    .with_cancel_flag(cancel)
    .with_max_rounds(5)
    .run(None);

    assert_eq!(outcome.state, ConversationState::Aborted);
    assert_eq!(outcome.abort_reason, Some(AbortReason::Cancelled));
    assert_eq!(outcome.transcript.len(), 4);
    assert_eq!(answers.calls(), 1);
    assert_eq!(sink.records().len(), 1);
}

/// Test an unverifiable peer aborts the handshake before any completion
#[test]
fn test_handshake_failure_aborts() {
    let questions = Scripted::new("Sage");
    let nameless = Peer::new(Persona::new("", PeerRole::Questioner), questions.clone());

    let sink = MemorySink::new();
    let outcome = Conversation::new(nameless, lens(Scripted::new("Lens")), sink.clone()).run(None);

    assert_eq!(outcome.state, ConversationState::Aborted);
    assert_eq!(outcome.abort_reason, Some(AbortReason::AuthFailed));
    assert!(outcome.transcript.is_empty());
    assert_eq!(questions.calls(), 0);
    assert_eq!(sink.records().len(), 1);
}

/// Test long replies travel compressed but are recorded decompressed
#[test]
fn test_compressed_turns_recorded_decompressed() {
    let outcome = Conversation::new(
        sage(Scripted::new("Sage")),
        lens(Scripted::new("Lens").padded(80)),
        MemorySink::new(),
    )
    .with_max_rounds(1)
    .run(None);

    assert!(outcome.is_done());
    let answer = &outcome.transcript.turns()[2];
    assert_eq!(answer.sender, "Lens");
    assert!(answer.rendered_message.contains("compression-method="));
    assert!(answer.display_content().starts_with("Lens reply 1 and so on"));
    assert!(answer.display_content().len() > 500);
}

/// Test transcripts are written as .json and .spl files
#[test]
fn test_file_sink_persistence() {
    let tmp = tempfile::tempdir().unwrap();
    let logs = tmp.path().join("logs");

    let outcome = Conversation::new(
        sage(Scripted::new("Sage")),
        lens(Scripted::new("Lens")),
        FileSink::new(&logs),
    )
    .with_max_rounds(2)
    .run(Some("rivers"));
    assert!(outcome.persisted);

    let mut names: Vec<String> = std::fs::read_dir(&logs)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("dialogue_exploration_") && names[0].ends_with(".json"));
    assert!(names[1].ends_with(".spl"));

    let flat = std::fs::read_to_string(logs.join(&names[1])).unwrap();
    assert!(flat.starts_with("operator: Let's explore and think about 'rivers'\n\n"));
    assert_eq!(flat.matches("\n\n").count(), 5);
}

/// Test a storage failure leaves the finished conversation intact
#[test]
fn test_storage_failure_is_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("occupied");
    std::fs::write(&blocker, b"file, not a directory").unwrap();

    let outcome = Conversation::new(
        sage(Scripted::new("Sage")),
        lens(Scripted::new("Lens")),
        FileSink::new(&blocker),
    )
    .with_max_rounds(1)
    .run(None);

    assert_eq!(outcome.state, ConversationState::Done);
    assert!(!outcome.persisted);
    assert_eq!(outcome.transcript.len(), 3);
}

/// Sink whose storage never answers in time
struct Stalled;

impl TranscriptSink for Stalled {
    fn persist(&mut self, _record: &TranscriptRecord) -> efficode::Result<()> {
        std::thread::sleep(Duration::from_secs(3));
        Ok(())
    }
}

/// Test a hung transcript write is cut off at the configured bound
#[test]
fn test_stalled_storage_is_bounded() {
    let started = Instant::now();
    let outcome = Conversation::new(
        sage(Scripted::new("Sage")),
        lens(Scripted::new("Lens")),
        Stalled,
    )
    .with_write_timeout(Duration::from_millis(100))
    .with_max_rounds(1)
    .run(None);

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(outcome.state, ConversationState::Done);
    assert!(!outcome.persisted);
    assert_eq!(outcome.transcript.len(), 3);
}

/// Test each session writes its own files and records its id
#[test]
fn test_sessions_write_separate_files() {
    let tmp = tempfile::tempdir().unwrap();
    let mut ids = Vec::new();
    for _ in 0..2 {
        let outcome = Conversation::new(
            sage(Scripted::new("Sage")),
            lens(Scripted::new("Lens")),
            FileSink::new(tmp.path()),
        )
        .with_max_rounds(1)
        .run(None);
        assert!(outcome.persisted);
        ids.push(outcome.session_id);
    }

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 4);
    for id in &ids {
        let prefix: String = id.chars().take(8).collect();
        let json = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| {
                let name = p.file_name().unwrap().to_string_lossy().into_owned();
                name.ends_with(&format!("_{prefix}.json"))
            })
            .unwrap();
        let record: TranscriptRecord =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(&record.session_id, id);
    }
}

/// Test interactive relay records operator, questioner and answerer turns
#[test]
fn test_interactive_relay() {
    let sink = MemorySink::new();
    let mut conversation = Conversation::new(
        sage(Scripted::new("Sage")),
        lens(Scripted::new("Lens")),
        sink.clone(),
    );

    let turns = conversation.relay("what are tides?").unwrap();
    let senders: Vec<_> = turns.iter().map(|t| t.sender.as_str()).collect();
    assert_eq!(senders, ["operator", "Sage", "Lens"]);
    assert_eq!(conversation.state(), ConversationState::Exchanging);

    assert_eq!(conversation.relay("and the moon?").unwrap().len(), 3);

    let outcome = conversation.finish();
    assert_eq!(outcome.state, ConversationState::Done);
    assert_eq!(outcome.transcript.len(), 6);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mode, "interactive");
}

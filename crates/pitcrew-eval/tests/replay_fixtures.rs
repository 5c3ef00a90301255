//! Replays the repository's recorded conversations against a fully wired
//! dispatcher: in-memory repository, buffered build topic with no worker
//! attached, empty status store, temporary artifact store.

use std::path::PathBuf;
use std::sync::Arc;

use pitcrew_core::delegates::standard_team;
use pitcrew_core::dispatcher::Dispatcher;
use pitcrew_core::session::SessionStore;
use pitcrew_core::tools::ToolRegistry;
use pitcrew_eval::{EvalRunner, load_all};
use pitcrew_queue::topic::build_topic;
use pitcrew_queue::{QueuePayload, StatusStore};
use pitcrew_store::{ArtifactStore, TicketIssuer};
use pitcrew_vcs::{Heads, InMemoryRepo, RepoProvider};

struct Harness {
    dispatcher: Arc<Dispatcher>,
    // Keeps the topic open so publishes buffer instead of failing
    _build_rx: tokio::sync::mpsc::Receiver<QueuePayload>,
    _artifacts_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let repo: Arc<dyn RepoProvider> = Arc::new(InMemoryRepo::default());
    let (publisher, build_rx) = build_topic(64);
    let status = Arc::new(StatusStore::in_memory().unwrap());
    let artifacts_dir = tempfile::TempDir::new().unwrap();
    let artifacts = Arc::new(ArtifactStore::new(artifacts_dir.path()));
    let issuer = Arc::new(TicketIssuer::new("http://localhost:8000"));

    let mut registry = ToolRegistry::new();
    pitcrew_queue::tools::register_all(&mut registry, publisher, status);
    pitcrew_vcs::tools::register_all(&mut registry, repo.clone());
    pitcrew_store::tools::register_all(&mut registry, artifacts, issuer, false);

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(standard_team()),
        Arc::new(SessionStore::new()),
        Arc::new(Heads::new(repo)),
    );

    Harness {
        dispatcher: Arc::new(dispatcher),
        _build_rx: build_rx,
        _artifacts_dir: artifacts_dir,
    }
}

fn evals_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../evals")
        .canonicalize()
        .expect("evals directory exists")
}

#[tokio::test]
async fn replay_all_recorded_conversations() {
    let sets = load_all(&evals_dir()).unwrap();
    assert!(!sets.is_empty());

    for set in sets {
        let harness = harness();
        let runner = EvalRunner::new(harness.dispatcher.clone());
        let report = runner.run_set(&set).await.unwrap();
        assert!(report.passed(), "eval set failed:\n{}", report.summary());
    }
}

#[tokio::test]
async fn replaying_twice_reproduces_the_trajectory() {
    let sets = load_all(&evals_dir()).unwrap();
    let set = sets
        .iter()
        .find(|s| s.eval_set_id == "build_flow")
        .expect("build_flow fixture present");

    for _ in 0..2 {
        let harness = harness();
        let runner = EvalRunner::new(harness.dispatcher.clone());
        let report = runner.run_set(set).await.unwrap();
        assert!(report.passed(), "{}", report.summary());
    }
}

#[tokio::test]
async fn trajectory_divergence_is_reported() {
    // Mutate the recording so the replay must fail
    let mut sets = load_all(&evals_dir()).unwrap();
    let set = sets
        .iter_mut()
        .find(|s| s.eval_set_id == "build_confirm")
        .expect("build_confirm fixture present");
    set.eval_cases[0].conversation[0].expected_tool_use[0]
        .tool_input
        .insert(
            "agent_name".to_string(),
            serde_json::Value::String("vcs".to_string()),
        );

    let harness = harness();
    let runner = EvalRunner::new(harness.dispatcher.clone());
    let report = runner.run_set(set).await.unwrap();
    assert!(!report.passed());
    assert!(report.summary().contains("FAIL"));
}

//! Replay runner
//!
//! Feeds each scripted conversation through the dispatcher and compares the
//! produced tool trajectory to the recording. Tool names and argument maps
//! must match exactly and in order; replies are scored by token overlap and
//! only need to clear a permissive threshold, since prose may legitimately
//! vary between revisions of the router.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use pitcrew_core::dispatcher::Dispatcher;
use pitcrew_core::types::{FrontendKind, IncomingTurn, TurnOutcome};

use crate::model::{EvalCase, EvalSet, EvalTurn};

/// Default minimum token-overlap score for replies
pub const DEFAULT_RESPONSE_THRESHOLD: f64 = 0.2;

/// User id recorded conversations replay under
const EVAL_USER_ID: &str = "eval_user";

/// One way a replayed turn can diverge from the recording
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalFailure {
    #[error("turn {turn}: expected {expected} tool call(s), router produced {actual}")]
    TrajectoryLength {
        turn: usize,
        expected: usize,
        actual: usize,
    },
    #[error("turn {turn}, call {index}: expected tool '{expected}', router invoked '{actual}'")]
    ToolNameMismatch {
        turn: usize,
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("turn {turn}, call {index} ({tool}): expected arguments {expected}, got {actual}")]
    ToolArgsMismatch {
        turn: usize,
        index: usize,
        tool: String,
        expected: String,
        actual: String,
    },
    #[error("turn {turn}: response similarity {score:.2} below threshold {threshold:.2}")]
    ResponseBelowThreshold {
        turn: usize,
        score: f64,
        threshold: f64,
    },
}

/// Outcome of replaying one case
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub eval_id: String,
    pub failures: Vec<EvalFailure>,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of replaying a whole set
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub set_name: String,
    pub cases: Vec<CaseResult>,
}

impl EvalReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed())
    }

    /// Multi-line human summary
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {}/{} case(s) passed\n",
            self.set_name,
            self.cases.iter().filter(|c| c.passed()).count(),
            self.cases.len()
        );
        for case in &self.cases {
            if case.passed() {
                out.push_str(&format!("  PASS {}\n", case.eval_id));
            } else {
                out.push_str(&format!("  FAIL {}\n", case.eval_id));
                for failure in &case.failures {
                    out.push_str(&format!("       {}\n", failure));
                }
            }
        }
        out
    }
}

/// Replays recorded conversations against a dispatcher
pub struct EvalRunner {
    dispatcher: Arc<Dispatcher>,
    response_threshold: f64,
}

impl EvalRunner {
    /// The dispatcher should be backed by a fresh session store so replayed
    /// session ids start with empty state.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            response_threshold: DEFAULT_RESPONSE_THRESHOLD,
        }
    }

    pub fn with_response_threshold(mut self, threshold: f64) -> Self {
        self.response_threshold = threshold;
        self
    }

    /// Replay every case in a set
    pub async fn run_set(&self, set: &EvalSet) -> Result<EvalReport> {
        info!(
            "Replaying eval set '{}' ({} case(s))",
            set.eval_set_id,
            set.eval_cases.len()
        );
        let mut cases = Vec::new();
        for case in &set.eval_cases {
            cases.push(self.run_case(case).await?);
        }
        Ok(EvalReport {
            set_name: set.name.clone(),
            cases,
        })
    }

    /// Replay one case in its own session
    pub async fn run_case(&self, case: &EvalCase) -> Result<CaseResult> {
        let mut failures = Vec::new();
        for (turn_index, scripted) in case.conversation.iter().enumerate() {
            let outcome = self
                .dispatcher
                .handle_turn(IncomingTurn {
                    session_id: case.session_id().to_string(),
                    user_id: EVAL_USER_ID.to_string(),
                    content: scripted.user_content.clone(),
                    frontend: FrontendKind::Eval,
                    timestamp: Utc::now(),
                })
                .await?;
            failures.extend(compare_turn(
                turn_index,
                scripted,
                &outcome,
                self.response_threshold,
            ));
        }
        debug!(
            "Case '{}' finished with {} failure(s)",
            case.eval_id,
            failures.len()
        );
        Ok(CaseResult {
            eval_id: case.eval_id.clone(),
            failures,
        })
    }
}

/// Compare one replayed turn against its recording
pub fn compare_turn(
    turn: usize,
    scripted: &EvalTurn,
    outcome: &TurnOutcome,
    response_threshold: f64,
) -> Vec<EvalFailure> {
    let mut failures = Vec::new();

    if scripted.expected_tool_use.len() != outcome.invocations.len() {
        failures.push(EvalFailure::TrajectoryLength {
            turn,
            expected: scripted.expected_tool_use.len(),
            actual: outcome.invocations.len(),
        });
        return failures;
    }

    for (index, (expected, actual)) in scripted
        .expected_tool_use
        .iter()
        .zip(&outcome.invocations)
        .enumerate()
    {
        if expected.tool_name != actual.tool_name {
            failures.push(EvalFailure::ToolNameMismatch {
                turn,
                index,
                expected: expected.tool_name.clone(),
                actual: actual.tool_name.clone(),
            });
            continue;
        }
        if expected.tool_input != actual.args {
            failures.push(EvalFailure::ToolArgsMismatch {
                turn,
                index,
                tool: expected.tool_name.clone(),
                expected: serde_json::Value::Object(expected.tool_input.clone()).to_string(),
                actual: serde_json::Value::Object(actual.args.clone()).to_string(),
            });
        }
    }

    if let Some(expected_response) = &scripted.expected_response {
        let score = response_similarity(expected_response, &outcome.reply);
        if score < response_threshold {
            failures.push(EvalFailure::ResponseBelowThreshold {
                turn,
                score,
                threshold: response_threshold,
            });
        }
    }

    failures
}

/// Token-overlap (Jaccard) similarity between two replies
pub fn response_similarity(expected: &str, actual: &str) -> f64 {
    let expected_tokens = tokenize(expected);
    let actual_tokens = tokenize(actual);
    if expected_tokens.is_empty() && actual_tokens.is_empty() {
        return 1.0;
    }
    let intersection = expected_tokens.intersection(&actual_tokens).count();
    let union = expected_tokens.union(&actual_tokens).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExpectedToolUse;
    use pitcrew_core::types::ToolInvocation;
    use serde_json::Map;

    fn outcome(invocations: Vec<ToolInvocation>, reply: &str) -> TurnOutcome {
        TurnOutcome {
            session_id: "s1".to_string(),
            reply: reply.to_string(),
            invocations,
        }
    }

    fn expected(tool: &str, input: serde_json::Value) -> ExpectedToolUse {
        ExpectedToolUse {
            tool_name: tool.to_string(),
            tool_input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_similarity_identical() {
        assert_eq!(response_similarity("build done", "build done"), 1.0);
    }

    #[test]
    fn test_similarity_disjoint() {
        assert_eq!(response_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_similarity_punctuation_insensitive() {
        let score = response_similarity("Build status: nobuild", "build status nobuild!");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_compare_turn_matches() {
        let scripted = EvalTurn {
            user_content: "status?".to_string(),
            expected_tool_use: vec![expected(
                "get_build_status",
                serde_json::json!({"session_id": "s1"}),
            )],
            expected_response: Some("nobuild".to_string()),
        };
        let actual = outcome(
            vec![ToolInvocation::new(
                "get_build_status",
                serde_json::json!({"session_id": "s1"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )],
            "Build status: nobuild",
        );
        assert!(compare_turn(0, &scripted, &actual, 0.2).is_empty());
    }

    #[test]
    fn test_compare_turn_length_mismatch() {
        let scripted = EvalTurn {
            user_content: "hi".to_string(),
            expected_tool_use: vec![],
            expected_response: None,
        };
        let actual = outcome(
            vec![ToolInvocation::new("get_build_status", Map::new())],
            "hello",
        );
        let failures = compare_turn(2, &scripted, &actual, 0.2);
        assert_eq!(
            failures,
            vec![EvalFailure::TrajectoryLength {
                turn: 2,
                expected: 0,
                actual: 1,
            }]
        );
    }

    #[test]
    fn test_compare_turn_name_mismatch() {
        let scripted = EvalTurn {
            user_content: "x".to_string(),
            expected_tool_use: vec![expected("publish_build_request", serde_json::json!({}))],
            expected_response: None,
        };
        let actual = outcome(
            vec![ToolInvocation::new("get_build_status", Map::new())],
            "",
        );
        let failures = compare_turn(0, &scripted, &actual, 0.2);
        assert!(matches!(
            failures[0],
            EvalFailure::ToolNameMismatch { ref expected, .. } if expected == "publish_build_request"
        ));
    }

    #[test]
    fn test_compare_turn_args_mismatch() {
        let scripted = EvalTurn {
            user_content: "x".to_string(),
            expected_tool_use: vec![expected(
                "get_build_status",
                serde_json::json!({"session_id": "s1"}),
            )],
            expected_response: None,
        };
        let actual = outcome(
            vec![ToolInvocation::new(
                "get_build_status",
                serde_json::json!({"session_id": "other"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )],
            "",
        );
        let failures = compare_turn(0, &scripted, &actual, 0.2);
        assert!(matches!(failures[0], EvalFailure::ToolArgsMismatch { .. }));
    }

    #[test]
    fn test_compare_turn_response_threshold() {
        let scripted = EvalTurn {
            user_content: "x".to_string(),
            expected_tool_use: vec![],
            expected_response: Some("completely different words".to_string()),
        };
        let actual = outcome(vec![], "nothing in common here");
        let failures = compare_turn(0, &scripted, &actual, 0.2);
        assert!(matches!(
            failures[0],
            EvalFailure::ResponseBelowThreshold { .. }
        ));
    }

    #[test]
    fn test_report_summary() {
        let report = EvalReport {
            set_name: "Build flow".to_string(),
            cases: vec![
                CaseResult {
                    eval_id: "ok_case".to_string(),
                    failures: vec![],
                },
                CaseResult {
                    eval_id: "bad_case".to_string(),
                    failures: vec![EvalFailure::TrajectoryLength {
                        turn: 0,
                        expected: 1,
                        actual: 0,
                    }],
                },
            ],
        };
        assert!(!report.passed());
        let summary = report.summary();
        assert!(summary.contains("1/2"));
        assert!(summary.contains("PASS ok_case"));
        assert!(summary.contains("FAIL bad_case"));
    }
}

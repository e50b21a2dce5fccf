//! Matching orchestration and the error boundary.
//!
//! One query, one outstanding model call at a time. Every failure is caught
//! here and converted to a user-visible message plus an empty result; no
//! error type crosses into the rendering layer.

use crate::budget::{self, Decision};
use crate::client::BriefClient;
use crate::error::MatchError;
use crate::record::{find_record, Record};
use crate::request::{MatchMode, RequestBuilder};
use crate::response::{self, MatchResult, UnresolvedMatch};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One matching query, constructed fresh per user action.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub brief_text: String,
    pub parameters: BTreeMap<String, String>,
    /// Presence of a budget activates budget-aware mode.
    pub client_budget: Option<f64>,
}

impl MatchQuery {
    pub fn new(brief_text: impl Into<String>) -> Self {
        Self {
            brief_text: brief_text.into(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_budget(mut self, client_budget: f64) -> Self {
        self.client_budget = Some(client_budget);
        self
    }

    pub fn mode(&self) -> MatchMode {
        if self.client_budget.is_some() {
            MatchMode::BudgetAware
        } else {
            MatchMode::General
        }
    }
}

/// What the rendering layer receives: validated matches, non-fatal warnings,
/// and at most one user-facing error message. Never an Err.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub matches: Vec<MatchResult>,
    pub warnings: Vec<UnresolvedMatch>,
    pub error: Option<String>,
}

impl MatchOutcome {
    /// Pair each match with its library record. Matches are reconciled
    /// during validation, so a missing record only happens if the caller
    /// passes a different library than the one queried.
    pub fn resolve<'a>(&'a self, library: &'a [Record]) -> Vec<(&'a MatchResult, &'a Record)> {
        self.matches
            .iter()
            .filter_map(|m| find_record(library, &m.id).map(|record| (m, record)))
            .collect()
    }
}

/// Run one matching query end to end.
pub async fn find_matches<C: BriefClient>(
    client: &C,
    library: &[Record],
    query: &MatchQuery,
) -> MatchOutcome {
    let result = match query.mode() {
        MatchMode::General => run_general(client, library, query).await,
        MatchMode::BudgetAware => run_budget_aware(client, library, query).await,
    };

    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(class = ?err.class(), error = %err, "match query failed");
            MatchOutcome {
                error: Some(err.user_message()),
                ..Default::default()
            }
        }
    }
}

async fn run_general<C: BriefClient>(
    client: &C,
    library: &[Record],
    query: &MatchQuery,
) -> Result<MatchOutcome, MatchError> {
    let request = RequestBuilder::new(MatchMode::General).build(
        &query.brief_text,
        &query.parameters,
        library,
    )?;
    let raw = client
        .complete(request.system_prompt(), &request.user_prompt())
        .await?;
    let validated = response::parse(&raw, library, MatchMode::General)?;
    info!(
        matches = validated.matches.len(),
        dropped = validated.warnings.len(),
        "general match complete"
    );
    Ok(MatchOutcome {
        matches: validated.matches,
        warnings: validated.warnings,
        error: None,
    })
}

/// Budget-aware mode: ask for the single best conceptual match, then gate it
/// through the budget scaler. A rejected candidate is removed and the query
/// is retried against the remaining library; attempts are capped at the
/// library size so the fallback always terminates.
async fn run_budget_aware<C: BriefClient>(
    client: &C,
    library: &[Record],
    query: &MatchQuery,
) -> Result<MatchOutcome, MatchError> {
    let client_budget = query.client_budget.unwrap_or_default();
    let builder = RequestBuilder::new(MatchMode::BudgetAware);

    let mut remaining: Vec<Record> = library.to_vec();
    let mut warnings = Vec::new();

    for attempt in 1..=library.len() {
        let request = builder.build(&query.brief_text, &query.parameters, &remaining)?;
        let raw = client
            .complete(request.system_prompt(), &request.user_prompt())
            .await?;
        let mut validated = response::parse(&raw, &remaining, MatchMode::BudgetAware)?;
        warnings.append(&mut validated.warnings);

        let Some(mut matched) = validated.matches.pop() else {
            // The model found no conceptual match; that is terminal.
            info!(attempt, "no conceptual match left");
            break;
        };

        // Reconciliation guarantees the record exists in `remaining`.
        let Some(record) = find_record(&remaining, &matched.id).cloned() else {
            break;
        };

        match budget::evaluate(&record, client_budget) {
            Decision::Accepted(tier_label) => {
                info!(id = %matched.id, tier = %tier_label, attempt, "budget-aware match accepted");
                matched.tier_label = Some(tier_label);
                return Ok(MatchOutcome {
                    matches: vec![matched],
                    warnings,
                    error: None,
                });
            }
            Decision::Rejected => {
                debug!(id = %matched.id, attempt, "candidate below minimum viable budget, trying next");
                remaining.retain(|r| r.id != record.id);
                if remaining.is_empty() {
                    break;
                }
            }
        }
    }

    // Candidates exhausted or the model said no match: a valid empty outcome.
    Ok(MatchOutcome {
        matches: Vec::new(),
        warnings,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::records_from_rows;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Canned transport: pops one scripted response per call.
    struct StubClient {
        responses: Mutex<VecDeque<Result<String, MatchError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl StubClient {
        fn new(responses: Vec<Result<String, MatchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn scripted(responses: &[&str]) -> Self {
            Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl BriefClient for StubClient {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, MatchError> {
            self.calls.lock().unwrap().push(user.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("[]".to_string()))
        }
    }

    fn library() -> Vec<Record> {
        records_from_rows(&[
            json!({
                "id": "brief-1",
                "title": "Eco cups",
                "minimum_viable_budget": 10000,
                "budget_description": "Reduced 5000; Full 20000",
            }),
            json!({
                "id": "brief-2",
                "title": "Fin lit",
                "minimum_viable_budget": 4000,
                "budget_description": "Pilot 4000; Full 12000",
            }),
        ])
    }

    #[tokio::test]
    async fn test_general_mode_returns_validated_matches() {
        let client = StubClient::scripted(&[
            r#"[{"id":"brief-2","explanation":"audience overlap"},{"id":"ghost","explanation":"?"}]"#,
        ]);
        let outcome = find_matches(&client, &library(), &MatchQuery::new("a budgeting app")).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].id, "brief-2");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_brief_never_reaches_the_client() {
        let client = StubClient::scripted(&[]);
        let outcome = find_matches(&client, &library(), &MatchQuery::new("   ")).await;
        assert_eq!(client.call_count(), 0);
        assert!(outcome.matches.is_empty());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_library_never_reaches_the_client() {
        let client = StubClient::scripted(&[]);
        let outcome = find_matches(&client, &[], &MatchQuery::new("a brief")).await;
        assert_eq!(client.call_count(), 0);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_user_message() {
        let client = StubClient::new(vec![Err(MatchError::Transport {
            message: "timeout".to_string(),
        })]);
        let outcome = find_matches(&client, &library(), &MatchQuery::new("a brief")).await;
        assert!(outcome.matches.is_empty());
        assert!(outcome.error.unwrap().contains("try again"));
    }

    #[tokio::test]
    async fn test_malformed_response_becomes_user_message() {
        let client = StubClient::scripted(&["the model rambled instead of JSON"]);
        let outcome = find_matches(&client, &library(), &MatchQuery::new("a brief")).await;
        assert!(outcome.matches.is_empty());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_budget_mode_accepts_affordable_candidate() {
        let client = StubClient::scripted(&[r#"[{"id":"brief-1","explanation":"fits"}]"#]);
        let query = MatchQuery::new("a brief").with_budget(15000.0);
        let outcome = find_matches(&client, &library(), &query).await;
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].tier_label.as_deref(), Some("Reduced"));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_budget_mode_falls_back_to_next_candidate() {
        // brief-1 needs 10000 minimum; 8000 rejects it and the retry request
        // must no longer offer it.
        let client = StubClient::scripted(&[
            r#"[{"id":"brief-1","explanation":"fits"}]"#,
            r#"[{"id":"brief-2","explanation":"second best"}]"#,
        ]);
        let query = MatchQuery::new("a brief").with_budget(8000.0);
        let outcome = find_matches(&client, &library(), &query).await;
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].id, "brief-2");
        assert_eq!(outcome.matches[0].tier_label.as_deref(), Some("Pilot"));
        assert_eq!(client.call_count(), 2);
        let calls = client.calls.lock().unwrap();
        assert!(!calls[1].contains("brief-1"));
    }

    #[tokio::test]
    async fn test_budget_mode_exhausts_candidates_without_error() {
        let client = StubClient::scripted(&[
            r#"[{"id":"brief-1","explanation":"fits"}]"#,
            r#"[{"id":"brief-2","explanation":"second"}]"#,
        ]);
        let query = MatchQuery::new("a brief").with_budget(1000.0);
        let outcome = find_matches(&client, &library(), &query).await;
        assert!(outcome.matches.is_empty());
        assert!(outcome.error.is_none());
        // Attempts never exceed the library size.
        assert!(client.call_count() <= 2);
    }

    #[tokio::test]
    async fn test_budget_mode_stops_when_model_says_no_match() {
        let client = StubClient::scripted(&["[]"]);
        let query = MatchQuery::new("a brief").with_budget(50000.0);
        let outcome = find_matches(&client, &library(), &query).await;
        assert!(outcome.matches.is_empty());
        assert!(outcome.error.is_none());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_pairs_matches_with_records() {
        let client = StubClient::scripted(&[r#"[{"id":"brief-1","explanation":"x"}]"#]);
        let lib = library();
        let outcome = find_matches(&client, &lib, &MatchQuery::new("a brief")).await;
        let resolved = outcome.resolve(&lib);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].1.text("title"), "Eco cups");
    }

    #[test]
    fn test_mode_derived_from_budget() {
        assert_eq!(MatchQuery::new("x").mode(), MatchMode::General);
        assert_eq!(
            MatchQuery::new("x").with_budget(100.0).mode(),
            MatchMode::BudgetAware
        );
    }
}

//! Request assembly: turn a new brief, optional structured parameters, and
//! the reference library into the prompt sent for matching.
//!
//! A `MatchRequest` is built fresh per invocation and never mutated; there is
//! no ambient state between queries.

use crate::error::MatchError;
use crate::record::{Record, FIELD_BUDGET_DESCRIPTION, FIELD_MIN_BUDGET};
use serde::Serialize;
use std::collections::BTreeMap;

/// Descriptive fields a candidate exposes to the model. Brand names and other
/// originally-identifying fields are never projected.
const MATCHABLE_FIELDS: &[&str] = &[
    "title",
    "summary",
    "concept",
    "audience",
    "objective",
    "tactics",
    "media_strategy",
    "key_results_summary",
];

pub const GENERAL_SYSTEM: &str = r#"You are a creative strategist matching a new client brief against a library of past campaign ideas and case studies.

Your job: pick the library entries whose concept, audience, and approach would transfer best to the new brief.

OUTPUT FORMAT (JSON):
A JSON array of at most 3 matches, best first. Each element:
{"id": "<id of the library entry>", "explanation": "<why it fits, written for a marketing stakeholder>"}

RULES:
- Respond with ONLY the JSON array, nothing else.
- If no library entry is a good conceptual match, respond with [] - an empty array is the correct answer, not a failure.
- Entries with "kind": "case_study" carry a key results summary of proven outcomes. When you match one, identify it as a proven case study and work those results into the explanation.
- Explanations are plain prose. Never mention internal field names, JSON keys, or budget figures from the library data."#;

pub const BUDGET_SYSTEM: &str = r#"You are a creative strategist matching a new client brief against a library of past campaign ideas and case studies.

Your job: pick the SINGLE library entry whose concept would transfer best to the new brief, so it can be scaled to the client's budget.

OUTPUT FORMAT (JSON):
A JSON array with at most 1 element:
{"id": "<id of the library entry>", "explanation": "<why it fits, written for a marketing stakeholder>"}

RULES:
- Respond with ONLY the JSON array, nothing else.
- If no library entry is a good conceptual match, respond with [] - an empty array is the correct answer, not a failure.
- Judge the conceptual fit only; budget viability is checked separately.
- Entries with "kind": "case_study" carry a key results summary of proven outcomes. When you match one, identify it as a proven case study and work those results into the explanation.
- Explanations are plain prose. Never mention internal field names, JSON keys, or budget figures from the library data."#;

/// Matching mode. General mode asks for the top conceptual matches;
/// budget-aware mode asks for a single best match and scales it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    General,
    BudgetAware,
}

impl MatchMode {
    /// Upper bound on how many matches a response may carry.
    pub fn max_matches(&self) -> usize {
        match self {
            MatchMode::General => 3,
            MatchMode::BudgetAware => 1,
        }
    }
}

/// A library record projected down to the fields the model may see.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: String,
    pub kind: &'static str,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// The assembled query: one brief, its parameters, and the projected
/// candidate list. Used once and discarded.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub mode: MatchMode,
    pub brief_text: String,
    pub parameters: BTreeMap<String, String>,
    pub candidates: Vec<Candidate>,
}

/// Builds `MatchRequest` values for a given mode, enforcing the input and
/// projection rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuilder {
    mode: MatchMode,
}

impl RequestBuilder {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Assemble a request. Fails before any network interaction when the
    /// brief is blank or the library has nothing to match against.
    pub fn build(
        &self,
        brief_text: &str,
        parameters: &BTreeMap<String, String>,
        library: &[Record],
    ) -> Result<MatchRequest, MatchError> {
        let brief = brief_text.trim();
        if brief.is_empty() {
            return Err(MatchError::EmptyBrief);
        }
        if library.is_empty() {
            return Err(MatchError::EmptyLibrary);
        }

        let candidates = library
            .iter()
            .map(|record| self.project(record))
            .collect();

        // Empty-valued parameters add nothing to the prompt.
        let parameters = parameters
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.trim().to_string()))
            .collect();

        Ok(MatchRequest {
            mode: self.mode,
            brief_text: brief.to_string(),
            parameters,
            candidates,
        })
    }

    /// Project a record to its matchable fields. Budget-aware mode also
    /// carries the budget fields; they feed the scaler and the model's
    /// conceptual judgement, never the end user's explanation.
    fn project(&self, record: &Record) -> Candidate {
        let mut fields = BTreeMap::new();
        for &name in MATCHABLE_FIELDS {
            let text = record.text(name);
            if !text.is_empty() {
                fields.insert(
                    name.to_string(),
                    serde_json::Value::String(text.to_string()),
                );
            }
        }
        if self.mode == MatchMode::BudgetAware {
            let minimum = record.number(FIELD_MIN_BUDGET);
            if minimum > 0.0 {
                if let Some(n) = serde_json::Number::from_f64(minimum) {
                    fields.insert(FIELD_MIN_BUDGET.to_string(), serde_json::Value::Number(n));
                }
            }
            let description = record.text(FIELD_BUDGET_DESCRIPTION);
            if !description.is_empty() {
                fields.insert(
                    FIELD_BUDGET_DESCRIPTION.to_string(),
                    serde_json::Value::String(description.to_string()),
                );
            }
        }
        Candidate {
            id: record.id.clone(),
            kind: record.kind.label(),
            fields,
        }
    }
}

impl MatchRequest {
    /// The instruction half of the prompt.
    pub fn system_prompt(&self) -> &'static str {
        match self.mode {
            MatchMode::General => GENERAL_SYSTEM,
            MatchMode::BudgetAware => BUDGET_SYSTEM,
        }
    }

    /// The data half of the prompt: brief, structured parameters, and the
    /// candidate library as JSON.
    pub fn user_prompt(&self) -> String {
        let mut prompt = format!("New brief:\n{}\n", self.brief_text);

        if !self.parameters.is_empty() {
            prompt.push_str("\nBrief parameters:\n");
            for (name, value) in &self.parameters {
                prompt.push_str(&format!("- {}: {}\n", name, value));
            }
        }

        let candidates = serde_json::to_string_pretty(&self.candidates)
            .unwrap_or_else(|_| "[]".to_string());
        prompt.push_str(&format!("\nLibrary of past work:\n{}\n", candidates));
        prompt.push_str("\nFind the matches:");
        prompt
    }
}

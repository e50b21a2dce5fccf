//! Response validation: parse the model's raw text, check the shape, and
//! reconcile the returned ids against the library.
//!
//! The transport hands us an opaque string even in JSON mode, so parsing
//! always happens here. LLM output is messy in predictable ways (markdown
//! fences, trailing commas, smart quotes); those are repaired before we give
//! up on a payload.

use crate::error::MatchError;
use crate::record::{find_record, normalize_id_value, Record};
use crate::request::MatchMode;
use tracing::{debug, warn};

/// One validated match, resolvable back to a `Record` via `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub id: String,
    pub explanation: String,
    /// Budget tier recommendation, set by the budget scaler in budget-aware
    /// mode. The model may propose one; the scaler's decision wins.
    pub tier_label: Option<String>,
}

/// A returned id with no corresponding library record. Non-fatal: the entry
/// is dropped and the rest of the response still stands.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedMatch {
    pub id: String,
}

/// A parsed, reconciled response.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    pub matches: Vec<MatchResult>,
    pub warnings: Vec<UnresolvedMatch>,
}

/// Parse and validate a raw model response against the library.
///
/// Order is preserved as the model returned it; entries past the mode's cap
/// are dropped. An empty array is a valid "no match" outcome, never an error.
pub fn parse(raw: &str, library: &[Record], mode: MatchMode) -> Result<Validated, MatchError> {
    let entries = parse_entries(raw)?;

    let mut validated = Validated::default();
    for entry in &entries {
        let obj = entry.as_object().ok_or_else(|| MatchError::Schema {
            detail: "response entry is not an object".to_string(),
        })?;
        let id = obj
            .get("id")
            .and_then(normalize_id_value)
            .ok_or_else(|| MatchError::Schema {
                detail: "response entry has no usable id".to_string(),
            })?;

        if find_record(library, &id).is_none() {
            warn!(id = %id, "dropping match with no corresponding library record");
            validated.warnings.push(UnresolvedMatch { id });
            continue;
        }

        if validated.matches.len() >= mode.max_matches() {
            debug!(id = %id, "dropping match beyond the mode's cap");
            continue;
        }

        // Several revisions of the prompt called this field "reason".
        let explanation = obj
            .get("explanation")
            .or_else(|| obj.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let tier_label = obj
            .get("tier_label")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        validated.matches.push(MatchResult {
            id,
            explanation,
            tier_label,
        });
    }

    Ok(validated)
}

/// Extract the JSON array of match entries from the raw response text.
fn parse_entries(raw: &str) -> Result<Vec<serde_json::Value>, MatchError> {
    let clean = strip_markdown_fences(raw);
    if clean.is_empty() {
        return Err(malformed("response is empty", raw));
    }

    // Prefer the bracketed array; some models wrap it in an object instead.
    let fragment = extract_json_fragment(clean, '[', ']')
        .or_else(|| extract_json_fragment(clean, '{', '}'))
        .unwrap_or(clean);

    let value: serde_json::Value = match serde_json::from_str(fragment) {
        Ok(value) => value,
        Err(first_err) => {
            let repaired = repair_json(fragment);
            match serde_json::from_str(&repaired) {
                Ok(value) => value,
                Err(_) => {
                    debug!(payload = %raw, "unparseable model response");
                    return Err(malformed(&first_err.to_string(), raw));
                }
            }
        }
    };

    match value {
        serde_json::Value::Array(entries) => Ok(entries),
        serde_json::Value::Object(obj) => {
            for key in ["matches", "results"] {
                if let Some(serde_json::Value::Array(entries)) = obj.get(key) {
                    return Ok(entries.clone());
                }
            }
            Err(MatchError::Schema {
                detail: "expected a JSON array of matches".to_string(),
            })
        }
        _ => Err(MatchError::Schema {
            detail: "expected a JSON array of matches".to_string(),
        }),
    }
}

fn malformed(detail: &str, raw: &str) -> MatchError {
    MatchError::Malformed {
        detail: detail.to_string(),
        preview: truncate_str(raw, 200).to_string(),
    }
}

/// Strip markdown code fences wrapping a response.
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// Extract a JSON fragment between matching delimiters.
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Repair common JSON damage in LLM output before declaring it malformed.
fn repair_json(json: &str) -> String {
    let mut fixed = json.to_string();

    // Trailing commas before a closing bracket.
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    // Smart quotes.
    fixed = fixed.replace(['\u{201C}', '\u{201D}'], "\"");
    fixed = fixed.replace(['\u{2018}', '\u{2019}'], "'");

    // Stray control characters.
    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Truncate a string for log/error previews (Unicode-safe).
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

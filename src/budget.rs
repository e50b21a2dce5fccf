//! Budget scaling for the budget-aware matching mode.
//!
//! Given a matched record and the client's budget, decide whether the record
//! is affordable at all and, if so, which named budget tier to recommend.
//! Pure and deterministic: no network, no randomness, unit-testable without
//! a model call.

use crate::record::{parse_loose_number, Record, FIELD_BUDGET_DESCRIPTION, FIELD_MIN_BUDGET};

/// Sentinel tier label: the budget clears the minimum but matches no named
/// tier, so the caller should recommend the qualitative core tactic instead
/// of a priced package.
pub const CORE_TACTIC: &str = "core tactic";

/// One named, priced package inside a record's budget description.
#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    pub label: String,
    pub price: f64,
}

/// Outcome of evaluating a candidate against a client budget.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The record fits; recommend the named tier (or [`CORE_TACTIC`]).
    Accepted(String),
    /// Budget is below the record's minimum viable spend. The caller falls
    /// back to the next-best candidate, or reports no match once candidates
    /// are exhausted.
    Rejected,
}

/// Evaluate a candidate record against the client's budget.
///
/// Order matters: the minimum-viable-budget gate runs before any tier is
/// considered, so a below-minimum budget is `Rejected` regardless of what
/// the tier list says.
pub fn evaluate(candidate: &Record, client_budget: f64) -> Decision {
    let minimum = candidate.number(FIELD_MIN_BUDGET);
    if client_budget < minimum {
        return Decision::Rejected;
    }

    let tiers = parse_tiers(candidate.text(FIELD_BUDGET_DESCRIPTION));
    let best = tiers
        .iter()
        .filter(|tier| tier.price <= client_budget)
        .max_by(|a, b| a.price.total_cmp(&b.price));

    match best {
        Some(tier) => Decision::Accepted(tier.label.clone()),
        None => Decision::Accepted(CORE_TACTIC.to_string()),
    }
}

/// Parse an ordered tier list out of a free-text budget description such as
/// `"Reduced 5000; Full 20000"` or `"Reduced: $5,000, Full: $20,000"`.
///
/// Each delimited chunk contributes one tier: the last numeric token is the
/// price, everything before it is the label. Chunks without both parts are
/// skipped rather than erroring.
pub fn parse_tiers(description: &str) -> Vec<Tier> {
    let mut tiers = Vec::new();
    for chunk in split_tier_chunks(description) {
        let words: Vec<&str> = chunk.split_whitespace().collect();
        if words.len() < 2 {
            continue;
        }
        let Some(price) = parse_loose_number(words[words.len() - 1]) else {
            continue;
        };
        let label = words[..words.len() - 1]
            .join(" ")
            .trim_end_matches([':', '-', '='])
            .trim()
            .to_string();
        if label.is_empty() {
            continue;
        }
        tiers.push(Tier { label, price });
    }
    tiers
}

/// Split on tier delimiters, treating commas between digits as thousands
/// separators rather than delimiters.
fn split_tier_chunks(description: &str) -> Vec<String> {
    let chars: Vec<char> = description.chars().collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        let is_delimiter = match c {
            ';' | '\n' | '|' => true,
            ',' => {
                let digit_before = i > 0 && chars[i - 1].is_ascii_digit();
                let digit_after = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                !(digit_before && digit_after)
            }
            _ => false,
        };
        if is_delimiter {
            if !current.trim().is_empty() {
                chunks.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    chunks
}

//! Reference library data model.
//!
//! A `Record` is one past campaign idea or case study, loaded from a
//! loosely-typed spreadsheet row. Lookups are tolerant: missing fields
//! default to empty/zero, and ids that arrive as numbers compare equal to
//! their string form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Field holding the minimum spend a record is viable at (budget-aware mode).
pub const FIELD_MIN_BUDGET: &str = "minimum_viable_budget";
/// Field holding the tiered budget description (budget-aware mode).
pub const FIELD_BUDGET_DESCRIPTION: &str = "budget_description";
/// Field holding the proven-results summary on case studies.
pub const FIELD_KEY_RESULTS: &str = "key_results_summary";

/// Kind of library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    Idea,
    CaseStudy,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Idea => "idea",
            RecordKind::CaseStudy => "case_study",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "case_study" | "case study" | "case-study" | "casestudy" => RecordKind::CaseStudy,
            _ => RecordKind::Idea,
        }
    }
}

/// A descriptive attribute value: free text or a number, never null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

/// One reference campaign, idea, or case study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Text value of a field, empty string when missing or numeric-only.
    pub fn text(&self, name: &str) -> &str {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    /// Numeric value of a field, zero when missing. Numeric strings
    /// ("10000", "$10,000") are accepted, since spreadsheet cells often
    /// arrive as text.
    pub fn number(&self, name: &str) -> f64 {
        match self.fields.get(name) {
            Some(FieldValue::Number(n)) => *n,
            Some(FieldValue::Text(s)) => parse_loose_number(s).unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// Display title for rendering: the `title` field, else the id.
    pub fn title(&self) -> &str {
        let title = self.text("title");
        if title.is_empty() {
            &self.id
        } else {
            title
        }
    }

    /// Build a Record from a loosely-typed row (one spreadsheet row as a
    /// JSON object). Returns None when the row has no usable id.
    pub fn from_row(row: &serde_json::Value) -> Option<Record> {
        let obj = row.as_object()?;
        let id = obj.get("id").and_then(normalize_id_value)?;

        let mut kind = RecordKind::default();
        let mut fields = BTreeMap::new();
        for (name, value) in obj {
            if name == "id" {
                continue;
            }
            if name == "kind" || name == "type" {
                if let Some(raw) = value.as_str() {
                    kind = RecordKind::parse(raw);
                }
                continue;
            }
            match value {
                serde_json::Value::String(s) => {
                    fields.insert(name.clone(), FieldValue::Text(s.clone()));
                }
                serde_json::Value::Number(n) => {
                    if let Some(f) = n.as_f64() {
                        fields.insert(name.clone(), FieldValue::Number(f));
                    }
                }
                // Nulls and nested structures are dropped rather than erroring.
                _ => {}
            }
        }

        Some(Record { id, kind, fields })
    }
}

/// Build Records from an array of rows, skipping id-less rows with a warning.
pub fn records_from_rows(rows: &[serde_json::Value]) -> Vec<Record> {
    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        match Record::from_row(row) {
            Some(record) => records.push(record),
            None => warn!(row = i, "skipping library row without a usable id"),
        }
    }
    records
}

/// Normalize an id for comparison: trim, and collapse numeric forms so that
/// `7`, `"7"` and `"7.0"` all compare equal.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            return format!("{}", n as i64);
        }
    }
    trimmed.to_string()
}

/// Normalize a JSON id cell (string or number) to its string form.
pub fn normalize_id_value(value: &serde_json::Value) -> Option<String> {
    let id = match value {
        serde_json::Value::String(s) => normalize_id(s),
        serde_json::Value::Number(n) => normalize_id(&n.to_string()),
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Look up a record by string-normalized id equality.
pub fn find_record<'a>(library: &'a [Record], id: &str) -> Option<&'a Record> {
    let wanted = normalize_id(id);
    library
        .iter()
        .find(|record| normalize_id(&record.id) == wanted)
}

/// Parse a number out of a spreadsheet-ish cell: tolerates `$`, thousands
/// separators, and surrounding text like "10000 minimum".
pub fn parse_loose_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_row_numeric_id() {
        let record = Record::from_row(&json!({"id": 7, "title": "Eco cups"})).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.text("title"), "Eco cups");
        assert_eq!(record.kind, RecordKind::Idea);
    }

    #[test]
    fn test_from_row_case_study_kind() {
        let record = Record::from_row(&json!({
            "id": "cs-1",
            "kind": "Case Study",
            "key_results_summary": "Doubled signups in 6 weeks"
        }))
        .unwrap();
        assert_eq!(record.kind, RecordKind::CaseStudy);
        assert!(!record.text(FIELD_KEY_RESULTS).is_empty());
    }

    #[test]
    fn test_from_row_rejects_missing_id() {
        assert!(Record::from_row(&json!({"title": "no id"})).is_none());
        assert!(Record::from_row(&json!({"id": "   "})).is_none());
    }

    #[test]
    fn test_tolerant_accessors_default() {
        let record = Record::from_row(&json!({"id": "1"})).unwrap();
        assert_eq!(record.text("audience"), "");
        assert_eq!(record.number(FIELD_MIN_BUDGET), 0.0);
    }

    #[test]
    fn test_number_accepts_text_cells() {
        let record = Record::from_row(&json!({
            "id": "1",
            "minimum_viable_budget": "$10,000"
        }))
        .unwrap();
        assert_eq!(record.number(FIELD_MIN_BUDGET), 10000.0);
    }

    #[test]
    fn test_find_record_numeric_vs_string() {
        let rows = vec![json!({"id": 7, "title": "Seven"})];
        let library = records_from_rows(&rows);
        assert!(find_record(&library, "7").is_some());
        assert!(find_record(&library, "7.0").is_some());
        assert!(find_record(&library, "8").is_none());
    }

    #[test]
    fn test_records_from_rows_skips_bad_rows() {
        let rows = vec![
            json!({"id": "ok"}),
            json!({"title": "missing id"}),
            json!("not an object"),
        ];
        let library = records_from_rows(&rows);
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].id, "ok");
    }

    #[test]
    fn test_title_falls_back_to_id() {
        let record = Record::from_row(&json!({"id": "brief-3"})).unwrap();
        assert_eq!(record.title(), "brief-3");
    }
}

//! Library loading.
//!
//! The reference library arrives as a JSON export of spreadsheet rows (the
//! fetching and caching of the spreadsheet itself lives with the external
//! loader, not here). Rows are loosely typed; bad rows are skipped, and an
//! empty library is a valid state the matcher reports on, not an error.

use crate::record::{records_from_rows, Record};
use anyhow::Context;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Load a library from a JSON file containing an array of row objects.
pub fn load_library(path: &Path) -> anyhow::Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read library file {}", path.display()))?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("library file {} is not a JSON array", path.display()))?;
    let records = records_from_rows(&rows);
    info!(path = %path.display(), records = records.len(), "library loaded");
    Ok(records)
}

/// Built-in sample library, used when no library file is configured so the
/// tool works out of the box.
pub fn sample_library() -> Vec<Record> {
    let rows = vec![
        json!({
            "id": "brief-1",
            "title": "Eco-Friendly Campaign for Young Adults",
            "summary": "Promote a new line of reusable coffee cups to a Gen Z audience on social media.",
            "audience": "Gen Z, sustainability-minded",
            "tactics": "Vibrant, shareable short-form video",
            "media_strategy": "Instagram, TikTok, YouTube Shorts",
            "minimum_viable_budget": 15000,
            "budget_description": "Reduced 8000; Full 25000",
        }),
        json!({
            "id": "brief-2",
            "title": "Financial Literacy for New Grads",
            "summary": "Digital ads and blog posts introducing recent graduates to a mobile banking app under the message 'make smart money moves'.",
            "audience": "Recent college graduates",
            "tactics": "Educational content series",
            "media_strategy": "Financial news sites, educational blogs, LinkedIn",
            "minimum_viable_budget": 10000,
            "budget_description": "Reduced 5000; Full 20000",
        }),
        json!({
            "id": "brief-3",
            "kind": "case_study",
            "title": "B2B Software Launch",
            "summary": "Lead generation for a project management tool aimed at small business owners and enterprise managers.",
            "audience": "SMB owners, enterprise managers",
            "tactics": "Case studies and webinars",
            "media_strategy": "Search ads, industry forums, email",
            "key_results_summary": "Generated 1,200 qualified leads in the first quarter at 40% below target cost-per-lead.",
            "minimum_viable_budget": 20000,
            "budget_description": "Pilot 12000; Full 35000",
        }),
        json!({
            "id": "brief-4",
            "title": "Summer Music Festival Promotion",
            "summary": "Drive ticket sales for a city music festival with FOMO and unique-experience messaging.",
            "audience": "Music lovers aged 18-35",
            "tactics": "Scarcity-led social push",
            "media_strategy": "Spotify, local radio, event pages",
            "minimum_viable_budget": 12000,
            "budget_description": "Reduced 6000; Full 18000",
        }),
        json!({
            "id": "brief-5",
            "kind": "case_study",
            "title": "Healthy Pet Food Product Launch",
            "summary": "Launch of an organic, grain-free dog food line built around product benefits.",
            "audience": "Millennial pet owners",
            "tactics": "Influencer collaborations and owner blogs",
            "media_strategy": "Pet blogs, Instagram, influencers",
            "key_results_summary": "Sold out the launch run in three weeks and grew the brand's Instagram following by 60%.",
            "minimum_viable_budget": 9000,
            "budget_description": "Starter 5000; Full 16000",
        }),
        json!({
            "id": "brief-6",
            "title": "Luxury Travel Agency Branding",
            "summary": "Rebrand a high-end travel agency around once-in-a-lifetime experiences for affluent travellers.",
            "audience": "Affluent individuals and couples, 40+",
            "tactics": "Aspirational storytelling",
            "media_strategy": "Travel magazines, lifestyle blogs, targeted display",
            "minimum_viable_budget": 30000,
            "budget_description": "Core 18000; Signature 45000",
        }),
    ];
    records_from_rows(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sample_library_is_well_formed() {
        let library = sample_library();
        assert_eq!(library.len(), 6);
        assert!(library.iter().all(|r| !r.id.is_empty()));
        // Case studies carry their proven results.
        let case_studies: Vec<_> = library
            .iter()
            .filter(|r| r.kind == crate::record::RecordKind::CaseStudy)
            .collect();
        assert_eq!(case_studies.len(), 2);
        assert!(case_studies
            .iter()
            .all(|r| !r.text(crate::record::FIELD_KEY_RESULTS).is_empty()));
    }

    #[test]
    fn test_load_library_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 1, "title": "One"}}, {{"title": "no id"}}]"#
        )
        .unwrap();
        let library = load_library(file.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].id, "1");
    }

    #[test]
    fn test_load_library_empty_array_is_valid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        let library = load_library(file.path()).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_load_library_rejects_non_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"not": "an array"}}"#).unwrap();
        assert!(load_library(file.path()).is_err());
    }
}

//! Cost accounting: per-model rate tables and usage pricing.
//!
//! Pricing is additive and never blocks the parse itself: a model with no
//! entry in the rate table simply yields no cost block. Only an explicitly
//! supplied but unreadable or malformed table is an error, because then the
//! caller asked for cost tracking and silently omitting it would be a lie.

use crate::config::CostMapping;
use crate::error::DocPipeError;
use crate::output::{TokenCost, TokenUsage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token rates for one model, plus a flat per-page surcharge
/// for image inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    /// USD per million input tokens.
    pub input: f64,
    /// Flat USD per LLM-processed page (image surcharge).
    #[serde(rename = "input-image", default)]
    pub input_image: f64,
    /// USD per million output tokens.
    pub output: f64,
}

/// Rates keyed by exact model name.
pub type RateTable = HashMap<String, ModelRate>;

/// Load a rate table from an inline mapping or a JSON file.
pub fn load_rate_table(mapping: &CostMapping) -> Result<RateTable, DocPipeError> {
    match mapping {
        CostMapping::Inline(table) => Ok(table.clone()),
        CostMapping::File(path) => {
            let contents = std::fs::read_to_string(path).map_err(|e| DocPipeError::CostMapping {
                detail: format!("cannot read '{}': {e}", path.display()),
            })?;
            serde_json::from_str(&contents).map_err(|e| DocPipeError::CostMapping {
                detail: format!("malformed rate table '{}': {e}", path.display()),
            })
        }
    }
}

/// Price aggregated usage for `model`. Returns `None` when the table has no
/// entry for the model, degrading silently by design.
pub fn price(usage: &TokenUsage, table: &RateTable, model: &str) -> Option<TokenCost> {
    let rate = table.get(model)?;
    let input = usage.input as f64 * rate.input / 1_000_000.0;
    let input_image = rate.input_image * usage.llm_page_count as f64;
    let output = usage.output as f64 * rate.output / 1_000_000.0;
    Some(TokenCost {
        input,
        input_image,
        output,
        total: input + input_image + output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn table() -> RateTable {
        HashMap::from([(
            "gpt-4.1-nano".to_string(),
            ModelRate {
                input: 0.10,
                input_image: 0.001,
                output: 0.40,
            },
        )])
    }

    #[test]
    fn prices_known_model() {
        let usage = TokenUsage {
            input: 2_000_000,
            output: 500_000,
            llm_page_count: 10,
            total: 2_500_000,
        };
        let cost = price(&usage, &table(), "gpt-4.1-nano").unwrap();
        assert!((cost.input - 0.20).abs() < 1e-9);
        assert!((cost.input_image - 0.01).abs() < 1e-9);
        assert!((cost.output - 0.20).abs() < 1e-9);
        assert!((cost.total - 0.41).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_degrades_to_none() {
        let usage = TokenUsage::default();
        assert!(price(&usage, &table(), "mystery-model").is_none());
    }

    #[test]
    fn file_table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.json");
        std::fs::write(
            &path,
            r#"{"gemini-2.0-flash": {"input": 0.1, "input-image": 0.00025, "output": 0.4}}"#,
        )
        .unwrap();

        let table = load_rate_table(&CostMapping::File(path)).unwrap();
        let rate = table.get("gemini-2.0-flash").unwrap();
        assert!((rate.input_image - 0.00025).abs() < 1e-12);
    }

    #[test]
    fn missing_image_rate_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.json");
        std::fs::write(&path, r#"{"m": {"input": 1.0, "output": 2.0}}"#).unwrap();
        let table = load_rate_table(&CostMapping::File(path)).unwrap();
        assert_eq!(table.get("m").unwrap().input_image, 0.0);
    }

    #[test]
    fn malformed_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_rate_table(&CostMapping::File(path)).unwrap_err();
        assert!(matches!(err, DocPipeError::CostMapping { .. }));
    }

    #[test]
    fn unreadable_table_is_an_error() {
        let err =
            load_rate_table(&CostMapping::File(PathBuf::from("/nonexistent/rates.json")))
                .unwrap_err();
        assert!(matches!(err, DocPipeError::CostMapping { .. }));
    }
}

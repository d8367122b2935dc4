//! Record scoring.
//!
//! `score = mean(field coverage, format validity, relationship validity)`,
//! each component in `[0, 100]`. Components with nothing to judge score 100.
//! Optional-field coverage is reported alongside but does not enter the score.

use crate::contract::QualityContract;
use crate::rules::{is_present, Check};
use serde::{Deserialize, Serialize};
use std::fmt;
use trawl_core::Record;

/// One problem found in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub field: String,
    pub message: String,
}

impl QualityIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Scoring result for one record. Advisory: it never aborts a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: f64,
    pub field_coverage: f64,
    /// Share of the contract's optional fields present
    pub optional_coverage: f64,
    pub format_validity: f64,
    pub relationship_validity: f64,
    /// Missing required fields
    pub errors: Vec<QualityIssue>,
    /// Malformed or suspicious values
    pub warnings: Vec<QualityIssue>,
}

impl QualityReport {
    /// No errors and a score of at least `threshold`.
    pub fn is_acceptable(&self, threshold: f64) -> bool {
        self.errors.is_empty() && self.score >= threshold
    }
}

fn percent(passed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let ratio = passed as f64 / total as f64;
        ratio * 100.0
    }
}

/// Score `record` against `contract`. Deterministic and side-effect free.
pub fn score(record: &Record, contract: &QualityContract) -> QualityReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut present_required = 0;
    for field in &contract.required {
        if is_present(record.get(field)) {
            present_required += 1;
        } else {
            errors.push(QualityIssue::new(field, "required field missing"));
        }
    }
    let field_coverage = percent(present_required, contract.required.len());
    let present_optional = contract
        .optional
        .iter()
        .filter(|field| is_present(record.get(field.as_str())))
        .count();
    let optional_coverage = percent(present_optional, contract.optional.len());

    let mut checked = 0;
    let mut valid = 0;
    for (field, rule) in &contract.formats {
        let Some(value) = record.get(field).filter(|v| is_present(Some(*v))) else {
            continue;
        };
        checked += 1;
        match rule.check(value) {
            Check::Valid => valid += 1,
            Check::Suspicious(message) => {
                valid += 1;
                warnings.push(QualityIssue::new(field, message));
            }
            Check::Invalid(message) => warnings.push(QualityIssue::new(field, message)),
        }
    }
    let format_validity = percent(valid, checked);

    let mut applicable = 0;
    let mut holding = 0;
    for rule in &contract.relationships {
        let Some(check) = rule.check(record) else {
            continue;
        };
        applicable += 1;
        match check {
            Check::Invalid(message) => warnings.push(QualityIssue::new("record", message)),
            _ => holding += 1,
        }
    }
    let relationship_validity = percent(holding, applicable);

    QualityReport {
        score: (field_coverage + format_validity + relationship_validity) / 3.0,
        field_coverage,
        optional_coverage,
        format_validity,
        relationship_validity,
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> Record {
        let value = json!({
            "sku": "035585499741",
            "name": "Cordless Drill",
            "price": "$129.99",
            "weight": "3.5 lb",
            "image_urls": ["https://cdn.test/drill-1.jpg", "https://cdn.test/drill-2.jpg"],
            "brand": "Acme",
            "cross_sell": "111|222"
        });
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_complete_record_scores_100() {
        let report = score(&complete(), &QualityContract::product());
        assert!((report.score - 100.0).abs() < f64::EPSILON);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert!(report.is_acceptable(70.0));
    }

    #[test]
    fn test_missing_required_field_reduces_coverage() {
        let mut record = complete();
        record.remove("weight");
        let report = score(&record, &QualityContract::product());

        assert!((report.field_coverage - 80.0).abs() < 1e-9);
        assert!((report.format_validity - 100.0).abs() < 1e-9);
        assert!((report.relationship_validity - 100.0).abs() < 1e-9);
        assert!((report.score - (80.0 + 100.0 + 100.0) / 3.0).abs() < 1e-9);
        assert_eq!(report.errors, vec![QualityIssue::new("weight", "required field missing")]);
        assert!(!report.is_acceptable(0.0));
    }

    #[test]
    fn test_optional_fields_reported_not_scored() {
        let mut record = complete();
        let full = score(&record, &QualityContract::product());
        assert!((full.optional_coverage - 50.0).abs() < 1e-9);

        record.remove("brand");
        record.remove("cross_sell");
        let sparse = score(&record, &QualityContract::product());
        assert!(sparse.optional_coverage.abs() < 1e-9);
        assert!((sparse.score - full.score).abs() < 1e-9);
        assert!(sparse.warnings.is_empty());
    }

    #[test]
    fn test_wrong_unit_is_warning() {
        let mut record = complete();
        record.insert("weight".into(), json!("2 kg"));
        let report = score(&record, &QualityContract::product());

        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, "weight");
        assert!((report.format_validity - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_relationship_violation() {
        let mut record = complete();
        record.insert("cross_sell".into(), json!("111|035585499741"));
        let report = score(&record, &QualityContract::product());
        assert!((report.relationship_validity - 200.0 / 3.0).abs() < 1e-9);
        assert!(report.warnings.iter().any(|w| w.message.contains("own SKU")));
    }

    #[test]
    fn test_empty_record() {
        let report = score(&Record::new(), &QualityContract::product());
        assert!((report.field_coverage).abs() < 1e-9);
        assert_eq!(report.errors.len(), 5);
        assert!((report.score - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let record = complete();
        let contract = QualityContract::product();
        assert_eq!(score(&record, &contract), score(&record, &contract));
    }
}

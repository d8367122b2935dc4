//! Data quality scoring for scraped records.
//!
//! A [`QualityContract`] lists required and optional fields, per-field
//! format rules and cross-field relationship rules. [`score`] checks a
//! record against it and returns a [`QualityReport`].

pub mod contract;
pub mod rules;
pub mod scorer;

pub use contract::QualityContract;
pub use rules::{FormatRule, RelationshipRule};
pub use scorer::{score, QualityIssue, QualityReport};

//! What a complete, well-formed record looks like.

use crate::rules::{FormatRule, RelationshipRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trawl_recipe::ValidationConfig;

/// Required and optional fields plus the rules their values must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityContract {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub formats: BTreeMap<String, FormatRule>,
    pub relationships: Vec<RelationshipRule>,
}

impl QualityContract {
    /// The retail product contract.
    pub fn product() -> Self {
        let fields = |names: &[&str]| names.iter().map(|s| (*s).to_string()).collect();
        Self {
            required: fields(&["sku", "name", "price", "weight", "image_urls"]),
            optional: fields(&["brand", "category", "description", "cross_sell"]),
            formats: BTreeMap::from([
                ("price".to_string(), FormatRule::Price),
                ("weight".to_string(), FormatRule::WeightLb),
                ("image_urls".to_string(), FormatRule::HttpUrls),
                ("cross_sell".to_string(), FormatRule::PipeList),
            ]),
            relationships: vec![
                RelationshipRule::CrossSellExcludesSku,
                RelationshipRule::ImagesRequireName,
                RelationshipRule::WeightPositive,
            ],
        }
    }

    /// Apply a recipe's field overrides. Empty override lists keep the
    /// contract's own lists.
    #[must_use]
    pub fn with_overrides(mut self, validation: &ValidationConfig) -> Self {
        if !validation.required_fields.is_empty() {
            self.required.clone_from(&validation.required_fields);
        }
        if !validation.optional_fields.is_empty() {
            self.optional.clone_from(&validation.optional_fields);
        }
        self
    }

    /// The product contract adjusted by a recipe's overrides.
    pub fn for_validation(validation: &ValidationConfig) -> Self {
        Self::product().with_overrides(validation)
    }
}

impl Default for QualityContract {
    fn default() -> Self {
        Self::product()
    }
}

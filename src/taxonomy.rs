//! Annotation taxonomy
//!
//! Categories available for annotation, loaded once per session from a
//! JSON file. The taxonomy is advisory: records in categories it does not
//! list are still stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::annotations::{ACTION_CATEGORY, COT_CATEGORY};

/// One annotation category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyCategory {
    pub display_name: String,
    /// Ordered secondary values
    #[serde(default)]
    pub sub_labels: Vec<String>,
    /// Names of extra structured fields
    #[serde(default)]
    pub extra_fields_schema: Vec<String>,
}

/// Category name → definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Taxonomy {
    categories: BTreeMap<String, TaxonomyCategory>,
}

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid taxonomy: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Taxonomy {
    pub fn from_json_str(json: &str) -> Result<Self, TaxonomyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a taxonomy file
    pub async fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let taxonomy = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            categories = taxonomy.categories.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// The chain-of-thought and action highlight categories
    pub fn builtin() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            COT_CATEGORY.to_string(),
            TaxonomyCategory {
                display_name: "Scheming CoT".to_string(),
                sub_labels: vec![
                    "scheming_long_term".to_string(),
                    "scheming_covert".to_string(),
                    "unfaithful".to_string(),
                ],
                extra_fields_schema: Vec::new(),
            },
        );
        categories.insert(
            ACTION_CATEGORY.to_string(),
            TaxonomyCategory {
                display_name: "Malicious Action".to_string(),
                sub_labels: vec!["malicious".to_string(), "covert_malicious".to_string()],
                extra_fields_schema: Vec::new(),
            },
        );
        Self { categories }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn get(&self, category: &str) -> Option<&TaxonomyCategory> {
        self.categories.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&String, &TaxonomyCategory)> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

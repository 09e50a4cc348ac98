use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CategoryId, ClassificationId, NodeId, ServiceError, ValidationError};

/// One mutation to apply to a node, and optionally to its subtree.
///
/// Each variant maps to exactly one remote call and one pair of
/// outcome-message templates. The tree walk is agnostic to the variant;
/// adding a mutation kind means adding a case here and its remote
/// adapter, never a special case inside the walk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationOp {
    /// Set attribute values inside a category on the node.
    UpdateAttribute {
        category: CategoryId,
        attribute: String,
        values: Vec<Value>,
        /// Existing values to swap out, matched positionally against
        /// `values`. Empty means overwrite.
        #[serde(default)]
        replace: Vec<Value>,
        /// Append instead of overwriting.
        #[serde(default)]
        add: bool,
    },
    /// Remove every value of one attribute inside a category.
    ClearAttribute { category: CategoryId, attribute: String },
    /// Copy the full category set from another node.
    CopyCategories {
        source: NodeId,
        #[serde(default)]
        merge_categories: bool,
        #[serde(default)]
        merge_attributes: bool,
    },
    /// Copy a single category from another node.
    CopyCategory {
        source: NodeId,
        category: CategoryId,
        #[serde(default)]
        merge_attributes: bool,
    },
    /// Apply a records-management classification.
    AssignRmClassification { classification: ClassificationId },
    /// Apply a set of plain classifications.
    AssignClassifications { classifications: Vec<ClassificationId> },
}

impl MutationOp {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateAttribute { .. } => "update_attribute",
            Self::ClearAttribute { .. } => "clear_attribute",
            Self::CopyCategories { .. } => "copy_categories",
            Self::CopyCategory { .. } => "copy_category",
            Self::AssignRmClassification { .. } => "assign_rm_classification",
            Self::AssignClassifications { .. } => "assign_classifications",
        }
    }

    /// Outcome line for a successful application on `node`.
    #[must_use]
    pub fn success_detail(&self, node: NodeId) -> String {
        match self {
            Self::UpdateAttribute { .. } => format!("{node} - attribute updated"),
            Self::ClearAttribute { .. } => format!("{node} - attribute cleared"),
            Self::CopyCategories { source, .. } => {
                format!("{node} - categories copied from {source}")
            }
            Self::CopyCategory { source, category, .. } => {
                format!("{node} - category {category} copied from {source}")
            }
            Self::AssignRmClassification { .. } => format!("{node} - RM classification applied"),
            Self::AssignClassifications { .. } => format!("{node} - classifications applied"),
        }
    }

    /// Outcome line for a failed application on `node`.
    #[must_use]
    pub fn failure_detail(&self, node: NodeId, error: &ServiceError) -> String {
        match self {
            Self::UpdateAttribute { .. } => {
                format!("{node} - attribute NOT updated. ERROR: {error}")
            }
            Self::ClearAttribute { .. } => {
                format!("{node} - attribute NOT cleared. ERROR: {error}")
            }
            Self::CopyCategories { source, .. } => {
                format!("{node} - categories NOT copied from {source}. ERROR: {error}")
            }
            Self::CopyCategory { source, category, .. } => {
                format!("{node} - category {category} NOT copied from {source}. ERROR: {error}")
            }
            Self::AssignRmClassification { .. } => {
                format!("{node} - RM classification NOT applied. ERROR: {error}")
            }
            Self::AssignClassifications { .. } => {
                format!("{node} - classifications NOT applied. ERROR: {error}")
            }
        }
    }

    /// Reject payloads that could never be applied, before the first
    /// remote call is issued.
    ///
    /// # Errors
    /// Returns [`ValidationError`] when an identifier or value list
    /// required by the variant is empty or out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::UpdateAttribute { attribute, values, replace, .. } => {
                if attribute.trim().is_empty() {
                    return Err(ValidationError::new("attribute name MUST be non-empty"));
                }
                if values.is_empty() {
                    return Err(ValidationError::new("values MUST contain at least one entry"));
                }
                if !replace.is_empty() && replace.len() != values.len() {
                    return Err(ValidationError::new(
                        "replace list MUST match values list in length",
                    ));
                }
            }
            Self::ClearAttribute { attribute, .. } => {
                if attribute.trim().is_empty() {
                    return Err(ValidationError::new("attribute name MUST be non-empty"));
                }
            }
            Self::CopyCategories { source, .. } | Self::CopyCategory { source, .. } => {
                if !source.is_valid() {
                    return Err(ValidationError::new("source node id MUST be positive"));
                }
            }
            Self::AssignRmClassification { classification } => {
                if classification.0 <= 0 {
                    return Err(ValidationError::new("classification id MUST be positive"));
                }
            }
            Self::AssignClassifications { classifications } => {
                if classifications.is_empty() {
                    return Err(ValidationError::new(
                        "classifications MUST contain at least one entry",
                    ));
                }
            }
        }

        Ok(())
    }
}

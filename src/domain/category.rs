//! Budget Category Entity
//!
//! Top-level grouping of budget lines. Categories carry the canonical agency
//! and margin rates for the lines below them.

use serde::{Deserialize, Serialize};
use super::budget_line::present;
use super::entity::Entity;

/// Reserved id of the social charges category, always kept last
pub const SOCIAL_CHARGES_CATEGORY_ID: &str = "social-charges";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_expanded: bool,
    /// Top-level line ids in display order
    #[serde(default)]
    pub items: Vec<String>,
    pub agency_percent: Option<f64>,
    pub margin_percent: Option<f64>,
}

impl BudgetCategory {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            is_expanded: true,
            items: Vec::new(),
            agency_percent: None,
            margin_percent: None,
        }
    }

    /// The reserved social charges category
    pub fn social_charges() -> Self {
        Self::new(SOCIAL_CHARGES_CATEGORY_ID.to_string(), "Charges sociales".to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == SOCIAL_CHARGES_CATEGORY_ID
    }

    pub fn apply(&mut self, patch: &CategoryPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(expanded) = patch.is_expanded {
            self.is_expanded = expanded;
        }
        if let Some(agency) = patch.agency_percent {
            self.agency_percent = agency;
        }
        if let Some(margin) = patch.margin_percent {
            self.margin_percent = margin;
        }
    }
}

impl Entity for BudgetCategory {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}

/// Partial update for a category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub is_expanded: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub agency_percent: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub margin_percent: Option<Option<f64>>,
}

//! Budget Line Entity
//!
//! One row of the budget hierarchy. Lines live in the tree arena and point to
//! their children by id; `sub_items` order is display order.

use serde::{Deserialize, Deserializer, Serialize};
use super::entity::{DomainError, Entity};

/// Level of a line in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LineType {
    Category,
    SubCategory,
    #[default]
    Post,
    SubPost,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Category => "category",
            LineType::SubCategory => "subCategory",
            LineType::Post => "post",
            LineType::SubPost => "subPost",
        }
    }

    /// Posts and sub-posts carry quantities; the other levels group them
    pub fn is_post_like(&self) -> bool {
        matches!(self, LineType::Post | LineType::SubPost)
    }
}

impl std::str::FromStr for LineType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(LineType::Category),
            "subCategory" => Ok(LineType::SubCategory),
            "post" => Ok(LineType::Post),
            "subPost" => Ok(LineType::SubPost),
            other => Err(DomainError::InvalidInput(format!("unknown line type {}", other))),
        }
    }
}

/// A line of the budget tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLine {
    /// Unique across the whole quote
    pub id: String,
    #[serde(rename = "type")]
    pub line_type: LineType,
    /// Parent line (None = top level of its category)
    pub parent_id: Option<String>,
    /// Owning category, set when the line is inserted
    #[serde(default)]
    pub category_id: String,
    pub name: String,
    pub quantity: f64,
    pub number: f64,
    pub unit: String,
    pub rate: f64,
    /// Social charge rate id from the settings
    pub social_charges: Option<String>,
    /// Percentage points; None inherits from the ancestors
    pub agency_percent: Option<f64>,
    pub margin_percent: Option<f64>,
    /// Children ids in display order
    #[serde(default)]
    pub sub_items: Vec<String>,
    #[serde(default)]
    pub is_expanded: bool,
}

impl BudgetLine {
    /// Create a detached line with blank values
    pub fn new(id: String, line_type: LineType) -> Self {
        Self {
            id,
            line_type,
            parent_id: None,
            category_id: String::new(),
            name: String::new(),
            quantity: 0.0,
            number: 0.0,
            unit: "-".to_string(),
            rate: 0.0,
            social_charges: None,
            agency_percent: None,
            margin_percent: None,
            sub_items: Vec::new(),
            is_expanded: true,
        }
    }

    /// Lines with children take their cost from them
    pub fn is_container(&self) -> bool {
        !self.sub_items.is_empty()
    }

    /// quantity × number × rate, meaningful for leaves only
    pub fn own_cost(&self) -> f64 {
        self.quantity * self.number * self.rate
    }

    /// Shallow merge of the fields present in `patch`
    pub fn apply(&mut self, patch: &BudgetLinePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(number) = patch.number {
            self.number = number;
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if let Some(social_charges) = &patch.social_charges {
            self.social_charges = social_charges.clone();
        }
        if let Some(agency) = patch.agency_percent {
            self.agency_percent = agency;
        }
        if let Some(margin) = patch.margin_percent {
            self.margin_percent = margin;
        }
        if let Some(expanded) = patch.is_expanded {
            self.is_expanded = expanded;
        }
    }
}

impl Entity for BudgetLine {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}

/// Partial update for a line; absent fields are left untouched.
///
/// Nullable fields use a nested option so `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLinePatch {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub number: Option<f64>,
    pub unit: Option<String>,
    pub rate: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    pub social_charges: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub agency_percent: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub margin_percent: Option<Option<f64>>,
    pub is_expanded: Option<bool>,
}

impl BudgetLinePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Maps a present JSON field (even `null`) to `Some`
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

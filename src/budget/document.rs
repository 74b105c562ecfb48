//! Nested budget document
//!
//! JSON shape of a budget as the UI exchanges it: categories owning their
//! lines, lines owning their `subItems`. Converting to and from the arena is
//! lossless; parent and category links are rebuilt from the nesting.

use serde::{Deserialize, Serialize};

use crate::domain::{
    BudgetCategory, BudgetLine, DomainError, DomainResult, LineType, SOCIAL_CHARGES_CATEGORY_ID,
};
use super::tree::BudgetTree;

fn expanded() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDocument {
    pub categories: Vec<CategoryDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDoc {
    pub id: String,
    pub name: String,
    #[serde(default = "expanded")]
    pub is_expanded: bool,
    #[serde(default)]
    pub agency_percent: Option<f64>,
    #[serde(default)]
    pub margin_percent: Option<f64>,
    #[serde(default)]
    pub items: Vec<LineDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDoc {
    pub id: String,
    #[serde(rename = "type")]
    pub line_type: LineType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub number: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub social_charges: Option<String>,
    #[serde(default)]
    pub agency_percent: Option<f64>,
    #[serde(default)]
    pub margin_percent: Option<f64>,
    #[serde(default = "expanded")]
    pub is_expanded: bool,
    #[serde(default)]
    pub sub_items: Vec<LineDoc>,
}

impl BudgetTree {
    /// Build an arena from a nested document.
    ///
    /// Fails on duplicate ids anywhere in the forest. The social charges
    /// category is moved last whatever its position in the document, and
    /// created when the document lacks it.
    pub fn from_document(document: &BudgetDocument) -> DomainResult<Self> {
        let mut tree = BudgetTree::new();
        let mut seen = std::collections::HashSet::new();

        let (sentinels, regular): (Vec<_>, Vec<_>) = document
            .categories
            .iter()
            .partition(|c| c.id == SOCIAL_CHARGES_CATEGORY_ID);

        for category_doc in regular.into_iter().chain(sentinels) {
            if !seen.insert(category_doc.id.clone()) {
                return Err(DomainError::InvalidInput(format!("duplicate id {}", category_doc.id)));
            }

            let mut category = BudgetCategory::new(category_doc.id.clone(), category_doc.name.clone());
            category.is_expanded = category_doc.is_expanded;
            category.agency_percent = category_doc.agency_percent;
            category.margin_percent = category_doc.margin_percent;

            for line_doc in &category_doc.items {
                category.items.push(line_doc.id.clone());
                insert_line(&mut tree, &mut seen, line_doc, &category.id, None)?;
            }
            tree.push_category(category);
        }

        if !seen.contains(SOCIAL_CHARGES_CATEGORY_ID) {
            tree.push_category(BudgetCategory::social_charges());
        }

        Ok(tree)
    }

    /// Nested view of the arena in display order
    pub fn to_document(&self) -> BudgetDocument {
        BudgetDocument {
            categories: self
                .categories()
                .map(|category| CategoryDoc {
                    id: category.id.clone(),
                    name: category.name.clone(),
                    is_expanded: category.is_expanded,
                    agency_percent: category.agency_percent,
                    margin_percent: category.margin_percent,
                    items: self.category_items(category).map(|line| self.line_doc(line)).collect(),
                })
                .collect(),
        }
    }

    fn line_doc(&self, line: &BudgetLine) -> LineDoc {
        LineDoc {
            id: line.id.clone(),
            line_type: line.line_type,
            name: line.name.clone(),
            quantity: line.quantity,
            number: line.number,
            unit: line.unit.clone(),
            rate: line.rate,
            social_charges: line.social_charges.clone(),
            agency_percent: line.agency_percent,
            margin_percent: line.margin_percent,
            is_expanded: line.is_expanded,
            sub_items: self.children(line).map(|child| self.line_doc(child)).collect(),
        }
    }
}

fn insert_line(
    tree: &mut BudgetTree,
    seen: &mut std::collections::HashSet<String>,
    doc: &LineDoc,
    category_id: &str,
    parent_id: Option<&str>,
) -> DomainResult<()> {
    if !seen.insert(doc.id.clone()) {
        return Err(DomainError::InvalidInput(format!("duplicate id {}", doc.id)));
    }

    let line = BudgetLine {
        id: doc.id.clone(),
        line_type: doc.line_type,
        parent_id: parent_id.map(|p| p.to_string()),
        category_id: category_id.to_string(),
        name: doc.name.clone(),
        quantity: doc.quantity,
        number: doc.number,
        unit: doc.unit.clone(),
        rate: doc.rate,
        social_charges: doc.social_charges.clone(),
        agency_percent: doc.agency_percent,
        margin_percent: doc.margin_percent,
        sub_items: doc.sub_items.iter().map(|child| child.id.clone()).collect(),
        is_expanded: doc.is_expanded,
    };
    tree.put_line(line);

    for child in &doc.sub_items {
        insert_line(tree, seen, child, category_id, Some(&doc.id))?;
    }
    Ok(())
}

//! Budget Tree Module
//!
//! The budget tree and everything computed from it:
//! - tree: arena storage with cheap snapshots
//! - lifecycle: create / insert / update / move / delete
//! - rates: agency and margin propagation
//! - aggregation: totals, social charges, agency, margin
//! - document: nested JSON round-trip

mod tree;
mod lifecycle;
mod rates;
mod aggregation;
mod document;

pub use tree::BudgetTree;
pub use lifecycle::{
    add_item_to_categories, create_budget_item, delete_category, delete_item, move_item,
    toggle_expanded, update_category, update_item, CreateContext,
};
pub use rates::{update_all_rates, update_item_rates};
pub use aggregation::{
    category_totals, compute_totals, line_amounts, line_total, Amounts, BudgetTotals,
    CategoryTotals, SocialChargeGroup,
};
pub use document::{BudgetDocument, CategoryDoc, LineDoc};

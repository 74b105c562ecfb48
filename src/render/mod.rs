//! Render Module
//!
//! Actuals tracking for the render phase:
//! - store: add / update / replace / delete / reset of recorded items
//! - totals: HT/TTC totals and variance against the budget

mod store;
mod totals;

pub use store::RenderStore;
pub use totals::{
    compute_render_totals, compute_variance, item_amounts, variance, BucketTotals, RenderAmounts,
    RenderTotals, SectionTotals, Variance,
};

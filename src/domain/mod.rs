//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has no I/O; everything here is plain data plus serde.

mod entity;
mod budget_line;
mod category;
mod settings;
mod render_item;

pub use entity::{new_id, Entity, DomainError, DomainResult};
pub use budget_line::{BudgetLine, BudgetLinePatch, LineType};
pub use category::{BudgetCategory, CategoryPatch, SOCIAL_CHARGES_CATEGORY_ID};
pub use settings::{Currency, QuoteSettings, RateLabels, SocialChargeRate, SocialChargesDisplay};
pub use render_item::{
    Attachment, InvoiceStatus, RenderItem, RenderItemPatch, RenderItemType, RenderMainCategory,
    RenderState, RenderSubCategory, SectionType,
};

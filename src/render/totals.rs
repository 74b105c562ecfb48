//! Render totals and budget variance

use serde::Serialize;

use crate::budget::BudgetTotals;
use crate::domain::{InvoiceStatus, RenderItem, RenderItemType, RenderState, SectionType};

/// HT / TTC pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderAmounts {
    #[serde(rename = "totalHT")]
    pub total_ht: f64,
    #[serde(rename = "totalTTC")]
    pub total_ttc: f64,
}

impl RenderAmounts {
    fn add(&mut self, other: RenderAmounts) {
        self.total_ht += other.total_ht;
        self.total_ttc += other.total_ttc;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTotals {
    pub sub_category: RenderItemType,
    pub amounts: RenderAmounts,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionTotals {
    pub section: SectionType,
    pub amounts: RenderAmounts,
    pub buckets: Vec<BucketTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTotals {
    pub sections: Vec<SectionTotals>,
    pub amounts: RenderAmounts,
    /// TTC of the items whose invoice is not paid yet
    pub unpaid_ttc: f64,
}

impl RenderTotals {
    pub fn total_ht(&self) -> f64 {
        self.amounts.total_ht
    }

    pub fn total_ttc(&self) -> f64 {
        self.amounts.total_ttc
    }
}

/// Contribution of a single item.
///
/// Salaries count gross + charges on both sides: they have no tax split.
pub fn item_amounts(item: &RenderItem) -> RenderAmounts {
    match item.item_type {
        RenderItemType::Salaries => {
            let gross = item.gross_salary.unwrap_or(0.0);
            let charge = gross * item.social_charges_percent.unwrap_or(0.0) / 100.0;
            RenderAmounts {
                total_ht: gross + charge,
                total_ttc: gross + charge,
            }
        }
        RenderItemType::Suppliers | RenderItemType::Expenses => RenderAmounts {
            total_ht: item.amount_ht.unwrap_or(0.0),
            total_ttc: item.amount_ttc.unwrap_or(0.0),
        },
    }
}

pub fn compute_render_totals(state: &RenderState) -> RenderTotals {
    let mut amounts = RenderAmounts::default();
    let mut unpaid_ttc = 0.0;
    let mut sections = Vec::new();

    for section in &state.categories {
        let mut section_amounts = RenderAmounts::default();
        let mut buckets = Vec::new();

        for bucket in &section.sub_categories {
            let mut bucket_amounts = RenderAmounts::default();
            for item in &bucket.items {
                let item_total = item_amounts(item);
                if item.invoice_status != InvoiceStatus::Paid {
                    unpaid_ttc += item_total.total_ttc;
                }
                bucket_amounts.add(item_total);
            }
            section_amounts.add(bucket_amounts);
            buckets.push(BucketTotals {
                sub_category: bucket.id,
                amounts: bucket_amounts,
                item_count: bucket.items.len(),
            });
        }

        amounts.add(section_amounts);
        sections.push(SectionTotals {
            section: section.id,
            amounts: section_amounts,
            buckets,
        });
    }

    RenderTotals {
        sections,
        amounts,
        unpaid_ttc,
    }
}

/// Actual spend against the budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variance {
    /// render HT + agency + margin − budget grand total
    pub difference: f64,
    /// Share of the budget grand total, 0 when the budget is empty
    pub percent_difference: f64,
    pub is_positive: bool,
}

pub fn variance(render_total_ht: f64, agency: f64, margin: f64, budget_grand_total: f64) -> Variance {
    let difference = render_total_ht + agency + margin - budget_grand_total;
    let percent_difference = if budget_grand_total == 0.0 {
        0.0
    } else {
        difference / budget_grand_total * 100.0
    };
    Variance {
        difference,
        percent_difference,
        is_positive: difference > 0.0,
    }
}

/// Variance of the render store against computed budget totals
pub fn compute_variance(render: &RenderTotals, budget: &BudgetTotals) -> Variance {
    variance(
        render.total_ht(),
        budget.amounts.agency,
        budget.amounts.margin,
        budget.grand_total,
    )
}

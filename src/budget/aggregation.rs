//! Aggregation Engine
//!
//! Bottom-up totals over the budget tree. Leaves cost
//! `quantity × number × rate`; containers cost the sum of their children and
//! their own fields are ignored. Social charges, agency and margin are
//! evaluated on leaves and summed upwards.
//!
//! Nothing is rounded here: presentation rounds to two decimals.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

use crate::domain::{
    BudgetCategory, BudgetLine, QuoteSettings, SocialChargesDisplay, SOCIAL_CHARGES_CATEGORY_ID,
};
use super::tree::BudgetTree;

/// Cost components of a line, a category or the whole quote
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Amounts {
    pub base: f64,
    pub social_charges: f64,
    pub agency: f64,
    pub margin: f64,
}

impl Amounts {
    pub fn total(&self) -> f64 {
        self.base + self.social_charges + self.agency + self.margin
    }
}

impl AddAssign for Amounts {
    fn add_assign(&mut self, other: Self) {
        self.base += other.base;
        self.social_charges += other.social_charges;
        self.agency += other.agency;
        self.margin += other.margin;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub category_id: String,
    pub name: String,
    pub amounts: Amounts,
    /// Displayed subtotal. In grouped mode charges are moved out of every
    /// row into the social charges row.
    pub subtotal: f64,
}

/// Social charges of one rate, summed over the whole forest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialChargeGroup {
    pub rate_id: String,
    pub label: String,
    pub rate: f64,
    /// Base the rate was applied to
    pub base: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTotals {
    pub categories: Vec<CategoryTotals>,
    /// Per-rate breakdown, filled in both display modes
    pub social_charges_by_rate: Vec<SocialChargeGroup>,
    /// Charges gathered on the social charges row (grouped mode only)
    pub social_charges_group_total: f64,
    pub amounts: Amounts,
    pub grand_total: f64,
}

/// Effective agency/margin percentages flowing down the tree
#[derive(Debug, Clone, Copy)]
struct Rates {
    agency: f64,
    margin: f64,
}

impl Rates {
    fn for_category(category: &BudgetCategory, settings: &QuoteSettings) -> Self {
        Self {
            agency: category.agency_percent.unwrap_or(settings.default_agency_percent),
            margin: category.margin_percent.unwrap_or(settings.default_margin_percent),
        }
    }

    fn overridden_by(self, line: &BudgetLine) -> Self {
        Self {
            agency: line.agency_percent.unwrap_or(self.agency),
            margin: line.margin_percent.unwrap_or(self.margin),
        }
    }
}

#[derive(Default)]
struct ChargeBucket {
    base: f64,
    amount: f64,
}

struct Aggregator<'a> {
    tree: &'a BudgetTree,
    settings: &'a QuoteSettings,
    by_rate: BTreeMap<String, ChargeBucket>,
}

impl<'a> Aggregator<'a> {
    fn new(tree: &'a BudgetTree, settings: &'a QuoteSettings) -> Self {
        Self {
            tree,
            settings,
            by_rate: BTreeMap::new(),
        }
    }

    fn fold_category(&mut self, category: &BudgetCategory) -> Amounts {
        let rates = Rates::for_category(category, self.settings);
        let tree = self.tree;
        let mut amounts = Amounts::default();
        for line in tree.category_items(category) {
            amounts += self.fold_line(line, rates);
        }
        amounts
    }

    fn fold_line(&mut self, line: &BudgetLine, inherited: Rates) -> Amounts {
        let rates = inherited.overridden_by(line);

        if line.is_container() {
            let tree = self.tree;
            let mut amounts = Amounts::default();
            for child in tree.children(line) {
                amounts += self.fold_line(child, rates);
            }
            return amounts;
        }

        let settings = self.settings;
        let base = line.own_cost();
        let mut amounts = Amounts {
            base,
            agency: base * rates.agency / 100.0,
            margin: base * rates.margin / 100.0,
            ..Default::default()
        };

        let resolved = line
            .social_charges
            .as_deref()
            .and_then(|id| settings.find_rate(id));
        if let Some(rate) = resolved {
            let charge = base * rate.rate;
            amounts.social_charges = charge;

            if settings.apply_social_charges_margins {
                let agency = rate.agency_percent.unwrap_or(rates.agency);
                let margin = rate.margin_percent.unwrap_or(rates.margin);
                amounts.agency += charge * agency / 100.0;
                amounts.margin += charge * margin / 100.0;
            }

            let bucket = self.by_rate.entry(rate.id.clone()).or_default();
            bucket.base += base;
            bucket.amount += charge;
        }

        amounts
    }

    fn charge_groups(&self) -> Vec<SocialChargeGroup> {
        // Settings order
        self.settings
            .social_charge_rates
            .iter()
            .filter_map(|rate| {
                self.by_rate.get(&rate.id).map(|bucket| SocialChargeGroup {
                    rate_id: rate.id.clone(),
                    label: rate.label.clone(),
                    rate: rate.rate,
                    base: bucket.base,
                    amount: bucket.amount,
                })
            })
            .collect()
    }
}

/// Base cost of a line: own cost for leaves, sum of children for containers
pub fn line_total(tree: &BudgetTree, line_id: &str) -> f64 {
    fn base(tree: &BudgetTree, line: &BudgetLine) -> f64 {
        if line.is_container() {
            tree.children(line).map(|child| base(tree, child)).sum()
        } else {
            line.own_cost()
        }
    }
    tree.line(line_id).map(|line| base(tree, line)).unwrap_or(0.0)
}

/// Every component of a line, with rates inherited from its ancestors
pub fn line_amounts(tree: &BudgetTree, settings: &QuoteSettings, line_id: &str) -> Amounts {
    let Some(line) = tree.line(line_id) else {
        return Amounts::default();
    };
    let Some(category) = tree.category(&line.category_id) else {
        return Amounts::default();
    };

    let mut rates = Rates::for_category(category, settings);
    for ancestor_id in tree.ancestors(line_id).iter().rev() {
        if let Some(ancestor) = tree.line(ancestor_id) {
            rates = rates.overridden_by(ancestor);
        }
    }

    Aggregator::new(tree, settings).fold_line(line, rates)
}

/// Totals of a single category, `None` when it does not exist
pub fn category_totals(tree: &BudgetTree, settings: &QuoteSettings, category_id: &str) -> Option<CategoryTotals> {
    let category = tree.category(category_id)?;
    let amounts = Aggregator::new(tree, settings).fold_category(category);
    Some(to_category_totals(category, amounts, settings))
}

fn to_category_totals(category: &BudgetCategory, amounts: Amounts, settings: &QuoteSettings) -> CategoryTotals {
    let amounts = match settings.social_charges_display {
        SocialChargesDisplay::Detailed => amounts,
        SocialChargesDisplay::Grouped => Amounts {
            social_charges: 0.0,
            ..amounts
        },
    };
    CategoryTotals {
        category_id: category.id.clone(),
        name: category.name.clone(),
        amounts,
        subtotal: amounts.total(),
    }
}

/// Totals of the whole quote.
///
/// The grand total is the sum of the category rows and is the same in both
/// display modes: grouped mode moves every charge from its category row to
/// the social charges row.
pub fn compute_totals(tree: &BudgetTree, settings: &QuoteSettings) -> BudgetTotals {
    let mut aggregator = Aggregator::new(tree, settings);
    let mut categories = Vec::new();
    let mut amounts = Amounts::default();

    for category in tree.categories() {
        let category_amounts = aggregator.fold_category(category);
        amounts += category_amounts;
        categories.push(to_category_totals(category, category_amounts, settings));
    }

    let social_charges_by_rate = aggregator.charge_groups();
    let social_charges_group_total = match settings.social_charges_display {
        SocialChargesDisplay::Detailed => 0.0,
        SocialChargesDisplay::Grouped => amounts.social_charges,
    };

    if social_charges_group_total != 0.0 {
        let index = match categories.iter().position(|c| c.category_id == SOCIAL_CHARGES_CATEGORY_ID) {
            Some(index) => index,
            None => {
                let sentinel = BudgetCategory::social_charges();
                categories.push(to_category_totals(&sentinel, Amounts::default(), settings));
                categories.len() - 1
            }
        };
        let row = &mut categories[index];
        row.amounts.social_charges += social_charges_group_total;
        row.subtotal += social_charges_group_total;
    }

    let grand_total = categories.iter().map(|c| c.subtotal).sum::<f64>();

    BudgetTotals {
        categories,
        social_charges_by_rate,
        social_charges_group_total,
        amounts,
        grand_total,
    }
}

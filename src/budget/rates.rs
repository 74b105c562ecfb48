//! Rate propagation
//!
//! "Apply to all lines": rewrite agency and margin percentages to the
//! settings defaults.

use crate::domain::{BudgetCategory, BudgetLine, QuoteSettings};
use super::tree::BudgetTree;

/// Set every category and every line to the default agency/margin rates
pub fn update_all_rates(tree: &BudgetTree, settings: &QuoteSettings) -> BudgetTree {
    let mut next = tree.clone();

    let category_ids: Vec<String> = tree.category_ids().cloned().collect();
    for category_id in &category_ids {
        if let Some(category) = tree.category(category_id) {
            let mut category = BudgetCategory::clone(category);
            category.agency_percent = Some(settings.default_agency_percent);
            category.margin_percent = Some(settings.default_margin_percent);
            next.put_category(category);
        }
        for line in tree.walk_category(category_id) {
            next.put_line(with_default_rates(&line, settings));
        }
    }

    next.bump_version();
    log::info!(
        "Applied agency {}% / margin {}% to {} lines",
        settings.default_agency_percent,
        settings.default_margin_percent,
        tree.line_count()
    );
    next
}

/// Same as [`update_all_rates`] restricted to one line and its subtree
pub fn update_item_rates(
    tree: &BudgetTree,
    category_id: &str,
    item_id: &str,
    settings: &QuoteSettings,
) -> BudgetTree {
    let mut next = tree.clone();
    let Some(line) = tree.find_in_category(category_id, item_id) else {
        log::debug!("rates: item {} not found in {}", item_id, category_id);
        return next;
    };

    next.put_line(with_default_rates(line, settings));
    for descendant in tree.descendants(item_id) {
        next.put_line(with_default_rates(&descendant, settings));
    }
    next.bump_version();
    next
}

fn with_default_rates(line: &BudgetLine, settings: &QuoteSettings) -> BudgetLine {
    let mut line = line.clone();
    line.agency_percent = Some(settings.default_agency_percent);
    line.margin_percent = Some(settings.default_margin_percent);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::lifecycle::{add_item_to_categories, create_budget_item, CreateContext};
    use crate::domain::LineType;

    fn build() -> (BudgetTree, String, String, String) {
        let settings = QuoteSettings::default();
        let tree = BudgetTree::with_social_charges();
        let category = create_budget_item(LineType::Category, None, &settings, CreateContext::Work);
        let c1 = category.id.clone();
        let tree = add_item_to_categories(&tree, "", None, category);

        let post = create_budget_item(LineType::Post, None, &settings, CreateContext::Work);
        let p1 = post.id.clone();
        let tree = add_item_to_categories(&tree, &c1, None, post);

        let sub = create_budget_item(LineType::SubPost, Some(p1.as_str()), &settings, CreateContext::Work);
        let s1 = sub.id.clone();
        let tree = add_item_to_categories(&tree, &c1, Some(p1.as_str()), sub);
        (tree, c1, p1, s1)
    }

    #[test]
    fn test_update_all_rates_recurses() {
        let (tree, c1, p1, s1) = build();
        let settings = QuoteSettings {
            default_agency_percent: 12.0,
            default_margin_percent: 8.0,
            ..Default::default()
        };

        let next = update_all_rates(&tree, &settings);
        assert_eq!(next.category(&c1).unwrap().agency_percent, Some(12.0));
        for id in [&p1, &s1] {
            let line = next.line(id).unwrap();
            assert_eq!(line.agency_percent, Some(12.0));
            assert_eq!(line.margin_percent, Some(8.0));
        }
        assert_eq!(tree.line(&s1).unwrap().agency_percent, None);
    }

    #[test]
    fn test_update_item_rates_scoped() {
        let (tree, c1, p1, s1) = build();
        let settings = QuoteSettings {
            default_agency_percent: 5.0,
            ..Default::default()
        };

        let next = update_item_rates(&tree, &c1, &s1, &settings);
        assert_eq!(next.line(&s1).unwrap().agency_percent, Some(5.0));
        assert_eq!(next.line(&p1).unwrap().agency_percent, None);

        let unchanged = update_item_rates(&tree, &c1, "missing", &settings);
        assert_eq!(unchanged.version(), tree.version());
    }
}

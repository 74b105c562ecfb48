//! Item Lifecycle Operations
//!
//! Create, insert, update, move and delete budget lines and categories.
//! Every operation takes a tree snapshot and returns a new one; the input is
//! never modified. Ids that do not exist make the operation a no-op and the
//! returned tree is an unchanged clone (same version).

use std::sync::Arc;

use crate::domain::{
    new_id, BudgetCategory, BudgetLine, BudgetLinePatch, CategoryPatch, Entity, LineType,
    QuoteSettings,
};
use super::tree::BudgetTree;

/// Where a new line is being created
#[derive(Debug, Clone, Copy)]
pub enum CreateContext<'a> {
    /// Work sheet: posts start blank, nothing is inherited
    Work,
    /// Budget table: posts inherit from the previous line of the same type
    Budget {
        tree: &'a BudgetTree,
        category_id: &'a str,
    },
}

/// Build a new detached line with a fresh id.
///
/// Category and sub-category levels get blank values plus the default
/// agency/margin rates. Posts and sub-posts created in the budget context copy
/// quantity, number, unit, rate and social charges from the last line of the
/// same type found depth-first in their scope (the category for top-level
/// posts, the parent's subtree otherwise).
pub fn create_budget_item(
    line_type: LineType,
    parent_id: Option<&str>,
    settings: &QuoteSettings,
    context: CreateContext<'_>,
) -> BudgetLine {
    let mut line = BudgetLine::new(new_id(), line_type);
    line.parent_id = parent_id.map(|p| p.to_string());

    match line_type {
        LineType::Category | LineType::SubCategory => {
            line.quantity = 0.0;
            line.number = if line_type == LineType::Category { 1.0 } else { 0.0 };
            line.unit = settings
                .available_units
                .first()
                .cloned()
                .unwrap_or_else(|| "-".to_string());
            line.rate = 0.0;
            line.agency_percent = Some(settings.default_agency_percent);
            line.margin_percent = Some(settings.default_margin_percent);
        }
        LineType::Post | LineType::SubPost => {
            apply_blank_post_defaults(&mut line);

            if let CreateContext::Budget { tree, category_id } = context {
                if let Some(previous) = find_previous_sibling(tree, category_id, parent_id, line_type) {
                    line.quantity = previous.quantity;
                    line.number = previous.number;
                    line.unit = previous.unit.clone();
                    line.rate = previous.rate;
                    line.social_charges = previous.social_charges.clone();
                }
            }
        }
    }

    line
}

fn apply_blank_post_defaults(line: &mut BudgetLine) {
    line.quantity = 0.0;
    line.number = 1.0;
    line.unit = "-".to_string();
    line.rate = 0.0;
    line.social_charges = None;
}

/// Last line of `line_type` in the scope, depth-first pre-order
fn find_previous_sibling(
    tree: &BudgetTree,
    category_id: &str,
    parent_id: Option<&str>,
    line_type: LineType,
) -> Option<Arc<BudgetLine>> {
    let scope = match parent_id {
        Some(pid) => tree.descendants(pid),
        None => tree.walk_category(category_id),
    };
    scope.into_iter().rev().find(|line| line.line_type == line_type)
}

/// Insert a created item.
///
/// Category items become categories, placed before the social charges
/// category when it exists. Other items are appended to the children of
/// `parent_id`, or to the category's top level when there is no parent.
pub fn add_item_to_categories(
    tree: &BudgetTree,
    category_id: &str,
    parent_id: Option<&str>,
    item: BudgetLine,
) -> BudgetTree {
    let mut next = tree.clone();

    if tree.contains(&item.id()) {
        log::warn!("Refusing to insert duplicate id {}", item.id);
        return next;
    }

    if item.line_type == LineType::Category {
        let mut category = BudgetCategory::new(item.id, item.name);
        category.agency_percent = item.agency_percent;
        category.margin_percent = item.margin_percent;
        category.is_expanded = item.is_expanded;
        next.push_category(category);
        next.bump_version();
        return next;
    }

    let Some(category) = tree.category(category_id) else {
        log::debug!("add: category {} not found", category_id);
        return next;
    };

    let mut line = item;
    line.category_id = category_id.to_string();
    line.parent_id = parent_id.map(|p| p.to_string());
    line.sub_items.clear();

    match parent_id {
        Some(pid) => {
            let Some(parent) = tree.find_in_category(category_id, pid) else {
                log::debug!("add: parent {} not found in {}", pid, category_id);
                return next;
            };
            let mut parent = BudgetLine::clone(parent);
            parent.sub_items.push(line.id.clone());
            next.put_line(parent);
        }
        None => {
            let mut category = BudgetCategory::clone(category);
            category.items.push(line.id.clone());
            next.put_category(category);
        }
    }

    next.put_line(line);
    next.bump_version();
    next
}

/// Shallow-merge `patch` into the line `item_id` of `category_id`
pub fn update_item(
    tree: &BudgetTree,
    category_id: &str,
    item_id: &str,
    patch: &BudgetLinePatch,
) -> BudgetTree {
    let mut next = tree.clone();
    let Some(line) = tree.find_in_category(category_id, item_id) else {
        log::debug!("update: item {} not found in {}", item_id, category_id);
        return next;
    };

    let mut line = BudgetLine::clone(line);
    line.apply(patch);
    next.put_line(line);
    next.bump_version();
    next
}

/// Shallow-merge `patch` into a category
pub fn update_category(tree: &BudgetTree, category_id: &str, patch: &CategoryPatch) -> BudgetTree {
    let mut next = tree.clone();
    let Some(category) = tree.category(category_id) else {
        log::debug!("update: category {} not found", category_id);
        return next;
    };

    let mut category = BudgetCategory::clone(category);
    category.apply(patch);
    next.put_category(category);
    next.bump_version();
    next
}

/// Remove a line and its whole subtree.
///
/// When `item_id` names the category itself the category is removed,
/// except the social charges category which is always kept.
pub fn delete_item(tree: &BudgetTree, category_id: &str, item_id: &str) -> BudgetTree {
    if item_id == category_id {
        return delete_category(tree, category_id);
    }

    let mut next = tree.clone();
    let Some(line) = tree.find_in_category(category_id, item_id) else {
        log::debug!("delete: item {} not found in {}", item_id, category_id);
        return next;
    };

    unlink(&mut next, line);
    next.remove_subtree(item_id);
    next.bump_version();
    next
}

/// Remove a category with all its lines; the social charges category stays
pub fn delete_category(tree: &BudgetTree, category_id: &str) -> BudgetTree {
    let mut next = tree.clone();
    match tree.category(category_id) {
        Some(category) if category.is_sentinel() => {
            log::debug!("delete: keeping social charges category");
        }
        Some(_) => {
            next.remove_category(category_id);
            next.bump_version();
        }
        None => log::debug!("delete: category {} not found", category_id),
    }
    next
}

/// Detach a line from its parent's children or its category's top level
fn unlink(next: &mut BudgetTree, line: &BudgetLine) {
    match &line.parent_id {
        Some(pid) => {
            if let Some(parent) = next.line(pid) {
                let mut parent = BudgetLine::clone(parent);
                parent.sub_items.retain(|id| *id != line.id);
                next.put_line(parent);
            }
        }
        None => {
            if let Some(category) = next.category(&line.category_id) {
                let mut category = BudgetCategory::clone(category);
                category.items.retain(|id| *id != line.id);
                next.put_category(category);
            }
        }
    }
}

/// Reparent a line, possibly into another category.
///
/// `position` is clamped to the target's children count. Moving a line under
/// itself or one of its descendants is refused (no-op).
pub fn move_item(
    tree: &BudgetTree,
    item_id: &str,
    target_category_id: &str,
    target_parent_id: Option<&str>,
    position: usize,
) -> BudgetTree {
    let mut next = tree.clone();
    let Some(line) = tree.line(item_id) else {
        log::debug!("move: item {} not found", item_id);
        return next;
    };
    if tree.category(target_category_id).is_none() {
        log::debug!("move: category {} not found", target_category_id);
        return next;
    }
    if let Some(pid) = target_parent_id {
        let valid_parent = tree.find_in_category(target_category_id, pid).is_some()
            && pid != item_id
            && !tree.descendants(item_id).iter().any(|d| d.id == pid);
        if !valid_parent {
            log::debug!("move: invalid target parent {}", pid);
            return next;
        }
    }

    unlink(&mut next, line);

    match target_parent_id {
        Some(pid) => {
            if let Some(parent) = next.line(pid) {
                let mut parent = BudgetLine::clone(parent);
                let index = position.min(parent.sub_items.len());
                parent.sub_items.insert(index, item_id.to_string());
                next.put_line(parent);
            }
        }
        None => {
            if let Some(category) = next.category(target_category_id) {
                let mut category = BudgetCategory::clone(category);
                let index = position.min(category.items.len());
                category.items.insert(index, item_id.to_string());
                next.put_category(category);
            }
        }
    }

    let mut moved = BudgetLine::clone(line);
    moved.parent_id = target_parent_id.map(|p| p.to_string());
    if moved.category_id != target_category_id {
        for descendant in tree.descendants(item_id) {
            let mut descendant = BudgetLine::clone(&descendant);
            descendant.category_id = target_category_id.to_string();
            next.put_line(descendant);
        }
        moved.category_id = target_category_id.to_string();
    }
    next.put_line(moved);
    next.bump_version();
    next
}

/// Flip the UI expansion flag of a line or a category
pub fn toggle_expanded(tree: &BudgetTree, id: &str) -> BudgetTree {
    let mut next = tree.clone();
    if let Some(line) = tree.line(id) {
        let mut line = BudgetLine::clone(line);
        line.is_expanded = !line.is_expanded;
        next.put_line(line);
        next.bump_version();
    } else if let Some(category) = tree.category(id) {
        let mut category = BudgetCategory::clone(category);
        category.is_expanded = !category.is_expanded;
        next.put_category(category);
        next.bump_version();
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SOCIAL_CHARGES_CATEGORY_ID;

    fn settings() -> QuoteSettings {
        QuoteSettings {
            default_agency_percent: 10.0,
            default_margin_percent: 15.0,
            ..Default::default()
        }
    }

    fn add_category(tree: &BudgetTree, name: &str) -> (BudgetTree, String) {
        let mut item = create_budget_item(LineType::Category, None, &settings(), CreateContext::Work);
        item.name = name.to_string();
        let id = item.id.clone();
        (add_item_to_categories(tree, "", None, item), id)
    }

    fn add_post(tree: &BudgetTree, category_id: &str, parent: Option<&str>, line_type: LineType) -> (BudgetTree, String) {
        let item = create_budget_item(
            line_type,
            parent,
            &settings(),
            CreateContext::Budget { tree, category_id },
        );
        let id = item.id.clone();
        (add_item_to_categories(tree, category_id, parent, item), id)
    }

    #[test]
    fn test_create_category_defaults() {
        let item = create_budget_item(LineType::Category, None, &settings(), CreateContext::Work);
        assert_eq!(item.quantity, 0.0);
        assert_eq!(item.number, 1.0);
        assert_eq!(item.rate, 0.0);
        assert_eq!(item.agency_percent, Some(10.0));
        assert_eq!(item.margin_percent, Some(15.0));

        let sub = create_budget_item(LineType::SubCategory, Some("p"), &settings(), CreateContext::Work);
        assert_eq!(sub.number, 0.0);
        assert_eq!(sub.parent_id.as_deref(), Some("p"));
    }

    #[test]
    fn test_categories_inserted_before_sentinel() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, c2) = add_category(&tree, "Régie");

        let ids: Vec<_> = tree.category_ids().cloned().collect();
        assert_eq!(ids, vec![c1, c2, SOCIAL_CHARGES_CATEGORY_ID.to_string()]);
    }

    #[test]
    fn test_categories_appended_without_sentinel() {
        let tree = BudgetTree::new();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, c2) = add_category(&tree, "Régie");
        let ids: Vec<_> = tree.category_ids().cloned().collect();
        assert_eq!(ids, vec![c1, c2]);
    }

    #[test]
    fn test_add_does_not_touch_input_snapshot() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (next, post) = add_post(&tree, &c1, None, LineType::Post);

        assert!(tree.line(&post).is_none());
        assert!(tree.category(&c1).unwrap().items.is_empty());
        assert_eq!(next.category(&c1).unwrap().items, vec![post.clone()]);
        assert_eq!(next.line(&post).unwrap().category_id, c1);
        assert!(next.version() > tree.version());
    }

    #[test]
    fn test_post_inherits_previous_sibling() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let tree = update_item(
            &tree,
            &c1,
            &p1,
            &BudgetLinePatch {
                quantity: Some(5.0),
                unit: Some("Jour".to_string()),
                rate: Some(350.0),
                social_charges: Some(Some("intermittent".to_string())),
                ..Default::default()
            },
        );

        let created = create_budget_item(
            LineType::Post,
            None,
            &settings(),
            CreateContext::Budget { tree: &tree, category_id: &c1 },
        );
        assert_eq!(created.quantity, 5.0);
        assert_eq!(created.unit, "Jour");
        assert_eq!(created.rate, 350.0);
        assert_eq!(created.social_charges.as_deref(), Some("intermittent"));
        assert_ne!(created.id, p1);
    }

    #[test]
    fn test_work_context_never_inherits() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let tree = update_item(&tree, &c1, &p1, &BudgetLinePatch { rate: Some(99.0), ..Default::default() });

        let created = create_budget_item(LineType::Post, None, &settings(), CreateContext::Work);
        assert_eq!(created.rate, 0.0);
        assert_eq!(created.unit, "-");
        assert!(created.social_charges.is_none());
    }

    #[test]
    fn test_sub_post_inherits_within_parent_only() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, p2) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, s1) = add_post(&tree, &c1, Some(p1.as_str()), LineType::SubPost);
        let tree = update_item(&tree, &c1, &s1, &BudgetLinePatch { rate: Some(42.0), ..Default::default() });

        let under_p1 = create_budget_item(
            LineType::SubPost,
            Some(p1.as_str()),
            &settings(),
            CreateContext::Budget { tree: &tree, category_id: &c1 },
        );
        let under_p2 = create_budget_item(
            LineType::SubPost,
            Some(p2.as_str()),
            &settings(),
            CreateContext::Budget { tree: &tree, category_id: &c1 },
        );
        assert_eq!(under_p1.rate, 42.0);
        assert_eq!(under_p2.rate, 0.0);
    }

    #[test]
    fn test_update_keeps_sibling_identity() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, c2) = add_category(&tree, "Régie");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, p2) = add_post(&tree, &c1, None, LineType::Post);

        let next = update_item(
            &tree,
            &c1,
            &p1,
            &BudgetLinePatch { name: Some("Caméra".to_string()), quantity: Some(3.0), ..Default::default() },
        );

        let updated = next.line(&p1).unwrap();
        assert_eq!(updated.name, "Caméra");
        assert_eq!(updated.quantity, 3.0);
        assert_eq!(updated.number, 1.0);
        assert!(Arc::ptr_eq(tree.line(&p2).unwrap(), next.line(&p2).unwrap()));
        assert!(Arc::ptr_eq(tree.category(&c1).unwrap(), next.category(&c1).unwrap()));
        assert!(Arc::ptr_eq(tree.category(&c2).unwrap(), next.category(&c2).unwrap()));
        assert!(!Arc::ptr_eq(tree.line(&p1).unwrap(), updated));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let next = update_item(&tree, &c1, "missing", &BudgetLinePatch { rate: Some(1.0), ..Default::default() });
        assert_eq!(next.version(), tree.version());

        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let wrong_category = update_item(&tree, "other", &p1, &BudgetLinePatch { rate: Some(1.0), ..Default::default() });
        assert_eq!(wrong_category.line(&p1).unwrap().rate, 0.0);
    }

    #[test]
    fn test_delete_removes_subtree_and_is_idempotent() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, s1) = add_post(&tree, &c1, Some(p1.as_str()), LineType::SubPost);
        let (tree, p2) = add_post(&tree, &c1, None, LineType::Post);

        let once = delete_item(&tree, &c1, &p1);
        assert!(once.line(&p1).is_none());
        assert!(once.line(&s1).is_none());
        assert_eq!(once.category(&c1).unwrap().items, vec![p2]);

        let twice = delete_item(&once, &c1, &p1);
        assert_eq!(twice.version(), once.version());
        assert_eq!(twice.line_count(), once.line_count());
    }

    #[test]
    fn test_delete_sub_post_unlinks_from_parent() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, s1) = add_post(&tree, &c1, Some(p1.as_str()), LineType::SubPost);

        let next = delete_item(&tree, &c1, &s1);
        assert!(next.line(&p1).unwrap().sub_items.is_empty());
    }

    #[test]
    fn test_sentinel_survives_delete() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");

        let next = delete_item(&tree, SOCIAL_CHARGES_CATEGORY_ID, SOCIAL_CHARGES_CATEGORY_ID);
        assert!(next.category(SOCIAL_CHARGES_CATEGORY_ID).is_some());

        let next = delete_category(&next, &c1);
        assert!(next.category(&c1).is_none());
        assert!(next.category(SOCIAL_CHARGES_CATEGORY_ID).is_some());

        let (next, c3) = add_category(&next, "Post-production");
        let ids: Vec<_> = next.category_ids().cloned().collect();
        assert_eq!(ids, vec![c3, SOCIAL_CHARGES_CATEGORY_ID.to_string()]);
    }

    #[test]
    fn test_move_between_categories() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, c2) = add_category(&tree, "Régie");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, s1) = add_post(&tree, &c1, Some(p1.as_str()), LineType::SubPost);
        let (tree, p2) = add_post(&tree, &c2, None, LineType::Post);

        let next = move_item(&tree, &p1, &c2, None, 0);
        assert!(next.category(&c1).unwrap().items.is_empty());
        assert_eq!(next.category(&c2).unwrap().items, vec![p1.clone(), p2]);
        assert_eq!(next.line(&s1).unwrap().category_id, c2);
    }

    #[test]
    fn test_move_under_own_descendant_is_refused() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let (tree, p1) = add_post(&tree, &c1, None, LineType::Post);
        let (tree, s1) = add_post(&tree, &c1, Some(p1.as_str()), LineType::SubPost);

        let next = move_item(&tree, &p1, &c1, Some(s1.as_str()), 0);
        assert_eq!(next.version(), tree.version());
        let next = move_item(&tree, &p1, &c1, Some(p1.as_str()), 0);
        assert_eq!(next.version(), tree.version());
    }

    #[test]
    fn test_toggle_expanded() {
        let tree = BudgetTree::with_social_charges();
        let (tree, c1) = add_category(&tree, "Technique");
        let next = toggle_expanded(&tree, &c1);
        assert!(!next.category(&c1).unwrap().is_expanded);
    }
}

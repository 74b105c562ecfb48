//! Budget Tree Arena
//!
//! Lines and categories are stored flat, keyed by id, with parent/children
//! recorded as id references. The maps are persistent (`im`), so cloning a
//! tree is cheap and every clone is an independent snapshot: a mutation
//! replaces only the touched `Arc` entries and leaves the rest shared.

use std::sync::Arc;

use crate::domain::{BudgetCategory, BudgetLine, SOCIAL_CHARGES_CATEGORY_ID};

#[derive(Debug, Clone, Default)]
pub struct BudgetTree {
    version: u64,
    category_order: im::Vector<String>,
    categories: im::HashMap<String, Arc<BudgetCategory>>,
    lines: im::HashMap<String, Arc<BudgetLine>>,
}

impl BudgetTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty tree holding only the social charges category
    pub fn with_social_charges() -> Self {
        let mut tree = Self::new();
        tree.push_category(BudgetCategory::social_charges());
        tree
    }

    /// Incremented by every effective mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn category_ids(&self) -> impl Iterator<Item = &String> {
        self.category_order.iter()
    }

    /// Categories in display order
    pub fn categories(&self) -> impl Iterator<Item = &Arc<BudgetCategory>> {
        self.category_order.iter().filter_map(move |id| self.categories.get(id))
    }

    pub fn category(&self, id: &str) -> Option<&Arc<BudgetCategory>> {
        self.categories.get(id)
    }

    pub fn line(&self, id: &str) -> Option<&Arc<BudgetLine>> {
        self.lines.get(id)
    }

    /// Line `item_id` if it belongs to `category_id`
    pub fn find_in_category(&self, category_id: &str, item_id: &str) -> Option<&Arc<BudgetLine>> {
        self.lines.get(item_id).filter(|line| line.category_id == category_id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lines.contains_key(id) || self.categories.contains_key(id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Direct children of a line, in order
    pub fn children<'a>(&'a self, line: &'a BudgetLine) -> impl Iterator<Item = &'a Arc<BudgetLine>> + 'a {
        line.sub_items.iter().filter_map(move |id| self.lines.get(id))
    }

    /// Top-level lines of a category, in order
    pub fn category_items<'a>(&'a self, category: &'a BudgetCategory) -> impl Iterator<Item = &'a Arc<BudgetLine>> + 'a {
        category.items.iter().filter_map(move |id| self.lines.get(id))
    }

    /// Every line of a category, depth-first pre-order
    pub fn walk_category(&self, category_id: &str) -> Vec<Arc<BudgetLine>> {
        let mut result = Vec::new();
        if let Some(category) = self.categories.get(category_id) {
            for id in &category.items {
                self.collect_subtree(id, &mut result);
            }
        }
        result
    }

    /// Descendants of a line (not the line itself), depth-first pre-order
    pub fn descendants(&self, id: &str) -> Vec<Arc<BudgetLine>> {
        let mut result = Vec::new();
        if let Some(line) = self.lines.get(id) {
            for child in &line.sub_items {
                self.collect_subtree(child, &mut result);
            }
        }
        result
    }

    /// Ids from the line's parent up to the top-level line
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut current = self.lines.get(id).and_then(|l| l.parent_id.clone());
        while let Some(parent_id) = current {
            // Guards against a malformed parent cycle
            if result.contains(&parent_id) {
                break;
            }
            current = self.lines.get(&parent_id).and_then(|l| l.parent_id.clone());
            result.push(parent_id);
        }
        result
    }

    fn collect_subtree(&self, id: &str, result: &mut Vec<Arc<BudgetLine>>) {
        if let Some(line) = self.lines.get(id) {
            result.push(Arc::clone(line));
            for child in &line.sub_items {
                self.collect_subtree(child, result);
            }
        }
    }

    // ========================
    // Arena mutation (crate internal)
    // ========================

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub(crate) fn put_line(&mut self, line: BudgetLine) {
        self.lines.insert(line.id.clone(), Arc::new(line));
    }

    pub(crate) fn put_category(&mut self, category: BudgetCategory) {
        self.categories.insert(category.id.clone(), Arc::new(category));
    }

    /// Register a category at its ordered position: before the social
    /// charges category when present, last otherwise.
    pub(crate) fn push_category(&mut self, category: BudgetCategory) {
        let id = category.id.clone();
        let sentinel_index = self
            .category_order
            .iter()
            .position(|c| c == SOCIAL_CHARGES_CATEGORY_ID);

        match sentinel_index {
            Some(index) if id != SOCIAL_CHARGES_CATEGORY_ID => self.category_order.insert(index, id),
            _ => self.category_order.push_back(id),
        }
        self.put_category(category);
    }

    /// Drop a category and every line it owns
    pub(crate) fn remove_category(&mut self, id: &str) {
        for line in self.walk_category(id) {
            self.lines.remove(&line.id);
        }
        self.categories.remove(id);
        self.category_order = self.category_order.iter().filter(|c| c.as_str() != id).cloned().collect();
    }

    /// Drop a line and its subtree from the arena (links are left to the caller)
    pub(crate) fn remove_subtree(&mut self, id: &str) {
        for line in self.descendants(id) {
            self.lines.remove(&line.id);
        }
        self.lines.remove(id);
    }
}

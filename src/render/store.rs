//! Render Store
//!
//! Mutable record of the actual spend. Every operation swaps in a whole new
//! state, so a snapshot taken before a mutation stays complete and
//! consistent. Operations on unknown ids are silent no-ops.

use std::sync::Arc;

use crate::domain::{
    Entity, RenderItem, RenderItemPatch, RenderItemType, RenderMainCategory, RenderState,
    RenderSubCategory, SectionType,
};

#[derive(Debug, Clone, Default)]
pub struct RenderStore {
    state: Arc<RenderState>,
}

impl RenderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RenderState) -> Self {
        Self { state: Arc::new(state) }
    }

    /// Shared read-only view of the current state
    pub fn snapshot(&self) -> Arc<RenderState> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed
    }

    pub fn bucket(&self, section: SectionType, sub_category: RenderItemType) -> Option<&RenderSubCategory> {
        self.state
            .categories
            .iter()
            .find(|c| c.id == section)?
            .sub_categories
            .iter()
            .find(|s| s.id == sub_category)
    }

    pub fn item(&self, section: SectionType, sub_category: RenderItemType, item_id: &str) -> Option<&RenderItem> {
        self.bucket(section, sub_category)?
            .items
            .iter()
            .find(|i| i.id == item_id)
    }

    /// Append an item; an existing item with the same id is replaced
    pub fn add(&mut self, section: SectionType, sub_category: RenderItemType, item: RenderItem) {
        self.upsert(section, sub_category, item);
    }

    /// Shallow-merge into an existing item. Returns whether it was found.
    pub fn update(
        &mut self,
        section: SectionType,
        sub_category: RenderItemType,
        item_id: &str,
        patch: &RenderItemPatch,
    ) -> bool {
        if self.item(section, sub_category, item_id).is_none() {
            log::debug!("render update: {} not found in {:?}/{:?}", item_id, section, sub_category);
            return false;
        }

        let state = Arc::make_mut(&mut self.state);
        if let Some(item) = bucket_mut(state, section, sub_category)
            .and_then(|bucket| bucket.items.iter_mut().find(|i| i.id == item_id))
        {
            item.apply(patch);
        }
        true
    }

    /// Overwrite the item at that id, or insert it
    pub fn replace(&mut self, section: SectionType, sub_category: RenderItemType, item: RenderItem) {
        self.upsert(section, sub_category, item);
    }

    /// Remove an item. Returns whether it was found.
    pub fn delete(&mut self, section: SectionType, sub_category: RenderItemType, item_id: &str) -> bool {
        if self.item(section, sub_category, item_id).is_none() {
            log::debug!("render delete: {} not found in {:?}/{:?}", item_id, section, sub_category);
            return false;
        }

        let state = Arc::make_mut(&mut self.state);
        if let Some(bucket) = bucket_mut(state, section, sub_category) {
            bucket.items.retain(|i| i.id != item_id);
        }
        true
    }

    /// Back to the two empty sections, not completed
    pub fn reset(&mut self) {
        self.state = Arc::new(RenderState::default());
    }

    pub fn set_completed(&mut self, completed: bool) {
        Arc::make_mut(&mut self.state).is_completed = completed;
    }

    fn upsert(&mut self, section: SectionType, sub_category: RenderItemType, mut item: RenderItem) {
        if item.item_type != sub_category {
            log::warn!(
                "render item {} typed {:?} stored in {:?} bucket",
                item.id,
                item.item_type,
                sub_category
            );
            item.item_type = sub_category;
        }
        item.refresh_derived();

        let state = Arc::make_mut(&mut self.state);
        let bucket = ensure_bucket(state, section, sub_category);
        let id = item.id();
        match bucket.items.iter_mut().find(|i| i.id() == id) {
            Some(existing) => *existing = item,
            None => bucket.items.push(item),
        }
    }
}

fn bucket_mut(
    state: &mut RenderState,
    section: SectionType,
    sub_category: RenderItemType,
) -> Option<&mut RenderSubCategory> {
    state
        .categories
        .iter_mut()
        .find(|c| c.id == section)?
        .sub_categories
        .iter_mut()
        .find(|s| s.id == sub_category)
}

/// Bucket lookup that recreates a section or bucket missing from old data
fn ensure_bucket(
    state: &mut RenderState,
    section: SectionType,
    sub_category: RenderItemType,
) -> &mut RenderSubCategory {
    let section_index = match state.categories.iter().position(|c| c.id == section) {
        Some(index) => index,
        None => {
            state.categories.push(RenderMainCategory {
                id: section,
                name: section.label().to_string(),
                sub_categories: Vec::new(),
            });
            state.categories.len() - 1
        }
    };

    let subs = &mut state.categories[section_index].sub_categories;
    let sub_index = match subs.iter().position(|s| s.id == sub_category) {
        Some(index) => index,
        None => {
            subs.push(RenderSubCategory::empty(sub_category));
            subs.len() - 1
        }
    };
    &mut subs[sub_index]
}

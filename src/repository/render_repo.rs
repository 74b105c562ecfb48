//! Render Store Repository
//!
//! The render store persists as `{ categories, isCompleted }` under
//! `render-store`. Version 0 predates the section/bucket layout and carries
//! nothing worth keeping, so it loads as the empty default.

use crate::domain::{DomainError, DomainResult, RenderState};
use crate::render::RenderStore;
use super::state_repo::JsonStateRepository;
use super::traits::{StateRepository, VersionedState};

pub const RENDER_STORE_KEY: &str = "render-store";

impl VersionedState for RenderState {
    const KEY: &'static str = RENDER_STORE_KEY;
    const VERSION: i64 = 1;

    fn migrate(from_version: i64, _payload: serde_json::Value) -> DomainResult<Self> {
        match from_version {
            0 => {
                log::warn!("Discarding render store v0 payload, a raw copy was backed up");
                Ok(RenderState::default())
            }
            other => Err(DomainError::Conflict(format!(
                "No migration from render store version {}",
                other
            ))),
        }
    }
}

pub type RenderStateRepository = JsonStateRepository<RenderState>;

impl RenderStateRepository {
    pub async fn load_store(&self) -> DomainResult<RenderStore> {
        Ok(RenderStore::from_state(self.load().await?))
    }

    pub async fn save_store(&self, store: &RenderStore) -> DomainResult<()> {
        self.save(store.state()).await
    }
}

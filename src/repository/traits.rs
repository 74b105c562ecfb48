//! Repository Layer - Core Traits
//!
//! Abstract interfaces for persisted state. Implementations can use SQLite,
//! in-memory maps, etc.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::DomainResult;

/// A whole-state document stored under a fixed key with a schema version
pub trait VersionedState: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Storage key
    const KEY: &'static str;
    /// Current schema version
    const VERSION: i64;

    /// Turn a payload written by an older schema into the current one
    fn migrate(from_version: i64, payload: serde_json::Value) -> DomainResult<Self>;
}

/// Load/save of a single persisted document
///
/// All operations are async to support various backends.
#[async_trait]
pub trait StateRepository<T>: Send + Sync {
    /// Load the state, migrating it when needed; default when nothing is stored
    async fn load(&self) -> DomainResult<T>;

    /// Replace the stored state
    async fn save(&self, state: &T) -> DomainResult<()>;

    /// Forget the stored state
    async fn clear(&self) -> DomainResult<()>;
}

//! Quote Repository
//!
//! Persists the settings and the nested budget document together.

use serde::{Deserialize, Serialize};

use crate::budget::{BudgetDocument, BudgetTree, CategoryDoc};
use crate::domain::{DomainError, DomainResult, QuoteSettings};
use super::state_repo::JsonStateRepository;
use super::traits::{StateRepository, VersionedState};

pub const QUOTE_KEY: &str = "quote";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuote {
    #[serde(default)]
    pub settings: QuoteSettings,
    #[serde(default)]
    pub categories: Vec<CategoryDoc>,
}

impl SavedQuote {
    pub fn new(settings: &QuoteSettings, tree: &BudgetTree) -> Self {
        Self {
            settings: settings.clone(),
            categories: tree.to_document().categories,
        }
    }

    pub fn tree(&self) -> DomainResult<BudgetTree> {
        BudgetTree::from_document(&BudgetDocument {
            categories: self.categories.clone(),
        })
    }
}

impl VersionedState for SavedQuote {
    const KEY: &'static str = QUOTE_KEY;
    const VERSION: i64 = 1;

    fn migrate(from_version: i64, _payload: serde_json::Value) -> DomainResult<Self> {
        Err(DomainError::Conflict(format!(
            "No migration from quote version {}",
            from_version
        )))
    }
}

pub type QuoteRepository = JsonStateRepository<SavedQuote>;

impl QuoteRepository {
    /// Settings and tree as last saved
    pub async fn load_quote(&self) -> DomainResult<(QuoteSettings, BudgetTree)> {
        let saved = self.load().await?;
        let tree = saved.tree()?;
        Ok((saved.settings, tree))
    }

    pub async fn save_quote(&self, settings: &QuoteSettings, tree: &BudgetTree) -> DomainResult<()> {
        self.save(&SavedQuote::new(settings, tree)).await
    }
}

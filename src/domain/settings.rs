//! Quote Settings
//!
//! Configuration read by the aggregation engine and the lifecycle operations.
//! Always passed explicitly; nothing in the crate keeps a global copy.

use std::path::Path;

use serde::{Deserialize, Serialize};
use super::entity::{DomainError, DomainResult};

/// A payroll charge applied on top of a base cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialChargeRate {
    pub id: String,
    pub label: String,
    /// Fraction, e.g. 0.65 for 65%
    pub rate: f64,
    /// Overrides used on the charge amount instead of the line's rates
    #[serde(default)]
    pub agency_percent: Option<f64>,
    #[serde(default)]
    pub margin_percent: Option<f64>,
}

impl SocialChargeRate {
    pub fn new(id: &str, label: &str, rate: f64) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            rate,
            agency_percent: None,
            margin_percent: None,
        }
    }
}

/// Where social charges show up in the totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SocialChargesDisplay {
    /// Inline in each category subtotal
    #[default]
    Detailed,
    /// Pulled out into a single social charges group
    Grouped,
}

/// Display names of the agency and margin rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLabels {
    pub agency: String,
    pub margin: String,
}

impl Default for RateLabels {
    fn default() -> Self {
        Self {
            agency: "Frais d'agence".to_string(),
            margin: "Marge".to_string(),
        }
    }
}

/// Currency with its rate against the quote's base currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    /// Units of this currency for one unit of the base currency
    pub rate: f64,
}

impl Currency {
    pub fn new(code: &str, symbol: &str, rate: f64) -> Self {
        Self {
            code: code.to_string(),
            symbol: symbol.to_string(),
            rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteSettings {
    pub social_charge_rates: Vec<SocialChargeRate>,
    pub available_units: Vec<String>,
    pub default_agency_percent: f64,
    pub default_margin_percent: f64,
    pub show_empty_items: bool,
    pub social_charges_display: SocialChargesDisplay,
    /// Apply agency and margin on base + charges instead of base only
    pub apply_social_charges_margins: bool,
    pub rate_labels: RateLabels,
    pub currencies: Vec<Currency>,
    pub selected_currency: String,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            social_charge_rates: vec![
                SocialChargeRate::new("intermittent", "Intermittents", 0.65),
                SocialChargeRate::new("permanent", "Permanents", 0.45),
                SocialChargeRate::new("artist", "Artistes", 0.55),
            ],
            available_units: ["Jour", "Semaine", "Heure", "Forfait", "%", "-"]
                .iter()
                .map(|u| u.to_string())
                .collect(),
            default_agency_percent: 0.0,
            default_margin_percent: 0.0,
            show_empty_items: true,
            social_charges_display: SocialChargesDisplay::Detailed,
            apply_social_charges_margins: false,
            rate_labels: RateLabels::default(),
            currencies: vec![
                Currency::new("EUR", "€", 1.0),
                Currency::new("USD", "$", 1.08),
                Currency::new("GBP", "£", 0.86),
            ],
            selected_currency: "EUR".to_string(),
        }
    }
}

impl QuoteSettings {
    /// Resolve a social charge reference; stale ids resolve to nothing
    pub fn find_rate(&self, id: &str) -> Option<&SocialChargeRate> {
        self.social_charge_rates.iter().find(|r| r.id == id)
    }

    pub fn selected_currency(&self) -> Option<&Currency> {
        self.currencies.iter().find(|c| c.code == self.selected_currency)
    }

    /// Read settings from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DomainError::NotFound(format!("{}: {}", path.display(), e)))?;
        let settings = serde_json::from_str(&content)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> DomainResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

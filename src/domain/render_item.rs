//! Render Entities
//!
//! Actual spend recorded during the render phase, grouped by section
//! (production / post-production) and bucket (salaries / suppliers /
//! expenses). Unrelated to the budget lines.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::budget_line::present;
use super::entity::{DomainError, DomainResult, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Production,
    Postproduction,
}

impl SectionType {
    pub const ALL: [SectionType; 2] = [SectionType::Production, SectionType::Postproduction];

    pub fn label(&self) -> &'static str {
        match self {
            SectionType::Production => "Production",
            SectionType::Postproduction => "Post-production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderItemType {
    Salaries,
    Suppliers,
    Expenses,
}

impl RenderItemType {
    pub const ALL: [RenderItemType; 3] = [
        RenderItemType::Salaries,
        RenderItemType::Suppliers,
        RenderItemType::Expenses,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RenderItemType::Salaries => "Salaires",
            RenderItemType::Suppliers => "Fournisseurs",
            RenderItemType::Expenses => "Frais",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    NotReceived,
    Received,
    ToPay,
    Paid,
}

/// Uploaded file kept alongside an item, base64 encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    /// blake3 of the raw bytes
    pub content_hash: String,
    pub data: String,
}

impl Attachment {
    pub fn from_bytes(file_name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            content_hash: blake3::hash(bytes).to_hex().to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> DomainResult<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| DomainError::InvalidInput(format!("attachment {}: {}", self.file_name, e)))
    }
}

/// One recorded expense line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: RenderItemType,
    #[serde(default)]
    pub name: String,

    // Salaries
    #[serde(default)]
    pub gross_salary: Option<f64>,
    #[serde(default)]
    pub social_charges_percent: Option<f64>,
    #[serde(default)]
    pub work_days: Vec<String>,
    /// gross_salary / work_days, kept in sync by the store
    #[serde(default)]
    pub daily_rate: Option<f64>,

    // Suppliers and expenses
    #[serde(default, rename = "amountHT")]
    pub amount_ht: Option<f64>,
    #[serde(default, rename = "amountTTC")]
    pub amount_ttc: Option<f64>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,

    #[serde(default)]
    pub invoice_status: InvoiceStatus,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl RenderItem {
    pub fn new(id: String, item_type: RenderItemType, name: &str) -> Self {
        Self {
            id,
            item_type,
            name: name.to_string(),
            gross_salary: None,
            social_charges_percent: None,
            work_days: Vec::new(),
            daily_rate: None,
            amount_ht: None,
            amount_ttc: None,
            iban: None,
            company_name: None,
            invoice_number: None,
            invoice_date: None,
            invoice_status: InvoiceStatus::NotReceived,
            attachment: None,
        }
    }

    /// Salary line with its charge percentage
    pub fn salary(id: String, name: &str, gross_salary: f64, social_charges_percent: f64) -> Self {
        let mut item = Self::new(id, RenderItemType::Salaries, name);
        item.gross_salary = Some(gross_salary);
        item.social_charges_percent = Some(social_charges_percent);
        item
    }

    /// Supplier or expense line
    pub fn invoice(id: String, item_type: RenderItemType, name: &str, amount_ht: f64, amount_ttc: f64) -> Self {
        let mut item = Self::new(id, item_type, name);
        item.amount_ht = Some(amount_ht);
        item.amount_ttc = Some(amount_ttc);
        item
    }

    /// Recompute `daily_rate` from the salary and the worked days
    pub fn refresh_derived(&mut self) {
        self.daily_rate = match (self.item_type, self.gross_salary) {
            (RenderItemType::Salaries, Some(gross)) if !self.work_days.is_empty() => {
                Some(gross / self.work_days.len() as f64)
            }
            _ => None,
        };
    }

    pub fn apply(&mut self, patch: &RenderItemPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(gross) = patch.gross_salary {
            self.gross_salary = Some(gross);
        }
        if let Some(pct) = patch.social_charges_percent {
            self.social_charges_percent = Some(pct);
        }
        if let Some(days) = &patch.work_days {
            self.work_days = days.clone();
        }
        if let Some(ht) = patch.amount_ht {
            self.amount_ht = Some(ht);
        }
        if let Some(ttc) = patch.amount_ttc {
            self.amount_ttc = Some(ttc);
        }
        if let Some(iban) = &patch.iban {
            self.iban = iban.clone();
        }
        if let Some(company) = &patch.company_name {
            self.company_name = Some(company.clone());
        }
        if let Some(number) = &patch.invoice_number {
            self.invoice_number = Some(number.clone());
        }
        if let Some(date) = &patch.invoice_date {
            self.invoice_date = Some(date.clone());
        }
        if let Some(status) = patch.invoice_status {
            self.invoice_status = status;
        }
        if let Some(attachment) = &patch.attachment {
            self.attachment = attachment.clone();
        }
        self.refresh_derived();
    }
}

impl Entity for RenderItem {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderItemPatch {
    pub name: Option<String>,
    pub gross_salary: Option<f64>,
    pub social_charges_percent: Option<f64>,
    pub work_days: Option<Vec<String>>,
    #[serde(rename = "amountHT")]
    pub amount_ht: Option<f64>,
    #[serde(rename = "amountTTC")]
    pub amount_ttc: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    pub iban: Option<Option<String>>,
    pub company_name: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub invoice_status: Option<InvoiceStatus>,
    #[serde(default, deserialize_with = "present")]
    pub attachment: Option<Option<Attachment>>,
}

/// Bucket of items of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSubCategory {
    pub id: RenderItemType,
    pub name: String,
    #[serde(default)]
    pub items: Vec<RenderItem>,
}

impl RenderSubCategory {
    pub fn empty(id: RenderItemType) -> Self {
        Self {
            id,
            name: id.label().to_string(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMainCategory {
    pub id: SectionType,
    pub name: String,
    pub sub_categories: Vec<RenderSubCategory>,
}

impl RenderMainCategory {
    /// Section with the three empty buckets
    pub fn empty(id: SectionType) -> Self {
        Self {
            id,
            name: id.label().to_string(),
            sub_categories: RenderItemType::ALL.iter().map(|t| RenderSubCategory::empty(*t)).collect(),
        }
    }
}

/// Persisted render state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    pub categories: Vec<RenderMainCategory>,
    #[serde(default)]
    pub is_completed: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            categories: SectionType::ALL.iter().map(|s| RenderMainCategory::empty(*s)).collect(),
            is_completed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_shape() {
        let state = RenderState::default();
        assert_eq!(state.categories.len(), 2);
        assert_eq!(state.categories[1].id, SectionType::Postproduction);
        for section in &state.categories {
            let ids: Vec<_> = section.sub_categories.iter().map(|s| s.id).collect();
            assert_eq!(ids, RenderItemType::ALL.to_vec());
            assert!(section.sub_categories.iter().all(|s| s.items.is_empty()));
        }
        assert!(!state.is_completed);
    }

    #[test]
    fn test_daily_rate() {
        let mut item = RenderItem::salary("s1".to_string(), "Chef op", 3000.0, 65.0);
        item.refresh_derived();
        assert_eq!(item.daily_rate, None);

        item.apply(&RenderItemPatch {
            work_days: Some(vec!["2024-03-01".into(), "2024-03-02".into(), "2024-03-03".into()]),
            ..Default::default()
        });
        assert_eq!(item.daily_rate, Some(1000.0));
    }

    #[test]
    fn test_attachment_round_trip() {
        let attachment = Attachment::from_bytes("facture.pdf", "application/pdf", b"%PDF-1.4");
        assert_eq!(attachment.size, 8);
        assert_eq!(attachment.content_hash.len(), 64);
        assert_eq!(attachment.decode().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_serde_names() {
        let item = RenderItem::invoice("f1".to_string(), RenderItemType::Suppliers, "Loueur", 100.0, 120.0);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "suppliers");
        assert_eq!(json["amountHT"], 100.0);
        assert_eq!(json["invoiceStatus"], "not_received");
    }
}

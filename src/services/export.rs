//! Quote export
//!
//! Builds the summary of a quote (settings, totals, notes and terms) and
//! hands it to a renderer that produces the exported file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::budget::{compute_totals, BudgetTree, BudgetTotals};
use crate::domain::{DomainResult, QuoteSettings, SocialChargesDisplay, SOCIAL_CHARGES_CATEGORY_ID};
use super::currency::display_amount;

/// Stem of the exported file; the renderer adds the extension
pub const EXPORT_FILE_NAME: &str = "devis";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    pub label: String,
    pub amount: f64,
}

/// Everything an exported quote shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDocument {
    pub title: String,
    pub currency: String,
    pub agency_label: String,
    pub margin_label: String,
    pub categories: Vec<SummaryLine>,
    /// One line per rate in detailed mode, a single line in grouped mode
    pub social_charges: Vec<SummaryLine>,
    pub base_cost: f64,
    pub social_charges_total: f64,
    pub agency: f64,
    pub margin: f64,
    pub grand_total: f64,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(skip)]
    settings: QuoteSettings,
}

impl QuoteDocument {
    pub fn build(
        title: &str,
        tree: &BudgetTree,
        settings: &QuoteSettings,
        notes: Option<&str>,
        terms: Option<&str>,
    ) -> Self {
        let totals = compute_totals(tree, settings);
        Self::from_totals(title, &totals, settings, notes, terms)
    }

    pub fn from_totals(
        title: &str,
        totals: &BudgetTotals,
        settings: &QuoteSettings,
        notes: Option<&str>,
        terms: Option<&str>,
    ) -> Self {
        // Grouped charges are listed with the other charges, not on the sentinel row
        let categories = totals
            .categories
            .iter()
            .map(|c| {
                let amount = if c.category_id == SOCIAL_CHARGES_CATEGORY_ID {
                    c.subtotal - totals.social_charges_group_total
                } else {
                    c.subtotal
                };
                (c, amount)
            })
            .filter(|(c, amount)| c.category_id != SOCIAL_CHARGES_CATEGORY_ID || *amount != 0.0)
            .map(|(c, amount)| SummaryLine {
                label: c.name.clone(),
                amount,
            })
            .collect();

        let social_charges = match settings.social_charges_display {
            SocialChargesDisplay::Detailed => totals
                .social_charges_by_rate
                .iter()
                .filter(|group| group.amount != 0.0)
                .map(|group| SummaryLine {
                    label: format!("{} ({:.0}%)", group.label, group.rate * 100.0),
                    amount: group.amount,
                })
                .collect(),
            SocialChargesDisplay::Grouped => vec![SummaryLine {
                label: "Charges sociales".to_string(),
                amount: totals.amounts.social_charges,
            }],
        };

        Self {
            title: title.to_string(),
            currency: settings.selected_currency.clone(),
            agency_label: settings.rate_labels.agency.clone(),
            margin_label: settings.rate_labels.margin.clone(),
            categories,
            social_charges,
            base_cost: totals.amounts.base,
            social_charges_total: totals.amounts.social_charges,
            agency: totals.amounts.agency,
            margin: totals.amounts.margin,
            grand_total: totals.grand_total,
            notes: notes.map(strip_html).filter(|n| !n.is_empty()),
            terms: terms.map(strip_html).filter(|t| !t.is_empty()),
            settings: settings.clone(),
        }
    }

    /// Amount formatted in the selected currency
    pub fn amount(&self, value: f64) -> String {
        display_amount(&self.settings, value)
    }
}

fn html_patterns() -> &'static (Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>").expect("static regex"),
            Regex::new(r"<[^>]*>").expect("static regex"),
            Regex::new(r"\n{3,}").expect("static regex"),
        )
    })
}

/// Rich text from the editor as plain text
pub fn strip_html(html: &str) -> String {
    let (breaks, tags, blank_runs) = html_patterns();
    let text = breaks.replace_all(html, "\n");
    let text = tags.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    blank_runs.replace_all(lines.join("\n").trim(), "\n\n").into_owned()
}

/// Turns a summary into file contents
pub trait DocumentRenderer {
    fn extension(&self) -> &'static str;

    fn render(&self, document: &QuoteDocument) -> DomainResult<Vec<u8>>;
}

/// Fixed-width text layout
pub struct PlainTextRenderer {
    pub width: usize,
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self { width: 60 }
    }
}

impl PlainTextRenderer {
    fn row(&self, out: &mut String, label: &str, amount: &str) {
        let pad = self
            .width
            .saturating_sub(label.chars().count() + amount.chars().count())
            .max(1);
        out.push_str(label);
        out.push_str(&" ".repeat(pad));
        out.push_str(amount);
        out.push('\n');
    }

    fn rule(&self, out: &mut String) {
        out.push_str(&"-".repeat(self.width));
        out.push('\n');
    }
}

impl DocumentRenderer for PlainTextRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, document: &QuoteDocument) -> DomainResult<Vec<u8>> {
        let mut out = String::new();
        out.push_str(&document.title);
        out.push('\n');
        self.rule(&mut out);

        for line in &document.categories {
            self.row(&mut out, &line.label, &document.amount(line.amount));
        }
        self.rule(&mut out);

        self.row(&mut out, "Total HT", &document.amount(document.base_cost));
        for line in &document.social_charges {
            self.row(&mut out, &line.label, &document.amount(line.amount));
        }
        self.row(&mut out, &document.agency_label, &document.amount(document.agency));
        self.row(&mut out, &document.margin_label, &document.amount(document.margin));
        self.rule(&mut out);
        self.row(&mut out, "Total", &document.amount(document.grand_total));

        if let Some(notes) = &document.notes {
            out.push_str("\nNotes\n");
            out.push_str(notes);
            out.push('\n');
        }
        if let Some(terms) = &document.terms {
            out.push_str("\nConditions\n");
            out.push_str(terms);
            out.push('\n');
        }

        Ok(out.into_bytes())
    }
}

/// Render `document` into `dir`, returning the written path
pub fn export_quote(
    document: &QuoteDocument,
    renderer: &dyn DocumentRenderer,
    dir: &Path,
) -> DomainResult<PathBuf> {
    let bytes = renderer.render(document)?;
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!("{}.{}", EXPORT_FILE_NAME, renderer.extension()));
    std::fs::write(&path, bytes)?;
    log::info!("Exported quote to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{add_item_to_categories, create_budget_item, CreateContext};
    use crate::domain::LineType;

    fn sample() -> (BudgetTree, QuoteSettings) {
        let mut settings = QuoteSettings::default();
        settings.default_agency_percent = 10.0;
        settings.default_margin_percent = 15.0;

        let mut category = create_budget_item(LineType::Category, None, &settings, CreateContext::Work);
        category.name = "Technique".to_string();
        let category_id = category.id.clone();
        let tree = add_item_to_categories(&BudgetTree::with_social_charges(), "", None, category);

        let mut post = create_budget_item(LineType::Post, None, &settings, CreateContext::Work);
        post.quantity = 2.0;
        post.rate = 500.0;
        post.social_charges = Some("intermittent".to_string());
        let tree = add_item_to_categories(&tree, &category_id, None, post);
        (tree, settings)
    }

    #[test]
    fn test_strip_html() {
        let html = "<p>Paiement à <b>30 jours</b></p><p>TVA&nbsp;20&nbsp;%</p><br/><br/><br/>Merci &amp; à bientôt";
        assert_eq!(strip_html(html), "Paiement à 30 jours\nTVA 20 %\n\nMerci & à bientôt");
        assert_eq!(strip_html("<p></p>"), "");
    }

    #[test]
    fn test_document_carries_totals() {
        let (tree, settings) = sample();
        let document = QuoteDocument::build("Tournage", &tree, &settings, Some("<p>Notes</p>"), Some("<p></p>"));

        assert_eq!(document.base_cost, 1000.0);
        assert_eq!(document.social_charges_total, 650.0);
        assert_eq!(document.agency, 100.0);
        assert_eq!(document.margin, 150.0);
        assert_eq!(document.grand_total, 1900.0);
        assert_eq!(document.social_charges.len(), 1);
        assert_eq!(document.categories.len(), 1);
        assert_eq!(document.notes.as_deref(), Some("Notes"));
        assert_eq!(document.terms, None);
    }

    #[test]
    fn test_grouped_mode_single_charge_line() {
        let (tree, mut settings) = sample();
        settings.social_charges_display = SocialChargesDisplay::Grouped;
        let document = QuoteDocument::build("Tournage", &tree, &settings, None, None);
        assert_eq!(document.social_charges.len(), 1);
        assert_eq!(document.social_charges[0].amount, 650.0);
        assert_eq!(document.categories.len(), 1);
        assert_eq!(document.categories[0].amount, 1250.0);
        assert_eq!(document.grand_total, 1900.0);
    }

    #[test]
    fn test_export_writes_fixed_file_name() {
        let (tree, settings) = sample();
        let document = QuoteDocument::build("Tournage", &tree, &settings, None, Some("Acompte 30%"));
        let dir = tempfile::tempdir().unwrap();

        let path = export_quote(&document, &PlainTextRenderer::default(), dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "devis.txt");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Tournage\n"));
        assert!(text.contains("1 900.00 €"));
        assert!(text.contains("Acompte 30%"));
    }
}

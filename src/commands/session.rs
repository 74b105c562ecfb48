//! Quote Session
//!
//! Command surface for a UI: holds the current budget tree, settings and
//! render store, routes every edit through the pure operations, and saves
//! through the repositories.

use std::path::{Path, PathBuf};

use crate::budget::{
    self, compute_totals, create_budget_item, BudgetTotals, BudgetTree, CreateContext,
};
use crate::domain::{
    BudgetLinePatch, CategoryPatch, DomainError, DomainResult, LineType, QuoteSettings, RenderItem,
    RenderItemPatch, RenderItemType, SectionType,
};
use crate::render::{compute_render_totals, compute_variance, RenderStore, RenderTotals, Variance};
use crate::repository::{DbState, QuoteRepository, RenderStateRepository};
use crate::services::{
    export_quote, extract_invoice, DocumentRenderer, ExtractedInvoice, InvoiceExtractor,
    QuoteDocument, UploadedFile,
};

pub struct QuoteSession {
    tree: BudgetTree,
    settings: QuoteSettings,
    render: RenderStore,
    quote_repo: QuoteRepository,
    render_repo: RenderStateRepository,
}

impl QuoteSession {
    /// Load the saved quote and render store
    pub async fn open(db: &DbState) -> DomainResult<Self> {
        let quote_repo = QuoteRepository::new(db.connection());
        let render_repo = RenderStateRepository::new(db.connection());

        let (settings, tree) = quote_repo.load_quote().await?;
        let render = render_repo.load_store().await?;
        log::info!(
            "Opened quote: {} categories, {} lines",
            tree.category_count(),
            tree.line_count()
        );

        Ok(Self {
            tree,
            settings,
            render,
            quote_repo,
            render_repo,
        })
    }

    pub async fn save(&self) -> DomainResult<()> {
        self.quote_repo.save_quote(&self.settings, &self.tree).await?;
        self.render_repo.save_store(&self.render).await?;
        log::debug!("Saved quote at tree version {}", self.tree.version());
        Ok(())
    }

    /// Persist the render store alone, leaving the saved quote and settings as they are
    pub async fn save_render(&self) -> DomainResult<()> {
        self.render_repo.save_store(&self.render).await
    }

    pub fn tree(&self) -> &BudgetTree {
        &self.tree
    }

    pub fn settings(&self) -> &QuoteSettings {
        &self.settings
    }

    pub fn render(&self) -> &RenderStore {
        &self.render
    }

    pub fn totals(&self) -> BudgetTotals {
        compute_totals(&self.tree, &self.settings)
    }

    pub fn render_totals(&self) -> RenderTotals {
        compute_render_totals(self.render.state())
    }

    pub fn variance(&self) -> Variance {
        compute_variance(&self.render_totals(), &self.totals())
    }

    // ========================
    // Budget tree
    // ========================

    /// New category, inserted before the social charges category
    pub fn add_category(&mut self, name: &str) -> String {
        let mut item = create_budget_item(LineType::Category, None, &self.settings, CreateContext::Work);
        item.name = name.to_string();
        let id = item.id.clone();
        self.tree = budget::add_item_to_categories(&self.tree, "", None, item);
        id
    }

    /// New line in the budget context, inheriting from its previous sibling.
    ///
    /// Fails when the category or parent does not exist, so the caller
    /// never receives an id that is not in the tree.
    pub fn add_item(
        &mut self,
        line_type: LineType,
        category_id: &str,
        parent_id: Option<&str>,
    ) -> DomainResult<String> {
        if line_type == LineType::Category {
            return Err(DomainError::InvalidInput("use add_category for categories".to_string()));
        }
        if self.tree.category(category_id).is_none() {
            return Err(DomainError::NotFound(format!("category {}", category_id)));
        }
        if let Some(pid) = parent_id {
            if self.tree.find_in_category(category_id, pid).is_none() {
                return Err(DomainError::NotFound(format!("line {} in {}", pid, category_id)));
            }
        }

        let item = create_budget_item(
            line_type,
            parent_id,
            &self.settings,
            CreateContext::Budget {
                tree: &self.tree,
                category_id,
            },
        );
        let id = item.id.clone();
        self.tree = budget::add_item_to_categories(&self.tree, category_id, parent_id, item);
        Ok(id)
    }

    pub fn update_item(&mut self, category_id: &str, item_id: &str, patch: &BudgetLinePatch) {
        self.tree = budget::update_item(&self.tree, category_id, item_id, patch);
    }

    pub fn update_category(&mut self, category_id: &str, patch: &CategoryPatch) {
        self.tree = budget::update_category(&self.tree, category_id, patch);
    }

    pub fn delete_item(&mut self, category_id: &str, item_id: &str) {
        self.tree = budget::delete_item(&self.tree, category_id, item_id);
    }

    pub fn move_item(
        &mut self,
        item_id: &str,
        target_category_id: &str,
        target_parent_id: Option<&str>,
        position: usize,
    ) {
        self.tree = budget::move_item(&self.tree, item_id, target_category_id, target_parent_id, position);
    }

    pub fn toggle_expanded(&mut self, id: &str) {
        self.tree = budget::toggle_expanded(&self.tree, id);
    }

    /// Replace the settings; `apply_rates` pushes the default rates to every line
    pub fn update_settings(&mut self, settings: QuoteSettings, apply_rates: bool) {
        self.settings = settings;
        if apply_rates {
            self.tree = budget::update_all_rates(&self.tree, &self.settings);
        }
    }

    pub fn reset_item_rates(&mut self, category_id: &str, item_id: &str) {
        self.tree = budget::update_item_rates(&self.tree, category_id, item_id, &self.settings);
    }

    // ========================
    // Render store
    // ========================

    pub fn add_render_item(&mut self, section: SectionType, sub_category: RenderItemType, item: RenderItem) {
        self.render.add(section, sub_category, item);
    }

    pub fn update_render_item(
        &mut self,
        section: SectionType,
        sub_category: RenderItemType,
        item_id: &str,
        patch: &RenderItemPatch,
    ) {
        self.render.update(section, sub_category, item_id, patch);
    }

    pub fn replace_render_item(&mut self, section: SectionType, sub_category: RenderItemType, item: RenderItem) {
        self.render.replace(section, sub_category, item);
    }

    pub fn delete_render_item(&mut self, section: SectionType, sub_category: RenderItemType, item_id: &str) {
        self.render.delete(section, sub_category, item_id);
    }

    pub fn set_render_completed(&mut self, completed: bool) {
        self.render.set_completed(completed);
    }

    pub fn reset_render(&mut self) {
        self.render.reset();
    }

    /// Read an invoice and fill the matching render item with what was found.
    ///
    /// The store is only touched once extraction succeeded.
    pub async fn attach_invoice(
        &mut self,
        extractor: &dyn InvoiceExtractor,
        section: SectionType,
        sub_category: RenderItemType,
        item_id: &str,
        file: &UploadedFile,
    ) -> DomainResult<ExtractedInvoice> {
        if self.render.item(section, sub_category, item_id).is_none() {
            return Err(DomainError::NotFound(format!("render item {}", item_id)));
        }

        let invoice = extract_invoice(extractor, file).await?;
        let mut patch = invoice.to_patch();
        patch.attachment = Some(Some(file.to_attachment()));
        self.render.update(section, sub_category, item_id, &patch);
        Ok(invoice)
    }

    // ========================
    // Export
    // ========================

    pub fn export(
        &self,
        title: &str,
        notes: Option<&str>,
        terms: Option<&str>,
        renderer: &dyn DocumentRenderer,
        dir: &Path,
    ) -> DomainResult<PathBuf> {
        let document = QuoteDocument::build(title, &self.tree, &self.settings, notes, terms);
        export_quote(&document, renderer, dir)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::InvoiceStatus;
    use crate::repository::init_db;
    use crate::services::PlainTextRenderer;

    struct StubExtractor {
        fail: bool,
    }

    #[async_trait]
    impl InvoiceExtractor for StubExtractor {
        async fn extract(&self, _file: &UploadedFile) -> DomainResult<ExtractedInvoice> {
            if self.fail {
                return Err(DomainError::External("timeout".to_string()));
            }
            Ok(ExtractedInvoice {
                company_name: Some("Loueur SA".to_string()),
                amount_ht: Some(1000.0),
                amount_ttc: Some(1200.0),
                invoice_date: None,
                invoice_number: Some("F-12".to_string()),
            })
        }
    }

    async fn open_session() -> (DbState, QuoteSession) {
        let db = init_db(&PathBuf::from(":memory:")).expect("Failed to init test DB");
        let session = QuoteSession::open(&db).await.expect("Failed to open session");
        (db, session)
    }

    fn build_scenario(session: &mut QuoteSession) -> (String, String) {
        let c1 = session.add_category("C1");
        session.update_category(
            &c1,
            &CategoryPatch {
                agency_percent: Some(Some(10.0)),
                margin_percent: Some(Some(15.0)),
                ..Default::default()
            },
        );
        let p1 = session.add_item(LineType::Post, &c1, None).unwrap();
        session.update_item(
            &c1,
            &p1,
            &BudgetLinePatch {
                quantity: Some(2.0),
                number: Some(1.0),
                rate: Some(500.0),
                social_charges: Some(Some("intermittent".to_string())),
                ..Default::default()
            },
        );
        (c1, p1)
    }

    #[tokio::test]
    async fn test_scenario_totals_and_variance() {
        let (_db, mut session) = open_session().await;
        build_scenario(&mut session);
        assert_eq!(session.totals().grand_total, 1900.0);

        session.add_render_item(
            SectionType::Production,
            RenderItemType::Suppliers,
            RenderItem::invoice("f1".to_string(), RenderItemType::Suppliers, "Loueur", 1000.0, 1200.0),
        );
        // 1000 + agency 100 + margin 150 - 1900
        let variance = session.variance();
        assert_eq!(variance.difference, -650.0);
        assert!(!variance.is_positive);
    }

    #[tokio::test]
    async fn test_add_item_rejects_unknown_targets() {
        let (_db, mut session) = open_session().await;
        let err = session.add_item(LineType::Post, "missing", None).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let c1 = session.add_category("C1");
        let err = session.add_item(LineType::SubPost, &c1, Some("nope")).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(session.tree().line_count(), 0);
    }

    #[tokio::test]
    async fn test_save_and_reopen() {
        let (db, mut session) = open_session().await;
        let (_c1, p1) = build_scenario(&mut session);
        session.add_render_item(
            SectionType::Postproduction,
            RenderItemType::Salaries,
            RenderItem::salary("s1".to_string(), "Monteur", 3000.0, 65.0),
        );
        session.set_render_completed(true);
        session.save().await.expect("Save failed");

        let reopened = QuoteSession::open(&db).await.expect("Reopen failed");
        assert!(reopened.tree().line(&p1).is_some());
        assert_eq!(reopened.totals().grand_total, 1900.0);
        assert_eq!(reopened.render_totals().total_ht(), 4950.0);
        assert!(reopened.render().is_completed());
    }

    #[tokio::test]
    async fn test_save_render_keeps_saved_settings() {
        let (db, mut session) = open_session().await;
        session.set_render_completed(true);
        session.save().await.expect("Save failed");

        let mut one_off = session.settings().clone();
        one_off.default_agency_percent = 42.0;
        session.update_settings(one_off, false);
        session.reset_render();
        session.save_render().await.expect("Save failed");

        let reopened = QuoteSession::open(&db).await.expect("Reopen failed");
        assert_eq!(reopened.settings(), &QuoteSettings::default());
        assert!(!reopened.render().is_completed());
    }

    #[tokio::test]
    async fn test_attach_invoice_fills_item() {
        let (_db, mut session) = open_session().await;
        session.add_render_item(
            SectionType::Production,
            RenderItemType::Suppliers,
            RenderItem::new("f1".to_string(), RenderItemType::Suppliers, ""),
        );
        let file = UploadedFile::new("facture.pdf", None, b"%PDF-1.4".to_vec()).unwrap();

        session
            .attach_invoice(&StubExtractor { fail: false }, SectionType::Production, RenderItemType::Suppliers, "f1", &file)
            .await
            .expect("Extraction failed");

        let item = session.render().item(SectionType::Production, RenderItemType::Suppliers, "f1").unwrap();
        assert_eq!(item.amount_ttc, Some(1200.0));
        assert_eq!(item.company_name.as_deref(), Some("Loueur SA"));
        assert_eq!(item.invoice_status, InvoiceStatus::NotReceived);
        assert_eq!(item.attachment.as_ref().unwrap().file_name, "facture.pdf");
    }

    #[tokio::test]
    async fn test_failed_extraction_leaves_store_untouched() {
        let (_db, mut session) = open_session().await;
        session.add_render_item(
            SectionType::Production,
            RenderItemType::Expenses,
            RenderItem::new("e1".to_string(), RenderItemType::Expenses, "Taxi"),
        );
        let before = session.render().snapshot();
        let file = UploadedFile::new("ticket.jpg", None, vec![0xFF, 0xD8]).unwrap();

        let err = session
            .attach_invoice(&StubExtractor { fail: true }, SectionType::Production, RenderItemType::Expenses, "e1", &file)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(*session.render().snapshot(), *before);
    }

    #[tokio::test]
    async fn test_export_from_session() {
        let (_db, mut session) = open_session().await;
        build_scenario(&mut session);
        let dir = tempfile::tempdir().unwrap();

        let path = session
            .export("Tournage", Some("<p>Merci</p>"), None, &PlainTextRenderer::default(), dir.path())
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("Merci"));
        assert!(text.contains("1 900.00 €"));
    }

    #[tokio::test]
    async fn test_settings_apply_rates() {
        let (_db, mut session) = open_session().await;
        let (c1, p1) = build_scenario(&mut session);

        let mut settings = session.settings().clone();
        settings.default_agency_percent = 0.0;
        settings.default_margin_percent = 0.0;
        session.update_settings(settings, true);

        assert_eq!(session.tree().category(&c1).unwrap().agency_percent, Some(0.0));
        assert_eq!(session.tree().line(&p1).unwrap().margin_percent, Some(0.0));
        assert_eq!(session.totals().grand_total, 1650.0);
    }
}

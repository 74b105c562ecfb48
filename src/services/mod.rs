//! Services Layer
//!
//! Collaborators around the core: currency display, invoice extraction
//! and quote export.

pub mod currency;
pub mod extraction;
pub mod export;

pub use currency::{convert, display_amount, format_amount, round2};
pub use extraction::{
    extract_invoice, normalize_amount, validate_upload, ExtractedInvoice, HttpInvoiceExtractor,
    InvoiceExtractor, UploadedFile, MAX_UPLOAD_BYTES,
};
pub use export::{
    export_quote, strip_html, DocumentRenderer, PlainTextRenderer, QuoteDocument, SummaryLine,
    EXPORT_FILE_NAME,
};

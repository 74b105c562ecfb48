//! Invoice extraction
//!
//! Uploaded invoices (PDF or image) are sent to an external endpoint that
//! returns a best-effort guess of the supplier, amounts, date and number.
//! Files are validated before anything leaves the process, and failures of
//! the endpoint never touch the render store.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Attachment, DomainError, DomainResult, RenderItemPatch};

/// Largest accepted upload, in bytes
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const RETRY_MESSAGE: &str = "Invoice analysis failed, please try again";

/// A file picked by the user, already read into memory
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Validate and wrap raw bytes. Without an explicit MIME type it is
    /// guessed from the file name.
    pub fn new(file_name: &str, mime_type: Option<&str>, bytes: Vec<u8>) -> DomainResult<Self> {
        let mime_type = validate_upload(file_name, mime_type, bytes.len())?;
        Ok(Self {
            file_name: file_name.to_string(),
            mime_type,
            bytes,
        })
    }

    /// Accepts plain base64 or a data URL such as `data:image/png;base64,...`
    pub fn from_base64(file_name: &str, mime_type: Option<&str>, data: &str) -> DomainResult<Self> {
        let (declared, payload) = match data.split_once(',') {
            Some((header, payload)) if header.starts_with("data:") => {
                let declared = header
                    .trim_start_matches("data:")
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty());
                (declared, payload)
            }
            _ => (None, data),
        };

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| DomainError::InvalidInput(format!("Failed to decode base64: {}", e)))?;
        Self::new(file_name, mime_type.or(declared), bytes)
    }

    pub fn to_attachment(&self) -> Attachment {
        Attachment::from_bytes(&self.file_name, &self.mime_type, &self.bytes)
    }
}

/// Check size and type, returning the MIME type to use
pub fn validate_upload(file_name: &str, mime_type: Option<&str>, size: usize) -> DomainResult<String> {
    if size > MAX_UPLOAD_BYTES {
        return Err(DomainError::InvalidInput(format!(
            "{} is {} bytes, the limit is 5 MB",
            file_name, size
        )));
    }

    let mime = match mime_type {
        Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
        _ => mime_guess::from_path(file_name).first_or_octet_stream().to_string(),
    };

    if mime == "application/pdf" || mime.starts_with("image/") {
        Ok(mime)
    } else {
        Err(DomainError::InvalidInput(format!(
            "{}: unsupported file type {} (PDF or image expected)",
            file_name, mime
        )))
    }
}

fn amount_noise() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| Regex::new(r"[^0-9,.\-]").expect("static regex"))
}

/// Parse a localized amount such as `"1 234,56 €"` or `"1.234,56"`.
///
/// Everything but digits, separators and minus is dropped. When both `,`
/// and `.` appear the last one is the decimal separator; a lone comma is
/// a decimal comma.
pub fn normalize_amount(raw: &str) -> Option<f64> {
    let cleaned = amount_noise().replace_all(raw, "");
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned.into_owned(),
    };

    normalized.parse().ok()
}

fn amount_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => normalize_amount(s),
        _ => None,
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// What the endpoint could read from an invoice
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedInvoice {
    pub company_name: Option<String>,
    #[serde(rename = "amountHT")]
    pub amount_ht: Option<f64>,
    #[serde(rename = "amountTTC")]
    pub amount_ttc: Option<f64>,
    pub invoice_date: Option<String>,
    pub invoice_number: Option<String>,
}

impl ExtractedInvoice {
    /// Read the endpoint's JSON, tolerating strings where numbers are expected
    pub fn from_json(value: &Value) -> Self {
        Self {
            company_name: text_field(value.get("companyName")),
            amount_ht: amount_field(value.get("amountHT")),
            amount_ttc: amount_field(value.get("amountTTC")),
            invoice_date: text_field(value.get("invoiceDate")),
            invoice_number: text_field(value.get("invoiceNumber")),
        }
    }

    /// Fields found, as a render item update
    pub fn to_patch(&self) -> RenderItemPatch {
        RenderItemPatch {
            name: self.company_name.clone(),
            company_name: self.company_name.clone(),
            amount_ht: self.amount_ht,
            amount_ttc: self.amount_ttc,
            invoice_date: self.invoice_date.clone(),
            invoice_number: self.invoice_number.clone(),
            ..Default::default()
        }
    }
}

/// External service reading invoices
#[async_trait]
pub trait InvoiceExtractor: Send + Sync {
    async fn extract(&self, file: &UploadedFile) -> DomainResult<ExtractedInvoice>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionRequest<'a> {
    file_name: &'a str,
    mime_type: &'a str,
    data: String,
}

/// Extractor posting the file as base64 JSON to an HTTP endpoint
pub struct HttpInvoiceExtractor {
    client: Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpInvoiceExtractor {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl InvoiceExtractor for HttpInvoiceExtractor {
    async fn extract(&self, file: &UploadedFile) -> DomainResult<ExtractedInvoice> {
        let request = ExtractionRequest {
            file_name: &file.file_name,
            mime_type: &file.mime_type,
            data: STANDARD.encode(&file.bytes),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::External(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DomainError::External(format!("status {}: {}", status, text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DomainError::External(format!("invalid response: {}", e)))?;

        // Some deployments wrap the result in `data`
        let payload = body.get("data").filter(|d| d.is_object()).unwrap_or(&body);
        Ok(ExtractedInvoice::from_json(payload))
    }
}

/// Run an extractor, turning any endpoint failure into a retryable message
pub async fn extract_invoice(
    extractor: &dyn InvoiceExtractor,
    file: &UploadedFile,
) -> DomainResult<ExtractedInvoice> {
    match extractor.extract(file).await {
        Ok(invoice) => {
            log::info!("Extracted invoice data from {}", file.file_name);
            Ok(invoice)
        }
        Err(err) => {
            log::error!("Invoice extraction failed for {}: {}", file.file_name, err);
            Err(DomainError::External(RETRY_MESSAGE.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedExtractor(Option<Value>);

    #[async_trait]
    impl InvoiceExtractor for FixedExtractor {
        async fn extract(&self, _file: &UploadedFile) -> DomainResult<ExtractedInvoice> {
            match &self.0 {
                Some(value) => Ok(ExtractedInvoice::from_json(value)),
                None => Err(DomainError::External("status 502 Bad Gateway".to_string())),
            }
        }
    }

    fn pdf() -> UploadedFile {
        UploadedFile::new("facture.pdf", None, b"%PDF-1.4".to_vec()).unwrap()
    }

    #[test]
    fn test_normalize_localized_amounts() {
        assert_eq!(normalize_amount("1 234,56 €"), Some(1234.56));
        assert_eq!(normalize_amount("1.234,56"), Some(1234.56));
        assert_eq!(normalize_amount("1,234.56"), Some(1234.56));
        assert_eq!(normalize_amount("€ 99"), Some(99.0));
        assert_eq!(normalize_amount("-12,5"), Some(-12.5));
        assert_eq!(normalize_amount("n/a"), None);
    }

    #[test]
    fn test_validate_upload_type_and_size() {
        assert_eq!(validate_upload("scan.PNG", None, 10).unwrap(), "image/png");
        assert_eq!(validate_upload("f.pdf", None, 10).unwrap(), "application/pdf");
        assert_eq!(validate_upload("x.bin", Some("image/jpeg"), 10).unwrap(), "image/jpeg");

        let err = validate_upload("notes.txt", None, 10).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));

        let err = validate_upload("big.pdf", None, MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert!(validate_upload("edge.pdf", None, MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_from_base64_reads_data_url() {
        let data = format!("data:application/pdf;base64,{}", STANDARD.encode(b"%PDF"));
        let file = UploadedFile::from_base64("upload", None, &data).unwrap();
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.bytes, b"%PDF");

        let attachment = file.to_attachment();
        assert_eq!(attachment.size, 4);
        assert_eq!(attachment.decode().unwrap(), b"%PDF");
    }

    #[test]
    fn test_from_json_accepts_strings_and_numbers() {
        let invoice = ExtractedInvoice::from_json(&json!({
            "companyName": " Loueur SA ",
            "amountHT": "1 000,00",
            "amountTTC": 1200,
            "invoiceDate": "2024-03-01",
            "invoiceNumber": 4512
        }));
        assert_eq!(invoice.company_name.as_deref(), Some("Loueur SA"));
        assert_eq!(invoice.amount_ht, Some(1000.0));
        assert_eq!(invoice.amount_ttc, Some(1200.0));
        assert_eq!(invoice.invoice_number.as_deref(), Some("4512"));

        let patch = invoice.to_patch();
        assert_eq!(patch.amount_ht, Some(1000.0));
        assert_eq!(patch.invoice_status, None);
    }

    #[tokio::test]
    async fn test_extract_invoice_success() {
        let extractor = FixedExtractor(Some(json!({"amountHT": "50,5"})));
        let invoice = extract_invoice(&extractor, &pdf()).await.unwrap();
        assert_eq!(invoice.amount_ht, Some(50.5));
        assert_eq!(invoice.company_name, None);
    }

    #[tokio::test]
    async fn test_extract_invoice_failure_is_retryable() {
        let extractor = FixedExtractor(None);
        let err = extract_invoice(&extractor, &pdf()).await.unwrap_err();
        assert_eq!(err, DomainError::External(RETRY_MESSAGE.to_string()));
        assert!(err.is_retryable());
    }
}

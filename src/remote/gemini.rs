//! Gemini-backed invoice OCR.
//!
//! The image goes up as inline base64 together with a prompt carrying the
//! condensed catalog listing, so the model answers with catalog identifiers
//! instead of free text. The model is asked for JSON directly
//! (`response_mime_type`), but fenced output still shows up in practice, so
//! the response text is unfenced before parsing.
//!
//! One attempt per call, no retries: a scan is user-initiated and cheap to
//! redo, a silent retry would double the quota cost.

use crate::config::OcrSettings;
use crate::core::catalog::CatalogItem;
use crate::core::ocr::{self, OcrExtraction, OcrLineItem, ReceiptOcr};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Vision-inference adapter for the Gemini `generateContent` endpoint.
pub struct GeminiOcr {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiOcr {
    /// Builds an adapter from settings, reading `GEMINI_API_KEY` from the
    /// environment.
    ///
    /// # Errors
    /// Fails when the key is unset or the HTTP client cannot be constructed.
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::Config {
            message: "GEMINI_API_KEY environment variable is not set".to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl ReceiptOcr for GeminiOcr {
    async fn extract(
        &self,
        image: &[u8],
        vendor_hint: Option<&str>,
        catalog: &[CatalogItem],
    ) -> Result<OcrExtraction> {
        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = request_body(image, &prompt(vendor_hint, catalog));

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Ocr {
                message: format!("extraction request returned {status}"),
            });
        }

        let payload: Value = response.json().await?;
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| Error::Ocr {
                message: "extraction response contained no text part".to_string(),
            })?;

        let extraction = parse_extraction(text)?;
        debug!(
            items = extraction.items.len(),
            model = %self.model,
            "Invoice extraction completed"
        );
        Ok(extraction)
    }
}

fn prompt(vendor_hint: Option<&str>, catalog: &[CatalogItem]) -> String {
    let mut prompt = String::from(
        "You are reading a photographed supplier invoice for a warehouse \
         intake clerk. Extract the line items and match each one against the \
         product catalog below. Respond with JSON only, in this shape:\n\
         {\"vendor_match\": string or null, \"reference\": string or null, \
         \"issue_date\": \"YYYY-MM-DD\" or null, \"items\": \
         [{\"matched_id\": number or null, \"name_on_receipt\": string, \
         \"quantity\": number or null, \"unit_price\": number or null}]}\n\
         Set matched_id to the catalog ID only when you are confident; \
         otherwise leave it null. Do not invent items.\n",
    );
    if let Some(vendor) = vendor_hint {
        prompt.push_str(&format!("The invoice is expected to be from: {vendor}\n"));
    }
    prompt.push_str("Catalog:\n");
    prompt.push_str(&ocr::catalog_listing(catalog));
    prompt
}

fn request_body(image: &[u8], prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": "image/jpeg",
                        "data": STANDARD.encode(image),
                    }
                }
            ]
        }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "temperature": 0.1,
        }
    })
}

/// Strips a surrounding markdown code fence, if any.
fn extract_json(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = body.rfind("```") {
            body = &body[..end];
        }
        body = body.trim();
    }
    body
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireExtraction {
    vendor_match: Option<String>,
    reference: Option<String>,
    issue_date: Option<String>,
    items: Vec<WireItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireItem {
    matched_id: Option<i64>,
    name_on_receipt: String,
    quantity: Option<f64>,
    unit_price: Option<f64>,
}

fn parse_extraction(text: &str) -> Result<OcrExtraction> {
    let wire: WireExtraction =
        serde_json::from_str(extract_json(text)).map_err(|e| Error::Ocr {
            message: format!("extraction response was not valid JSON: {e}"),
        })?;

    // An illegible date is treated as absent, same as every other field
    let issue_date = wire
        .issue_date
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

    Ok(OcrExtraction {
        vendor_match: wire.vendor_match,
        reference: wire.reference,
        issue_date,
        items: wire
            .items
            .into_iter()
            .map(|item| OcrLineItem {
                catalog_id: item.matched_id,
                extracted_name: item.name_on_receipt,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    })
}

//! OCR extraction contract and cart merge logic.
//!
//! A photographed invoice goes to an external vision-inference provider
//! together with a condensed listing of the current catalog, so the provider
//! can answer with catalog identifiers instead of free text. The provider is
//! behind the [`ReceiptOcr`] trait; swapping vendors never touches the cart
//! engine or the submission pipeline.
//!
//! Merging is strict: only entries whose matched identifier resolves against
//! the in-memory catalog are applied. Everything else is dropped and counted
//! for a single summary. Header fields detected on the invoice (vendor,
//! reference, date) are returned as proposals only - the merge never touches
//! header state.

use crate::core::cart::Cart;
use crate::core::catalog::CatalogItem;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Maximum accepted invoice image size: 4 MB.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// One detected invoice line.
#[derive(Clone, Debug, PartialEq)]
pub struct OcrLineItem {
    /// Catalog identifier the provider matched, if any
    pub catalog_id: Option<i64>,
    /// The line text as printed on the invoice
    pub extracted_name: String,
    /// Detected quantity, if legible
    pub quantity: Option<f64>,
    /// Detected unit price, if legible
    pub unit_price: Option<f64>,
}

/// The structured result of one extraction call. Transient: merged into the
/// cart immediately and then discarded, never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OcrExtraction {
    /// Vendor name the provider matched against the known vendor list
    pub vendor_match: Option<String>,
    /// Invoice reference number read off the document
    pub reference: Option<String>,
    /// Issue date read off the document
    pub issue_date: Option<NaiveDate>,
    /// Detected line items
    pub items: Vec<OcrLineItem>,
}

/// Counts of what a merge applied and what it dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Lines added to (or merged into) the cart
    pub added: usize,
    /// Entries dropped for lacking a resolvable catalog identifier
    pub skipped: usize,
}

/// A vision-inference provider that turns an invoice image into structured
/// line items matched against the supplied catalog.
#[async_trait]
pub trait ReceiptOcr: Send + Sync {
    /// Extracts invoice lines from `image`.
    ///
    /// `vendor_hint` is disambiguating context only; implementations must not
    /// require it. `catalog` is the full in-memory catalog for identifier
    /// matching.
    async fn extract(
        &self,
        image: &[u8],
        vendor_hint: Option<&str>,
        catalog: &[CatalogItem],
    ) -> Result<OcrExtraction>;
}

/// Merges an extraction into the cart.
///
/// Entries with no resolvable catalog identifier are skipped. Quantity
/// defaults to 1 and unit price to the item's standard buy price when the
/// extraction omits them (or reports non-positive values).
pub fn merge_extraction(
    cart: &mut Cart,
    catalog: &[CatalogItem],
    extraction: &OcrExtraction,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for entry in &extraction.items {
        let item = entry
            .catalog_id
            .and_then(|id| catalog.iter().find(|c| c.id == id));

        let Some(item) = item else {
            summary.skipped += 1;
            continue;
        };

        let quantity = entry.quantity.filter(|q| *q > 0.0).unwrap_or(1.0);
        let unit_price = entry
            .unit_price
            .filter(|p| *p > 0.0)
            .or(item.buy_price)
            .unwrap_or(0.0);

        cart.add_or_merge(item, quantity, unit_price);
        summary.added += 1;
    }

    summary
}

/// Renders the condensed catalog listing sent alongside the image, one item
/// per line: `ID:{id}|{name}|{code}`.
#[must_use]
pub fn catalog_listing(catalog: &[CatalogItem]) -> String {
    catalog
        .iter()
        .map(|item| format!("ID:{}|{}|{}", item.id, item.name, item.code))
        .collect::<Vec<_>>()
        .join("\n")
}

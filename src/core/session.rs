//! Per-workflow form sessions.
//!
//! A session is the glue a form screen talks to: it owns the header fields
//! and cart for one in-progress document, mirrors every change into the
//! draft store, runs the duplicate guard (goods receipt), accepts OCR merges
//! (goods receipt), and drives the submission pipeline.
//!
//! Sessions enforce the load-before-save rule: every mutator fails with
//! [`Error::SessionNotReady`] until [`load_draft`](ReceiptSession::load_draft)
//! has run once. Without this, an early save of pristine state would wipe a
//! real draft before it had been read back.
//!
//! Validation is first-failing-check-wins; the checks run in a fixed order
//! and only the first failure is reported.

use crate::core::cart::{Cart, CartLine, LineId};
use crate::core::catalog::CatalogItem;
use crate::core::draft::DraftStore;
use crate::core::guard::{DuplicateGuard, GuardState};
use crate::core::ocr::{self, MergeSummary, ReceiptOcr};
use crate::core::submit::{SubmissionRequest, SubmitOutcome, TransactionApi, lines_from_cart};
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Goods receipt
// ---------------------------------------------------------------------------

/// Header fields of an in-progress goods receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptHeader {
    /// Vendor name
    pub vendor: String,
    /// Invoice reference number
    pub reference: String,
    /// Invoice issue date (defaults to today)
    pub issue_date: NaiveDate,
    /// Payable due date
    pub due_date: Option<NaiveDate>,
}

impl Default for ReceiptHeader {
    fn default() -> Self {
        Self {
            vendor: String::new(),
            reference: String::new(),
            issue_date: today(),
            due_date: None,
        }
    }
}

impl ReceiptHeader {
    fn is_blank(&self) -> bool {
        self.vendor.is_empty() && self.reference.is_empty() && self.due_date.is_none()
    }
}

/// The persisted snapshot of a goods-receipt form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptDraft {
    /// Header fields
    pub header: ReceiptHeader,
    /// Cart lines
    pub cart: Cart,
}

/// What an invoice scan produced: merge counts plus header *proposals*.
/// Proposals are never applied automatically; the caller decides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOutcome {
    /// How many extraction entries were merged and how many dropped
    pub summary: MergeSummary,
    /// Vendor name the provider matched, for the caller to offer
    pub proposed_vendor: Option<String>,
    /// Invoice reference read off the document
    pub proposed_reference: Option<String>,
    /// Issue date read off the document
    pub proposed_issue_date: Option<NaiveDate>,
}

/// An in-progress goods receipt: vendor invoice header, cart, duplicate
/// guard, OCR assist, draft mirroring, submission.
pub struct ReceiptSession {
    catalog: Vec<CatalogItem>,
    header: ReceiptHeader,
    cart: Cart,
    drafts: DraftStore,
    guard: DuplicateGuard,
    api: Arc<dyn TransactionApi>,
    ocr: Arc<dyn ReceiptOcr>,
    max_image_bytes: usize,
    loaded: bool,
}

impl ReceiptSession {
    /// Creates a session over the supplied catalog. Call
    /// [`load_draft`](Self::load_draft) before anything else.
    #[must_use]
    pub fn new(
        catalog: Vec<CatalogItem>,
        drafts: DraftStore,
        guard: DuplicateGuard,
        api: Arc<dyn TransactionApi>,
        ocr: Arc<dyn ReceiptOcr>,
    ) -> Self {
        Self {
            catalog,
            header: ReceiptHeader::default(),
            cart: Cart::new(),
            drafts,
            guard,
            api,
            ocr,
            max_image_bytes: ocr::MAX_IMAGE_BYTES,
            loaded: false,
        }
    }

    /// Overrides the maximum accepted invoice image size.
    #[must_use]
    pub fn with_image_limit(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Restores a previously saved draft, if any. Must run once, before any
    /// mutator. Returns whether a draft was restored.
    ///
    /// # Errors
    /// Returns an error if the draft database is unreachable.
    pub async fn load_draft(&mut self) -> Result<bool> {
        if self.loaded {
            return Ok(false);
        }
        let restored: Option<ReceiptDraft> = self.drafts.load().await?;
        self.loaded = true;

        let Some(draft) = restored else {
            return Ok(false);
        };
        info!(lines = draft.cart.len(), "Restored goods-receipt draft");
        self.header = draft.header;
        self.cart = draft.cart;
        self.guard
            .on_change(&self.header.vendor, &self.header.reference);
        Ok(true)
    }

    /// Sets the vendor, restarting the duplicate guard.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_vendor(&mut self, vendor: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.header.vendor = vendor.to_string();
        self.guard
            .on_change(&self.header.vendor, &self.header.reference);
        self.persist().await
    }

    /// Sets the invoice reference, restarting the duplicate guard.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_reference(&mut self, reference: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.header.reference = reference.to_string();
        self.guard
            .on_change(&self.header.vendor, &self.header.reference);
        self.persist().await
    }

    /// Sets the invoice issue date.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_issue_date(&mut self, date: NaiveDate) -> Result<()> {
        self.ensure_loaded()?;
        self.header.issue_date = date;
        self.persist().await
    }

    /// Sets or clears the due date.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_due_date(&mut self, date: Option<NaiveDate>) -> Result<()> {
        self.ensure_loaded()?;
        self.header.due_date = date;
        self.persist().await
    }

    /// Adds a catalog item to the cart at the given buy price, merging into
    /// an existing line for the same item.
    ///
    /// # Errors
    /// Rejects non-positive quantity or price and unknown catalog ids.
    pub async fn add_item(
        &mut self,
        catalog_id: i64,
        quantity: f64,
        unit_price: f64,
    ) -> Result<LineId> {
        self.ensure_loaded()?;
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(Error::InvalidQuantity { quantity });
        }
        if unit_price <= 0.0 || !unit_price.is_finite() {
            return Err(Error::InvalidPrice { price: unit_price });
        }
        let item = self
            .catalog
            .iter()
            .find(|c| c.id == catalog_id)
            .ok_or(Error::UnknownCatalogItem { id: catalog_id })?
            .clone();

        let line_id = self.cart.add_or_merge(&item, quantity, unit_price);
        self.persist().await?;
        Ok(line_id)
    }

    /// Removes a cart line by its stable identifier.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn remove_line(&mut self, line_id: LineId) -> Result<Option<CartLine>> {
        self.ensure_loaded()?;
        let removed = self.cart.remove(line_id);
        self.persist().await?;
        Ok(removed)
    }

    /// Whether a vendor has been selected. Callers should confirm with the
    /// user before scanning without one; the scan itself does not require it.
    #[must_use]
    pub fn has_vendor(&self) -> bool {
        !self.header.vendor.is_empty()
    }

    /// Sends an invoice photo to the OCR provider and merges the matched
    /// lines into the cart. Header fields detected on the invoice come back
    /// as proposals in the outcome, never applied here.
    ///
    /// # Errors
    /// Rejects images over the configured limit; provider failures surface as
    /// a single error with the cart untouched.
    pub async fn scan_invoice(&mut self, image: &[u8]) -> Result<ScanOutcome> {
        self.ensure_loaded()?;
        if image.len() > self.max_image_bytes {
            return Err(Error::ImageTooLarge {
                size: image.len(),
                limit: self.max_image_bytes,
            });
        }

        let vendor_hint = (!self.header.vendor.is_empty()).then_some(self.header.vendor.as_str());
        let extraction = self.ocr.extract(image, vendor_hint, &self.catalog).await?;

        let summary = ocr::merge_extraction(&mut self.cart, &self.catalog, &extraction);
        info!(
            added = summary.added,
            skipped = summary.skipped,
            "Merged OCR extraction into cart"
        );
        self.persist().await?;

        Ok(ScanOutcome {
            summary,
            proposed_vendor: extraction.vendor_match,
            proposed_reference: extraction.reference,
            proposed_issue_date: extraction.issue_date,
        })
    }

    /// Validates the form and sends it to the backend exactly once.
    ///
    /// On success the cart and header are reset and the draft cleared. On any
    /// failure the state is left untouched for correction and resubmission.
    ///
    /// # Errors
    /// The first failing validation check, or the backend's error verbatim.
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        self.ensure_loaded()?;

        if self.header.vendor.is_empty() {
            return Err(Error::MissingCounterparty);
        }
        if self.header.reference.is_empty() {
            return Err(Error::MissingReference);
        }
        if self.guard.blocks_submission() {
            return Err(Error::DuplicateInvoice {
                vendor: self.header.vendor.clone(),
                reference: self.header.reference.clone(),
            });
        }
        let Some(due_date) = self.header.due_date else {
            return Err(Error::MissingDueDate);
        };
        if self.cart.is_empty() {
            return Err(Error::EmptyCart);
        }

        let request = SubmissionRequest::GoodsReceipt {
            vendor: self.header.vendor.clone(),
            reference: self.header.reference.clone(),
            issue_date: self.header.issue_date,
            due_date,
            lines: lines_from_cart(&self.cart),
        };

        let outcome = self.api.submit(&request).await?;

        info!(reference = %self.header.reference, "Goods receipt submitted");
        self.cart.clear();
        self.header = ReceiptHeader::default();
        self.guard.reset();
        self.drafts.clear().await?;
        Ok(outcome)
    }

    /// Discards the cart, header, and stored draft.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft delete error.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        self.cart.clear();
        self.header = ReceiptHeader::default();
        self.guard.reset();
        self.drafts.clear().await
    }

    /// Current header fields.
    #[must_use]
    pub const fn header(&self) -> &ReceiptHeader {
        &self.header
    }

    /// Current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Current duplicate-guard state.
    #[must_use]
    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    /// The catalog this session was constructed over.
    #[must_use]
    pub fn catalog(&self) -> &[CatalogItem] {
        &self.catalog
    }

    /// Grand total of the cart.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cart.total()
    }

    const fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(Error::SessionNotReady)
        }
    }

    async fn persist(&self) -> Result<()> {
        if self.cart.is_empty() && self.header.is_blank() {
            self.drafts.clear().await
        } else {
            self.drafts
                .save(&ReceiptDraft {
                    header: self.header.clone(),
                    cart: self.cart.clone(),
                })
                .await
        }
    }
}

// ---------------------------------------------------------------------------
// Purchase order
// ---------------------------------------------------------------------------

/// Header fields of an in-progress purchase order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderHeader {
    /// Destination outlet
    pub outlet: String,
    /// Requested ship date (defaults to today)
    pub ship_date: Option<NaiveDate>,
}

impl Default for OrderHeader {
    fn default() -> Self {
        Self {
            outlet: String::new(),
            ship_date: Some(today()),
        }
    }
}

/// The persisted snapshot of a purchase-order form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDraft {
    /// Header fields
    pub header: OrderHeader,
    /// Cart lines
    pub cart: Cart,
}

/// An in-progress purchase order. Lines are priced at the catalog sell price
/// and adds are refused when they would exceed the stock on hand.
pub struct OrderSession {
    catalog: Vec<CatalogItem>,
    header: OrderHeader,
    cart: Cart,
    drafts: DraftStore,
    api: Arc<dyn TransactionApi>,
    loaded: bool,
}

impl OrderSession {
    /// Creates a session over the supplied catalog. Call
    /// [`load_draft`](Self::load_draft) before anything else.
    #[must_use]
    pub fn new(catalog: Vec<CatalogItem>, drafts: DraftStore, api: Arc<dyn TransactionApi>) -> Self {
        Self {
            catalog,
            header: OrderHeader::default(),
            cart: Cart::new(),
            drafts,
            api,
            loaded: false,
        }
    }

    /// Restores a previously saved draft, if any. Must run once, before any
    /// mutator. Returns whether a draft was restored.
    ///
    /// # Errors
    /// Returns an error if the draft database is unreachable.
    pub async fn load_draft(&mut self) -> Result<bool> {
        if self.loaded {
            return Ok(false);
        }
        let restored: Option<OrderDraft> = self.drafts.load().await?;
        self.loaded = true;

        let Some(draft) = restored else {
            return Ok(false);
        };
        info!(lines = draft.cart.len(), "Restored purchase-order draft");
        self.header = draft.header;
        self.cart = draft.cart;
        Ok(true)
    }

    /// Sets the destination outlet.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_outlet(&mut self, outlet: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.header.outlet = outlet.to_string();
        self.persist().await
    }

    /// Sets or clears the ship date.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_ship_date(&mut self, date: Option<NaiveDate>) -> Result<()> {
        self.ensure_loaded()?;
        self.header.ship_date = date;
        self.persist().await
    }

    /// Adds a catalog item at its standard sell price, merging into an
    /// existing line. The cumulative carted quantity for the item may not
    /// exceed its stock on hand.
    ///
    /// # Errors
    /// Rejects non-positive quantities, unknown catalog ids, and adds that
    /// would exceed available stock.
    pub async fn add_item(&mut self, catalog_id: i64, quantity: f64) -> Result<LineId> {
        self.ensure_loaded()?;
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(Error::InvalidQuantity { quantity });
        }
        let item = self
            .catalog
            .iter()
            .find(|c| c.id == catalog_id)
            .ok_or(Error::UnknownCatalogItem { id: catalog_id })?
            .clone();

        let requested = self.cart.quantity_for(catalog_id) + quantity;
        if requested > item.stock_on_hand {
            return Err(Error::InsufficientStock {
                requested,
                available: item.stock_on_hand,
            });
        }

        let line_id = self.cart.add_or_merge(&item, quantity, item.sell_price);
        self.persist().await?;
        Ok(line_id)
    }

    /// Removes a cart line by its stable identifier.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn remove_line(&mut self, line_id: LineId) -> Result<Option<CartLine>> {
        self.ensure_loaded()?;
        let removed = self.cart.remove(line_id);
        self.persist().await?;
        Ok(removed)
    }

    /// Validates the form and sends it to the backend exactly once.
    ///
    /// # Errors
    /// The first failing validation check, or the backend's error verbatim.
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        self.ensure_loaded()?;

        if self.header.outlet.is_empty() {
            return Err(Error::MissingCounterparty);
        }
        let Some(ship_date) = self.header.ship_date else {
            return Err(Error::MissingShipDate);
        };
        if self.cart.is_empty() {
            return Err(Error::EmptyCart);
        }

        let request = SubmissionRequest::PurchaseOrder {
            outlet: self.header.outlet.clone(),
            ship_date,
            lines: lines_from_cart(&self.cart),
        };

        let outcome = self.api.submit(&request).await?;

        info!(outlet = %self.header.outlet, "Purchase order submitted");
        self.cart.clear();
        self.header = OrderHeader::default();
        self.drafts.clear().await?;
        Ok(outcome)
    }

    /// Discards the cart, header, and stored draft.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft delete error.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        self.cart.clear();
        self.header = OrderHeader::default();
        self.drafts.clear().await
    }

    /// Current header fields.
    #[must_use]
    pub const fn header(&self) -> &OrderHeader {
        &self.header
    }

    /// Current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Grand total of the cart.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cart.total()
    }

    const fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(Error::SessionNotReady)
        }
    }

    async fn persist(&self) -> Result<()> {
        if self.cart.is_empty() && self.header.outlet.is_empty() {
            self.drafts.clear().await
        } else {
            self.drafts
                .save(&OrderDraft {
                    header: self.header.clone(),
                    cart: self.cart.clone(),
                })
                .await
        }
    }
}

// ---------------------------------------------------------------------------
// Outlet return
// ---------------------------------------------------------------------------

/// Header fields of an in-progress outlet return.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnHeader {
    /// Originating outlet
    pub outlet: String,
    /// Return date (defaults to today)
    pub issue_date: Option<NaiveDate>,
    /// Free-text note
    pub note: String,
}

impl Default for ReturnHeader {
    fn default() -> Self {
        Self {
            outlet: String::new(),
            issue_date: Some(today()),
            note: String::new(),
        }
    }
}

/// The persisted snapshot of a return form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnDraft {
    /// Header fields
    pub header: ReturnHeader,
    /// Cart lines
    pub cart: Cart,
}

/// Result of adding a line to a return: returns may exceed recorded stock
/// (physically damaged goods not yet in the system), so the overflow is a
/// warning, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReturnAdd {
    /// Identifier of the created or merged line
    pub line_id: LineId,
    /// Whether the carted quantity now exceeds the recorded stock on hand
    pub exceeds_stock: bool,
}

/// An in-progress outlet return. Lines are priced at the catalog sell price.
pub struct ReturnSession {
    catalog: Vec<CatalogItem>,
    header: ReturnHeader,
    cart: Cart,
    drafts: DraftStore,
    api: Arc<dyn TransactionApi>,
    loaded: bool,
}

impl ReturnSession {
    /// Creates a session over the supplied catalog. Call
    /// [`load_draft`](Self::load_draft) before anything else.
    #[must_use]
    pub fn new(catalog: Vec<CatalogItem>, drafts: DraftStore, api: Arc<dyn TransactionApi>) -> Self {
        Self {
            catalog,
            header: ReturnHeader::default(),
            cart: Cart::new(),
            drafts,
            api,
            loaded: false,
        }
    }

    /// Restores a previously saved draft, if any. Must run once, before any
    /// mutator. Returns whether a draft was restored.
    ///
    /// # Errors
    /// Returns an error if the draft database is unreachable.
    pub async fn load_draft(&mut self) -> Result<bool> {
        if self.loaded {
            return Ok(false);
        }
        let restored: Option<ReturnDraft> = self.drafts.load().await?;
        self.loaded = true;

        let Some(draft) = restored else {
            return Ok(false);
        };
        info!(lines = draft.cart.len(), "Restored return draft");
        self.header = draft.header;
        self.cart = draft.cart;
        Ok(true)
    }

    /// Sets the originating outlet.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_outlet(&mut self, outlet: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.header.outlet = outlet.to_string();
        self.persist().await
    }

    /// Sets or clears the return date.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_issue_date(&mut self, date: Option<NaiveDate>) -> Result<()> {
        self.ensure_loaded()?;
        self.header.issue_date = date;
        self.persist().await
    }

    /// Sets the free-text note.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn set_note(&mut self, note: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.header.note = note.to_string();
        self.persist().await
    }

    /// Adds a catalog item at its standard sell price, merging into an
    /// existing line. Exceeding the recorded stock is flagged, not refused.
    ///
    /// # Errors
    /// Rejects non-positive quantities and unknown catalog ids.
    pub async fn add_item(&mut self, catalog_id: i64, quantity: f64) -> Result<ReturnAdd> {
        self.ensure_loaded()?;
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(Error::InvalidQuantity { quantity });
        }
        let item = self
            .catalog
            .iter()
            .find(|c| c.id == catalog_id)
            .ok_or(Error::UnknownCatalogItem { id: catalog_id })?
            .clone();

        let requested = self.cart.quantity_for(catalog_id) + quantity;
        let exceeds_stock = requested > item.stock_on_hand;

        let line_id = self.cart.add_or_merge(&item, quantity, item.sell_price);
        self.persist().await?;
        Ok(ReturnAdd {
            line_id,
            exceeds_stock,
        })
    }

    /// Removes a cart line by its stable identifier.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft write error.
    pub async fn remove_line(&mut self, line_id: LineId) -> Result<Option<CartLine>> {
        self.ensure_loaded()?;
        let removed = self.cart.remove(line_id);
        self.persist().await?;
        Ok(removed)
    }

    /// Validates the form and sends it to the backend exactly once.
    ///
    /// # Errors
    /// The first failing validation check, or the backend's error verbatim.
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        self.ensure_loaded()?;

        if self.header.outlet.is_empty() {
            return Err(Error::MissingCounterparty);
        }
        let Some(issue_date) = self.header.issue_date else {
            return Err(Error::MissingIssueDate);
        };
        if self.cart.is_empty() {
            return Err(Error::EmptyCart);
        }

        let request = SubmissionRequest::OutletReturn {
            outlet: self.header.outlet.clone(),
            issue_date,
            note: self.header.note.clone(),
            lines: lines_from_cart(&self.cart),
        };

        let outcome = self.api.submit(&request).await?;

        info!(outlet = %self.header.outlet, "Return submitted");
        self.cart.clear();
        self.header = ReturnHeader::default();
        self.drafts.clear().await?;
        Ok(outcome)
    }

    /// Discards the cart, header, and stored draft.
    ///
    /// # Errors
    /// Fails before [`load_draft`](Self::load_draft) or on a draft delete error.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        self.cart.clear();
        self.header = ReturnHeader::default();
        self.drafts.clear().await
    }

    /// Current header fields.
    #[must_use]
    pub const fn header(&self) -> &ReturnHeader {
        &self.header
    }

    /// Current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Grand total of the cart.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cart.total()
    }

    const fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(Error::SessionNotReady)
        }
    }

    async fn persist(&self) -> Result<()> {
        if self.cart.is_empty() && self.header.outlet.is_empty() && self.header.note.is_empty() {
            self.drafts.clear().await
        } else {
            self.drafts
                .save(&ReturnDraft {
                    header: self.header.clone(),
                    cart: self.cart.clone(),
                })
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::draft::FormKind;
    use crate::core::guard::OutagePolicy;
    use crate::core::ocr::{OcrExtraction, OcrLineItem};
    use crate::test_utils::*;
    use sea_orm::DatabaseConnection;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn receipt_session(
        db: &DatabaseConnection,
        checker: Arc<FnChecker>,
        api: Arc<RecordingApi>,
        ocr: Arc<dyn ReceiptOcr>,
    ) -> ReceiptSession {
        let drafts = DraftStore::new(db.clone(), FormKind::GoodsReceipt);
        let guard =
            DuplicateGuard::with_debounce(checker, OutagePolicy::FailOpen, Duration::from_millis(10));
        ReceiptSession::new(sample_catalog(), drafts, guard, api, ocr)
    }

    fn no_op_ocr() -> Arc<dyn ReceiptOcr> {
        StubOcr::new(OcrExtraction::default())
    }

    async fn filled_receipt_session(
        db: &DatabaseConnection,
        api: Arc<RecordingApi>,
    ) -> Result<ReceiptSession> {
        let mut session = receipt_session(db, FnChecker::new(|_, _| Ok(false)), api, no_op_ocr());
        session.load_draft().await?;
        session.set_vendor("CV Maju Jaya").await?;
        session.set_reference("INV-001").await?;
        session.set_issue_date(date(2025, 11, 1)).await?;
        session.set_due_date(Some(date(2025, 12, 1))).await?;
        session.add_item(1, 2.0, 9000.0).await?;
        Ok(session)
    }

    #[tokio::test]
    async fn test_mutators_require_load_first() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            no_op_ocr(),
        );

        assert!(matches!(
            session.set_vendor("CV Maju").await,
            Err(Error::SessionNotReady)
        ));
        assert!(matches!(
            session.add_item(1, 1.0, 9000.0).await,
            Err(Error::SessionNotReady)
        ));
        assert!(matches!(session.submit().await, Err(Error::SessionNotReady)));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_with_no_draft_starts_blank() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            no_op_ocr(),
        );

        assert!(!session.load_draft().await?);
        assert_eq!(session.header().vendor, "");
        assert_eq!(session.header().reference, "");
        assert!(session.header().due_date.is_none());
        assert!(session.cart().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_validation_reports_first_failing_check() -> Result<()> {
        let db = setup_test_db().await?;
        let api = RecordingApi::new();
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            api.clone(),
            no_op_ocr(),
        );
        session.load_draft().await?;

        // Everything is missing; only the counterparty is reported
        assert!(matches!(
            session.submit().await,
            Err(Error::MissingCounterparty)
        ));

        session.set_vendor("CV Maju Jaya").await?;
        assert!(matches!(
            session.submit().await,
            Err(Error::MissingReference)
        ));

        session.set_reference("INV-001").await?;
        assert!(matches!(session.submit().await, Err(Error::MissingDueDate)));

        session.set_due_date(Some(date(2025, 12, 1))).await?;
        assert!(matches!(session.submit().await, Err(Error::EmptyCart)));

        assert!(api.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_sends_request_and_resets() -> Result<()> {
        let db = setup_test_db().await?;
        let api = RecordingApi::new();
        let mut session = filled_receipt_session(&db, api.clone()).await?;

        let outcome = session.submit().await?;
        assert_eq!(outcome.message, "saved");

        let requests = api.requests();
        assert_eq!(requests.len(), 1);
        match &requests[0] {
            SubmissionRequest::GoodsReceipt {
                vendor,
                reference,
                issue_date,
                due_date,
                lines,
            } => {
                assert_eq!(vendor, "CV Maju Jaya");
                assert_eq!(reference, "INV-001");
                assert_eq!(*issue_date, date(2025, 11, 1));
                assert_eq!(*due_date, date(2025, 12, 1));
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].catalog_id, 1);
                assert_eq!(lines[0].quantity, 2.0);
            }
            other => panic!("unexpected request: {other:?}"),
        }

        // Form and draft are gone, ready for the next document
        assert!(session.cart().is_empty());
        assert_eq!(session.header().vendor, "");
        assert_eq!(session.guard_state(), GuardState::Idle);
        let drafts = DraftStore::new(db, FormKind::GoodsReceipt);
        let leftover: Option<ReceiptDraft> = drafts.load().await?;
        assert!(leftover.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_guard_blocks_submission() -> Result<()> {
        let db = setup_test_db().await?;
        let api = RecordingApi::new();
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(true)),
            api.clone(),
            no_op_ocr(),
        );
        session.load_draft().await?;
        session.set_vendor("CV Maju Jaya").await?;
        session.set_reference("INV-001").await?;
        session.set_due_date(Some(date(2025, 12, 1))).await?;
        session.add_item(1, 1.0, 9000.0).await?;

        // Let the debounced check land
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.guard_state(), GuardState::Duplicate);

        match session.submit().await {
            Err(Error::DuplicateInvoice { vendor, reference }) => {
                assert_eq!(vendor, "CV Maju Jaya");
                assert_eq!(reference, "INV-001");
            }
            other => panic!("expected duplicate rejection, got {other:?}"),
        }
        assert!(api.requests().is_empty());
        assert_eq!(session.cart().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_form_intact() -> Result<()> {
        let db = setup_test_db().await?;
        let api = RecordingApi::failing("stock movement rejected");
        let mut session = filled_receipt_session(&db, api).await?;

        match session.submit().await {
            Err(Error::Backend { message }) => assert_eq!(message, "stock movement rejected"),
            other => panic!("expected backend error, got {other:?}"),
        }

        // Everything stays for correction and resubmission
        assert_eq!(session.cart().len(), 1);
        assert_eq!(session.header().vendor, "CV Maju Jaya");
        let drafts = DraftStore::new(db, FormKind::GoodsReceipt);
        let draft: Option<ReceiptDraft> = drafts.load().await?;
        assert!(draft.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_draft_survives_across_sessions() -> Result<()> {
        let db = setup_test_db().await?;
        {
            let mut session =
                filled_receipt_session(&db, RecordingApi::new()).await?;
            session.set_vendor("CV Sumber Rejeki").await?;
        }

        let mut restored = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            no_op_ocr(),
        );
        assert!(restored.load_draft().await?);
        assert_eq!(restored.header().vendor, "CV Sumber Rejeki");
        assert_eq!(restored.header().reference, "INV-001");
        assert_eq!(restored.cart().len(), 1);
        assert_eq!(restored.total(), 18000.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_validates_inputs() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            no_op_ocr(),
        );
        session.load_draft().await?;

        assert!(matches!(
            session.add_item(1, 0.0, 9000.0).await,
            Err(Error::InvalidQuantity { .. })
        ));
        assert!(matches!(
            session.add_item(1, 1.0, -5.0).await,
            Err(Error::InvalidPrice { .. })
        ));
        assert!(matches!(
            session.add_item(999, 1.0, 9000.0).await,
            Err(Error::UnknownCatalogItem { id: 999 })
        ));
        assert!(session.cart().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_emptied_form_clears_its_draft() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            no_op_ocr(),
        );
        session.load_draft().await?;

        let line_id = session.add_item(1, 1.0, 9000.0).await?;
        let drafts = DraftStore::new(db.clone(), FormKind::GoodsReceipt);
        let saved: Option<ReceiptDraft> = drafts.load().await?;
        assert!(saved.is_some());

        let removed = session.remove_line(line_id).await?;
        assert!(removed.is_some());

        let leftover: Option<ReceiptDraft> = drafts.load().await?;
        assert!(leftover.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_rejects_oversized_image() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            no_op_ocr(),
        )
        .with_image_limit(16);
        session.load_draft().await?;

        match session.scan_invoice(&[0u8; 17]).await {
            Err(Error::ImageTooLarge { size, limit }) => {
                assert_eq!(size, 17);
                assert_eq!(limit, 16);
            }
            other => panic!("expected size rejection, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_merges_lines_and_proposes_header() -> Result<()> {
        let db = setup_test_db().await?;
        let ocr = StubOcr::new(OcrExtraction {
            vendor_match: Some("CV Maju Jaya".to_string()),
            reference: Some("INV-778".to_string()),
            issue_date: Some(date(2025, 10, 30)),
            items: vec![
                OcrLineItem {
                    catalog_id: Some(1),
                    extracted_name: "BERAS 5KG".to_string(),
                    quantity: Some(2.0),
                    unit_price: Some(9500.0),
                },
                OcrLineItem {
                    catalog_id: None,
                    extracted_name: "BIAYA KIRIM".to_string(),
                    quantity: Some(1.0),
                    unit_price: Some(5000.0),
                },
            ],
        });
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            ocr.clone(),
        );
        session.load_draft().await?;
        session.set_vendor("CV Maju Jaya").await?;

        let outcome = session.scan_invoice(&[1, 2, 3]).await?;
        assert_eq!(outcome.summary.added, 1);
        assert_eq!(outcome.summary.skipped, 1);
        assert_eq!(outcome.proposed_vendor.as_deref(), Some("CV Maju Jaya"));
        assert_eq!(outcome.proposed_reference.as_deref(), Some("INV-778"));
        assert_eq!(outcome.proposed_issue_date, Some(date(2025, 10, 30)));

        // Lines merged, header untouched, vendor passed as a hint
        assert_eq!(session.cart().len(), 1);
        assert_eq!(session.header().reference, "");
        assert_eq!(ocr.hints(), vec![Some("CV Maju Jaya".to_string())]);

        // The merged cart is already on disk
        let drafts = DraftStore::new(db, FormKind::GoodsReceipt);
        let draft: ReceiptDraft = drafts.load().await?.unwrap();
        assert_eq!(draft.cart.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_failure_leaves_cart_untouched() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = receipt_session(
            &db,
            FnChecker::new(|_, _| Ok(false)),
            RecordingApi::new(),
            Arc::new(FailingOcr),
        );
        session.load_draft().await?;
        session.add_item(1, 2.0, 9000.0).await?;

        assert!(matches!(
            session.scan_invoice(&[1, 2, 3]).await,
            Err(Error::Ocr { .. })
        ));
        assert_eq!(session.cart().len(), 1);
        assert_eq!(session.cart().lines()[0].quantity, 2.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_order_add_uses_sell_price_and_enforces_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let drafts = DraftStore::new(db, FormKind::PurchaseOrder);
        let mut session = OrderSession::new(sample_catalog(), drafts, RecordingApi::new());
        session.load_draft().await?;

        // Sugar: stock 5, sell price 1500
        session.add_item(2, 3.0).await?;
        assert_eq!(session.cart().lines()[0].unit_price, 1500.0);

        match session.add_item(2, 3.0).await {
            Err(Error::InsufficientStock {
                requested,
                available,
            }) => {
                assert_eq!(requested, 6.0);
                assert_eq!(available, 5.0);
            }
            other => panic!("expected stock rejection, got {other:?}"),
        }
        assert_eq!(session.cart().lines()[0].quantity, 3.0);

        // Topping up within stock still merges
        session.add_item(2, 2.0).await?;
        assert_eq!(session.cart().lines()[0].quantity, 5.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_order_submit_validation_and_request_shape() -> Result<()> {
        let db = setup_test_db().await?;
        let api = RecordingApi::new();
        let drafts = DraftStore::new(db.clone(), FormKind::PurchaseOrder);
        let mut session = OrderSession::new(sample_catalog(), drafts, api.clone());
        session.load_draft().await?;

        assert!(matches!(
            session.submit().await,
            Err(Error::MissingCounterparty)
        ));

        session.set_outlet("Outlet Kemang").await?;
        session.set_ship_date(None).await?;
        assert!(matches!(session.submit().await, Err(Error::MissingShipDate)));

        session.set_ship_date(Some(date(2025, 11, 3))).await?;
        assert!(matches!(session.submit().await, Err(Error::EmptyCart)));

        session.add_item(4, 6.0).await?;
        session.submit().await?;

        match &api.requests()[0] {
            SubmissionRequest::PurchaseOrder {
                outlet,
                ship_date,
                lines,
            } => {
                assert_eq!(outlet, "Outlet Kemang");
                assert_eq!(*ship_date, date(2025, 11, 3));
                assert_eq!(lines[0].catalog_id, 4);
                assert_eq!(lines[0].unit_price, 1800.0);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        assert!(session.cart().is_empty());

        let drafts = DraftStore::new(db, FormKind::PurchaseOrder);
        let leftover: Option<OrderDraft> = drafts.load().await?;
        assert!(leftover.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_return_add_flags_overstock_without_refusing() -> Result<()> {
        let db = setup_test_db().await?;
        let drafts = DraftStore::new(db, FormKind::OutletReturn);
        let mut session = ReturnSession::new(sample_catalog(), drafts, RecordingApi::new());
        session.load_draft().await?;

        // Sugar: stock 5
        let first = session.add_item(2, 4.0).await?;
        assert!(!first.exceeds_stock);

        let second = session.add_item(2, 3.0).await?;
        assert!(second.exceeds_stock);
        assert_eq!(second.line_id, first.line_id);
        assert_eq!(session.cart().lines()[0].quantity, 7.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_return_submit_includes_note() -> Result<()> {
        let db = setup_test_db().await?;
        let api = RecordingApi::new();
        let drafts = DraftStore::new(db, FormKind::OutletReturn);
        let mut session = ReturnSession::new(sample_catalog(), drafts, api.clone());
        session.load_draft().await?;

        assert!(matches!(
            session.submit().await,
            Err(Error::MissingCounterparty)
        ));

        session.set_outlet("Outlet Kemang").await?;
        session.set_issue_date(None).await?;
        assert!(matches!(
            session.submit().await,
            Err(Error::MissingIssueDate)
        ));

        session.set_issue_date(Some(date(2025, 11, 5))).await?;
        session.set_note("kemasan rusak").await?;
        session.add_item(1, 1.0).await?;
        session.submit().await?;

        match &api.requests()[0] {
            SubmissionRequest::OutletReturn {
                outlet,
                issue_date,
                note,
                lines,
            } => {
                assert_eq!(outlet, "Outlet Kemang");
                assert_eq!(*issue_date, date(2025, 11, 5));
                assert_eq!(note, "kemasan rusak");
                assert_eq!(lines[0].unit_price, 10500.0);
            }
            other => panic!("unexpected request: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_discards_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let mut session = filled_receipt_session(&db, RecordingApi::new()).await?;

        session.reset().await?;
        assert!(session.cart().is_empty());
        assert_eq!(session.header().vendor, "");
        assert_eq!(session.guard_state(), GuardState::Idle);

        let drafts = DraftStore::new(db, FormKind::GoodsReceipt);
        let leftover: Option<ReceiptDraft> = drafts.load().await?;
        assert!(leftover.is_none());
        Ok(())
    }
}

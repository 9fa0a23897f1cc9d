//! Submission contract - what a completed form sends to the backend.
//!
//! Validation order and draft clearing live in the sessions; this module
//! defines the serialized request shape and the [`TransactionApi`] trait the
//! sessions call exactly once per submit attempt (no retries - any transport
//! or business-rule error is surfaced verbatim and the form is left intact).

use crate::core::cart::{Cart, CartLine};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

/// One serialized document line: catalog id, quantity, unit price.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionLine {
    /// Stable catalog identifier
    pub catalog_id: i64,
    /// Line quantity
    pub quantity: f64,
    /// Unit price applied to the line
    pub unit_price: f64,
}

impl From<&CartLine> for SubmissionLine {
    fn from(line: &CartLine) -> Self {
        Self {
            catalog_id: line.catalog_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// Serializes every cart line in insertion order.
#[must_use]
pub fn lines_from_cart(cart: &Cart) -> Vec<SubmissionLine> {
    cart.lines().iter().map(SubmissionLine::from).collect()
}

/// A validated document ready for the transaction backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionRequest {
    /// Incoming goods from a vendor; creates a payable
    GoodsReceipt {
        /// Vendor name
        vendor: String,
        /// Invoice reference number
        reference: String,
        /// Invoice issue date
        issue_date: NaiveDate,
        /// Payable due date
        due_date: NaiveDate,
        /// Document lines
        lines: Vec<SubmissionLine>,
    },
    /// Stock requested for an outlet
    PurchaseOrder {
        /// Destination outlet name
        outlet: String,
        /// Requested ship date
        ship_date: NaiveDate,
        /// Document lines
        lines: Vec<SubmissionLine>,
    },
    /// Stock sent back from an outlet; increases stock
    OutletReturn {
        /// Originating outlet name
        outlet: String,
        /// Return date
        issue_date: NaiveDate,
        /// Free-text note
        note: String,
        /// Document lines
        lines: Vec<SubmissionLine>,
    },
}

/// Success acknowledgement from the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Backend-supplied confirmation message
    pub message: String,
}

/// The external transaction collaborator. One call per submit attempt;
/// implementations must not retry.
#[async_trait]
pub trait TransactionApi: Send + Sync {
    /// Persists the document on the backend.
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmitOutcome>;
}

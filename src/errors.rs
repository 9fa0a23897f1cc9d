//! Unified error types and result handling for the intake workflow.
//!
//! Every fallible operation in the crate returns the [`Result`] alias defined
//! here. Validation failures get their own variants so callers (and tests) can
//! match on exactly which pre-submission check failed first.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or environment problem.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of what went wrong
        message: String,
    },

    /// Draft database failure (connection, query, schema).
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A session mutator was called before `load_draft` completed.
    #[error("Form session not ready: load the draft before editing")]
    SessionNotReady,

    /// Quantity must be strictly positive.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: f64,
    },

    /// Unit price must be strictly positive.
    #[error("Invalid unit price: {price}")]
    InvalidPrice {
        /// The rejected price
        price: f64,
    },

    /// The referenced catalog item does not exist in the supplied catalog.
    #[error("Unknown catalog item: {id}")]
    UnknownCatalogItem {
        /// The unresolved catalog identifier
        id: i64,
    },

    /// A purchase-order add would exceed the stock on hand.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Total quantity the cart would hold after the add
        requested: f64,
        /// Stock currently on hand for the item
        available: f64,
    },

    /// No counterparty (vendor or outlet) selected.
    #[error("No counterparty selected")]
    MissingCounterparty,

    /// Goods receipts require an invoice reference number.
    #[error("Document reference number is required")]
    MissingReference,

    /// The duplicate guard flagged this vendor + reference pair.
    #[error("Invoice {reference} is already registered for {vendor}")]
    DuplicateInvoice {
        /// Vendor the conflicting document belongs to
        vendor: String,
        /// The conflicting reference number
        reference: String,
    },

    /// Goods receipts require a due date.
    #[error("Due date is required")]
    MissingDueDate,

    /// Purchase orders require a ship date.
    #[error("Ship date is required")]
    MissingShipDate,

    /// Returns require an issue date.
    #[error("Issue date is required")]
    MissingIssueDate,

    /// Submission attempted with no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Uploaded image exceeds the provider limit.
    #[error("Image is too large: {size} bytes (limit {limit})")]
    ImageTooLarge {
        /// Size of the rejected image in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// The OCR provider failed or returned an unusable response.
    #[error("OCR extraction failed: {message}")]
    Ocr {
        /// Provider-reported reason
        message: String,
    },

    /// The transaction backend rejected a request.
    #[error("Backend error: {message}")]
    Backend {
        /// Backend-reported reason, surfaced verbatim
        message: String,
    },

    /// Network-level failure talking to an external collaborator.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON (de)serialization failure outside the tolerated draft path.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error (config file reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

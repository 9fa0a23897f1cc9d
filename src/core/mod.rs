//! Core business logic - framework-agnostic intake workflow machinery.
//!
//! Everything in this module tree is independent of any particular UI or
//! transport: the cart engine, catalog lookup, draft persistence, duplicate
//! guard, OCR merge logic, submission pipeline, and the per-workflow sessions
//! that wire them together. External collaborators appear only as traits;
//! concrete HTTP adapters live in [`crate::remote`].

/// Cart engine: line items, merge rules, totals
pub mod cart;
/// Catalog reference data and keyboard-navigable fuzzy lookup
pub mod catalog;
/// Draft persistence keyed per workflow kind
pub mod draft;
/// Debounced duplicate-invoice guard
pub mod guard;
/// OCR extraction contract and cart merge logic
pub mod ocr;
/// Per-workflow form sessions (goods receipt, purchase order, return)
pub mod session;
/// Pre-submission validation and the transaction API contract
pub mod submit;

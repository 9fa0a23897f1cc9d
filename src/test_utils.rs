//! Shared fixtures and stub collaborators for unit tests.

#![allow(clippy::unwrap_used)]

use crate::config::database::create_tables;
use crate::core::catalog::CatalogItem;
use crate::core::guard::DuplicateChecker;
use crate::core::ocr::{OcrExtraction, ReceiptOcr};
use crate::core::submit::{SubmissionRequest, SubmitOutcome, TransactionApi};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Installs a log subscriber honoring `RUST_LOG` for a test run. Repeated
/// calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connects to a fresh in-memory SQLite database with the schema applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

/// A catalog item with plain defaults for tests that only care about identity.
pub fn catalog_item(id: i64, name: &str, code: &str) -> CatalogItem {
    CatalogItem {
        id,
        name: name.to_string(),
        code: code.to_string(),
        unit: "pcs".to_string(),
        stock_on_hand: 100.0,
        sell_price: 1000.0,
        buy_price: Some(800.0),
    }
}

fn item(
    id: i64,
    name: &str,
    code: &str,
    unit: &str,
    stock_on_hand: f64,
    sell_price: f64,
    buy_price: Option<f64>,
) -> CatalogItem {
    CatalogItem {
        id,
        name: name.to_string(),
        code: code.to_string(),
        unit: unit.to_string(),
        stock_on_hand,
        sell_price,
        buy_price,
    }
}

/// The standard four-item test catalog.
pub fn sample_catalog() -> Vec<CatalogItem> {
    vec![
        item(1, "Rice 5kg", "RC-05", "sack", 10.0, 10500.0, Some(9000.0)),
        item(2, "Sugar 1kg", "SG-01", "pcs", 5.0, 1500.0, Some(1400.0)),
        item(3, "Flour 1kg", "FL-01", "pcs", 8.0, 1200.0, Some(1000.0)),
        item(4, "Cooking Oil 1L", "OL-01", "bottle", 20.0, 1800.0, None),
    ]
}

type CheckFn = dyn Fn(&str, &str) -> Result<bool> + Send + Sync;

/// A [`DuplicateChecker`] backed by a closure, recording every request.
pub struct FnChecker {
    /// Number of checks performed
    pub calls: AtomicUsize,
    last: Mutex<Option<(String, String)>>,
    f: Box<CheckFn>,
}

impl FnChecker {
    pub fn new<F>(f: F) -> Arc<Self>
    where
        F: Fn(&str, &str) -> Result<bool> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
            f: Box::new(f),
        })
    }

    /// The (vendor, reference) pair of the most recent check, if any.
    pub fn last_request(&self) -> Option<(String, String)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl DuplicateChecker for FnChecker {
    async fn invoice_exists(&self, vendor: &str, reference: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((vendor.to_string(), reference.to_string()));
        (self.f)(vendor, reference)
    }
}

/// A [`TransactionApi`] that records requests and optionally fails.
pub struct RecordingApi {
    requests: Mutex<Vec<SubmissionRequest>>,
    fail_with: Option<String>,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail_with: None,
        })
    }

    /// An api whose every submit fails with the given backend message.
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        })
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionApi for RecordingApi {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmitOutcome> {
        if let Some(message) = &self.fail_with {
            return Err(Error::Backend {
                message: message.clone(),
            });
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(SubmitOutcome {
            message: "saved".to_string(),
        })
    }
}

/// A [`ReceiptOcr`] that returns a fixed extraction, recording each hint.
pub struct StubOcr {
    extraction: OcrExtraction,
    hints: Mutex<Vec<Option<String>>>,
}

impl StubOcr {
    pub fn new(extraction: OcrExtraction) -> Arc<Self> {
        Arc::new(Self {
            extraction,
            hints: Mutex::new(Vec::new()),
        })
    }

    /// Vendor hints received so far, one per extract call.
    pub fn hints(&self) -> Vec<Option<String>> {
        self.hints.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiptOcr for StubOcr {
    async fn extract(
        &self,
        _image: &[u8],
        vendor_hint: Option<&str>,
        _catalog: &[CatalogItem],
    ) -> Result<OcrExtraction> {
        self.hints
            .lock()
            .unwrap()
            .push(vendor_hint.map(str::to_string));
        Ok(self.extraction.clone())
    }
}

/// A [`ReceiptOcr`] whose every call fails.
pub struct FailingOcr;

#[async_trait]
impl ReceiptOcr for FailingOcr {
    async fn extract(
        &self,
        _image: &[u8],
        _vendor_hint: Option<&str>,
        _catalog: &[CatalogItem],
    ) -> Result<OcrExtraction> {
        Err(Error::Ocr {
            message: "model unavailable".to_string(),
        })
    }
}

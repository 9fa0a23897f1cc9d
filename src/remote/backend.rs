//! HTTP adapter for the transaction backend.
//!
//! One client covers both backend roles: the REST probe behind
//! [`DuplicateChecker`] and the transaction edge function behind
//! [`TransactionApi`]. The service key comes from the `BACKEND_SERVICE_KEY`
//! environment variable at construction; it is never stored in the config.
//!
//! The wire shape is the backend's, not ours: the edge function takes an
//! `action` discriminator plus a payload with Indonesian field names, and
//! item rows carry a precomputed `total`.

use crate::config::BackendSettings;
use crate::core::guard::DuplicateChecker;
use crate::core::submit::{SubmissionLine, SubmissionRequest, SubmitOutcome, TransactionApi};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the hosted backend (payables table + transaction function).
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl BackendClient {
    /// Builds a client from settings, reading `BACKEND_SERVICE_KEY` from the
    /// environment.
    ///
    /// # Errors
    /// Fails when the key is unset or the HTTP client cannot be constructed.
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let service_key = std::env::var("BACKEND_SERVICE_KEY").map_err(|_| Error::Config {
            message: "BACKEND_SERVICE_KEY environment variable is not set".to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }
}

#[async_trait]
impl DuplicateChecker for BackendClient {
    async fn invoice_exists(&self, vendor: &str, reference: &str) -> Result<bool> {
        let url = format!("{}/rest/v1/payables", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .query(&[
                ("nama_vendor", format!("eq.{vendor}")),
                ("no_nota_vendor", format!("eq.{reference}")),
                ("select", "id".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend {
                message: format!("duplicate probe returned {status}"),
            });
        }

        let rows: Vec<Value> = response.json().await?;
        debug!(%vendor, %reference, exists = !rows.is_empty(), "Duplicate probe completed");
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl TransactionApi for BackendClient {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmitOutcome> {
        let url = format!("{}/functions/v1/manage-transactions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&wire_body(request))
            .send()
            .await?;

        let status = response.status();
        let payload: Value = match response.json().await {
            Ok(value) => value,
            Err(_) => Value::Null,
        };

        if !status.is_success() {
            let message = payload["error"]
                .as_str()
                .map_or_else(|| format!("transaction request returned {status}"), str::to_string);
            return Err(Error::Backend { message });
        }

        let message = payload["message"]
            .as_str()
            .unwrap_or("Transaction recorded")
            .to_string();
        Ok(SubmitOutcome { message })
    }
}

fn action_for(request: &SubmissionRequest) -> &'static str {
    match request {
        SubmissionRequest::GoodsReceipt { .. } => "process-incoming-goods",
        SubmissionRequest::PurchaseOrder { .. } => "create-purchase-order",
        SubmissionRequest::OutletReturn { .. } => "process-return",
    }
}

fn wire_lines(lines: &[SubmissionLine]) -> Vec<Value> {
    lines
        .iter()
        .map(|line| {
            json!({
                "id_barang": line.catalog_id,
                "qty": line.quantity,
                "harga": line.unit_price,
                "total": line.quantity * line.unit_price,
            })
        })
        .collect()
}

/// Renders a request in the edge function's wire shape.
fn wire_body(request: &SubmissionRequest) -> Value {
    let payload = match request {
        SubmissionRequest::GoodsReceipt {
            vendor,
            reference,
            issue_date,
            due_date,
            lines,
        } => json!({
            "nama_vendor": vendor,
            "no_nota_vendor": reference,
            "tanggal_nota": issue_date.to_string(),
            "tanggal_jatuh_tempo": due_date.to_string(),
            "items": wire_lines(lines),
        }),
        SubmissionRequest::PurchaseOrder {
            outlet,
            ship_date,
            lines,
        } => json!({
            "nama_outlet": outlet,
            "tanggal_kirim": ship_date.to_string(),
            "items": wire_lines(lines),
        }),
        SubmissionRequest::OutletReturn {
            outlet,
            issue_date,
            note,
            lines,
        } => json!({
            "nama_outlet": outlet,
            "tanggal_retur": issue_date.to_string(),
            "catatan": note,
            "items": wire_lines(lines),
        }),
    };

    json!({
        "action": action_for(request),
        "payload": payload,
    })
}

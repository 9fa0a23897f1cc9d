//! Draft persistence - mirrors in-progress form state across restarts.
//!
//! Each workflow kind owns a single slot in the local draft database. Saves
//! are full overwrites (no merging), so two processes editing the same
//! workflow kind will clobber each other - accepted, not defended against.
//! Reads are best-effort: a payload written by an older release deserializes
//! with missing fields at their form defaults, and an unparseable payload is
//! discarded with a warning rather than surfaced as an error.

use crate::entities::{Draft, DraftModel, draft};
use crate::errors::Result;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

/// The three intake workflows, each with its own draft slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormKind {
    /// Incoming goods from a vendor (creates a payable)
    GoodsReceipt,
    /// Stock requested for an outlet
    PurchaseOrder,
    /// Stock sent back from an outlet
    OutletReturn,
}

impl FormKind {
    /// The storage key of this workflow's draft slot.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::GoodsReceipt => "goods_receipt_draft_v1",
            Self::PurchaseOrder => "purchase_order_draft_v1",
            Self::OutletReturn => "outlet_return_draft_v1",
        }
    }
}

/// Persists one workflow's draft in the local draft database.
///
/// The workflow kind is injected per instance; there is no shared global
/// storage key.
#[derive(Debug, Clone)]
pub struct DraftStore {
    db: DatabaseConnection,
    kind: FormKind,
}

impl DraftStore {
    /// Creates a store bound to one workflow's draft slot.
    #[must_use]
    pub const fn new(db: DatabaseConnection, kind: FormKind) -> Self {
        Self { db, kind }
    }

    /// The workflow this store is bound to.
    #[must_use]
    pub const fn kind(&self) -> FormKind {
        self.kind
    }

    /// Loads the stored draft, if any.
    ///
    /// Returns `Ok(None)` both when no draft exists and when the stored
    /// payload no longer parses (stale schema from a previous release); the
    /// latter is logged and silently dropped.
    ///
    /// # Errors
    /// Returns an error only for database failures.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let row = Draft::find_by_id(self.kind.storage_key().to_string())
            .one(&self.db)
            .await?;

        let Some(model) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&model.payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(
                    form_kind = self.kind.storage_key(),
                    error = %e,
                    "Discarding unparseable draft payload"
                );
                Ok(None)
            }
        }
    }

    /// Overwrites the draft slot with a full snapshot of the given value.
    ///
    /// # Errors
    /// Returns an error if serialization or the database write fails.
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = chrono::Utc::now().naive_utc();
        let key = self.kind.storage_key().to_string();

        let existing: Option<DraftModel> = Draft::find_by_id(key.clone()).one(&self.db).await?;

        if let Some(model) = existing {
            let mut active: draft::ActiveModel = model.into();
            active.payload = Set(payload);
            active.updated_at = Set(now);
            active.update(&self.db).await?;
        } else {
            let active = draft::ActiveModel {
                form_kind: Set(key),
                payload: Set(payload),
                updated_at: Set(now),
            };
            active.insert(&self.db).await?;
        }

        Ok(())
    }

    /// Deletes the draft slot. Deleting an absent draft is not an error.
    ///
    /// # Errors
    /// Returns an error if the database delete fails.
    pub async fn clear(&self) -> Result<()> {
        Draft::delete_by_id(self.kind.storage_key().to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

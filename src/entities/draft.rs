//! Draft entity - one persisted in-progress form per workflow kind.
//!
//! Each workflow (goods receipt, purchase order, outlet return) owns exactly
//! one row, keyed by its storage key. The payload is the JSON snapshot of the
//! form's header and cart; it is always written as a full overwrite.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Draft database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drafts")]
pub struct Model {
    /// Storage key of the owning workflow (e.g. `goods_receipt_draft_v1`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub form_kind: String,
    /// Serialized `{header, cart}` snapshot
    pub payload: String,
    /// When the draft was last overwritten
    pub updated_at: DateTime,
}

/// Drafts have no relations; each row is self-contained.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

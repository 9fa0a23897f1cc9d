//! Cart engine - the line-item collection for a single in-progress document.
//!
//! One cart backs one document (goods receipt, purchase order, or return).
//! Re-adding an item that is already in the cart merges into the existing
//! line: quantities accumulate and the newest unit price overwrites the old
//! one ("latest price wins", deliberately not a weighted average). Every line
//! carries a stable synthetic [`LineId`] assigned at insertion; removal is by
//! that id, never by positional index.

use crate::core::catalog::CatalogItem;
use serde::{Deserialize, Serialize};

/// Stable identifier of a cart line, assigned at insertion and never reused
/// within a cart's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(pub u64);

/// A catalog item priced and quantified into a document line.
///
/// `subtotal` is always `quantity * unit_price`; it is recomputed on every
/// mutation and never stored independently of the other two fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Stable line identifier
    pub line_id: LineId,
    /// Catalog identifier of the underlying item
    pub catalog_id: i64,
    /// Display name, copied from the catalog at insertion
    pub name: String,
    /// Short product code, copied from the catalog at insertion
    pub code: String,
    /// Unit label, copied from the catalog at insertion
    pub unit: String,
    /// Quantity (strictly positive, caller-validated)
    pub quantity: f64,
    /// Unit price (strictly positive, caller-validated)
    pub unit_price: f64,
    /// `quantity * unit_price`
    pub subtotal: f64,
}

/// The line-item collection for one in-progress document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
    #[serde(default)]
    next_id: u64,
}

impl Cart {
    /// Creates an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a catalog item to the cart, or merges into the existing line for
    /// the same catalog identifier.
    ///
    /// Merge rule: quantity is incremented by `quantity`, unit price is
    /// overwritten by `unit_price`, subtotal recomputed from both. Returns the
    /// id of the created or updated line.
    ///
    /// Callers must ensure `quantity > 0` and `unit_price > 0` before
    /// invocation; the engine does not re-validate.
    pub fn add_or_merge(&mut self, item: &CatalogItem, quantity: f64, unit_price: f64) -> LineId {
        if let Some(line) = self.lines.iter_mut().find(|l| l.catalog_id == item.id) {
            line.quantity += quantity;
            line.unit_price = unit_price;
            line.subtotal = line.quantity * line.unit_price;
            return line.line_id;
        }

        let line_id = self.fresh_line_id();
        self.lines.push(CartLine {
            line_id,
            catalog_id: item.id,
            name: item.name.clone(),
            code: item.code.clone(),
            unit: item.unit.clone(),
            quantity,
            unit_price,
            subtotal: quantity * unit_price,
        });
        line_id
    }

    /// Removes a line by its stable identifier, returning it when present.
    pub fn remove(&mut self, line_id: LineId) -> Option<CartLine> {
        let idx = self.lines.iter().position(|l| l.line_id == line_id)?;
        Some(self.lines.remove(idx))
    }

    /// Sum of all line subtotals, recomputed on demand (never cached).
    #[must_use]
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|l| l.subtotal).sum()
    }

    /// All lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Looks up a line by its stable identifier.
    #[must_use]
    pub fn line(&self, line_id: LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    /// Quantity currently carted for a catalog item, zero when absent.
    #[must_use]
    pub fn quantity_for(&self, catalog_id: i64) -> f64 {
        self.lines
            .iter()
            .find(|l| l.catalog_id == catalog_id)
            .map_or(0.0, |l| l.quantity)
    }

    /// Number of lines in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    // Drafts written by an older release may predate `next_id`; never hand
    // out an id a restored line already holds.
    fn fresh_line_id(&mut self) -> LineId {
        let floor = self
            .lines
            .iter()
            .map(|l| l.line_id.0 + 1)
            .max()
            .unwrap_or(0);
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        LineId(id)
    }
}

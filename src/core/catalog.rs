//! Catalog reference data and suggestion lookup.
//!
//! The catalog is supplied wholesale by the caller when a form session is
//! constructed and is never mutated by this workflow. [`CatalogLookup`] wraps
//! it with search-as-you-type behavior: case-insensitive substring matching
//! over name and code, capped suggestion list, and a tracked active index
//! for keyboard traversal.

use serde::{Deserialize, Serialize};

/// Minimum query length before any matching is attempted.
pub const MIN_QUERY_LEN: usize = 2;
/// Maximum number of suggestions returned for a query.
pub const MAX_SUGGESTIONS: usize = 10;

/// A read-only product reference entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable catalog identifier, independent of display name
    pub id: i64,
    /// Display name
    pub name: String,
    /// Short product code
    pub code: String,
    /// Unit label (e.g. "pcs", "kg")
    pub unit: String,
    /// Quantity currently on hand
    pub stock_on_hand: f64,
    /// Standard sell price
    pub sell_price: f64,
    /// Standard buy price, if known
    pub buy_price: Option<f64>,
}

/// In-memory fuzzy filter over a supplied catalog with keyboard-navigable
/// selection state.
#[derive(Debug, Clone)]
pub struct CatalogLookup {
    items: Vec<CatalogItem>,
    query: String,
    matches: Vec<usize>,
    open: bool,
    active: usize,
}

impl CatalogLookup {
    /// Creates a lookup over the supplied catalog. Insertion order is
    /// preserved; no ranking is applied beyond it.
    #[must_use]
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            query: String::new(),
            matches: Vec::new(),
            open: false,
            active: 0,
        }
    }

    /// The full catalog this lookup filters.
    #[must_use]
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// Resolves a catalog identifier against the supplied catalog.
    #[must_use]
    pub fn find_by_id(&self, id: i64) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Replaces the query text and recomputes the suggestion list.
    ///
    /// Queries shorter than [`MIN_QUERY_LEN`] clear the suggestions and close
    /// the list. The active index resets to the first result on every new
    /// query.
    pub fn set_query(&mut self, text: &str) {
        self.query = text.to_string();

        if text.chars().count() < MIN_QUERY_LEN {
            self.matches.clear();
            self.open = false;
            return;
        }

        let needle = text.to_lowercase();
        self.matches = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.name.to_lowercase().contains(&needle)
                    || item.code.to_lowercase().contains(&needle)
            })
            .map(|(idx, _)| idx)
            .take(MAX_SUGGESTIONS)
            .collect();
        self.open = true;
        self.active = 0;
    }

    /// Current query text.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Whether the suggestion list is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Current suggestions, at most [`MAX_SUGGESTIONS`] entries.
    #[must_use]
    pub fn suggestions(&self) -> Vec<&CatalogItem> {
        if !self.open {
            return Vec::new();
        }
        self.matches.iter().map(|&idx| &self.items[idx]).collect()
    }

    /// Index of the highlighted suggestion.
    #[must_use]
    pub const fn active_index(&self) -> usize {
        self.active
    }

    /// Moves the highlight one suggestion down, stopping at the last entry.
    pub fn move_down(&mut self) {
        if self.open && self.active + 1 < self.matches.len() {
            self.active += 1;
        }
    }

    /// Moves the highlight one suggestion up, stopping at the first entry.
    pub fn move_up(&mut self) {
        if self.open && self.active > 0 {
            self.active -= 1;
        }
    }

    /// Confirms the highlighted suggestion, clearing the query and closing
    /// the list. Returns `None` when nothing is highlighted.
    pub fn confirm(&mut self) -> Option<CatalogItem> {
        if !self.open {
            return None;
        }
        let chosen = self
            .matches
            .get(self.active)
            .map(|&idx| self.items[idx].clone())?;

        self.query.clear();
        self.matches.clear();
        self.open = false;
        self.active = 0;
        Some(chosen)
    }

    /// Closes the suggestion list without selecting anything. The query text
    /// is kept so the user can resume typing.
    pub fn cancel(&mut self) {
        self.open = false;
    }
}

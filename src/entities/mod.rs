//! Entity module - SeaORM entity definitions for the local draft database.
//! The draft database is a single-file SQLite store holding one row per
//! workflow form, keyed by the form's storage key.

pub mod draft;

pub use draft::{Column as DraftColumn, Entity as Draft, Model as DraftModel};

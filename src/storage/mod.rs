//! Storage for Motif
//!
//! One JSON document per store, replaced atomically on every write.

mod document;
mod file;

pub use document::{StoreDocument, STORE_VERSION};
pub use file::Store;

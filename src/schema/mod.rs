//! Schema Catalog Module
//!
//! The fixed, read-only universe of fields the Selector chooses from.

pub mod catalog;

pub use catalog::{clean_field_name, FieldInfo, SchemaCatalog};

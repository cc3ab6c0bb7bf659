//! # LinkX Schema
//!
//! Declarative field schema for record comparison.
//!
//! A schema is an ordered list of field declarations. Each declaration
//! names a field and the comparator used on it; interactions multiply
//! previously declared fields. The resolved schema fixes the layout of
//! every feature vector.
//!
//! ## Example
//!
//! ```rust
//! use linkx_schema::{ComparatorRegistry, FieldDeclaration, FieldSchema};
//!
//! let schema = FieldSchema::new(
//!     vec![
//!         FieldDeclaration::string("address"),
//!         FieldDeclaration::exact("zip").with_missing(),
//!         FieldDeclaration::interaction("address_zip", &["address", "zip"]),
//!     ],
//!     &ComparatorRegistry::new(),
//! )
//! .unwrap();
//!
//! assert_eq!(schema.len(), 3);
//! ```

pub mod distance;
pub mod registry;
pub mod schema;

pub use registry::{ComparatorRegistry, CustomComparator};
pub use schema::{Comparator, FieldComparator, FieldDeclaration, FieldSchema, FieldSpec, StringMetric};

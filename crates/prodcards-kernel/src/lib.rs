//! Product cards kernel
//!
//! Shared building blocks used by every other crate in the workspace:
//! - the in-memory catalog model ([`catalog`])
//! - the remote completion seam and its heterogeneous payload shapes ([`llm`])
//! - configuration loading primitives ([`config`])

// catalog module
pub mod catalog;
pub use catalog::{
    CatalogError, CatalogResult, Catalog, CellValue, ColumnSchema, ColumnType, Record,
};

// llm module
pub mod llm;

// config module
pub mod config;

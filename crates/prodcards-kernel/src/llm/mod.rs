//! Remote completion seam
//!
//! Types shared by the card generator and every completion backend.

pub mod backend;
pub mod types;

pub use backend::CompletionBackend;
pub use types::*;

//! Common test utilities shared by the `prodcards-foundation` integration tests.
//!
//! Not a standalone test binary; declared with `mod common;` where needed.

pub mod mock_backend;

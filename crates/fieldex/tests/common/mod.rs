//! Shared test utilities for fieldex integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated project directories with fake OCR backends
//! - Builders for mapping configs and small PDF fixtures

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;

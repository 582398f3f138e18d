//! Shared test utilities for tagserve integration tests.

pub mod builders;
pub mod engine;
pub mod harness;

pub use builders::*;
pub use engine::{EngineMode, KeywordEngine};
pub use harness::TestHarness;

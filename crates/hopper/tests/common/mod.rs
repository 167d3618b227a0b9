//! Shared test utilities for hopper integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated registries over temp directories
//! - Scripted job creators standing in for a real job engine

pub mod builders;
pub mod harness;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use harness::TestHarness;

//! Shared test utilities for scriven integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Scripted delegate engines with recordable behavior

pub mod engines;
pub mod harness;

pub use engines::*;
pub use harness::TestHarness;

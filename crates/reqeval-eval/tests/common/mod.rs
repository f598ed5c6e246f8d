//! Common test utilities for requirement evaluation
//!
//! This module provides shared testing infrastructure including:
//! - A pinned reference date and date helpers
//! - Catalog entity and lab value fixtures
//! - Builders for input links

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;

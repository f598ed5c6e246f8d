//! CLI functionality for the reqeval tool
//!
//! This module contains all CLI-related functionality including:
//! - Policy evaluation against context documents
//! - Policy validation
//! - Operator listing
//! - Output formatting

pub mod evaluate;
pub mod operators;
pub mod output;
pub mod validate;

//! Requirement policy data model
//!
//! This crate provides:
//! - Domain entities (catalog and patient-level)
//! - `RequirementLinks`, the typed bag of linked facts
//! - Requirements, requirement sets and the `PolicyCatalog` arena
//! - The link aggregator building input facts from a root object
//! - Context provider traits and JSON document loading

pub mod aggregate;
pub mod catalog;
pub mod document;
pub mod entities;
pub mod error;
pub mod links;
pub mod provider;
pub mod requirement;
pub mod requirement_set;

pub use aggregate::{AggregateError, DomainObject, aggregate};
pub use catalog::PolicyCatalog;
pub use document::{
    ContextDocument, DocumentError, DocumentResult, EntityCatalog, LoadedContext, LoadedPolicy,
    PolicyDocument, load_policy,
};
pub use entities::*;
pub use error::{ModelError, ModelResult};
pub use links::{DatedItem, LinkCategory, Linked, RequirementLinks, RequirementLinksBuilder};
pub use provider::{ContextProvider, ContextProviderError, InMemoryContextProvider};
pub use requirement::{
    Requirement, RequirementId, RequirementOperator, RequirementType, Unit,
};
pub use requirement_set::{InformationSource, RequirementSet, RequirementSetType, SetId};

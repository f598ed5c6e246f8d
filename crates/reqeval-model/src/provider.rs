//! Context provider traits
//!
//! The engine never loads domain objects itself. Callers hand it already
//! materialized roots, and the lookup cache resolves context ids through a
//! `ContextProvider`.

use crate::entities::{EntityId, PatientExamination, PatientRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves context ids into materialized domain roots
pub trait ContextProvider: Send + Sync {
    /// Load a patient examination with its findings and catalog relations
    fn patient_examination(
        &self,
        id: EntityId,
    ) -> Result<Arc<PatientExamination>, ContextProviderError>;

    /// Load a patient with everything recorded for them
    fn patient(&self, id: EntityId) -> Result<Arc<PatientRecord>, ContextProviderError>;
}

/// Context provider error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextProviderError {
    #[error("Patient examination not found: {0}")]
    PatientExaminationNotFound(EntityId),

    #[error("Patient not found: {0}")]
    PatientNotFound(EntityId),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Context provider backed by in-memory maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextProvider {
    examinations: Arc<RwLock<HashMap<EntityId, Arc<PatientExamination>>>>,
    patients: Arc<RwLock<HashMap<EntityId, Arc<PatientRecord>>>>,
}

impl InMemoryContextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a patient examination
    pub fn add_examination(&self, examination: Arc<PatientExamination>) {
        self.examinations.write().insert(examination.id, examination);
    }

    /// Register or replace a patient record
    pub fn add_patient(&self, record: Arc<PatientRecord>) {
        self.patients.write().insert(record.patient.id, record);
    }

    pub fn remove_examination(&self, id: EntityId) -> Option<Arc<PatientExamination>> {
        self.examinations.write().remove(&id)
    }

    pub fn examination_count(&self) -> usize {
        self.examinations.read().len()
    }
}

impl ContextProvider for InMemoryContextProvider {
    fn patient_examination(
        &self,
        id: EntityId,
    ) -> Result<Arc<PatientExamination>, ContextProviderError> {
        self.examinations
            .read()
            .get(&id)
            .cloned()
            .ok_or(ContextProviderError::PatientExaminationNotFound(id))
    }

    fn patient(&self, id: EntityId) -> Result<Arc<PatientRecord>, ContextProviderError> {
        self.patients
            .read()
            .get(&id)
            .cloned()
            .ok_or(ContextProviderError::PatientNotFound(id))
    }
}

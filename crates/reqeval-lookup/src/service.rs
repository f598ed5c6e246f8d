//! Lookup session service
//!
//! A session is a JSON object stored under `{prefix}:{token}` with the
//! payload TTL. The owning context id is also kept under
//! `{prefix}:{token}:context` with the longer recovery TTL, so a session whose
//! payload expired or got corrupted can be rebuilt once.

use crate::config::LookupConfig;
use crate::error::{LookupError, LookupResult};
use crate::locks::TokenLocks;
use crate::projection::{self, LookupProjection, default_selection, keys};
use crate::store::SessionStore;
use chrono::{NaiveDate, Utc};
use reqeval_eval::{EvaluationContext, RequirementEngine};
use reqeval_model::{ContextProvider, EntityId, PolicyCatalog, SetId};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// JSON object stored for a session
pub type Payload = Map<String, Value>;

/// Source of the reference date for timeframe operators
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Session data as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResponse {
    /// Token to use from now on; differs from the requested one after recovery
    pub token: String,
    pub data: Payload,
    /// The session was rebuilt from its context
    pub recovered: bool,
}

/// Token-addressed lookup sessions over one policy catalog
pub struct LookupService<S> {
    store: S,
    provider: Arc<dyn ContextProvider>,
    catalog: Arc<PolicyCatalog>,
    engine: RequirementEngine,
    clock: Clock,
    parameters: HashMap<String, Value>,
    config: LookupConfig,
    locks: TokenLocks,
}

impl<S> fmt::Debug for LookupService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupService")
            .field("config", &self.config)
            .field("sets", &self.catalog.sets().count())
            .finish_non_exhaustive()
    }
}

impl<S: SessionStore> LookupService<S> {
    /// Create a service with the default configuration and standard operators
    ///
    /// Fails when the catalog uses an operator the engine does not know.
    pub fn new(store: S, provider: Arc<dyn ContextProvider>, catalog: Arc<PolicyCatalog>) -> LookupResult<Self> {
        Self::with_engine(store, provider, catalog, RequirementEngine::new())
    }

    /// Create a service evaluating with a custom engine
    pub fn with_engine(
        store: S,
        provider: Arc<dyn ContextProvider>,
        catalog: Arc<PolicyCatalog>,
        engine: RequirementEngine,
    ) -> LookupResult<Self> {
        engine.validate_catalog(&catalog)?;
        Ok(Self {
            store,
            provider,
            catalog,
            engine,
            clock: Arc::new(|| Utc::now().date_naive()),
            parameters: HashMap::new(),
            config: LookupConfig::default(),
            locks: TokenLocks::new(),
        })
    }

    pub fn with_config(mut self, config: LookupConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin the reference date of every projection
    pub fn with_today(self, today: NaiveDate) -> Self {
        self.with_clock(Arc::new(move || today))
    }

    /// Read the reference date from `clock` on every projection
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Parameter forwarded to operators
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &TokenLocks {
        &self.locks
    }

    /// Create a session for a patient examination and return its token
    ///
    /// Every requirement set of the catalog starts out selected.
    pub fn init(&self, context_id: EntityId) -> LookupResult<String> {
        self.init_with_selection(context_id, None)
    }

    /// Full session payload
    ///
    /// A missing, expired or corrupted payload is rebuilt once from the
    /// session's context; the response then carries the new token.
    pub fn get_all(&self, token: &str) -> LookupResult<LookupResponse> {
        if let Some(data) = self.read(token)?.filter(is_complete) {
            return Ok(LookupResponse {
                token: token.to_string(),
                data,
                recovered: false,
            });
        }
        // Re-check under the lock: a concurrent caller may have recovered
        // and discarded this token already
        self.locks.with_lock(token, || -> LookupResult<LookupResponse> {
            match self.read(token)? {
                Some(data) if is_complete(&data) => Ok(LookupResponse {
                    token: token.to_string(),
                    data,
                    recovered: false,
                }),
                payload => self.recover(token, payload),
            }
        })
    }

    /// Only the requested keys; absent keys are left out
    pub fn get_many(&self, token: &str, wanted: &[&str]) -> LookupResult<LookupResponse> {
        let mut response = self.get_all(token)?;
        response.data.retain(|key, _| wanted.contains(&key.as_str()));
        Ok(response)
    }

    /// Merge values into the session
    pub fn set_many(&self, token: &str, updates: Payload) -> LookupResult<()> {
        self.locks.with_lock(token, || -> LookupResult<()> {
            let mut payload = self.require(token)?;
            payload.extend(updates);
            self.write(token, payload)
        })
    }

    /// Merge values and recompute when the selection changed
    ///
    /// Returns everything that changed: the updates plus any re-derived keys.
    pub fn patch(&self, token: &str, updates: Payload) -> LookupResult<Payload> {
        self.locks.with_lock(token, || -> LookupResult<Payload> {
            let mut payload = self.require(token)?;
            let selection_changed = updates
                .iter()
                .any(|(key, value)| keys::SELECTION.contains(&key.as_str()) && payload.get(key) != Some(value));

            payload.extend(updates.clone());
            let mut applied = updates;
            if selection_changed {
                log::debug!("selection of lookup session {token} changed, recomputing");
                applied.extend(self.recompute_payload(token, &mut payload)?);
            }
            self.write(token, payload)?;
            Ok(applied)
        })
    }

    /// Re-derive the projection from the current selection
    ///
    /// Returns the derived keys. Without an intervening change, two calls
    /// return the same values.
    pub fn recompute(&self, token: &str) -> LookupResult<Payload> {
        self.locks.with_lock(token, || -> LookupResult<Payload> {
            let mut payload = self.require(token)?;
            let derived = self.recompute_payload(token, &mut payload)?;
            self.write(token, payload)?;
            Ok(derived)
        })
    }

    /// Drop a session and its context index
    pub fn invalidate(&self, token: &str) -> LookupResult<()> {
        self.locks.with_lock(token, || self.discard(token))?;
        log::debug!("invalidated lookup session {token}");
        Ok(())
    }

    fn init_with_selection(&self, context_id: EntityId, selection: Option<Vec<SetId>>) -> LookupResult<String> {
        let selection = selection.unwrap_or_else(|| default_selection(&self.catalog));
        let payload = self.derive(context_id, &selection)?.into_map()?;

        let token = Uuid::new_v4().to_string();
        self.write(&token, payload)?;
        self.store.set(
            &self.config.context_key(&token),
            Value::from(context_id),
            self.config.recovery_ttl,
        )?;
        log::debug!("initialized lookup session {token} for context {context_id}");
        Ok(token)
    }

    fn derive(&self, context_id: EntityId, selection: &[SetId]) -> LookupResult<LookupProjection> {
        let examination = self
            .provider
            .patient_examination(context_id)
            .map_err(|source| LookupError::ContextNotFound { context_id, source })?;
        projection::derive(&self.engine, &self.catalog, &examination, selection, &self.evaluation_context())
    }

    /// Fresh context per projection, dated by the clock
    fn evaluation_context(&self) -> EvaluationContext {
        let mut builder = EvaluationContext::builder().today((self.clock)());
        for (name, value) in &self.parameters {
            builder = builder.parameter(name.clone(), value.clone());
        }
        builder.build()
    }

    /// Rebuild a session once; never recurses into another recovery
    ///
    /// Runs under the token's lock.
    fn recover(&self, token: &str, payload: Option<Payload>) -> LookupResult<LookupResponse> {
        let from_payload = payload
            .as_ref()
            .and_then(|data| data.get(keys::CONTEXT_ID))
            .and_then(Value::as_i64);
        let context_id = match from_payload {
            Some(id) => Some(id),
            None => self
                .store
                .get(&self.config.context_key(token))?
                .as_ref()
                .and_then(Value::as_i64),
        };
        let Some(context_id) = context_id else {
            log::debug!("lookup session {token} has no recoverable context");
            return Err(LookupError::not_found(token));
        };

        let selection = payload
            .as_ref()
            .and_then(|data| selection_of(data).ok().flatten())
            .map(|mut ids| {
                ids.retain(|id| self.catalog.set(*id).is_some());
                ids
            });
        log::warn!("lookup session {token} is missing or incomplete, re-initializing from context {context_id}");

        let new_token = match self.init_with_selection(context_id, selection) {
            Ok(new_token) => new_token,
            Err(err) => {
                log::warn!("recovery of lookup session {token} failed: {err}");
                return Err(LookupError::not_found(token));
            }
        };
        self.discard(token)?;

        match self.read(&new_token)? {
            Some(data) if is_complete(&data) => Ok(LookupResponse {
                token: new_token,
                data,
                recovered: true,
            }),
            _ => Err(LookupError::not_found(token)),
        }
    }

    fn recompute_payload(&self, token: &str, payload: &mut Payload) -> LookupResult<Payload> {
        let context_id = payload
            .get(keys::CONTEXT_ID)
            .and_then(Value::as_i64)
            .ok_or_else(|| LookupError::not_found(token))?;
        let selection = selection_of(payload)?.unwrap_or_else(|| default_selection(&self.catalog));
        let derived = self.derive(context_id, &selection)?.into_derived()?;
        payload.extend(derived.clone());
        Ok(derived)
    }

    fn read(&self, token: &str) -> LookupResult<Option<Payload>> {
        match self.store.get(&self.config.payload_key(token))? {
            Some(Value::Object(payload)) => Ok(Some(payload)),
            Some(_) => {
                log::warn!("lookup session {token} holds a non-object payload");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn require(&self, token: &str) -> LookupResult<Payload> {
        self.read(token)?.ok_or_else(|| LookupError::not_found(token))
    }

    fn write(&self, token: &str, payload: Payload) -> LookupResult<()> {
        self.store.set(
            &self.config.payload_key(token),
            Value::Object(payload),
            self.config.ttl,
        )
    }

    fn discard(&self, token: &str) -> LookupResult<()> {
        self.store.delete(&self.config.payload_key(token))?;
        self.store.delete(&self.config.context_key(token))
    }
}

fn is_complete(payload: &Payload) -> bool {
    keys::REQUIRED.iter().all(|key| payload.contains_key(*key))
}

fn selection_of(payload: &Payload) -> LookupResult<Option<Vec<SetId>>> {
    payload
        .get(keys::SELECTED_SETS)
        .map(|value| serde_json::from_value(value.clone()))
        .transpose()
        .map_err(LookupError::from)
}

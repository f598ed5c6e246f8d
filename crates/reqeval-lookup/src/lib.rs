//! Lookup sessions for interactive clients
//!
//! A lookup session caches a client-facing projection of a policy
//! evaluation for one patient examination: selectable requirement sets,
//! available and required findings, per-requirement defaults and choice
//! lists, and the current requirement status. Sessions are addressed by a
//! random token and expire after a TTL.
//!
//! # Example
//!
//! ```ignore
//! use reqeval_lookup::{InMemorySessionStore, LookupService};
//!
//! let service = LookupService::new(InMemorySessionStore::new(), provider, catalog)?;
//! let token = service.init(examination_id)?;
//! let response = service.get_all(&token)?;
//! service.patch(&response.token, updates)?;
//! ```
//!
//! # Storage
//!
//! - `SessionStore`: get/set/delete with per-entry TTL
//! - `InMemorySessionStore`: lazily expiring map for tests and single
//!   processes
//!
//! # Concurrency
//!
//! Read-modify-write operations on a session (`set_many`, `patch`,
//! `recompute`, recovery in `get_all`) run under a per-token mutex. The
//! mutex only exists while an operation on its token is in flight.

pub mod config;
pub mod error;
pub mod locks;
pub mod projection;
pub mod service;
pub mod store;

pub use config::LookupConfig;
pub use error::{LookupError, LookupResult};
pub use locks::TokenLocks;
pub use projection::{LookupProjection, derive, keys};
pub use service::{Clock, LookupResponse, LookupService, Payload};
pub use store::{InMemorySessionStore, SessionStore};

//! Lookup session tests
//!
//! Round trips, merges, recomputation and the one-shot recovery path over the
//! in-memory store.

use chrono::{Days, NaiveDate, Utc};
use pretty_assertions::assert_eq;
use reqeval_eval::{EvalError, OperatorFn, OperatorRegistry, RequirementEngine};
use reqeval_lookup::{InMemorySessionStore, LookupConfig, LookupError, LookupService, Payload, keys};
use reqeval_model::{
    Examination, Finding, InMemoryContextProvider, ModelError, PatientExamination, PatientFinding, PolicyCatalog,
    Requirement, RequirementLinks, RequirementOperator, RequirementSet, RequirementSetType, Unit,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn test_config() -> LookupConfig {
    LookupConfig {
        ttl: Duration::from_secs(60),
        ..LookupConfig::testing()
    }
}

struct Fixture {
    service: LookupService<InMemorySessionStore>,
    store: InMemorySessionStore,
    provider: InMemoryContextProvider,
}

/// Set 1 (all) owns "polyp documented" and links to set 2 (none), which owns
/// "perforation"; examination 1 recorded a polyp only
fn fixture() -> Fixture {
    let polyp = Arc::new(Finding::new(10, "polyp"));
    let perforation = Arc::new(Finding::new(11, "perforation"));

    let catalog = PolicyCatalog::new()
        .with_requirement(
            Requirement::new(5, "polyp documented")
                .with_operator(RequirementOperator::new("models_match_any"))
                .with_targets(RequirementLinks::builder().add(Arc::clone(&polyp)).build()),
        )
        .unwrap()
        .with_requirement(
            Requirement::new(6, "perforation")
                .with_operator(RequirementOperator::new("models_match_any"))
                .with_targets(RequirementLinks::builder().add(Arc::clone(&perforation)).build()),
        )
        .unwrap()
        .with_set(RequirementSet::new(1, "screening").with_requirements([5]).with_links([2]))
        .unwrap()
        .with_set(
            RequirementSet::new(2, "complications")
                .with_type(RequirementSetType::None)
                .with_requirements([6]),
        )
        .unwrap();

    let mut exam = PatientExamination::new(1);
    exam.examination = Some(Arc::new(Examination::new(7, "colonoscopy").with_findings([10, 11])));
    exam.findings = vec![Arc::new(PatientFinding::new(100, polyp))];

    let provider = InMemoryContextProvider::new();
    provider.add_examination(Arc::new(exam));

    let store = InMemorySessionStore::new();
    let service = LookupService::new(store.clone(), Arc::new(provider.clone()), Arc::new(catalog))
        .unwrap()
        .with_config(test_config())
        .with_today(today());

    Fixture {
        service,
        store,
        provider,
    }
}

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

// ============================================================================
// Construction
// ============================================================================

fn catalog_using(operator: &str) -> Arc<PolicyCatalog> {
    let catalog = PolicyCatalog::new()
        .with_requirement(Requirement::new(1, "odd").with_operator(RequirementOperator::new(operator)))
        .unwrap()
        .with_set(RequirementSet::new(1, "s").with_requirements([1]))
        .unwrap();
    Arc::new(catalog)
}

#[test]
fn test_unknown_operator_is_rejected_at_construction() {
    let result = LookupService::new(
        InMemorySessionStore::new(),
        Arc::new(InMemoryContextProvider::new()),
        catalog_using("magic"),
    );

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        LookupError::Evaluation(EvalError::Model(ModelError::UnsupportedOperator { ref operator, .. }))
            if operator == "magic"
    ));
}

#[test]
fn test_custom_engine_accepts_its_operators() {
    let mut registry = OperatorRegistry::with_standard_operators();
    let always: OperatorFn = Arc::new(|_, _, _, _| Ok(true));
    registry.register("magic", always);

    let provider = InMemoryContextProvider::new();
    provider.add_examination(Arc::new(PatientExamination::new(1)));
    let service = LookupService::with_engine(
        InMemorySessionStore::new(),
        Arc::new(provider),
        catalog_using("magic"),
        RequirementEngine::with_registry(registry),
    )
    .unwrap();

    let token = service.init(1).unwrap();
    let data = service.get_all(&token).unwrap().data;
    assert_eq!(data[keys::REQUIREMENT_STATUS], json!({"1": true}));
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_init_then_get_all_returns_init_payload() {
    let Fixture { service, store, .. } = fixture();
    let token = service.init(1).unwrap();

    let response = service.get_all(&token).unwrap();
    assert_eq!(response.token, token);
    assert!(!response.recovered);

    let stored = store.get_value(&service.config().payload_key(&token));
    assert_eq!(Value::Object(response.data.clone()), stored);
    for key in keys::REQUIRED {
        assert!(response.data.contains_key(key), "missing {key}");
    }
}

#[test]
fn test_initial_projection() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();
    let data = service.get_all(&token).unwrap().data;

    assert_eq!(data[keys::SELECTED_SETS], json!([1, 2]));
    assert_eq!(data[keys::AVAILABLE_FINDINGS], json!([10, 11]));
    assert_eq!(data[keys::REQUIRED_FINDINGS], json!([10, 11]));
    assert_eq!(data[keys::REQUIREMENT_STATUS], json!({"5": true, "6": false}));
    assert_eq!(data[keys::SET_STATUS], json!({"1": true, "2": true}));
}

#[test]
fn test_get_many_returns_requested_keys() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();

    let response = service
        .get_many(&token, &[keys::REQUIRED_FINDINGS, "notAKey"])
        .unwrap();
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[keys::REQUIRED_FINDINGS], json!([10, 11]));
}

#[test]
fn test_unknown_context_fails_init() {
    let Fixture { service, .. } = fixture();
    let err = service.init(404).unwrap_err();
    assert!(matches!(err, LookupError::ContextNotFound { context_id: 404, .. }));
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_patch_merges_into_existing_payload() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();
    let before = service.get_all(&token).unwrap().data;

    let applied = service.patch(&token, payload(json!({"k": "v"}))).unwrap();
    assert_eq!(applied, payload(json!({"k": "v"})));

    let after = service.get_all(&token).unwrap().data;
    assert_eq!(after["k"], json!("v"));
    for (key, value) in &before {
        assert_eq!(&after[key], value);
    }
}

#[test]
fn test_set_many_merges() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();

    service.set_many(&token, payload(json!({"a": 1, "b": 2}))).unwrap();
    service.set_many(&token, payload(json!({"b": 3}))).unwrap();

    let data = service.get_many(&token, &["a", "b", keys::CONTEXT_ID]).unwrap().data;
    assert_eq!(Value::Object(data), json!({"a": 1, "b": 3, "patient_examination_id": 1}));
}

#[test]
fn test_writes_to_unknown_token_fail() {
    let Fixture { service, .. } = fixture();
    let err = service.set_many("missing", Payload::new()).unwrap_err();
    assert!(matches!(err, LookupError::NotFound { .. }));
    assert!(service.patch("missing", Payload::new()).is_err());
    assert!(service.recompute("missing").is_err());
}

#[test]
fn test_concurrent_patches_keep_every_update() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();

    std::thread::scope(|scope| {
        for i in 0..16 {
            let service = &service;
            let token = token.as_str();
            scope.spawn(move || {
                service
                    .patch(token, payload(json!({ format!("key{i}"): i })))
                    .unwrap();
            });
        }
    });

    let data = service.get_all(&token).unwrap().data;
    for i in 0..16 {
        assert_eq!(data[&format!("key{i}")], json!(i));
    }
}

#[test]
fn test_lock_table_stays_flat() {
    let Fixture { service, store, .. } = fixture();
    for i in 0..10_000 {
        let token = format!("bogus-{i}");
        assert!(service.set_many(&token, payload(json!({"k": i}))).is_err());
    }
    assert!(store.is_empty());
    assert!(service.locks().is_empty());

    let token = service.init(1).unwrap();
    service.patch(&token, payload(json!({"k": 1}))).unwrap();
    store.delete_key(&service.config().payload_key(&token));
    let recovered = service.get_all(&token).unwrap();
    service.invalidate(&recovered.token).unwrap();
    assert!(service.locks().is_empty());
}

// ============================================================================
// Recompute
// ============================================================================

#[test]
fn test_selection_patch_recomputes() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();

    let applied = service
        .patch(&token, payload(json!({ keys::SELECTED_SETS: [2] })))
        .unwrap();
    assert_eq!(applied[keys::SELECTED_SETS], json!([2]));
    assert_eq!(applied[keys::REQUIRED_FINDINGS], json!([11]));

    let data = service.get_all(&token).unwrap().data;
    assert_eq!(
        data[keys::REQUIREMENTS_BY_SET],
        json!({"2": [{"id": 6, "name": "perforation"}]})
    );
    assert_eq!(data[keys::REQUIREMENT_STATUS], json!({"6": false}));
}

#[test]
fn test_unchanged_selection_does_not_recompute() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();

    let applied = service
        .patch(&token, payload(json!({ keys::SELECTED_SETS: [1, 2] })))
        .unwrap();
    assert_eq!(applied.len(), 1);
}

#[test]
fn test_recompute_is_idempotent() {
    let Fixture { service, .. } = fixture();
    let token = service.init(1).unwrap();

    let first = service.recompute(&token).unwrap();
    let second = service.recompute(&token).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), keys::DERIVED.len());
    assert!(!first.contains_key(keys::SELECTED_SETS));
}

#[test]
fn test_recompute_reflects_new_facts() {
    let Fixture { service, provider, .. } = fixture();
    let token = service.init(1).unwrap();

    let mut exam = PatientExamination::new(1);
    exam.findings = vec![Arc::new(PatientFinding::new(101, Arc::new(Finding::new(11, "perforation"))))];
    provider.add_examination(Arc::new(exam));

    let derived = service.recompute(&token).unwrap();
    assert_eq!(derived[keys::REQUIREMENT_STATUS], json!({"5": false, "6": true}));
    assert_eq!(derived[keys::AVAILABLE_FINDINGS], json!([]));
}

#[test]
fn test_projection_follows_the_clock() {
    let polyp = Arc::new(Finding::new(10, "polyp"));
    let catalog = PolicyCatalog::new()
        .with_requirement(
            Requirement::new(5, "polyp this week")
                .with_operator(RequirementOperator::new("models_match_any_in_timeframe"))
                .with_targets(RequirementLinks::builder().add(Arc::clone(&polyp)).build())
                .with_numeric_range(Decimal::from(-7), Decimal::ZERO)
                .with_unit(Unit::days()),
        )
        .unwrap()
        .with_set(RequirementSet::new(1, "recent").with_requirements([5]))
        .unwrap();

    let mut finding = PatientFinding::new(100, polyp);
    finding.date = today().checked_sub_days(Days::new(7));
    let mut exam = PatientExamination::new(1);
    exam.findings = vec![Arc::new(finding)];
    let provider = InMemoryContextProvider::new();
    provider.add_examination(Arc::new(exam));

    let elapsed = Arc::new(AtomicU64::new(0));
    let clock = {
        let elapsed = Arc::clone(&elapsed);
        Arc::new(move || today() + Days::new(elapsed.load(Ordering::SeqCst)))
    };
    let service = LookupService::new(InMemorySessionStore::new(), Arc::new(provider), Arc::new(catalog))
        .unwrap()
        .with_config(test_config())
        .with_clock(clock);

    let token = service.init(1).unwrap();
    let data = service.get_all(&token).unwrap().data;
    assert_eq!(data[keys::REQUIREMENT_STATUS], json!({"5": true}));

    elapsed.store(1, Ordering::SeqCst);
    let derived = service.recompute(&token).unwrap();
    assert_eq!(derived[keys::REQUIREMENT_STATUS], json!({"5": false}));
}

#[test]
fn test_default_clock_reads_the_current_date() {
    let polyp = Arc::new(Finding::new(10, "polyp"));
    let catalog = PolicyCatalog::new()
        .with_requirement(
            Requirement::new(5, "polyp today")
                .with_operator(RequirementOperator::new("models_match_any_in_timeframe"))
                .with_targets(RequirementLinks::builder().add(Arc::clone(&polyp)).build())
                .with_numeric_range(Decimal::ZERO, Decimal::ZERO)
                .with_unit(Unit::days()),
        )
        .unwrap()
        .with_set(RequirementSet::new(1, "today").with_requirements([5]))
        .unwrap();

    let mut finding = PatientFinding::new(100, polyp);
    finding.date = Some(Utc::now().date_naive());
    let mut exam = PatientExamination::new(1);
    exam.findings = vec![Arc::new(finding)];
    let provider = InMemoryContextProvider::new();
    provider.add_examination(Arc::new(exam));

    let service = LookupService::new(InMemorySessionStore::new(), Arc::new(provider), Arc::new(catalog))
        .unwrap()
        .with_config(test_config());
    let token = service.init(1).unwrap();
    let data = service.get_all(&token).unwrap().data;
    assert_eq!(data[keys::REQUIREMENT_STATUS], json!({"5": true}));
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_expired_payload_is_recovered_once() {
    let Fixture { service, store, .. } = fixture();
    let token = service.init(1).unwrap();
    store.delete_key(&service.config().payload_key(&token));

    let response = service.get_all(&token).unwrap();
    assert!(response.recovered);
    assert_ne!(response.token, token);
    assert_eq!(response.data[keys::CONTEXT_ID], json!(1));

    // The old token is gone for good, the new one works normally
    assert!(service.get_all(&token).is_err());
    assert!(!service.get_all(&response.token).unwrap().recovered);
}

#[test]
fn test_corrupted_payload_is_recovered_with_its_selection() {
    let Fixture { service, store, .. } = fixture();
    let token = service.init(1).unwrap();
    store.put(
        &service.config().payload_key(&token),
        json!({"patient_examination_id": 1, "selectedRequirementSetIds": [2, 99]}),
    );

    let response = service.get_all(&token).unwrap();
    assert!(response.recovered);
    assert_eq!(response.data[keys::SELECTED_SETS], json!([2]));
}

#[test]
fn test_recovery_without_context_is_not_found() {
    let Fixture { service, .. } = fixture();
    let err = service.get_all("never-issued").unwrap_err();
    assert!(matches!(err, LookupError::NotFound { ref token } if token == "never-issued"));
}

#[test]
fn test_failed_recovery_is_not_found() {
    let Fixture {
        service,
        store,
        provider,
    } = fixture();
    let token = service.init(1).unwrap();
    store.delete_key(&service.config().payload_key(&token));
    provider.remove_examination(1);

    let err = service.get_all(&token).unwrap_err();
    assert!(matches!(err, LookupError::NotFound { .. }));
}

#[test]
fn test_concurrent_recovery_issues_one_session() {
    let Fixture { service, store, .. } = fixture();
    let token = service.init(1).unwrap();
    store.put(
        &service.config().payload_key(&token),
        json!({"patient_examination_id": 1}),
    );

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = &service;
                let token = token.as_str();
                scope.spawn(move || service.get_all(token))
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let recovered: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(recovered.len(), 1);
    assert!(recovered[0].recovered);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, LookupError::NotFound { .. }))
    );

    // Payload and context index of the single new session
    assert_eq!(store.len(), 2);
    assert!(service.locks().is_empty());
}

#[test]
fn test_invalidate_removes_session_and_context() {
    let Fixture { service, store, .. } = fixture();
    let token = service.init(1).unwrap();
    service.invalidate(&token).unwrap();

    assert!(store.is_empty());
    assert!(matches!(service.get_all(&token), Err(LookupError::NotFound { .. })));
}

/// Store access shortcuts for tests
trait StoreExt {
    fn get_value(&self, key: &str) -> Value;
    fn put(&self, key: &str, value: Value);
    fn delete_key(&self, key: &str);
}

impl StoreExt for InMemorySessionStore {
    fn get_value(&self, key: &str) -> Value {
        reqeval_lookup::SessionStore::get(self, key).unwrap().unwrap()
    }

    fn put(&self, key: &str, value: Value) {
        reqeval_lookup::SessionStore::set(self, key, value, Duration::from_secs(60)).unwrap();
    }

    fn delete_key(&self, key: &str) {
        reqeval_lookup::SessionStore::delete(self, key).unwrap();
    }
}

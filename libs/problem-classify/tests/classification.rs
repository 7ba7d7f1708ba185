//! End-to-end classification through the manager.

mod common;

use std::error::Error;
use std::sync::Arc;

use common::{ReadTimeout, SignupInvalid, Storage};
use figment::Figment;
use figment::providers::{Format, Yaml};
use problem_classify::failures::{AccessDenied, ValidationFailure};
use problem_classify::{
    ClassificationManager, ClassifierConfig, CustomizeContext, MessageCatalogCustomizer,
    RequestIdCustomizer, RequestScope, StaticMessageSource,
};
use problem_core::catalog::general;
use problem_core::{Problem, ResponseProblem, Status};
use serde_json::json;

fn manager() -> ClassificationManager {
    ClassificationManager::builder(Arc::new(common::registry())).build()
}

#[test]
fn validation_subtype_is_handled_by_the_validation_handler() {
    let failure = SignupInvalid {
        base: ValidationFailure::new()
            .with_violation("email", "must not be blank")
            .with_violation("password", "too short"),
    };

    let response = manager().classify(&failure).unwrap();
    assert_eq!(response.type_uri(), "validation_failed");
    assert_eq!(response.status(), Some(&Status::BAD_REQUEST));
    assert_eq!(
        response.properties().unwrap()["errors"],
        json!([
            {"field": "email", "message": "must not be blank"},
            {"field": "password", "message": "too short"}
        ])
    );
}

#[test]
fn wrapped_failure_is_classified_by_its_root_cause() {
    let response = manager().classify(&common::nested_access_denied()).unwrap();
    assert_eq!(response.type_uri(), "access_denied");
    assert_eq!(response.status_code(), http::StatusCode::FORBIDDEN);
    assert_eq!(response.detail(), Some("reports are admin only"));
}

#[test]
fn inline_sources_are_unwound() {
    let response = manager().classify(&common::inline_access_denied()).unwrap();
    assert_eq!(response.type_uri(), "access_denied");
    assert_eq!(response.detail(), Some("admin only"));
}

#[test]
fn anyhow_context_chains_are_unwound() {
    let error = anyhow::Error::new(AccessDenied::new("no")).context("loading report");
    let failure: &(dyn Error + 'static) = error.as_ref();

    let response = manager().classify(failure).unwrap();
    assert_eq!(response.status(), Some(&Status::FORBIDDEN));
}

#[test]
fn root_most_handled_cause_wins_over_outer_handled_failures() {
    #[derive(Debug, thiserror::Error)]
    #[error("sync failed")]
    struct SyncFailed(#[source] ReadTimeout);

    let registry = common::storage_builder()
        .register(|_: &SyncFailed| Problem::conflict("sync_failed"))
        .register(|_: &Storage| Problem::service_unavailable("storage_unavailable"))
        .build()
        .unwrap();
    let m = ClassificationManager::builder(Arc::new(registry)).build();

    let response = m.classify(&SyncFailed(ReadTimeout::new(500))).unwrap();
    assert_eq!(response.type_uri(), "storage_unavailable");

    let response = m.classify(&common::wrap("retrying", SyncFailed(ReadTimeout::new(1))));
    assert_eq!(response.unwrap().type_uri(), "storage_unavailable");
}

#[test]
fn catch_all_applies_to_the_root_cause() {
    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct Unknown;

    let registry = common::storage_builder()
        .register_any(|failure| general::INTERNAL_SERVER_ERROR.with_detail(failure.to_string()))
        .build()
        .unwrap();
    let m = ClassificationManager::builder(Arc::new(registry)).build();

    let response = m.classify(&common::wrap("saving draft", Unknown)).unwrap();
    assert_eq!(response.detail(), Some("disk on fire"));
}

#[test]
fn customizers_run_in_order_and_see_earlier_edits() {
    let catalog = StaticMessageSource::new()
        .with_message(None, "problem.access_denied", "Denied (request {0})");
    let m = ClassificationManager::builder(Arc::new(common::registry()))
        .customizer(RequestIdCustomizer::default())
        .customizer(MessageCatalogCustomizer::new(Arc::new(catalog)))
        .customizer(|ctx: &CustomizeContext<'_>, response: &mut ResponseProblem| {
            let seen = response.title().unwrap_or_default().to_owned();
            response.with_property("seen_title", seen);
            response.with_property("failure", ctx.failure().to_string());
        })
        .build();

    let scope = RequestScope::new().with_request_id("r-42");
    let response = m.classify_in(&AccessDenied::new("admin only"), &scope).unwrap();

    assert_eq!(response.title(), Some("Denied (request r-42)"));
    let properties = response.properties().unwrap();
    assert_eq!(properties["request_id"], json!("r-42"));
    assert_eq!(properties["seen_title"], json!("Denied (request r-42)"));
    assert_eq!(properties["failure"], json!("admin only"));
    assert!(response.problem().properties().is_none());
}

#[test]
fn scope_registry_overrides_the_global_one() {
    let global = Arc::new(common::registry());
    let local = global
        .scope()
        .register(|_: &Storage| Problem::service_unavailable("tenant_storage_down"))
        .build()
        .unwrap();
    let m = ClassificationManager::builder(Arc::clone(&global)).build();
    let scope = RequestScope::new().with_registry(Arc::new(local));

    let response = m.classify_in(&ReadTimeout::new(5), &scope).unwrap();
    assert_eq!(response.type_uri(), "tenant_storage_down");

    let response = m.classify_in(&AccessDenied::new("x"), &scope).unwrap();
    assert_eq!(response.type_uri(), "access_denied");

    let response = m.classify(&ReadTimeout::new(5)).unwrap();
    assert_eq!(response.type_uri(), "storage_timeout");
}

#[test]
fn unclassified_failures_fall_back_to_internal_server_error() {
    #[derive(Debug, thiserror::Error)]
    #[error("mystery")]
    struct Mystery;

    let m = ClassificationManager::builder(Arc::new(common::registry()))
        .customizer(RequestIdCustomizer::default())
        .build();
    let scope = RequestScope::new().with_request_id("r-1");

    assert!(m.classify_in(&Mystery, &scope).is_none());
    let response = m.classify_or_default(&Mystery, &scope);
    assert_eq!(response.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.properties().unwrap()["request_id"], json!("r-1"));
}

#[test]
fn manager_is_assembled_from_configuration() {
    let figment = Figment::new().merge(Yaml::string(
        r"
problem:
  unwrap_limit: 1
  request_id_key: trace_id
  type_base_uri: https://errors.example.com/
  messages:
    enabled: true
",
    ));
    let config = ClassifierConfig::from_figment(&figment).unwrap();
    let registry = problem_classify::register_defaults(config.registry_builder())
        .build()
        .unwrap();
    let m = ClassificationManager::from_config(
        Arc::new(registry),
        &config,
        Some(Arc::new(StaticMessageSource::builtin())),
    );
    assert_eq!(m.unwrap_limit(), 1);

    let scope = RequestScope::new().with_request_id("r-9");
    let failure = common::wrap("outer", AccessDenied::new(""));
    let response = m.classify_in(&failure, &scope).unwrap();
    assert_eq!(response.type_uri(), "https://errors.example.com/access_denied");
    assert!(response.title().is_some());
    assert_eq!(response.properties().unwrap()["trace_id"], json!("r-9"));

    assert!(m.classify_in(&common::nested_access_denied(), &scope).is_none());
}

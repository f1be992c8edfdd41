//! Integration tests for REST API endpoints
//!
//! Exercises login, permission checks, provisioning, status, deprovisioning
//! and the DNS endpoints through the router.

mod common;

use axum::http::StatusCode;
use common::{ENGINEER, HR_ADMIN, IT_ADMIN};
use serde_json::{json, Value};
use ws_directory::mock::BindPlan;
use ws_directory::DirectoryState;
use ws_orchestrator::{ResourceKind, Workspace, WorkspaceStatus};

#[tokio::test]
async fn test_health_needs_no_identity() {
    let t = common::test_app().await;

    let response = t.send("GET", "/health", &[], None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = t.send("GET", "/health/ready", &[], None).await;
    let body: Value = common::extract_json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["cluster"]["reachable"], true);
    assert_eq!(body["cluster"]["readyNodes"], 1);
    assert_eq!(body["directory"]["status"], "enabled");
    assert_eq!(body["directory"]["domain"], "innovatech.local");
}

#[tokio::test]
async fn test_readiness_reports_cluster_outage_and_disabled_directory() {
    let t = common::test_app_with(
        common::directory(),
        DirectoryState::Disabled {
            reason: "directory not enabled".to_string(),
        },
    )
    .await;
    t.cluster.fail_node_listing("connection refused");

    let response = t.send("GET", "/health/ready", &[], None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::extract_json_body(response).await;

    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["cluster"]["reachable"], false);
    assert!(body["cluster"]["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(body["directory"]["status"], "disabled");
    assert_eq!(body["directory"]["reason"], "directory not enabled");
}

#[tokio::test]
async fn test_login_returns_identity_with_permissions() {
    let t = common::test_app().await;

    let response = t
        .send(
            "POST",
            "/api/v1/auth/login",
            &[],
            Some(json!({ "username": "ada", "password": "correct horse" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::extract_json_body(response).await;
    assert_eq!(body["username"], "ada");
    assert_eq!(body["displayName"], "Ada Lovelace");
    assert_eq!(body["groups"], json!(["HR-Admins", "Engineering"]));
    assert_eq!(body["permissions"]["employees"], json!(["create", "read", "update", "delete"]));
    assert_eq!(body["permissions"]["workspaces"], json!(["create", "read", "delete"]));
    assert_eq!(body["permissions"]["monitoring"], json!([]));
}

#[tokio::test]
async fn test_login_rejected_is_unauthorized() {
    let t = common::test_app().await;

    let response = t
        .send(
            "POST",
            "/api/v1/auth/login",
            &[],
            Some(json!({ "username": "ada", "password": "wrong" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(t.directory.open_connections(), 0);
}

#[tokio::test]
async fn test_login_with_directory_disabled() {
    let t = common::test_app_with(
        common::directory(),
        DirectoryState::Disabled {
            reason: "directory not enabled".to_string(),
        },
    )
    .await;

    let response = t
        .send(
            "POST",
            "/api/v1/auth/login",
            &[],
            Some(json!({ "username": "ada", "password": "correct horse" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(t.directory.connects(), 0);
}

#[tokio::test]
async fn test_login_with_unreachable_directory() {
    let t = common::test_app_with(
        common::directory().with_bind_plan(BindPlan::Fail),
        common::enabled_directory(),
    )
    .await;

    let response = t
        .send(
            "POST",
            "/api/v1/auth/login",
            &[],
            Some(json!({ "username": "ada", "password": "correct horse" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = common::extract_json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_identity() {
    let t = common::test_app().await;

    let response = t.send("GET", "/api/v1/workspaces", &[], None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_engineer_cannot_provision() {
    let t = common::test_app().await;

    let response = t
        .send("POST", "/api/v1/workspaces/provision/emp-ada", ENGINEER, None)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(t.cluster.calls().is_empty());
}

#[tokio::test]
async fn test_provision_status_and_deprovision() {
    let t = common::test_app().await;

    let response = t
        .send("POST", "/api/v1/workspaces/provision/emp-ada", HR_ADMIN, None)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let workspace: Workspace = common::extract_json_body(response).await;
    assert_eq!(workspace.name, "ada-lovelace");
    assert_eq!(workspace.status, WorkspaceStatus::Provisioning);
    assert_eq!(workspace.url, "https://ada.lovelace.innovatech.local");

    let response = t
        .send("GET", "/api/v1/workspaces/employee/emp-ada", ENGINEER, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Workspace = common::extract_json_body(response).await;
    assert_eq!(fetched.workspace_id, workspace.workspace_id);

    t.cluster
        .set_workload_state(ws_orchestrator::WorkloadPhase::Running, true);
    let response = t
        .send("GET", "/api/v1/workspaces/employee/emp-ada/status", ENGINEER, None)
        .await;
    let status: Value = common::extract_json_body(response).await;
    assert_eq!(status["status"], "active");
    assert_eq!(status["ready"], true);

    let response = t.send("GET", "/api/v1/workspaces", ENGINEER, None).await;
    let listed: Vec<Workspace> = common::extract_json_body(response).await;
    assert_eq!(listed.len(), 1);

    let response = t.send("DELETE", "/api/v1/workspaces/emp-ada", IT_ADMIN, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::extract_json_body(response).await;
    assert_eq!(body["workspace"]["status"], "terminated");
    assert!(t.cluster.resources().is_empty());

    let response = t.send("DELETE", "/api/v1/workspaces/emp-ada", IT_ADMIN, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = common::extract_json_body(response).await;
    assert_eq!(body["message"], "No workspace to deprovision");
}

#[tokio::test]
async fn test_provision_twice_conflicts() {
    let t = common::test_app().await;

    let first = t
        .send("POST", "/api/v1/workspaces/provision/emp-ada", HR_ADMIN, None)
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = t
        .send("POST", "/api/v1/workspaces/provision/emp-ada", HR_ADMIN, None)
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_provision_unknown_employee_is_not_found() {
    let t = common::test_app().await;

    let response = t
        .send("POST", "/api/v1/workspaces/provision/emp-nobody", HR_ADMIN, None)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provision_cluster_failure_is_bad_gateway() {
    let t = common::test_app().await;
    t.cluster.fail_create(ResourceKind::Service);

    let response = t
        .send("POST", "/api/v1/workspaces/provision/emp-ada", HR_ADMIN, None)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(t.cluster.resources().is_empty());
}

#[tokio::test]
async fn test_dns_lookup_and_remove() {
    let t = common::test_app().await;
    t.send("POST", "/api/v1/workspaces/provision/emp-ada", HR_ADMIN, None)
        .await;

    let response = t.send("GET", "/api/v1/dns/emp-ada", ENGINEER, None).await;
    let lookup: Value = common::extract_json_body(response).await;
    assert_eq!(lookup["hostname"], "ada.lovelace.innovatech.local");
    assert_eq!(lookup["exists"], true);
    assert_eq!(lookup["addresses"], json!(["10.0.1.5"]));

    let response = t.send("DELETE", "/api/v1/dns/emp-ada", ENGINEER, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for expected in [true, false] {
        let response = t.send("DELETE", "/api/v1/dns/emp-ada", HR_ADMIN, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let removal: Value = common::extract_json_body(response).await;
        assert_eq!(removal["removed"], expected);
    }
    assert!(t.zone.is_empty());
}

#[tokio::test]
async fn test_directory_endpoints_require_monitoring_read() {
    let t = common::test_app().await;

    let response = t
        .send("GET", "/api/v1/auth/directory/health", HR_ADMIN, None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = t
        .send("GET", "/api/v1/auth/directory/health", IT_ADMIN, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = common::extract_json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["domain"], "innovatech.local");

    let response = t
        .send("POST", "/api/v1/auth/directory/refresh", HR_ADMIN, None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = t
        .send("POST", "/api/v1/auth/directory/refresh", IT_ADMIN, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: Value = common::extract_json_body(response).await;
    assert_eq!(refreshed["enabled"], true);
}

//! Common test utilities and helpers for ws-api tests
//!
//! Builds the router over an in-memory database, the fake cluster, an
//! in-memory DNS zone and a scripted directory.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use ws_api::{create_app, AppState};
use ws_directory::mock::ScriptedConnector;
use ws_directory::{
    DirectoryAuthenticator, DirectoryConfig, DirectoryEntry, DirectorySettings, DirectoryState, RetryPolicy,
};
use ws_dns::memory::InMemoryDnsProvider;
use ws_dns::{DnsSettings, DnsSynchronizer};
use ws_orchestrator::test_utils::{create_test_db, employee, FakeCluster};
use ws_orchestrator::{ClusterNodes, ProvisionSettings, SqliteStore, WorkspaceOrchestrator};

pub const HR_ADMIN: &[(&str, &str)] = &[("x-ws-user", "hr.admin"), ("x-ws-groups", "HR-Admins")];
pub const IT_ADMIN: &[(&str, &str)] = &[("x-ws-user", "it.admin"), ("x-ws-groups", "IT-Admins")];
pub const ENGINEER: &[(&str, &str)] = &[("x-ws-user", "eng"), ("x-ws-groups", "Engineering")];

pub struct TestApp {
    pub app: Router,
    pub cluster: FakeCluster,
    pub zone: InMemoryDnsProvider,
    pub directory: ScriptedConnector,
}

pub fn directory() -> ScriptedConnector {
    ScriptedConnector::new()
        .with_account("ada@innovatech.local", "correct horse")
        .with_account("svc@innovatech.local", "svc-pass")
        .with_entry(
            "ada",
            DirectoryEntry::new("CN=Ada Lovelace,OU=People,DC=innovatech,DC=local")
                .with_attribute(
                    "memberOf",
                    &[
                        "CN=HR-Admins,OU=Groups,DC=innovatech,DC=local",
                        "CN=Engineering,OU=Groups,DC=innovatech,DC=local",
                    ],
                )
                .with_attribute("displayName", &["Ada Lovelace"])
                .with_attribute("mail", &["ada.lovelace@innovatech.com"]),
        )
}

pub fn enabled_directory() -> DirectoryState {
    let config = DirectoryConfig::new(
        "ldap://10.0.56.171:389",
        "DC=innovatech,DC=local",
        Duration::from_secs(5),
    )
    .expect("valid directory config")
    .with_service_account("svc", "svc-pass");
    DirectoryState::Enabled(Arc::new(config))
}

pub async fn test_app() -> TestApp {
    test_app_with(directory(), enabled_directory()).await
}

pub async fn test_app_with(directory: ScriptedConnector, state: DirectoryState) -> TestApp {
    let store = SqliteStore::new(create_test_db().await);
    store
        .insert_employee(&employee("emp-ada", "Ada", "Lovelace"))
        .await
        .expect("Failed to seed employee");

    let cluster = FakeCluster::new();
    cluster.set_nodes(vec![Ipv4Addr::new(10, 0, 1, 5)]);
    let zone = InMemoryDnsProvider::new();
    let dns = DnsSynchronizer::new(Arc::new(zone.clone()), DnsSettings::new("innovatech.local"))
        .with_node_addresses(Arc::new(ClusterNodes(Arc::new(cluster.clone()))));

    let orchestrator = WorkspaceOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(cluster.clone()),
        Arc::new(dns),
        ProvisionSettings::default(),
    );

    let authenticator = DirectoryAuthenticator::new(
        Arc::new(DirectorySettings::fixed(state)),
        Arc::new(directory.clone()),
    )
    .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));

    TestApp {
        app: create_app(AppState::new(store, orchestrator, Arc::new(authenticator))),
        cluster,
        zone,
        directory,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.app.clone().oneshot(request).await.unwrap()
    }
}

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: Response<Body>) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

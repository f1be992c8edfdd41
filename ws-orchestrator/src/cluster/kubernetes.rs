//! Kubernetes implementation of [`ClusterClient`].

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, PersistentVolumeClaim, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

use super::{ClusterClient, ClusterError, ResourceKind, WorkloadPhase, WorkloadState, WorkspaceSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub namespace: String,
    pub image: String,
    pub storage_class: String,
    pub storage_size: String,
    pub ingress_class: String,
    pub service_account: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            namespace: "workspaces".to_string(),
            image: "employee-workspace:latest".to_string(),
            storage_class: "workspace-storage".to_string(),
            storage_size: "10Gi".to_string(),
            ingress_class: "alb".to_string(),
            service_account: "workspace-provisioner".to_string(),
        }
    }
}

/// Resource manifests for a workspace.
pub mod manifests {
    use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Secret, Service};
    use k8s_openapi::api::networking::v1::Ingress;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use ws_core::naming::sanitize_label;

    use super::ClusterSettings;
    use crate::cluster::{ClusterError, ResourceKind, WorkspaceSpec};

    pub const CONTAINER_PORT: i32 = 8080;
    pub const SERVICE_PORT: i32 = 80;
    pub const PASSWORD_KEY: &str = "password";
    const RUN_AS_USER: i64 = 1000;

    fn build<T: DeserializeOwned>(kind: ResourceKind, value: Value) -> Result<T, ClusterError> {
        serde_json::from_value(value).map_err(|e| ClusterError::Api(format!("invalid {kind} manifest: {e}")))
    }

    pub fn storage_claim(spec: &WorkspaceSpec, settings: &ClusterSettings) -> Result<PersistentVolumeClaim, ClusterError> {
        build(
            ResourceKind::StorageClaim,
            json!({
                "apiVersion": "v1",
                "kind": "PersistentVolumeClaim",
                "metadata": {
                    "name": ResourceKind::StorageClaim.resource_name(&spec.name),
                    "namespace": settings.namespace,
                    "labels": { "app": "workspace", "employee": spec.name },
                },
                "spec": {
                    "accessModes": ["ReadWriteOnce"],
                    "storageClassName": settings.storage_class,
                    "resources": { "requests": { "storage": settings.storage_size } },
                },
            }),
        )
    }

    pub fn secret(spec: &WorkspaceSpec, settings: &ClusterSettings) -> Result<Secret, ClusterError> {
        build(
            ResourceKind::Secret,
            json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {
                    "name": ResourceKind::Secret.resource_name(&spec.name),
                    "namespace": settings.namespace,
                    "labels": { "app": "workspace", "employee": spec.name },
                },
                "type": "Opaque",
                "stringData": { "password": spec.password },
            }),
        )
    }

    pub fn workload(spec: &WorkspaceSpec, settings: &ClusterSettings) -> Result<Pod, ClusterError> {
        let claim = ResourceKind::StorageClaim.resource_name(&spec.name);
        let secret = ResourceKind::Secret.resource_name(&spec.name);

        build(
            ResourceKind::Workload,
            json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {
                    "name": ResourceKind::Workload.resource_name(&spec.name),
                    "namespace": settings.namespace,
                    "labels": {
                        "app": "workspace",
                        "employee": spec.name,
                        "role": sanitize_label(&spec.employee.role),
                        "workspace-id": spec.workspace_id,
                    },
                },
                "spec": {
                    "serviceAccountName": settings.service_account,
                    "containers": [{
                        "name": "code-server",
                        "image": settings.image,
                        "imagePullPolicy": "Always",
                        "ports": [{ "containerPort": CONTAINER_PORT, "name": "http" }],
                        "env": [
                            { "name": "EMPLOYEE_ID", "value": spec.employee.employee_id },
                            { "name": "EMPLOYEE_EMAIL", "value": spec.employee.email },
                            { "name": "EMPLOYEE_ROLE", "value": spec.employee.role },
                            {
                                "name": "PASSWORD",
                                "valueFrom": { "secretKeyRef": { "name": secret, "key": PASSWORD_KEY } },
                            },
                        ],
                        "volumeMounts": [
                            { "name": "workspace-storage", "mountPath": "/home/coder/workspace" },
                            { "name": "tmp", "mountPath": "/tmp" },
                        ],
                        "resources": {
                            "requests": { "memory": "1Gi", "cpu": "500m" },
                            "limits": { "memory": "2Gi", "cpu": "1000m" },
                        },
                        "securityContext": {
                            "runAsNonRoot": true,
                            "runAsUser": RUN_AS_USER,
                            "allowPrivilegeEscalation": false,
                            "capabilities": { "drop": ["ALL"] },
                        },
                    }],
                    "volumes": [
                        { "name": "workspace-storage", "persistentVolumeClaim": { "claimName": claim } },
                        { "name": "tmp", "emptyDir": {} },
                    ],
                },
            }),
        )
    }

    pub fn service(spec: &WorkspaceSpec, settings: &ClusterSettings) -> Result<Service, ClusterError> {
        build(
            ResourceKind::Service,
            json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": {
                    "name": ResourceKind::Service.resource_name(&spec.name),
                    "namespace": settings.namespace,
                    "labels": { "app": "workspace", "employee": spec.name },
                },
                "spec": {
                    "type": "ClusterIP",
                    "selector": { "employee": spec.name },
                    "ports": [{ "protocol": "TCP", "port": SERVICE_PORT, "targetPort": CONTAINER_PORT }],
                },
            }),
        )
    }

    pub fn ingress(spec: &WorkspaceSpec, settings: &ClusterSettings) -> Result<Ingress, ClusterError> {
        let annotations = if settings.ingress_class == "alb" {
            json!({
                "alb.ingress.kubernetes.io/scheme": "internet-facing",
                "alb.ingress.kubernetes.io/target-type": "ip",
                "alb.ingress.kubernetes.io/listen-ports": r#"[{"HTTPS":443}]"#,
                "alb.ingress.kubernetes.io/ssl-redirect": "443",
            })
        } else {
            json!({})
        };

        build(
            ResourceKind::Ingress,
            json!({
                "apiVersion": "networking.k8s.io/v1",
                "kind": "Ingress",
                "metadata": {
                    "name": ResourceKind::Ingress.resource_name(&spec.name),
                    "namespace": settings.namespace,
                    "labels": { "app": "workspace", "employee": spec.name },
                    "annotations": annotations,
                },
                "spec": {
                    "ingressClassName": settings.ingress_class,
                    "rules": [{
                        "host": spec.hostname,
                        "http": {
                            "paths": [{
                                "path": "/",
                                "pathType": "Prefix",
                                "backend": {
                                    "service": {
                                        "name": ResourceKind::Service.resource_name(&spec.name),
                                        "port": { "number": SERVICE_PORT },
                                    },
                                },
                            }],
                        },
                    }],
                },
            }),
        )
    }
}

pub struct KubeCluster {
    client: Client,
    settings: ClusterSettings,
}

impl KubeCluster {
    pub fn new(client: Client, settings: ClusterSettings) -> Self {
        Self { client, settings }
    }

    /// In-cluster config, falling back to the local kubeconfig.
    pub async fn try_default(settings: ClusterSettings) -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Config(format!("failed to create k8s client: {e}")))?;
        Ok(Self::new(client, settings))
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.settings.namespace)
    }

    async fn create_object<K>(&self, kind: ResourceKind, object: K) -> Result<(), ClusterError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let name = object.meta().name.clone().unwrap_or_default();
        self.api::<K>()
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| ClusterError::Create {
                kind,
                name: name.clone(),
                message: e.to_string(),
            })?;

        info!(%kind, %name, namespace = %self.settings.namespace, "Created cluster resource");
        Ok(())
    }

    async fn delete_object<K>(&self, kind: ResourceKind, name: &str) -> Result<(), ClusterError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        match self.api::<K>().delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(%kind, name, "Deleted cluster resource");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(%kind, name, "Cluster resource already absent");
                Ok(())
            }
            Err(e) => Err(ClusterError::Delete {
                kind,
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn create(&self, kind: ResourceKind, spec: &WorkspaceSpec) -> Result<(), ClusterError> {
        match kind {
            ResourceKind::StorageClaim => {
                self.create_object(kind, manifests::storage_claim(spec, &self.settings)?)
                    .await
            }
            ResourceKind::Secret => self.create_object(kind, manifests::secret(spec, &self.settings)?).await,
            ResourceKind::Workload => self.create_object(kind, manifests::workload(spec, &self.settings)?).await,
            ResourceKind::Service => self.create_object(kind, manifests::service(spec, &self.settings)?).await,
            ResourceKind::Ingress => self.create_object(kind, manifests::ingress(spec, &self.settings)?).await,
        }
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ClusterError> {
        match kind {
            ResourceKind::StorageClaim => self.delete_object::<PersistentVolumeClaim>(kind, name).await,
            ResourceKind::Secret => self.delete_object::<Secret>(kind, name).await,
            ResourceKind::Workload => self.delete_object::<Pod>(kind, name).await,
            ResourceKind::Service => self.delete_object::<Service>(kind, name).await,
            ResourceKind::Ingress => self.delete_object::<Ingress>(kind, name).await,
        }
    }

    async fn list_node_addresses(&self) -> Result<Vec<Ipv4Addr>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::Api(format!("failed to list nodes: {e}")))?;

        let mut addresses = Vec::new();
        for node in nodes.items.iter().filter(|node| is_ready(node)) {
            let internal = node
                .status
                .as_ref()
                .and_then(|s| s.addresses.as_ref())
                .and_then(|addrs| addrs.iter().find(|a| a.type_ == "InternalIP"));

            match internal.map(|a| a.address.parse::<Ipv4Addr>()) {
                Some(Ok(ip)) => addresses.push(ip),
                Some(Err(_)) | None => {
                    warn!(node = ?node.metadata.name, "Ready node has no IPv4 InternalIP");
                }
            }
        }

        debug!(count = addresses.len(), "Listed ready node addresses");
        Ok(addresses)
    }

    async fn workload_state(&self, name: &str) -> Result<WorkloadState, ClusterError> {
        let pod = self
            .api::<Pod>()
            .get_opt(name)
            .await
            .map_err(|e| ClusterError::Api(format!("failed to read workload {name}: {e}")))?;

        let Some(pod) = pod else {
            return Ok(WorkloadState {
                phase: WorkloadPhase::Missing,
                ready: false,
            });
        };

        let status = pod.status.as_ref();
        let phase = status
            .and_then(|s| s.phase.as_deref())
            .map(WorkloadPhase::parse)
            .unwrap_or(WorkloadPhase::Unknown);
        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .map(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
            .unwrap_or(false);

        Ok(WorkloadState { phase, ready })
    }
}

fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
        .unwrap_or(false)
}

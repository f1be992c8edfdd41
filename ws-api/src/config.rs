use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use ws_dns::DnsSettings;
use ws_orchestrator::{ClusterSettings, ProvisionSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    // Cluster
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_storage_class")]
    pub storage_class: String,

    #[serde(default = "default_storage_size")]
    pub storage_size: String,

    #[serde(default = "default_ingress_class")]
    pub ingress_class: String,

    // DNS
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_hosted_zone_id")]
    pub hosted_zone_id: String,

    #[serde(default = "default_fallback_node_address")]
    pub fallback_node_address: Ipv4Addr,

    #[serde(default = "default_public_port")]
    pub public_port: u16,

    // Directory
    #[serde(default = "default_parameter_prefix")]
    pub parameter_prefix: String,

    #[serde(default = "default_directory_base_dn")]
    pub directory_base_dn: String,

    #[serde(default = "default_directory_timeout_ms")]
    pub directory_timeout_ms: u64,

    #[serde(default = "default_aws_region")]
    pub aws_region: String,
}

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

fn default_bind_addr() -> String {
    env_or("WS_API_BIND", "0.0.0.0:3121")
}

fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("WS_API_DB_PATH") {
        return PathBuf::from(path);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".ws").join("api").join("workspaces.db")
}

fn default_namespace() -> String {
    env_or("WS_NAMESPACE", "workspaces")
}

fn default_image() -> String {
    env_or("WS_IMAGE", "employee-workspace:latest")
}

fn default_storage_class() -> String {
    env_or("WS_STORAGE_CLASS", "workspace-storage")
}

fn default_storage_size() -> String {
    env_or("WS_STORAGE_SIZE", "10Gi")
}

fn default_ingress_class() -> String {
    env_or("WS_INGRESS_CLASS", "alb")
}

fn default_domain() -> String {
    env_or("WS_DOMAIN", "innovatech.local")
}

// No usable default; Route 53 setup fails at startup when unset.
fn default_hosted_zone_id() -> String {
    env_or("WS_HOSTED_ZONE_ID", "")
}

fn default_fallback_node_address() -> Ipv4Addr {
    env_parsed("WS_FALLBACK_NODE_ADDRESS", Ipv4Addr::LOCALHOST)
}

fn default_public_port() -> u16 {
    env_parsed("WS_PUBLIC_PORT", 443)
}

fn default_parameter_prefix() -> String {
    env_or("WS_PARAMETER_PREFIX", "/workspaces")
}

fn default_directory_base_dn() -> String {
    env_or("WS_DIRECTORY_BASE_DN", "DC=innovatech,DC=local")
}

fn default_directory_timeout_ms() -> u64 {
    env_parsed("WS_DIRECTORY_TIMEOUT_MS", 5000)
}

fn default_aws_region() -> String {
    env_or("AWS_REGION", "eu-west-1")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            namespace: default_namespace(),
            image: default_image(),
            storage_class: default_storage_class(),
            storage_size: default_storage_size(),
            ingress_class: default_ingress_class(),
            domain: default_domain(),
            hosted_zone_id: default_hosted_zone_id(),
            fallback_node_address: default_fallback_node_address(),
            public_port: default_public_port(),
            parameter_prefix: default_parameter_prefix(),
            directory_base_dn: default_directory_base_dn(),
            directory_timeout_ms: default_directory_timeout_ms(),
            aws_region: default_aws_region(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn cluster_settings(&self) -> ClusterSettings {
        ClusterSettings {
            namespace: self.namespace.clone(),
            image: self.image.clone(),
            storage_class: self.storage_class.clone(),
            storage_size: self.storage_size.clone(),
            ingress_class: self.ingress_class.clone(),
            ..ClusterSettings::default()
        }
    }

    pub fn provision_settings(&self) -> ProvisionSettings {
        ProvisionSettings {
            fallback_address: self.fallback_node_address,
            public_port: self.public_port,
        }
    }

    pub fn dns_settings(&self) -> DnsSettings {
        DnsSettings::new(self.domain.clone())
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }
}

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use ws_api::{create_app, AppState, Config};
use ws_directory::{DirectoryAuthenticator, DirectorySettings, LdapConnector, SsmParameterSource};
use ws_dns::{DnsSynchronizer, Route53Provider};
use ws_orchestrator::{ClusterNodes, KubeCluster, SqliteStore, WorkspaceOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    ws_core::tracing_init::init_with_defaults("ws_api=debug,ws_orchestrator=debug,ws_directory=info,ws_dns=info,tower_http=debug")
        .context("Failed to initialize tracing")?;

    info!("Starting ws-api service...");

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        db_path = %config.db_path.display(),
        namespace = %config.namespace,
        domain = %config.domain,
        "Configuration loaded"
    );

    // Database setup
    let store = SqliteStore::connect(&config.db_path)
        .await
        .context("Failed to open the workspace database")?;

    // Cluster
    let cluster = Arc::new(
        KubeCluster::try_default(config.cluster_settings())
            .await
            .context("Failed to connect to the cluster")?,
    );

    // DNS
    let provider = Route53Provider::from_env(&config.aws_region, config.hosted_zone_id.clone())
        .await
        .context("Failed to set up Route 53")?;
    let dns = DnsSynchronizer::new(Arc::new(provider), config.dns_settings())
        .with_node_addresses(Arc::new(ClusterNodes(cluster.clone())));

    // Directory, loaded lazily on first login
    let parameters = SsmParameterSource::from_env(&config.aws_region).await;
    let settings = DirectorySettings::new(
        Arc::new(parameters),
        &config.parameter_prefix,
        config.directory_base_dn.clone(),
        config.directory_timeout(),
    );
    let authenticator = DirectoryAuthenticator::new(Arc::new(settings), Arc::new(LdapConnector::new()));

    let orchestrator = WorkspaceOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        cluster,
        Arc::new(dns),
        config.provision_settings(),
    );

    let app = create_app(AppState::new(store, orchestrator, Arc::new(authenticator)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use expert_governance::{
    AppState, DatabasePool, GovernanceConfig, GovernanceEngine, GovernanceStore, InMemoryStore,
    PgGovernanceStore, create_router,
    collab::{
        DisabledMl, DisabledWorkflow, HttpMlClient, HttpSecurityConfig, MlScoring,
        SecureHttpClient, WebhookWorkflowClient, WorkflowDispatch,
    },
    config::sanitize_for_logging,
};

/// How often stale rate-limit windows are dropped
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates all security requirements
    let config = GovernanceConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check EXPERT_GOV_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting expert governance server");
    info!(
        "Security settings: HTTPS required: {}, rate limit: {}/{}s",
        config.security.require_https,
        config.security.rate_limit_requests,
        config.security.rate_limit_window_secs
    );

    let store = create_store(&config).await?;
    let ml = create_ml_client(&config)?;
    let workflow = create_workflow_client(&config)?;

    if config.security.cron_secret.is_empty() {
        warn!("No cron secret configured - scheduled sweep endpoints will reject every call");
    }
    if config.security.webhook_secret.is_empty() {
        warn!("No webhook secret configured - workflow callbacks will be rejected");
    }

    let engine = GovernanceEngine::new(store, config.governance, ml, workflow);
    let state = AppState::new(engine, &config);

    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter.cleanup();
        }
    });

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Governance server listening on {}", bind_addr);

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging from configuration
fn init_logging(config: &GovernanceConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Logging initialized with data sanitization enabled");
    }

    Ok(())
}

/// PostgreSQL when enabled, otherwise the in-memory store
async fn create_store(config: &GovernanceConfig) -> Result<Arc<dyn GovernanceStore>> {
    if !config.database.postgres_enabled {
        warn!("PostgreSQL disabled - using in-memory store, state is lost on restart");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    info!(
        "Connecting to PostgreSQL at {}",
        sanitize_for_logging(&config.database.postgres_url)
    );
    let pool = DatabasePool::new(&config.database.postgres_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    pool.init_schema()
        .await
        .context("Failed to initialize governance schema")?;

    Ok(Arc::new(PgGovernanceStore::new(Arc::new(pool))))
}

fn http_client(config: &GovernanceConfig, url: &str, timeout: Duration) -> Result<SecureHttpClient> {
    let host = url::Url::parse(url)
        .with_context(|| format!("Invalid collaborator URL: {}", url))?
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Collaborator URL has no host: {}", url))?;

    SecureHttpClient::new(HttpSecurityConfig {
        require_https: config.security.require_https,
        timeout,
        allowed_hosts: vec![host],
        ..Default::default()
    })
    .context("Failed to create secure HTTP client")
}

fn create_ml_client(config: &GovernanceConfig) -> Result<Arc<dyn MlScoring>> {
    let base_url = &config.collaborators.ml_base_url;
    if base_url.is_empty() {
        warn!("No ML service configured - rate estimates use booking history only");
        return Ok(Arc::new(DisabledMl));
    }

    let http = http_client(config, base_url, config.collaborators.ml_timeout())?;
    info!("ML scoring service: {}", base_url);
    Ok(Arc::new(HttpMlClient::new(
        http,
        base_url.clone(),
        config.collaborators.ml_circuit_open(),
    )))
}

fn create_workflow_client(config: &GovernanceConfig) -> Result<Arc<dyn WorkflowDispatch>> {
    let url = &config.collaborators.workflow_webhook_url;
    if url.is_empty() {
        warn!("No workflow webhook configured - replenishment scrapes will not start");
        return Ok(Arc::new(DisabledWorkflow));
    }

    let http = http_client(
        config,
        url,
        Duration::from_secs(config.collaborators.workflow_timeout_secs),
    )?;
    info!("Workflow webhook: {}", sanitize_for_logging(url));
    Ok(Arc::new(WebhookWorkflowClient::new(
        http,
        url.clone(),
        config.security.webhook_secret.clone(),
    )))
}

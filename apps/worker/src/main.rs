//! Scholaris audit retention worker.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use scholaris_application::{AdministrationEngine, AdministrationPorts};
use scholaris_core::{AppError, AppResult, SystemClock};
use scholaris_infrastructure::{
    EngineConfig, PostgresAdministratorRepository, PostgresAuditLogRepository,
    PostgresAuditRepository, PostgresHierarchyEdgeLog, PostgresOrganizationDirectory,
    PostgresScopeRepository,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    purge_interval_secs: u64,
    run_once: bool,
    engine: EngineConfig,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let engine = build_engine(pool, config.engine);

    info!(
        retention_days = config.engine.audit_retention_days,
        purge_interval_secs = config.purge_interval_secs,
        run_once = config.run_once,
        "scholaris-worker started"
    );

    loop {
        if let Err(error) = engine
            .audit()
            .purge_older_than(config.engine.audit_retention_days)
            .await
        {
            if config.run_once {
                return Err(error);
            }
            warn!(error = %error, "audit retention pass failed");
        }

        if config.run_once {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(config.purge_interval_secs)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_engine(pool: PgPool, config: EngineConfig) -> AdministrationEngine {
    let ports = AdministrationPorts {
        administrators: Arc::new(PostgresAdministratorRepository::new(pool.clone())),
        scopes: Arc::new(PostgresScopeRepository::new(pool.clone())),
        directory: Arc::new(PostgresOrganizationDirectory::new(pool.clone())),
        hierarchy_edges: Arc::new(PostgresHierarchyEdgeLog::new(pool.clone())),
        audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
        audit_log: Arc::new(PostgresAuditLogRepository::new(pool)),
    };

    AdministrationEngine::new(ports, Arc::new(SystemClock), config.access_policy)
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let purge_interval_secs = parse_env_u64("AUDIT_PURGE_INTERVAL_SECS", 86_400)?;
        let run_once = parse_env_bool("AUDIT_PURGE_RUN_ONCE", false)?;
        let engine = EngineConfig::from_env()?;

        if purge_interval_secs == 0 {
            return Err(AppError::Validation(
                "AUDIT_PURGE_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            purge_interval_secs,
            run_once,
            engine,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<bool>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

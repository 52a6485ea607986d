//! Projects Backend
//!
//! Project lifecycle state machine and per-member field rights, backed by
//! SQLite. Transport, authentication and email delivery live outside this
//! crate and plug in through [`collaborators`].

pub mod api;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod models;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use api::{ApiResponse, Caller, CallerScope, ProjectApi};
pub use config::Config;
pub use errors::{AppError, Outcome};

use collaborators::{CategoryCatalog, NotificationService, UserDirectory};
use db::Repository;
use lifecycle::ProjectLifecycle;

/// Install the global tracing subscriber. Returns false if one was already set.
pub fn init_tracing(config: &Config) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.is_ok()
}

/// Open the database and wire the lifecycle with its collaborators.
pub async fn connect(
    config: Config,
    users: Arc<dyn UserDirectory>,
    categories: Arc<dyn CategoryCatalog>,
    notifier: Arc<dyn NotificationService>,
) -> Result<ProjectApi, AppError> {
    tracing::info!("Database path: {:?}", config.db_path);

    let pool = db::init_database(&config.db_path, config.db_max_connections).await?;
    let repo = Repository::new(pool);

    let lifecycle = ProjectLifecycle::new(repo, users, categories, notifier, Arc::new(config));
    Ok(ProjectApi::new(Arc::new(lifecycle)))
}

#[cfg(test)]
mod tests;

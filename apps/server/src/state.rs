//! Shared handler state, resolved at startup.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use enrichkit_core::{BatchRunner, ResultLogger};
use enrichkit_shared::{AppConfig, EnrichKitError, EnvConfig, Result};
use enrichkit_storage::Storage;

/// Components built from configuration.
///
/// The batch runner is built once; without complete configuration it is
/// absent and requests fail with the config error. The result logger opens
/// its database on first use and retries on later requests until it succeeds.
#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<AppConfig>,
    pub env: Arc<EnvConfig>,
    runner: Option<BatchRunner>,
    logger: Arc<OnceCell<ResultLogger>>,
}

impl AppState {
    /// Resolve every component the configuration allows.
    pub async fn build(config: AppConfig, env: EnvConfig) -> Self {
        let runner = match env
            .scrape_settings(&config)
            .and_then(|settings| BatchRunner::new(&settings))
        {
            Ok(runner) => Some(runner),
            Err(e) => {
                warn!(error = %e, "scrape endpoint disabled");
                None
            }
        };

        let state = Self::from_parts(config, env, runner, None);

        let logging = match state.logger().await {
            Ok(_) => true,
            Err(e @ EnrichKitError::Config { .. }) => {
                warn!(error = %e, "logging endpoint disabled");
                false
            }
            Err(e) => {
                warn!(error = %e, "audit database unavailable, will retry on demand");
                false
            }
        };

        info!(
            scrape = state.runner.is_some(),
            logging,
            "application state ready"
        );

        state
    }

    pub fn from_parts(
        config: AppConfig,
        env: EnvConfig,
        runner: Option<BatchRunner>,
        logger: Option<ResultLogger>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            env: Arc::new(env),
            runner,
            logger: Arc::new(OnceCell::new_with(logger)),
        }
    }

    /// The batch runner, or the configuration error explaining its absence.
    pub fn runner(&self) -> Result<&BatchRunner> {
        match &self.runner {
            Some(runner) => Ok(runner),
            None => {
                self.env.scrape_settings(&self.config)?;
                Err(EnrichKitError::config(
                    "batch runner could not be initialized; see startup logs",
                ))
            }
        }
    }

    /// The result logger, opening the audit database if no earlier attempt
    /// succeeded. Missing settings yield a config error; a database that
    /// cannot be opened yields its storage error.
    pub async fn logger(&self) -> Result<&ResultLogger> {
        if let Some(logger) = self.logger.get() {
            return Ok(logger);
        }

        let settings = self.env.database_settings(&self.config)?;
        self.logger
            .get_or_try_init(|| async {
                let storage = Storage::connect(&settings).await?;
                Ok::<_, EnrichKitError>(ResultLogger::new(Arc::new(storage)))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_env(url: String) -> EnvConfig {
        EnvConfig {
            database_url: Some(url),
            service_key: Some("svc".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_database_settings_is_config_error() {
        let state = AppState::build(AppConfig::default(), EnvConfig::default()).await;
        let err = state.logger().await.err().expect("no logger");
        assert!(matches!(err, EnrichKitError::Config { .. }));
    }

    #[tokio::test]
    async fn unopenable_database_is_retried_on_demand() {
        // A regular file where the database directory should be.
        let blocker = std::env::temp_dir().join(format!("ek_blocker_{}", uuid::Uuid::now_v7()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let url = format!("file:{}", blocker.join("audit.db").display());

        let state = AppState::build(AppConfig::default(), database_env(url)).await;

        let err = state.logger().await.err().expect("database blocked");
        assert!(!matches!(err, EnrichKitError::Config { .. }));

        std::fs::remove_file(&blocker).unwrap();
        state.logger().await.expect("opens once the path is usable");

        std::fs::remove_dir_all(&blocker).ok();
    }
}

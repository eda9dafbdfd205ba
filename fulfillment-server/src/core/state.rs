//! Server state shared by every handler

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::extraction::{CodeExtractor, DisabledExtractor, HttpOcrExtractor};
use crate::fulfillment::{FulfillmentRunner, PipelineContext, reconciler};
use crate::marketplace::{MarketplaceClient, OrderSource, ProductCatalog};
use crate::messaging::{Notifier, SmsGateway};
use crate::utils::{AppError, ErrorCode};

/// Server state
///
/// Cheap to clone; every field is shared.
///
/// | Field | Purpose |
/// |-------|---------|
/// | config | process configuration |
/// | pool | SQLite connection pool |
/// | runner | pipeline runs and the periodic trigger |
/// | notifier | customer messaging (also used for resends) |
/// | catalog | seller listings on the marketplace |
/// | extractor | image to voucher code extraction |
/// | tasks | background task registry |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub runner: Arc<FulfillmentRunner>,
    pub notifier: Arc<dyn Notifier>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub extractor: Arc<dyn CodeExtractor>,
    pub tasks: Arc<BackgroundTasks>,
}

impl ServerState {
    /// Open the database and build the external clients from configuration
    ///
    /// Missing credentials only warn in development; production refuses to
    /// start without them.
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        check_credentials(config)?;

        let db = DbService::new(&config.database_path).await?;

        let marketplace = Arc::new(
            MarketplaceClient::new(
                config.marketplace.clone(),
                config.request_timeout(),
                config.collect_window_hours,
            )
            .map_err(|e| AppError::internal(format!("Failed to build marketplace client: {e}")))?,
        );

        let notifier = SmsGateway::new(config.sms.clone(), config.request_timeout())
            .map_err(|e| AppError::internal(format!("Failed to build SMS gateway: {e}")))?;

        let extractor: Arc<dyn CodeExtractor> = match &config.ocr_service_url {
            Some(url) => Arc::new(
                HttpOcrExtractor::new(url.clone(), config.request_timeout())
                    .map_err(|e| AppError::internal(format!("Failed to build OCR client: {e}")))?,
            ),
            None => {
                tracing::info!("OCR_SERVICE_URL not set, image code extraction disabled");
                Arc::new(DisabledExtractor)
            }
        };

        Ok(Self::with_components(
            config.clone(),
            db.pool,
            marketplace.clone(),
            marketplace,
            Arc::new(notifier),
            extractor,
        ))
    }

    /// Assemble state from prebuilt collaborators
    pub fn with_components(
        config: Config,
        pool: SqlitePool,
        source: Arc<dyn OrderSource>,
        catalog: Arc<dyn ProductCatalog>,
        notifier: Arc<dyn Notifier>,
        extractor: Arc<dyn CodeExtractor>,
    ) -> Self {
        let ctx = PipelineContext {
            pool: pool.clone(),
            source,
            notifier: notifier.clone(),
            store_name: config.store_name.clone(),
        };
        Self {
            config: Arc::new(config),
            pool,
            runner: Arc::new(FulfillmentRunner::new(ctx)),
            notifier,
            catalog,
            extractor,
            tasks: Arc::new(BackgroundTasks::new()),
        }
    }

    /// Start the periodic collect-then-process trigger
    pub fn start_schedule(&self, interval_secs: u64) -> Result<u64, AppError> {
        let task = self.runner.start(interval_secs)?;
        self.tasks.spawn("scheduled_collection", TaskKind::Periodic, task);
        Ok(self.runner.status().interval_secs)
    }

    /// Startup work: auto collection and leftover reconciliation
    pub fn start_background_tasks(&self) {
        let ctx = self.runner.context().clone();
        self.tasks.spawn("startup_reconcile", TaskKind::Warmup, async move {
            reconciler::retry_unreconciled(&ctx, reconciler::RECONCILE_BATCH).await;
        });

        if self.config.auto_collect
            && let Err(e) = self.start_schedule(self.config.collect_interval_secs)
        {
            tracing::warn!(error = %e, "Failed to start scheduled collection");
        }
        self.tasks.log_summary();
    }

    /// Stop the trigger and wait for background tasks
    pub async fn shutdown(&self) {
        self.runner.shutdown();
        self.tasks.shutdown().await;
    }
}

fn check_credentials(config: &Config) -> Result<(), AppError> {
    let mut missing = Vec::new();
    if config.marketplace.stored_token().is_none() && !config.marketplace.can_issue_token() {
        missing.push("MARKETPLACE_CLIENT_ID/MARKETPLACE_CLIENT_SECRET");
    }
    if !config.sms.is_configured() {
        missing.push("SMS_ACCESS_KEY/SMS_SECRET_KEY/SMS_SERVICE_ID/SMS_SENDER");
    }
    if missing.is_empty() {
        return Ok(());
    }

    let message = format!("Missing credentials: {}", missing.join(", "));
    if config.is_production() {
        return Err(AppError::with_message(ErrorCode::ConfigError, message));
    }
    tracing::warn!("{message}; related operations will fail until configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_credentials() {
        let mut config = Config::with_work_dir("/tmp/unused");
        assert!(check_credentials(&config).is_ok());

        config.environment = "production".into();
        let err = check_credentials(&config).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }
}

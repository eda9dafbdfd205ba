//! Pipeline run coordination
//!
//! One run lock arbitrates the periodic trigger and manual API triggers: a
//! trigger that finds a run in flight is rejected (manual) or skipped
//! (scheduled). Run counters live in [`PipelineStatus`], owned by the runner
//! and read through [`FulfillmentRunner::status`].
//!
//! Every run executes on its own task. A caller that stops waiting (an HTTP
//! client disconnecting, a timeout) detaches from the run instead of
//! cancelling it, so an order is never abandoned between delivery and commit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{CollectOutcome, PipelineContext, ProcessOutcome, collect, process_pending_orders};
use crate::core::config::clamp_interval;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("A pipeline run is already in progress")]
    Busy,

    #[error("Scheduled collection is already running")]
    AlreadyScheduled,

    #[error("Scheduled collection is not running")]
    NotScheduled,

    #[error("Pipeline run aborted: {0}")]
    Aborted(String),
}

impl From<RunnerError> for AppError {
    fn from(err: RunnerError) -> Self {
        let code = match err {
            RunnerError::Busy => ErrorCode::PipelineBusy,
            RunnerError::AlreadyScheduled => ErrorCode::AutomationAlreadyRunning,
            RunnerError::NotScheduled => ErrorCode::AutomationNotRunning,
            RunnerError::Aborted(_) => ErrorCode::InternalError,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Observability counters, never used for control flow
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    /// Periodic trigger active
    pub scheduled: bool,
    pub interval_secs: u64,
    /// A run is in flight
    pub running: bool,
    pub last_collection_at: Option<i64>,
    pub last_new_orders: usize,
    pub total_collected: u64,
    pub last_processed_at: Option<i64>,
    pub total_processed: u64,
    pub total_completed: u64,
    pub failed_runs: u64,
    pub last_error: Option<String>,
}

impl PipelineStatus {
    fn record_collection(&mut self, outcome: &CollectOutcome) {
        self.last_collection_at = Some(now_millis());
        self.last_new_orders = outcome.new_orders;
        self.total_collected += outcome.new_orders as u64;
        if !outcome.success {
            self.failed_runs += 1;
            self.last_error = Some(outcome.message.clone());
        }
    }

    fn record_processing(&mut self, outcome: &ProcessOutcome) {
        self.last_processed_at = Some(now_millis());
        self.total_processed += outcome.processed as u64;
        self.total_completed += outcome.completed as u64;
        if !outcome.success {
            self.failed_runs += 1;
            self.last_error = Some(outcome.message.clone());
        }
    }
}

/// Marks a run in flight; cleared on drop, including when the run panics
struct RunningFlag<'a>(&'a Mutex<PipelineStatus>);

impl<'a> RunningFlag<'a> {
    fn raise(status: &'a Mutex<PipelineStatus>) -> Self {
        status.lock().running = true;
        Self(status)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.lock().running = false;
    }
}

/// Collection followed by processing
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub collect: CollectOutcome,
    pub process: ProcessOutcome,
}

/// Serializes pipeline runs and owns the periodic trigger
pub struct FulfillmentRunner {
    ctx: PipelineContext,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    status: Mutex<PipelineStatus>,
    schedule: Mutex<Option<CancellationToken>>,
    /// Stops processing between orders on server shutdown
    shutdown: CancellationToken,
}

impl FulfillmentRunner {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            status: Mutex::new(PipelineStatus::default()),
            schedule: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.lock().clone()
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.lock().is_some()
    }

    /// Collect new orders, then process everything pending
    pub async fn trigger_collection(self: &Arc<Self>) -> Result<CycleOutcome, RunnerError> {
        let runner = Arc::clone(self);
        self.detached(async move {
            let _running = RunningFlag::raise(&runner.status);

            let collect = collect(&runner.ctx).await;
            runner.status.lock().record_collection(&collect);

            let process = process_pending_orders(&runner.ctx, &runner.shutdown).await;
            runner.status.lock().record_processing(&process);

            CycleOutcome { collect, process }
        })
        .await
    }

    /// Process pending orders without collecting
    pub async fn trigger_processing(self: &Arc<Self>) -> Result<ProcessOutcome, RunnerError> {
        let runner = Arc::clone(self);
        self.detached(async move {
            let _running = RunningFlag::raise(&runner.status);

            let process = process_pending_orders(&runner.ctx, &runner.shutdown).await;
            runner.status.lock().record_processing(&process);
            process
        })
        .await
    }

    /// Take the run lock and drive `run` to completion on its own task
    ///
    /// The lock travels with the task, so it is held until the run ends even
    /// if the caller stops waiting.
    async fn detached<T, F>(&self, run: F) -> Result<T, RunnerError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let guard = Arc::clone(&self.run_lock)
            .try_lock_owned()
            .map_err(|_| RunnerError::Busy)?;

        let handle = tokio::spawn(async move {
            let _guard = guard;
            run.await
        });
        handle.await.map_err(|e| {
            tracing::error!(error = %e, "Pipeline run task failed");
            RunnerError::Aborted(e.to_string())
        })
    }

    /// Arm the periodic trigger, returning the loop to spawn
    ///
    /// The interval is clamped to the configured minimum. The first cycle
    /// runs immediately.
    pub fn start(self: &Arc<Self>, interval_secs: u64) -> Result<BoxFuture<'static, ()>, RunnerError> {
        let interval_secs = clamp_interval(interval_secs);
        let token = {
            let mut schedule = self.schedule.lock();
            if schedule.is_some() {
                return Err(RunnerError::AlreadyScheduled);
            }
            let token = self.shutdown.child_token();
            *schedule = Some(token.clone());
            token
        };
        {
            let mut status = self.status.lock();
            status.scheduled = true;
            status.interval_secs = interval_secs;
        }
        tracing::info!(interval_secs, "Scheduled collection started");

        let runner = Arc::clone(self);
        Ok(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        // A run that has started is never interrupted by stop()
                        if let Err(e) = runner.trigger_collection().await {
                            tracing::debug!(reason = %e, "Scheduled cycle skipped");
                        }
                    }
                }
            }
            tracing::info!("Scheduled collection loop exited");
        }
        .boxed())
    }

    /// Disarm the periodic trigger; an in-flight run completes normally
    pub fn stop(&self) -> Result<(), RunnerError> {
        let token = self
            .schedule
            .lock()
            .take()
            .ok_or(RunnerError::NotScheduled)?;
        token.cancel();
        self.status.lock().scheduled = false;
        tracing::info!("Scheduled collection stopped");
        Ok(())
    }

    /// Stop scheduling and let the current run end after its current order
    pub fn shutdown(&self) {
        self.schedule.lock().take();
        self.status.lock().scheduled = false;
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::marketplace::{MarketplaceError, OrderSource};
    use crate::messaging::Notifier;
    use async_trait::async_trait;
    use shared::models::OrderCreate;

    struct EmptySource;

    #[async_trait]
    impl OrderSource for EmptySource {
        async fn fetch_recent_orders(&self) -> Result<Vec<OrderCreate>, MarketplaceError> {
            Ok(Vec::new())
        }

        async fn mark_dispatched(&self, _order_number: &str) -> bool {
            true
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn send_text(&self, _phone: &str, _message: &str) -> bool {
            true
        }

        async fn send_image(&self, _phone: &str, _message: &str, _image: &[u8]) -> bool {
            true
        }
    }

    async fn runner() -> Arc<FulfillmentRunner> {
        let db = DbService::in_memory().await.unwrap();
        Arc::new(FulfillmentRunner::new(PipelineContext {
            pool: db.pool,
            source: Arc::new(EmptySource),
            notifier: Arc::new(SilentNotifier),
            store_name: "Shop".into(),
        }))
    }

    #[tokio::test]
    async fn test_manual_trigger_rejected_while_running() {
        let runner = runner().await;
        let guard = runner.run_lock.lock().await;
        assert!(matches!(
            runner.trigger_collection().await,
            Err(RunnerError::Busy)
        ));
        assert!(matches!(
            runner.trigger_processing().await,
            Err(RunnerError::Busy)
        ));
        drop(guard);

        let cycle = runner.trigger_collection().await.unwrap();
        assert!(cycle.collect.success);
        assert_eq!(cycle.process.processed, 0);

        let status = runner.status();
        assert!(!status.running);
        assert!(status.last_collection_at.is_some());
        assert!(status.last_processed_at.is_some());
    }

    #[tokio::test]
    async fn test_start_stop_schedule() {
        let runner = runner().await;
        let fut = runner.start(1).unwrap();
        assert!(matches!(runner.start(30), Err(RunnerError::AlreadyScheduled)));
        assert_eq!(runner.status().interval_secs, 10);

        let handle = tokio::spawn(fut);
        runner.stop().unwrap();
        assert!(matches!(runner.stop(), Err(RunnerError::NotScheduled)));
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!runner.status().scheduled);
        assert!(!runner.is_scheduled());
    }

    #[test]
    fn test_runner_errors_map_to_conflict_codes() {
        assert_eq!(AppError::from(RunnerError::Busy).code, ErrorCode::PipelineBusy);
        assert_eq!(
            AppError::from(RunnerError::NotScheduled).code,
            ErrorCode::AutomationNotRunning
        );
    }
}

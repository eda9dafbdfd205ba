//! Background task management
//!
//! Every long-running task of the server is spawned through
//! [`BackgroundTasks`] so that panics are logged and shutdown can wait for
//! all of them.
//!
//! # Task kinds
//!
//! - [`TaskKind::Warmup`] - one-shot startup work
//! - [`TaskKind::Periodic`] - timer-driven loop, ends when its trigger is stopped

use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Warmup,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Warmup => write!(f, "Warmup"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Background task registry
///
/// ```ignore
/// let tasks = BackgroundTasks::new();
/// tasks.spawn("scheduled_collection", TaskKind::Periodic, runner.start(30)?);
/// tasks.shutdown().await;
/// ```
#[derive(Default)]
pub struct BackgroundTasks {
    tasks: Mutex<Vec<RegisteredTask>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task wrapped so that a panic is logged instead of lost
    pub fn spawn<F>(&self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let wrapped_future = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => {
                    tracing::debug!(task = %name, kind = %kind, "Background task finished");
                }
                Err(panic_info) => {
                    let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_msg,
                        "Background task panicked"
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");

        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.handle.is_finished());
        tasks.push(RegisteredTask { name, kind, handle });
    }

    /// Tasks still running
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    pub fn log_summary(&self) {
        let tasks = self.tasks.lock();
        let periodic = tasks.iter().filter(|t| t.kind == TaskKind::Periodic).count();
        tracing::info!(
            total = tasks.len(),
            periodic,
            warmup = tasks.len() - periodic,
            "Background tasks registered"
        );
    }

    /// Wait for every task to finish
    ///
    /// Tasks are expected to observe their own cancellation tokens, which the
    /// caller cancels first.
    pub async fn shutdown(&self) {
        let tasks: Vec<RegisteredTask> = std::mem::take(&mut *self.tasks.lock());
        tracing::info!("Waiting for {} background tasks...", tasks.len());

        for task in tasks {
            match task.handle.await {
                Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

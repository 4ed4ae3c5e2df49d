//! Background task management
//!
//! Registers long-running tasks, catches their panics and shuts them down in
//! two phases: the shutdown token stops intake, and once the grace period has
//! elapsed the abort token stops in-flight store work.
//!
//! - [`TaskKind::Worker`] - long-running consumer (ingestion loop)
//! - [`TaskKind::Listener`] - network listener (TCP ingest)

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long an aborted task may take to observe the abort token
const ABORT_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Worker,
    Listener,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Listener => write!(f, "Listener"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Background task manager
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new(state.shutdown.clone());
/// tasks.spawn("ingest_loop", TaskKind::Worker, async move {
///     adapter.run(source, shutdown).await;
/// });
///
/// tasks.shutdown(grace, &state.abort).await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tasks: Vec::new(),
            shutdown,
        }
    }

    /// Token the registered tasks listen on
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register and start a background task.
    ///
    /// Panics inside the task are caught and logged.
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let wrapped_future = async move {
            let result: Result<(), Box<dyn std::any::Any + Send>> =
                AssertUnwindSafe(future).catch_unwind().await;
            match result {
                Ok(()) => {
                    if !shutdown.is_cancelled() {
                        tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                    }
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
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn log_summary(&self) {
        let listeners = self
            .tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Listener)
            .count();
        tracing::info!(
            "Background tasks registered: {} total (Worker: {}, Listener: {})",
            self.tasks.len(),
            self.tasks.len() - listeners,
            listeners
        );
    }

    /// Graceful shutdown.
    ///
    /// Cancels the shutdown token and waits up to `grace` for every task.
    /// Past the deadline `abort` is cancelled, and tasks that still do not
    /// finish are aborted.
    pub async fn shutdown(self, grace: Duration, abort: &CancellationToken) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        let deadline = Instant::now() + grace;
        for task in self.tasks {
            let mut handle = task.handle;
            let result = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(result) => result,
                Err(_) => {
                    if !abort.is_cancelled() {
                        tracing::warn!(grace_ms = grace.as_millis() as u64, "Grace period elapsed, aborting in-flight work");
                        abort.cancel();
                    }
                    match tokio::time::timeout(ABORT_WAIT, &mut handle).await {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::warn!(task = %task.name, "Task ignored abort, killing it");
                            handle.abort();
                            handle.await
                        }
                    }
                }
            };

            match result {
                Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_tasks_stop_on_shutdown() {
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        let mut tasks = BackgroundTasks::new(shutdown.clone());
        let stopped = Arc::new(AtomicBool::new(false));

        let token = tasks.shutdown_token();
        let flag = stopped.clone();
        tasks.spawn("waiter", TaskKind::Worker, async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(tasks.len(), 1);

        tasks.shutdown(Duration::from_secs(1), &abort).await;

        assert!(stopped.load(Ordering::SeqCst));
        assert!(shutdown.is_cancelled());
        assert!(!abort.is_cancelled());
    }

    #[tokio::test]
    async fn test_slow_task_gets_abort_signal() {
        let abort = CancellationToken::new();
        let mut tasks = BackgroundTasks::new(CancellationToken::new());

        // Ignores shutdown, only stops on abort
        let abort_seen = abort.clone();
        tasks.spawn("in_flight", TaskKind::Worker, async move {
            abort_seen.cancelled().await;
        });

        tasks.shutdown(Duration::from_millis(20), &abort).await;
        assert!(abort.is_cancelled());
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let mut tasks = BackgroundTasks::new(CancellationToken::new());
        tasks.spawn("boom", TaskKind::Listener, async {
            panic!("listener exploded");
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(tasks.tasks[0].handle.is_finished());

        // The caught panic does not surface as a join error
        tasks
            .shutdown(Duration::from_millis(10), &CancellationToken::new())
            .await;
    }
}

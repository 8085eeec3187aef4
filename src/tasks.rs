//! Async task queue for long-running operations.
//!
//! Tasks run as tokio tasks gated by a bounded semaphore (pool width 10).
//! Bodies are cooperative: they receive a [`TaskContext`] and are expected
//! to call [`TaskContext::check_cancelled`] and
//! [`TaskContext::update_progress`] at natural checkpoints. Cancellation
//! only flips the per-task flag; the body keeps running until its next
//! checkpoint and unwinds through its own cleanup, so side-effect windows
//! such as a target registry's IMPORT mode are closed before the task ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{Result, WardenError};

/// Width of the worker pool; also bounds write concurrency against upstreams.
pub const WORKER_POOL_SIZE: usize = 10;

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Migration,
    Sync,
    Cleanup,
    Export,
    Import,
}

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Snapshot of one task as served to callers.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct AsyncTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Percent complete in `[0, 100]`.
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
}

/// Handle passed into task bodies for cooperative progress and cancellation.
#[derive(Clone)]
pub struct TaskContext {
    task_id: String,
    cancel: Arc<AtomicBool>,
    tasks: Arc<DashMap<String, AsyncTask>>,
}

impl TaskContext {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Bail out with `TaskCancelled` when the cancel flag is set.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(WardenError::TaskCancelled {
                task_id: self.task_id.clone(),
            });
        }
        Ok(())
    }

    pub fn update_progress(&self, progress: f64) {
        if let Some(mut task) = self.tasks.get_mut(&self.task_id) {
            if task.status == TaskStatus::Running {
                task.progress = progress.clamp(0.0, 100.0);
            }
        }
    }
}

pub struct TaskManager {
    tasks: Arc<DashMap<String, AsyncTask>>,
    cancel_flags: DashMap<String, Arc<AtomicBool>>,
    pool: Arc<Semaphore>,
    shutting_down: AtomicBool,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            cancel_flags: DashMap::new(),
            pool: Arc::new(Semaphore::new(WORKER_POOL_SIZE)),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Create a task in PENDING state.
    pub fn create(&self, task_type: TaskType, metadata: serde_json::Value) -> Result<AsyncTask> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(WardenError::TaskShuttingDown);
        }
        let task = AsyncTask {
            id: uuid::Uuid::new_v4().to_string(),
            task_type,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0.0,
            error: None,
            result: None,
            metadata,
        };
        self.tasks.insert(task.id.clone(), task.clone());
        self.cancel_flags
            .insert(task.id.clone(), Arc::new(AtomicBool::new(false)));
        Ok(task)
    }

    /// Run a task body to completion, recording the outcome.
    ///
    /// The body runs under a pool permit and is cancelled cooperatively:
    /// `cancel` flips the flag and the body is expected to bail at its next
    /// checkpoint, which lets cleanup such as closing an IMPORT-mode window
    /// run before the task ends. Per-task transitions are monotonic: once
    /// terminal, nothing overwrites them.
    pub async fn execute<F, Fut>(&self, task_id: &str, body: F)
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value>> + Send,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            self.settle(task_id, TaskStatus::Cancelled, None, Some("TaskManager is shutting down".into()));
            return;
        }
        let Some(cancel) = self.cancel_flags.get(task_id).map(|f| f.clone()) else {
            return;
        };

        let permit = match Arc::clone(&self.pool).acquire_owned().await {
            Ok(permit) => permit,
            // Pool closed: shutdown won the race.
            Err(_) => {
                self.settle(task_id, TaskStatus::Cancelled, None, Some("TaskManager is shutting down".into()));
                return;
            }
        };

        {
            let Some(mut task) = self.tasks.get_mut(task_id) else {
                return;
            };
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
        }

        let ctx = TaskContext {
            task_id: task_id.to_string(),
            cancel,
            tasks: Arc::clone(&self.tasks),
        };
        let outcome = body(ctx).await;
        drop(permit);

        match outcome {
            Ok(result) => {
                self.settle(task_id, TaskStatus::Completed, Some(result), None);
            }
            Err(WardenError::TaskCancelled { .. }) => {
                self.settle(task_id, TaskStatus::Cancelled, None, Some("Task was cancelled".into()));
            }
            Err(err) => {
                self.settle(task_id, TaskStatus::Failed, None, Some(err.to_string()));
            }
        }
    }

    fn settle(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        if let Some(mut task) = self.tasks.get_mut(task_id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = status;
            task.completed_at = Some(Utc::now());
            task.error = error;
            if status == TaskStatus::Completed {
                task.progress = 100.0;
                task.result = result;
            }
        }
    }

    pub fn get(&self, task_id: &str) -> Option<AsyncTask> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    pub fn list(
        &self,
        task_type: Option<TaskType>,
        status: Option<TaskStatus>,
    ) -> Vec<AsyncTask> {
        let mut tasks: Vec<AsyncTask> = self
            .tasks
            .iter()
            .filter(|t| task_type.map_or(true, |ty| t.task_type == ty))
            .filter(|t| status.map_or(true, |st| t.status == st))
            .map(|t| t.clone())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Cancel a running task. PENDING and terminal tasks are untouched.
    ///
    /// Sets the cooperative flag and settles the observable state at once;
    /// the body keeps running until its next checkpoint, where it unwinds
    /// through its own cleanup.
    pub fn cancel(&self, task_id: &str) -> bool {
        let Some(task) = self.get(task_id) else {
            return false;
        };
        if task.status != TaskStatus::Running {
            return false;
        }
        if let Some(flag) = self.cancel_flags.get(task_id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.settle(task_id, TaskStatus::Cancelled, None, Some("Task was cancelled".into()));
        true
    }

    pub fn cancel_all(&self) -> usize {
        let running: Vec<String> = self
            .list(None, Some(TaskStatus::Running))
            .into_iter()
            .map(|t| t.id)
            .collect();
        running.iter().filter(|id| self.cancel(id)).count()
    }

    /// Drop every non-RUNNING task from the table.
    pub fn reset_queue(&self) {
        let keep: Vec<String> = self
            .list(None, Some(TaskStatus::Running))
            .into_iter()
            .map(|t| t.id)
            .collect();
        self.tasks.retain(|id, _| keep.contains(id));
        self.cancel_flags.retain(|id, _| keep.contains(id));
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Idempotent: cancels everything running and refuses new tasks.
    pub fn shutdown(&self) -> usize {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let cancelled = self.cancel_all();
        self.pool.close();
        tracing::info!(cancelled, "task manager shut down");
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lifecycle_completed() {
        let manager = Arc::new(TaskManager::new());
        let task = manager
            .create(TaskType::Migration, serde_json::json!({"scope": "unit"}))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        manager
            .execute(&task.id, |ctx| async move {
                ctx.update_progress(50.0);
                Ok(serde_json::json!({"done": true}))
            })
            .await;

        let settled = manager.get(&task.id).unwrap();
        assert_eq!(settled.status, TaskStatus::Completed);
        assert_eq!(settled.progress, 100.0);
        assert!(settled.completed_at.is_some());
        assert_eq!(settled.result.unwrap()["done"], true);
    }

    #[tokio::test]
    async fn test_failure_records_error() {
        let manager = TaskManager::new();
        let task = manager
            .create(TaskType::Cleanup, serde_json::Value::Null)
            .unwrap();
        manager
            .execute(&task.id, |_ctx| async move {
                Err(WardenError::Config {
                    message: "boom".to_string(),
                })
            })
            .await;
        let settled = manager.get(&task.id).unwrap();
        assert_eq!(settled.status, TaskStatus::Failed);
        assert!(settled.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_cancel_running_task() {
        let manager = Arc::new(TaskManager::new());
        let task = manager
            .create(TaskType::Migration, serde_json::Value::Null)
            .unwrap();

        let mgr = Arc::clone(&manager);
        let id = task.id.clone();
        let runner = tokio::spawn(async move {
            mgr.execute(&id, |ctx| async move {
                loop {
                    ctx.check_cancelled()?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
        });

        // Let it reach RUNNING, then cancel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.get(&task.id).unwrap().status, TaskStatus::Running);
        assert!(manager.cancel(&task.id));
        runner.await.unwrap();

        let settled = manager.get(&task.id).unwrap();
        assert_eq!(settled.status, TaskStatus::Cancelled);
        assert!(settled.completed_at.is_some());

        // Terminal state is sticky.
        assert!(!manager.cancel(&task.id));
        assert_eq!(manager.get(&task.id).unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_pending_and_terminal_are_noops() {
        let manager = TaskManager::new();
        let pending = manager
            .create(TaskType::Export, serde_json::Value::Null)
            .unwrap();
        assert!(!manager.cancel(&pending.id));
        assert_eq!(manager.get(&pending.id).unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_reset_queue_keeps_running_only() {
        let manager = Arc::new(TaskManager::new());
        let done = manager
            .create(TaskType::Sync, serde_json::Value::Null)
            .unwrap();
        manager
            .execute(&done.id, |_| async { Ok(serde_json::Value::Null) })
            .await;

        let running = manager
            .create(TaskType::Migration, serde_json::Value::Null)
            .unwrap();
        let mgr = Arc::clone(&manager);
        let id = running.id.clone();
        let runner = tokio::spawn(async move {
            mgr.execute(&id, |ctx| async move {
                loop {
                    ctx.check_cancelled()?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.reset_queue();
        assert!(manager.get(&done.id).is_none());
        assert!(manager.get(&running.id).is_some());

        manager.cancel(&running.id);
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn test_filtered_listing() {
        let manager = TaskManager::new();
        manager
            .create(TaskType::Migration, serde_json::Value::Null)
            .unwrap();
        manager
            .create(TaskType::Cleanup, serde_json::Value::Null)
            .unwrap();

        assert_eq!(manager.list(None, None).len(), 2);
        assert_eq!(manager.list(Some(TaskType::Migration), None).len(), 1);
        assert_eq!(
            manager.list(None, Some(TaskStatus::Pending)).len(),
            2
        );
        assert!(manager.list(None, Some(TaskStatus::Running)).is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_tasks() {
        let manager = TaskManager::new();
        manager.shutdown();
        assert!(matches!(
            manager.create(TaskType::Migration, serde_json::Value::Null),
            Err(WardenError::TaskShuttingDown)
        ));
        // Idempotent.
        assert_eq!(manager.shutdown(), 0);
    }
}

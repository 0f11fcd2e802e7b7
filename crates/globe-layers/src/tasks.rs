//! Bounded background execution for resolution tasks.
//!
//! The service owns a bounded admission queue and a worker-count semaphore.
//! [`TaskSubmitter::try_submit`] never blocks: when the queue is full or the
//! service is gone, the submission is rejected and the caller decides what
//! to report. An accepted task always runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::config::TaskServiceConfig;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Returned when the task service cannot accept a submission.
#[derive(Debug, Error)]
#[error("task service saturated or shut down")]
pub struct TaskRejected;

/// Runs submitted tasks with bounded concurrency.
pub struct TaskService {
    receiver: mpsc::Receiver<BoxedTask>,
    permits: Arc<Semaphore>,
}

impl TaskService {
    /// Create a service and its submission handle.
    ///
    /// The service does nothing until [`run`](Self::run) is driven, usually
    /// via `tokio::spawn(service.run())`.
    pub fn new(config: &TaskServiceConfig) -> (Self, TaskSubmitter) {
        let (sender, receiver) = mpsc::channel(config.queue_depth.max(1));

        let service = Self {
            receiver,
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
        };

        (service, TaskSubmitter { sender })
    }

    /// Execute queued tasks until every submitter handle is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.receiver.recv().await {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore closed unexpectedly");

            tokio::spawn(async move {
                task.await;
                drop(permit);
            });
        }

        debug!("Task service stopped");
    }
}

/// Cloneable handle for submitting tasks to a [`TaskService`].
#[derive(Clone)]
pub struct TaskSubmitter {
    sender: mpsc::Sender<BoxedTask>,
}

impl TaskSubmitter {
    /// Hand a task to the service without blocking.
    ///
    /// Rejection means no part of the task will ever run.
    pub fn try_submit<F>(&self, task: F) -> Result<(), TaskRejected>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.sender.try_send(Box::pin(task)) {
            Ok(()) => Ok(()),
            Err(_) => {
                debug!("Task service rejected submission");
                Err(TaskRejected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_runs_submitted_task() {
        let (service, submitter) = TaskService::new(&TaskServiceConfig::default());
        tokio::spawn(service.run());

        let done = Arc::new(Notify::new());
        let task_done = done.clone();
        submitter
            .try_submit(async move {
                task_done.notify_one();
            })
            .unwrap();

        done.notified().await;
    }

    #[tokio::test]
    async fn test_rejects_when_queue_full() {
        // Service is never driven, so the first submission occupies the
        // whole queue.
        let config = TaskServiceConfig {
            workers: 1,
            queue_depth: 1,
        };
        let (_service, submitter) = TaskService::new(&config);

        assert!(submitter.try_submit(async {}).is_ok());
        assert!(submitter.try_submit(async {}).is_err());
    }

    #[tokio::test]
    async fn test_rejects_after_service_dropped() {
        let (service, submitter) = TaskService::new(&TaskServiceConfig::default());
        drop(service);

        assert!(submitter.try_submit(async {}).is_err());
    }

    #[tokio::test]
    async fn test_second_task_waits_for_free_worker() {
        let config = TaskServiceConfig {
            workers: 1,
            queue_depth: 4,
        };
        let (service, submitter) = TaskService::new(&config);
        tokio::spawn(service.run());

        let gate = Arc::new(Notify::new());
        let second_ran = Arc::new(AtomicBool::new(false));
        let second_done = Arc::new(Notify::new());

        let task_gate = gate.clone();
        submitter
            .try_submit(async move {
                task_gate.notified().await;
            })
            .unwrap();

        let flag = second_ran.clone();
        let task_done = second_done.clone();
        submitter
            .try_submit(async move {
                flag.store(true, Ordering::SeqCst);
                task_done.notify_one();
            })
            .unwrap();

        // With a single worker held by the first task, the second cannot
        // have started.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(!second_ran.load(Ordering::SeqCst));

        gate.notify_one();
        second_done.notified().await;
        assert!(second_ran.load(Ordering::SeqCst));
    }
}

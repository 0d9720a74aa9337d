use std::future::Future;

use tokio::task::JoinHandle;

use crate::lock;

/// Background tasks owned by one record, keyed by name.
///
/// Spawning under a name already in use replaces (and aborts) the older
/// task. [`TaskSet::shutdown`] aborts everything still running and waits
/// for each task to finish unwinding, so no task outlives its record.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: std::sync::Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(fut);
        let mut tasks = lock(&self.tasks);
        tasks.retain(|(_, h)| !h.is_finished());
        if let Some(pos) = tasks.iter().position(|(n, _)| *n == name) {
            let (_, old) = tasks.remove(pos);
            old.abort();
        }
        tasks.push((name, handle));
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.tasks)
            .iter()
            .any(|(n, h)| n == name && !h.is_finished())
    }

    /// Names of tasks that have not finished yet.
    pub fn running(&self) -> Vec<String> {
        lock(&self.tasks)
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Abort and await one task. A task cannot cancel itself this way;
    /// the current task is skipped when it is the one named.
    pub async fn cancel(&self, name: &str) {
        let handle = {
            let mut tasks = lock(&self.tasks);
            tasks
                .iter()
                .position(|(n, _)| n == name)
                .map(|pos| tasks.remove(pos).1)
        };
        if let Some(handle) = handle {
            Self::abort_and_wait(handle).await;
        }
    }

    /// Abort and await every task except the caller's own.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = lock(&self.tasks).drain(..).collect();
        for (_, handle) in handles {
            Self::abort_and_wait(handle).await;
        }
    }

    async fn abort_and_wait(handle: JoinHandle<()>) {
        if tokio::task::try_id() == Some(handle.id()) {
            return;
        }
        handle.abort();
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_aborts_pending_tasks() {
        let tasks = TaskSet::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        tasks.spawn("sleeper", async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
        });
        assert!(tasks.is_running("sleeper"));
        tasks.shutdown().await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(tasks.running().is_empty());
    }

    #[tokio::test]
    async fn respawn_replaces_task_of_same_name() {
        let tasks = TaskSet::new();
        tasks.spawn("poll", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        tasks.spawn("poll", async {});
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!tasks.is_running("poll"));
    }

    #[tokio::test]
    async fn cancel_removes_only_named_task() {
        let tasks = TaskSet::new();
        tasks.spawn("a", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        tasks.spawn("b", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        tasks.cancel("a").await;
        assert_eq!(tasks.running(), vec!["b".to_string()]);
        tasks.shutdown().await;
    }
}

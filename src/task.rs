use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
}

/// A job that starts after a fixed delay and can be cancelled at any point,
/// either while waiting or while running. Dropping the handle cancels it.
pub struct DelayedTask<T> {
    cancel: watch::Sender<bool>,
    join: JoinHandle<TaskOutcome<T>>,
}

impl<T: Send + 'static> DelayedTask<T> {
    pub fn spawn<F, Fut>(rt: &Handle, delay: Duration, job: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (cancel, mut cancel_rx) = watch::channel(false);
        let join = rt.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(&mut cancel_rx) => return TaskOutcome::Cancelled,
            }
            tokio::select! {
                out = job() => TaskOutcome::Completed(out),
                _ = cancelled(&mut cancel_rx) => TaskOutcome::Cancelled,
            }
        });
        Self { cancel, join }
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Resolves once the job has completed or been cancelled.
    pub async fn wait(self) -> TaskOutcome<T> {
        let Self { cancel, join } = self;
        let out = match join.await {
            Ok(out) => out,
            Err(e) => {
                tracing::error!("delayed task failed: {e}");
                TaskOutcome::Cancelled
            }
        };
        drop(cancel);
        out
    }
}

/// Resolves when cancellation is requested or the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|c| *c).await;
}

//! In-process background job queue.
//!
//! Jobs are enqueued synchronously on the request path and executed later by
//! a worker task. Delivery is at-most-once: there is no persistence and no
//! retry, a failed job is logged and dropped.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};

#[async_trait]
pub trait JobHandler<J>: Send + Sync {
    async fn handle(&self, job: J) -> Result<()>;
}

pub struct JobQueue<J> {
    name: &'static str,
    tx: mpsc::UnboundedSender<J>,
}

impl<J> Clone for JobQueue<J> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<J: Send + 'static> JobQueue<J> {
    /// Queue plus the receiving end, for callers that drive jobs themselves.
    pub fn channel(name: &'static str) -> (Self, mpsc::UnboundedReceiver<J>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { name, tx }, rx)
    }

    /// Queue with a worker task that hands every job to `handler`.
    /// Must be called inside a tokio runtime.
    pub fn spawn<H>(name: &'static str, handler: Arc<H>) -> Self
    where
        H: JobHandler<J> + 'static,
    {
        let (queue, rx) = Self::channel(name);
        tokio::spawn(run_worker(name, rx, handler));
        queue
    }

    pub fn enqueue(&self, job: J) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| anyhow::anyhow!("job queue {} is closed", self.name))?;
        debug!(queue = self.name, "job enqueued");
        Ok(())
    }
}

async fn run_worker<J, H>(name: &'static str, mut rx: mpsc::UnboundedReceiver<J>, handler: Arc<H>)
where
    J: Send + 'static,
    H: JobHandler<J> + 'static,
{
    while let Some(job) = rx.recv().await {
        let handler = handler.clone();
        // Jobs run independently; a slow one must not hold up the next.
        tokio::spawn(async move {
            if let Err(e) = handler.handle(job).await {
                error!(queue = name, error = %e, "job failed");
            }
        });
    }
    debug!(queue = name, "job worker stopped");
}

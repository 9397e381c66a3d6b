use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::StageTask;

/// Submission side of the stage work queue.
pub trait StageQueue: Send + Sync {
    fn enqueue(&self, task: StageTask);
}

/// In-process queue: an unbounded channel drained by the controller's
/// worker pool. Stands in for a durable broker; the pipeline only relies on
/// at-least-once delivery, which redelivery via [`StageQueue::enqueue`]
/// preserves.
pub struct InProcessQueue {
    tx: mpsc::UnboundedSender<StageTask>,
}

impl InProcessQueue {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StageTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl StageQueue for InProcessQueue {
    fn enqueue(&self, task: StageTask) {
        debug!(
            job_id = %task.job_id,
            stage = %task.kind,
            attempt = task.attempt,
            "enqueueing stage task"
        );
        if self.tx.send(task).is_err() {
            // Receiver gone; only happens during shutdown.
            warn!("stage queue receiver dropped, task discarded");
        }
    }
}

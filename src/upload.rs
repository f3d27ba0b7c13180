use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

use crate::reactive::{Observable, Subscription};
use crate::resolve::Resolution;
use crate::{BindError, BindResult, ObjectMetadata, UploadId, UploadProgress};

struct TaskShared {
    id: UploadId,
    progress: Observable<UploadProgress>,
    canceled: AtomicBool,
    cancel_notify: Notify,
}

/// Live, cancellable, progress-reporting handle to one in-flight upload.
///
/// Lifecycle: created, running, then exactly one of succeeded, failed, or
/// canceled. Handles are cheap clones of the same task.
#[derive(Clone)]
pub struct UploadTask {
    shared: Arc<TaskShared>,
    completion: Resolution<ObjectMetadata>,
}

impl UploadTask {
    /// Create a task plus the controller half a transport drives it with
    pub fn channel(total_bytes: u64) -> (UploadTask, UploadController) {
        let shared = Arc::new(TaskShared {
            id: UploadId::new(),
            progress: Observable::new(UploadProgress::new(0, total_bytes)),
            canceled: AtomicBool::new(false),
            cancel_notify: Notify::new(),
        });

        let (done_tx, done_rx) = oneshot::channel::<BindResult<ObjectMetadata>>();
        let state = shared.clone();
        let completion: Resolution<ObjectMetadata> = async move {
            let outcome = match done_rx.await {
                Ok(outcome) => outcome,
                // Driver went away without a terminal report.
                Err(_) => Err(BindError::interrupted("upload driver dropped")),
            };
            // A canceled task can never reach the succeeded or failed
            // outcome, even if the transport finished the transfer anyway.
            if state.canceled.load(Ordering::SeqCst) {
                Err(BindError::Canceled)
            } else {
                outcome
            }
        }
        .boxed()
        .shared();

        let task = UploadTask {
            shared: shared.clone(),
            completion,
        };
        let controller = UploadController {
            shared,
            done: Some(done_tx),
        };
        (task, controller)
    }

    pub fn id(&self) -> &UploadId {
        &self.shared.id
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> UploadProgress {
        self.shared.progress.get()
    }

    /// Subscribe to progress events. Dropping the guard unsubscribes.
    pub fn on_progress<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&UploadProgress) + Send + Sync + 'static,
    {
        self.shared.progress.subscribe(listener)
    }

    /// Request best-effort cancellation
    pub fn cancel(&self) {
        self.shared.canceled.store(true, Ordering::SeqCst);
        self.shared.cancel_notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }

    /// Shared completion outcome: the final object metadata on success
    pub fn completion(&self) -> Resolution<ObjectMetadata> {
        self.completion.clone()
    }
}

/// Transport-side driver half of an upload task
pub struct UploadController {
    shared: Arc<TaskShared>,
    done: Option<oneshot::Sender<BindResult<ObjectMetadata>>>,
}

impl UploadController {
    pub fn id(&self) -> &UploadId {
        &self.shared.id
    }

    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested
    pub async fn canceled(&self) {
        loop {
            let notified = self.shared.cancel_notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }

    /// Publish a progress snapshot to subscribers
    pub fn report(&self, transferred_bytes: u64, total_bytes: u64) {
        self.shared
            .progress
            .set(UploadProgress::new(transferred_bytes, total_bytes));
    }

    /// Terminal success with the authoritative final metadata
    pub fn succeed(mut self, metadata: ObjectMetadata) {
        if let Some(done) = self.done.take() {
            let _ = done.send(Ok(metadata));
        }
    }

    /// Terminal failure
    pub fn fail(mut self, error: BindError) {
        if let Some(done) = self.done.take() {
            let _ = done.send(Err(error));
        }
    }
}

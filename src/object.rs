use bytes::Bytes;
use futures::future;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::BindOptions;
use crate::hydrate::HydrationContext;
use crate::metadata::MetadataBinding;
use crate::reactive::{Computed, Disposers, Observable, Subscription};
use crate::resolve::{resolved, spawn_resolution, Resolution};
use crate::source::RefSource;
use crate::store::ObjectStore;
use crate::upload::UploadTask;
use crate::url::UrlBinding;
use crate::{BindError, ObjectMetadata, SettableMetadata, UploadProgress};

struct ObjectInner {
    store: Arc<dyn ObjectStore>,
    source: RefSource,
    url: UrlBinding,
    metadata: MetadataBinding,
    task: Observable<Option<UploadTask>>,
    snapshot: Observable<Option<UploadProgress>>,
    upload_error: Observable<Option<BindError>>,
    progress_subscription: Mutex<Option<Subscription>>,
}

/// Reactive URL and metadata of a storage object, plus upload orchestration:
/// a single-flight upload task, live progress, and terminal error capture.
///
/// At most one upload task is active per binding; starting another cancels
/// the previous one first. Upload failures land in the error cell instead of
/// surfacing as rejections, so consumers can render them reactively.
pub struct ObjectBinding {
    inner: Arc<ObjectInner>,
    progress: Computed<Option<f64>>,
    disposers: Disposers,
}

impl ObjectBinding {
    /// Bind against `store` with no hydration and default options
    pub fn new<S: Into<RefSource>>(store: Arc<dyn ObjectStore>, source: S) -> Self {
        Self::create(store, source.into(), None, BindOptions::default())
    }

    pub(crate) fn create(
        store: Arc<dyn ObjectStore>,
        source: RefSource,
        hydration: Option<HydrationContext>,
        options: BindOptions,
    ) -> Self {
        // The composed watcher below owns refresh ordering, so the inner
        // bindings are created without watchers of their own.
        let url = UrlBinding::create(
            store.clone(),
            source.clone(),
            hydration.clone(),
            options.clone(),
            false,
        );
        let metadata = MetadataBinding::create(store.clone(), source.clone(), hydration, options, false);

        let inner = Arc::new(ObjectInner {
            store,
            source,
            url,
            metadata,
            task: Observable::new(None),
            snapshot: Observable::new(None),
            upload_error: Observable::new(None),
            progress_subscription: Mutex::new(None),
        });

        let progress = inner
            .snapshot
            .derive(|snapshot| snapshot.as_ref().map(UploadProgress::ratio));

        let disposers = Disposers::new();
        let weak = Arc::downgrade(&inner);
        if let Some(subscription) = inner.source.watch(move |reference| {
            let Some(inner) = weak.upgrade() else { return };
            if reference.is_none() {
                // Cancel before the composed refresh so the teardown is not
                // racing a resolution for a reference that no longer exists.
                if let Some(task) = inner.task.get() {
                    debug!(task = %task.id(), "reference cleared; canceling active upload");
                    inner.progress_subscription.lock().take();
                    task.cancel();
                }
                inner.task.set(None);
                inner.snapshot.set(None);
            }
            ObjectInner::refresh(&inner);
        }) {
            disposers.hold(subscription);
        }

        Self {
            inner,
            progress,
            disposers,
        }
    }

    /// Current URL cell
    pub fn url(&self) -> &Observable<Option<String>> {
        self.inner.url.url()
    }

    /// Current metadata cell
    pub fn metadata(&self) -> &Observable<Option<ObjectMetadata>> {
        self.inner.metadata.metadata()
    }

    /// Latest progress snapshot of the active (or just-finished) upload;
    /// `None` before the first upload and after cancellation
    pub fn snapshot(&self) -> &Observable<Option<UploadProgress>> {
        &self.inner.snapshot
    }

    /// Terminal error of the last upload, if it failed
    pub fn upload_error(&self) -> &Observable<Option<BindError>> {
        &self.inner.upload_error
    }

    /// Fraction of the upload completed, derived from the snapshot cell
    pub fn progress(&self) -> &Computed<Option<f64>> {
        &self.progress
    }

    /// Handle to the active upload task, if any
    pub fn task(&self) -> Option<UploadTask> {
        self.inner.task.get()
    }

    /// Upload `payload` to the current reference, replacing whatever the
    /// object held. Cancels any active upload first and invalidates the
    /// locally known URL and metadata. Without a current reference nothing
    /// is uploaded and the cleared state stands.
    pub fn upload<P: Into<Bytes>>(
        &self,
        payload: P,
        metadata: Option<SettableMetadata>,
    ) -> Option<UploadTask> {
        ObjectInner::upload(&self.inner, payload.into(), metadata)
    }

    /// Write settable metadata fields; see [`MetadataBinding::update`]
    pub fn update_metadata(&self, changes: SettableMetadata) -> Resolution<Option<ObjectMetadata>> {
        self.inner.metadata.update(changes)
    }

    /// Re-resolve URL and metadata concurrently; settles when both have,
    /// with the first error winning the outcome
    pub fn refresh(&self) -> Resolution<()> {
        ObjectInner::refresh(&self.inner)
    }

    /// Delete the remote object and clear all local state. The transport
    /// call proceeds whether or not the resolution is awaited.
    pub fn delete(&self) -> Resolution<()> {
        ObjectInner::delete(&self.inner)
    }
}

impl ObjectInner {
    fn refresh(this: &Arc<Self>) -> Resolution<()> {
        let url = this.url.refresh();
        let metadata = this.metadata.refresh();
        async move {
            let (url_outcome, metadata_outcome) = future::join(url, metadata).await;
            url_outcome?;
            metadata_outcome?;
            Ok(())
        }
        .boxed()
        .shared()
    }

    fn upload(
        this: &Arc<Self>,
        payload: Bytes,
        new_metadata: Option<SettableMetadata>,
    ) -> Option<UploadTask> {
        if let Some(previous) = this.task.get() {
            previous.cancel();
        }

        // New content invalidates everything known about the object.
        this.upload_error.set(None);
        this.snapshot.set(None);
        this.task.set(None);
        this.url.url().set(None);
        this.metadata.metadata().set(None);
        this.progress_subscription.lock().take();

        let Some(reference) = this.source.current() else {
            warn!("upload without a current reference; nothing uploaded");
            return None;
        };

        let task = this.store.start_upload(&reference, payload, new_metadata);
        this.task.set(Some(task.clone()));
        this.snapshot.set(Some(task.progress()));

        let snapshot = this.snapshot.clone();
        *this.progress_subscription.lock() =
            Some(task.on_progress(move |progress| snapshot.set(Some(*progress))));

        let completion = task.completion();
        let weak = Arc::downgrade(this);
        let task_id = task.id().clone();
        tokio::spawn(async move {
            let outcome = completion.await;
            let Some(this) = weak.upgrade() else { return };
            // A task that was replaced no longer owns the cells.
            if !this
                .task
                .get()
                .is_some_and(|current| *current.id() == task_id)
            {
                return;
            }
            match outcome {
                Ok(metadata) => {
                    this.task.set(None);
                    this.progress_subscription.lock().take();
                    this.metadata.metadata().set(Some(metadata));
                    // Content changed; the URL may need revalidation.
                    this.url.refresh();
                }
                Err(BindError::Canceled) => {}
                Err(error) => {
                    this.progress_subscription.lock().take();
                    this.task.set(None);
                    this.upload_error.set(Some(error));
                }
            }
        });

        Some(task)
    }

    fn delete(this: &Arc<Self>) -> Resolution<()> {
        let Some(reference) = this.source.current() else {
            warn!("delete without a current reference; nothing deleted");
            return resolved(Ok(()));
        };
        let store = this.store.clone();
        let resolution = spawn_resolution(async move { store.delete(&reference).await });

        this.metadata.metadata().set(None);
        this.url.url().set(None);
        this.progress_subscription.lock().take();
        this.snapshot.set(None);
        this.task.set(None);

        resolution
    }
}

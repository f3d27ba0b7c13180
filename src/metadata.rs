use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::config::BindOptions;
use crate::hydrate::{HydratedValue, HydrationContext};
use crate::reactive::{Disposers, Observable};
use crate::resolve::{resolved, spawn_resolution, Resolution};
use crate::source::RefSource;
use crate::store::ObjectStore;
use crate::{ObjectMetadata, SettableMetadata};

pub(crate) struct MetadataInner {
    store: Arc<dyn ObjectStore>,
    source: RefSource,
    metadata: Observable<Option<ObjectMetadata>>,
    resolution: Observable<Resolution<Option<ObjectMetadata>>>,
    generation: AtomicU64,
    options: BindOptions,
    hydration: Option<HydrationContext>,
}

/// Reactive metadata of a storage object.
///
/// Same shape as [`crate::UrlBinding`], plus [`MetadataBinding::update`] for
/// writing settable fields back. The cell always holds what the server last
/// said, never a locally merged guess.
pub struct MetadataBinding {
    inner: Arc<MetadataInner>,
    disposers: Disposers,
}

impl MetadataBinding {
    /// Bind against `store` with no hydration and default options
    pub fn new<S: Into<RefSource>>(store: Arc<dyn ObjectStore>, source: S) -> Self {
        Self::create(store, source.into(), None, BindOptions::default(), true)
    }

    pub(crate) fn create(
        store: Arc<dyn ObjectStore>,
        source: RefSource,
        hydration: Option<HydrationContext>,
        options: BindOptions,
        auto_refresh: bool,
    ) -> Self {
        let initial_reference = source.current();
        let metadata = Observable::new(None);

        if let (Some(reference), Some(context)) = (&initial_reference, &hydration) {
            if let Some(HydratedValue::Metadata(value)) =
                context.take_initial_metadata(&reference.key())
            {
                metadata.set(Some(value));
            }
        }

        let inner = Arc::new(MetadataInner {
            store,
            source,
            metadata,
            resolution: Observable::new(resolved(Ok(None))),
            generation: AtomicU64::new(0),
            options,
            hydration,
        });
        let disposers = Disposers::new();

        let first = MetadataInner::refresh(&inner);

        if auto_refresh {
            let weak = Arc::downgrade(&inner);
            if let Some(subscription) = inner.source.watch(move |_| {
                if let Some(inner) = weak.upgrade() {
                    MetadataInner::refresh(&inner);
                }
            }) {
                disposers.hold(subscription);
            }
        }

        if let (Some(reference), Some(context)) = (&initial_reference, &inner.hydration) {
            if context.is_server() {
                let guard = context.register_pending(reference.key(), first);
                disposers.defer(move || drop(guard));
            }
        }

        Self { inner, disposers }
    }

    /// Current metadata cell
    pub fn metadata(&self) -> &Observable<Option<ObjectMetadata>> {
        &self.inner.metadata
    }

    /// Most recently initiated resolution
    pub fn resolution(&self) -> Resolution<Option<ObjectMetadata>> {
        self.inner.resolution.get()
    }

    /// Re-fetch metadata for the current reference
    pub fn refresh(&self) -> Resolution<Option<ObjectMetadata>> {
        MetadataInner::refresh(&self.inner)
    }

    /// Write settable fields and republish the authoritative server
    /// metadata. Without a current reference this is a no-op.
    pub fn update(&self, changes: SettableMetadata) -> Resolution<Option<ObjectMetadata>> {
        MetadataInner::update(&self.inner, changes)
    }
}

impl MetadataInner {
    pub(crate) fn refresh(this: &Arc<Self>) -> Resolution<Option<ObjectMetadata>> {
        let generation = this.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let resolution = match this.source.current() {
            Some(reference) => {
                let inner = this.clone();
                spawn_resolution(async move {
                    let value = inner.store.metadata(&reference).await?;
                    inner.publish(generation, &reference, value.clone());
                    Ok(Some(value))
                })
            }
            None => {
                this.metadata.set(None);
                resolved(Ok(None))
            }
        };
        this.resolution.set(resolution.clone());
        resolution
    }

    fn update(this: &Arc<Self>, changes: SettableMetadata) -> Resolution<Option<ObjectMetadata>> {
        let Some(reference) = this.source.current() else {
            warn!("metadata update without a current reference; ignoring");
            return this.resolution.get();
        };
        let generation = this.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = this.clone();
        let resolution = spawn_resolution(async move {
            let value = inner.store.update_metadata(&reference, changes).await?;
            inner.publish(generation, &reference, value.clone());
            Ok(Some(value))
        });
        this.resolution.set(resolution.clone());
        resolution
    }

    fn publish(&self, generation: u64, reference: &crate::ObjectRef, value: ObjectMetadata) {
        if self.options.guard_stale_writes
            && self.generation.load(Ordering::SeqCst) != generation
        {
            return;
        }
        if let Some(context) = &self.hydration {
            if context.is_server() {
                context.seed_metadata(reference.key(), value.clone());
            }
        }
        self.metadata.set(Some(value));
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::BindOptions;
use crate::hydrate::{HydratedValue, HydrationContext};
use crate::reactive::{Disposers, Observable};
use crate::resolve::{resolved, spawn_resolution, Resolution};
use crate::source::RefSource;
use crate::store::ObjectStore;

pub(crate) struct UrlInner {
    store: Arc<dyn ObjectStore>,
    source: RefSource,
    url: Observable<Option<String>>,
    resolution: Observable<Resolution<Option<String>>>,
    generation: AtomicU64,
    options: BindOptions,
    hydration: Option<HydrationContext>,
}

/// Reactive download URL of a storage object.
///
/// Republishes automatically when an observed reference changes; a reference
/// that goes away nulls the URL. Construction triggers the first resolution.
pub struct UrlBinding {
    inner: Arc<UrlInner>,
    disposers: Disposers,
}

impl UrlBinding {
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
        let url = Observable::new(None);

        // Seed from a server-precomputed value before any network completion.
        if let (Some(reference), Some(context)) = (&initial_reference, &hydration) {
            if let Some(HydratedValue::Url(value)) = context.take_initial(&reference.key()) {
                url.set(Some(value));
            }
        }

        let inner = Arc::new(UrlInner {
            store,
            source,
            url,
            resolution: Observable::new(resolved(Ok(None))),
            generation: AtomicU64::new(0),
            options,
            hydration,
        });
        let disposers = Disposers::new();

        let first = UrlInner::refresh(&inner);

        if auto_refresh {
            let weak = Arc::downgrade(&inner);
            if let Some(subscription) = inner.source.watch(move |_| {
                if let Some(inner) = weak.upgrade() {
                    UrlInner::refresh(&inner);
                }
            }) {
                disposers.hold(subscription);
            }
        }

        // During a server render pass the surrounding pipeline awaits the
        // in-flight resolution; the registration dies with the binding.
        if let (Some(reference), Some(context)) = (&initial_reference, &inner.hydration) {
            if context.is_server() {
                let guard = context.register_pending(reference.key(), first);
                disposers.defer(move || drop(guard));
            }
        }

        Self { inner, disposers }
    }

    /// Current URL cell
    pub fn url(&self) -> &Observable<Option<String>> {
        &self.inner.url
    }

    /// Most recently initiated resolution
    pub fn resolution(&self) -> Resolution<Option<String>> {
        self.inner.resolution.get()
    }

    /// Re-resolve the URL for the current reference
    pub fn refresh(&self) -> Resolution<Option<String>> {
        UrlInner::refresh(&self.inner)
    }
}

impl UrlInner {
    pub(crate) fn refresh(this: &Arc<Self>) -> Resolution<Option<String>> {
        let generation = this.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let resolution = match this.source.current() {
            Some(reference) => {
                let inner = this.clone();
                spawn_resolution(async move {
                    let value = inner.store.download_url(&reference).await?;
                    if !inner.options.guard_stale_writes
                        || inner.generation.load(Ordering::SeqCst) == generation
                    {
                        inner.url.set(Some(value.clone()));
                        if let Some(context) = &inner.hydration {
                            if context.is_server() {
                                context.seed_url(reference.key(), value.clone());
                            }
                        }
                    }
                    Ok(Some(value))
                })
            }
            None => {
                this.url.set(None);
                resolved(Ok(None))
            }
        };
        this.resolution.set(resolution.clone());
        resolution
    }
}

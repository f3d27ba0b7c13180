use std::sync::Arc;

use crate::config::BindOptions;
use crate::hydrate::HydrationContext;
use crate::metadata::MetadataBinding;
use crate::object::ObjectBinding;
use crate::source::RefSource;
use crate::store::ObjectStore;
use crate::url::UrlBinding;

/// The binding factory services embed: holds the transport, the hydration
/// context, and the options, and wires them into every binding it creates.
pub struct ObjectBinder {
    store: Arc<dyn ObjectStore>,
    hydration: Option<HydrationContext>,
    options: BindOptions,
}

impl ObjectBinder {
    /// Create a binder over `store`
    pub fn new<S: ObjectStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Create a binder over an already-shared store
    pub fn from_arc(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            hydration: None,
            options: BindOptions::default(),
        }
    }

    /// Attach a hydration context for the server/client handshake
    pub fn with_hydration(mut self, context: HydrationContext) -> Self {
        self.hydration = Some(context);
        self
    }

    /// Override binding options
    pub fn with_options(mut self, options: BindOptions) -> Self {
        self.options = options;
        self
    }

    /// Shared handle to the underlying store
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    /// Reactive download URL of `source`
    pub fn bind_url<S: Into<RefSource>>(&self, source: S) -> UrlBinding {
        UrlBinding::create(
            self.store.clone(),
            source.into(),
            self.hydration.clone(),
            self.options.clone(),
            true,
        )
    }

    /// Reactive metadata of `source`
    pub fn bind_metadata<S: Into<RefSource>>(&self, source: S) -> MetadataBinding {
        MetadataBinding::create(
            self.store.clone(),
            source.into(),
            self.hydration.clone(),
            self.options.clone(),
            true,
        )
    }

    /// Reactive URL + metadata + upload orchestration for `source`
    pub fn bind_object<S: Into<RefSource>>(&self, source: S) -> ObjectBinding {
        ObjectBinding::create(
            self.store.clone(),
            source.into(),
            self.hydration.clone(),
            self.options.clone(),
        )
    }
}

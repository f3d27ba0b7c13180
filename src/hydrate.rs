//! Server/client hydration handshake.
//!
//! A [`HydrationContext`] carries server-precomputed values into client
//! bindings (so first render needs no network round trip and matches the
//! server output) and collects in-flight resolutions during a server render
//! pass so the pipeline can await them before emitting. It is explicitly
//! injected into bindings, never an ambient singleton; create one per render
//! pass and tear it down with [`HydrationContext::finish`].

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

use crate::resolve::Resolution;
use crate::BindResult;
use crate::ObjectMetadata;

/// Server-precomputed value for one hydration key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HydratedValue {
    Url(String),
    Metadata(ObjectMetadata),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Server,
    Client,
}

type PendingFuture = Shared<BoxFuture<'static, BindResult<()>>>;

struct PendingEntry {
    key: String,
    future: PendingFuture,
}

struct HydrationInner {
    mode: Mode,
    initial: Mutex<HashMap<String, HydratedValue>>,
    pending: Mutex<HashMap<u64, PendingEntry>>,
}

static PENDING_ID: AtomicU64 = AtomicU64::new(1);

// Metadata values share the key space with URLs; the prefix keeps the two
// from colliding for the same reference.
const METADATA_KEY_PREFIX: &str = "m ";

/// Shared store reconciling server-precomputed values with client-side
/// re-resolution
#[derive(Clone)]
pub struct HydrationContext {
    inner: Arc<HydrationInner>,
}

impl HydrationContext {
    fn with_mode(mode: Mode) -> Self {
        Self {
            inner: Arc::new(HydrationInner {
                mode,
                initial: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Context for a server render pass: collects pending resolutions and
    /// records resolved values for export
    pub fn server() -> Self {
        Self::with_mode(Mode::Server)
    }

    /// Context for the client: hands out precomputed values, consumed once
    pub fn client() -> Self {
        Self::with_mode(Mode::Client)
    }

    /// Client context seeded from a server-exported payload
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        let initial: HashMap<String, HydratedValue> = serde_json::from_str(payload)?;
        let context = Self::client();
        *context.inner.initial.lock() = initial;
        Ok(context)
    }

    pub fn is_server(&self) -> bool {
        self.inner.mode == Mode::Server
    }

    /// Store a precomputed URL under the reference's key
    pub fn seed_url<K: Into<String>, V: Into<String>>(&self, key: K, url: V) {
        self.inner
            .initial
            .lock()
            .insert(key.into(), HydratedValue::Url(url.into()));
    }

    /// Store precomputed metadata under the reference's key. The metadata
    /// prefix is applied internally; pass the same key as for URLs.
    pub fn seed_metadata<K: Into<String>>(&self, key: K, metadata: ObjectMetadata) {
        self.inner.initial.lock().insert(
            format!("{METADATA_KEY_PREFIX}{}", key.into()),
            HydratedValue::Metadata(metadata),
        );
    }

    /// One-shot read: the first consumer takes the value
    pub fn take_initial(&self, key: &str) -> Option<HydratedValue> {
        self.inner.initial.lock().remove(key)
    }

    /// One-shot read of the metadata value for `key`
    pub(crate) fn take_initial_metadata(&self, key: &str) -> Option<HydratedValue> {
        self.take_initial(&format!("{METADATA_KEY_PREFIX}{key}"))
    }

    /// Register an in-flight resolution for the current render pass.
    /// Dropping the returned guard removes the registration.
    pub fn register_pending<T, K>(&self, key: K, resolution: Resolution<T>) -> PendingGuard
    where
        T: Clone + Send + Sync + 'static,
        K: Into<String>,
    {
        let id = PENDING_ID.fetch_add(1, Ordering::Relaxed);
        let future: PendingFuture = resolution
            .map(|outcome| outcome.map(|_| ()))
            .boxed()
            .shared();
        self.inner.pending.lock().insert(
            id,
            PendingEntry {
                key: key.into(),
                future,
            },
        );
        PendingGuard {
            context: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of registrations still held
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Await everything registered. Resolves once all pending resolutions
    /// settle; the first rejection wins the outcome.
    pub async fn settle(&self) -> BindResult<()> {
        let snapshot: Vec<(String, PendingFuture)> = self
            .inner
            .pending
            .lock()
            .values()
            .map(|entry| (entry.key.clone(), entry.future.clone()))
            .collect();

        let mut first_error = None;
        for (key, future) in snapshot {
            if let Err(error) = future.await {
                warn!(%key, %error, "hydration resolution failed");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Export the recorded values as a JSON payload for the client
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.inner.initial.lock())
    }

    /// Teardown after hydration completes: drops both sides
    pub fn finish(&self) {
        self.inner.initial.lock().clear();
        self.inner.pending.lock().clear();
    }
}

/// Removal guard for a registered pending resolution
pub struct PendingGuard {
    context: Weak<HydrationInner>,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.context.upgrade() {
            inner.pending.lock().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolved;
    use crate::{BindError, ObjectRef};

    #[test]
    fn initial_values_are_consumed_once() {
        let context = HydrationContext::client();
        context.seed_url("media/ref1", "https://cached/ref1");

        assert_eq!(
            context.take_initial("media/ref1"),
            Some(HydratedValue::Url("https://cached/ref1".to_string()))
        );
        assert_eq!(context.take_initial("media/ref1"), None);
    }

    #[test]
    fn url_and_metadata_keys_do_not_collide() {
        let context = HydrationContext::client();
        let reference = ObjectRef::new("media", "ref1");
        context.seed_url(reference.key(), "https://cached/ref1");
        context.seed_metadata(reference.key(), ObjectMetadata::new(&reference, 3));

        assert!(matches!(
            context.take_initial("media/ref1"),
            Some(HydratedValue::Url(_))
        ));
        assert!(matches!(
            context.take_initial_metadata("media/ref1"),
            Some(HydratedValue::Metadata(_))
        ));
    }

    #[tokio::test]
    async fn settle_surfaces_the_first_rejection() {
        let context = HydrationContext::server();
        let _ok = context.register_pending("a", resolved(Ok(1u32)));
        let _err = context.register_pending("b", resolved::<u32>(Err(BindError::not_found("b"))));

        assert_eq!(context.settle().await, Err(BindError::not_found("b")));
    }

    #[tokio::test]
    async fn dropping_the_guard_removes_the_registration() {
        let context = HydrationContext::server();
        let guard = context.register_pending("a", resolved(Ok(())));
        assert_eq!(context.pending_count(), 1);

        drop(guard);
        assert_eq!(context.pending_count(), 0);
        assert_eq!(context.settle().await, Ok(()));
    }
}

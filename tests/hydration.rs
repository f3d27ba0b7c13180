use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;

use dog_bind::prelude::*;
use dog_bind::MemoryStoreConfig;

/// Test factory functions
fn seeded_store(delay: Option<Duration>) -> (MemoryObjectStore, ObjectRef) {
    let mut config = MemoryStoreConfig::new().with_base_url("https://x");
    if let Some(delay) = delay {
        config = config.with_op_delay(delay);
    }
    let store = MemoryObjectStore::with_config(config);
    let reference = ObjectRef::new("media", "ref1");
    store.insert(
        &reference,
        Bytes::from_static(b"payload"),
        SettableMetadata::new().with_content_type("text/plain"),
    );
    (store, reference)
}

async fn settled<T>(resolution: Resolution<T>) -> BindResult<T>
where
    T: Clone + Send + Sync + 'static,
{
    timeout(Duration::from_secs(2), resolution)
        .await
        .expect("resolution timed out")
}

/// H1. Server pass collects resolutions, exports values, client reuses them
#[tokio::test]
async fn server_pass_round_trips_to_the_client() {
    // Server render: bindings register their in-flight resolutions and the
    // pipeline awaits them before emitting.
    let (store, reference) = seeded_store(None);
    let server = HydrationContext::server();
    let binder = ObjectBinder::new(store).with_hydration(server.clone());
    let url = binder.bind_url(reference.clone());
    let metadata = binder.bind_metadata(reference.clone());
    assert_eq!(server.pending_count(), 2);

    server.settle().await.unwrap();
    assert_eq!(url.url().get(), Some("https://x/media/ref1".to_string()));
    let payload = server.export_json().unwrap();
    drop((url, metadata));
    server.finish();

    // Client render against a slow transport: the precomputed values are
    // visible before any resolution settles.
    let (slow, reference) = seeded_store(Some(Duration::from_millis(60)));
    let client = HydrationContext::from_json(&payload).unwrap();
    let binder = ObjectBinder::new(slow).with_hydration(client.clone());

    let url = binder.bind_url(reference.clone());
    assert_eq!(url.url().get(), Some("https://x/media/ref1".to_string()));

    let metadata = binder.bind_metadata(reference);
    let seeded = metadata.metadata().get().expect("hydrated metadata");
    assert_eq!(seeded.content_type.as_deref(), Some("text/plain"));

    // Client bindings never register pending work.
    assert_eq!(client.pending_count(), 0);

    // The real resolution still lands and agrees.
    assert_eq!(
        settled(url.resolution()).await.unwrap(),
        Some("https://x/media/ref1".to_string())
    );
}

/// H2. A precomputed value is consumed by the first binding only
#[tokio::test]
async fn precomputed_value_is_consumed_once() {
    let (store, reference) = seeded_store(Some(Duration::from_millis(60)));
    let client = HydrationContext::client();
    client.seed_url(reference.key(), "https://cached/ref1");

    let binder = ObjectBinder::new(store).with_hydration(client);
    let first = binder.bind_url(reference.clone());
    assert_eq!(first.url().get(), Some("https://cached/ref1".to_string()));

    let second = binder.bind_url(reference);
    assert_eq!(second.url().get(), None);
}

/// H3. Settle surfaces a failed resolution to the render pipeline
#[tokio::test]
async fn settle_surfaces_refresh_failures() {
    let server = HydrationContext::server();
    let binder = ObjectBinder::new(MemoryObjectStore::new()).with_hydration(server.clone());
    let missing = ObjectRef::new("media", "missing");

    let url = binder.bind_url(missing);

    assert_eq!(
        server.settle().await,
        Err(BindError::not_found("media/missing"))
    );
    // The cell keeps its last (absent) value on failure.
    assert_eq!(url.url().get(), None);
}

/// H4. Dropping a binding removes its pending registration
#[tokio::test]
async fn dropped_binding_removes_pending_registration() {
    let (store, reference) = seeded_store(None);
    let server = HydrationContext::server();
    let binder = ObjectBinder::new(store).with_hydration(server.clone());

    let url = binder.bind_url(reference);
    assert_eq!(server.pending_count(), 1);

    drop(url);
    assert_eq!(server.pending_count(), 0);
    server.settle().await.unwrap();
}

/// H5. Finish tears the context down
#[tokio::test]
async fn finish_clears_the_context() {
    let context = HydrationContext::client();
    context.seed_url("media/ref1", "https://cached/ref1");

    context.finish();

    assert!(context.take_initial("media/ref1").is_none());
    assert_eq!(context.pending_count(), 0);
}

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::store::ObjectStore;
use crate::upload::{UploadController, UploadTask};
use crate::{BindError, BindResult, ObjectMetadata, ObjectRef, SettableMetadata};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Base of the URLs handed out for stored objects
    pub base_url: String,

    /// Upload transfer granularity; progress is reported once per chunk
    pub upload_chunk_bytes: u64,

    /// Optional simulated latency applied to each transport operation
    pub op_delay: Option<Duration>,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "memory://local".to_string(),
            upload_chunk_bytes: 256 * 1024,
            op_delay: None,
        }
    }
}

impl MemoryStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the URL base
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the upload chunk size
    pub fn with_upload_chunk_bytes(mut self, bytes: u64) -> Self {
        self.upload_chunk_bytes = bytes;
        self
    }

    /// Simulate per-operation latency
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = Some(delay);
        self
    }
}

struct StoredObject {
    data: Bytes,
    metadata: ObjectMetadata,
}

/// In-memory object store for testing and development
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    config: MemoryStoreConfig,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Seed an object directly, bypassing the upload path
    pub fn insert(
        &self,
        reference: &ObjectRef,
        data: Bytes,
        changes: SettableMetadata,
    ) -> ObjectMetadata {
        let metadata = build_metadata(reference, data.len() as u64, Some(&changes));
        self.objects.write().insert(
            reference.key(),
            StoredObject {
                data,
                metadata: metadata.clone(),
            },
        );
        metadata
    }

    /// Whether an object exists at `reference`
    pub fn contains(&self, reference: &ObjectRef) -> bool {
        self.objects.read().contains_key(&reference.key())
    }

    /// Stored payload at `reference`, if any
    pub fn data(&self, reference: &ObjectRef) -> Option<Bytes> {
        self.objects
            .read()
            .get(&reference.key())
            .map(|object| object.data.clone())
    }

    fn object_url(&self, reference: &ObjectRef) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            reference.key()
        )
    }

    async fn simulate_delay(&self) {
        if let Some(delay) = self.config.op_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn build_metadata(
    reference: &ObjectRef,
    size_bytes: u64,
    changes: Option<&SettableMetadata>,
) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::new(reference, size_bytes);
    metadata.content_type = Some("application/octet-stream".to_string());
    if let Some(changes) = changes {
        metadata.apply(changes);
    }
    metadata
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download_url(&self, reference: &ObjectRef) -> BindResult<String> {
        self.simulate_delay().await;
        if self.objects.read().contains_key(&reference.key()) {
            Ok(self.object_url(reference))
        } else {
            Err(BindError::not_found(reference.key()))
        }
    }

    async fn metadata(&self, reference: &ObjectRef) -> BindResult<ObjectMetadata> {
        self.simulate_delay().await;
        self.objects
            .read()
            .get(&reference.key())
            .map(|object| object.metadata.clone())
            .ok_or_else(|| BindError::not_found(reference.key()))
    }

    async fn update_metadata(
        &self,
        reference: &ObjectRef,
        changes: SettableMetadata,
    ) -> BindResult<ObjectMetadata> {
        self.simulate_delay().await;
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(&reference.key())
            .ok_or_else(|| BindError::not_found(reference.key()))?;
        object.metadata.apply(&changes);
        object.metadata.generation += 1;
        object.metadata.updated_at = Utc::now();
        Ok(object.metadata.clone())
    }

    fn start_upload(
        &self,
        reference: &ObjectRef,
        payload: Bytes,
        metadata: Option<SettableMetadata>,
    ) -> UploadTask {
        let (task, controller) = UploadTask::channel(payload.len() as u64);
        let objects = self.objects.clone();
        let config = self.config.clone();
        let reference = reference.clone();
        tokio::spawn(drive_upload(objects, config, reference, payload, metadata, controller));
        task
    }

    async fn delete(&self, reference: &ObjectRef) -> BindResult<()> {
        self.simulate_delay().await;
        self.objects.write().remove(&reference.key());
        Ok(())
    }
}

/// Chunked transfer loop: report progress per chunk, stop as soon as
/// cancellation is observed.
async fn drive_upload(
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    config: MemoryStoreConfig,
    reference: ObjectRef,
    payload: Bytes,
    changes: Option<SettableMetadata>,
    controller: UploadController,
) {
    let total = payload.len() as u64;
    let chunk = config.upload_chunk_bytes.max(1);
    let mut transferred = 0u64;

    // Let a cancel issued right after start_upload land before any transfer.
    tokio::task::yield_now().await;

    while transferred < total {
        if controller.is_canceled() {
            return;
        }
        if let Some(delay) = config.op_delay {
            tokio::time::sleep(delay).await;
        }
        transferred = (transferred + chunk).min(total);
        if controller.is_canceled() {
            return;
        }
        controller.report(transferred, total);
    }

    if controller.is_canceled() {
        return;
    }

    let metadata = build_metadata(&reference, total, changes.as_ref());
    objects.write().insert(
        reference.key(),
        StoredObject {
            data: payload,
            metadata: metadata.clone(),
        },
    );
    controller.succeed(metadata);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn reference() -> ObjectRef {
        ObjectRef::new("media", "clips/intro.mp4")
    }

    #[tokio::test]
    async fn upload_reports_chunked_progress_and_stores_the_object() {
        let store = MemoryObjectStore::with_config(
            MemoryStoreConfig::default().with_upload_chunk_bytes(4),
        );
        let task = store.start_upload(
            &reference(),
            Bytes::from_static(b"0123456789"),
            Some(SettableMetadata::new().with_content_type("video/mp4")),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = task.on_progress(move |progress| sink.lock().push(progress.transferred_bytes));

        let metadata = task.completion().await.unwrap();
        assert_eq!(metadata.size_bytes, 10);
        assert_eq!(metadata.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(*seen.lock(), vec![4, 8, 10]);
        assert_eq!(store.data(&reference()).unwrap(), Bytes::from_static(b"0123456789"));
    }

    #[tokio::test]
    async fn canceled_upload_stores_nothing() {
        let store = MemoryObjectStore::with_config(
            MemoryStoreConfig::default()
                .with_upload_chunk_bytes(2)
                .with_op_delay(Duration::from_millis(5)),
        );
        let task = store.start_upload(&reference(), Bytes::from_static(b"0123456789"), None);

        task.cancel();
        assert_eq!(task.completion().await, Err(BindError::Canceled));
        assert!(!store.contains(&reference()));
    }

    #[tokio::test]
    async fn update_metadata_is_authoritative() {
        let store = MemoryObjectStore::new();
        store.insert(&reference(), Bytes::from_static(b"abc"), SettableMetadata::new());

        let updated = store
            .update_metadata(&reference(), SettableMetadata::new().with_content_type("text/plain"))
            .await
            .unwrap();

        assert_eq!(updated.generation, 2);
        assert_eq!(updated.content_type.as_deref(), Some("text/plain"));
        assert_eq!(store.metadata(&reference()).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn missing_objects_resolve_to_not_found() {
        let store = MemoryObjectStore::new();
        let missing = ObjectRef::new("media", "nope");
        assert_eq!(
            store.download_url(&missing).await,
            Err(BindError::not_found("media/nope"))
        );
    }
}

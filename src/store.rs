use async_trait::async_trait;
use bytes::Bytes;

use crate::upload::UploadTask;
use crate::{BindResult, ObjectMetadata, ObjectRef, SettableMetadata};

/// Storage transport operations - must be implemented by all backends.
///
/// The bindings never talk to a network themselves; everything they know
/// about the remote side arrives through this trait.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Resolve a public download URL for an object
    async fn download_url(&self, reference: &ObjectRef) -> BindResult<String>;

    /// Fetch the object's full metadata
    async fn metadata(&self, reference: &ObjectRef) -> BindResult<ObjectMetadata>;

    /// Apply settable fields and return the authoritative server metadata
    async fn update_metadata(
        &self,
        reference: &ObjectRef,
        changes: SettableMetadata,
    ) -> BindResult<ObjectMetadata>;

    /// Start a resumable upload of `payload` to `reference`.
    ///
    /// Returns immediately with a live task handle; the transfer itself runs
    /// in the background and reports progress and completion through the
    /// task. Implementors drive the task via [`UploadTask::channel`].
    fn start_upload(
        &self,
        reference: &ObjectRef,
        payload: Bytes,
        metadata: Option<SettableMetadata>,
    ) -> UploadTask;

    /// Delete the object
    async fn delete(&self, reference: &ObjectRef) -> BindResult<()>;
}

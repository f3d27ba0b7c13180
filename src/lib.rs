//! # dog-bind: Reactive bindings for blob storage objects
//!
//! `dog-bind` keeps in-memory reactive state in sync with objects living in
//! remote blob storage. Bind a (possibly changing) object reference once and
//! the download URL, metadata, and upload lifecycle stay live from there:
//! reference changes re-resolve automatically, uploads report progress into
//! observable cells, and a server render pass can precompute values the
//! client picks up without a second round trip.
//!
//! ## Key Features
//!
//! - **Live values, not snapshots**: URL and metadata republish whenever the
//!   tracked reference changes
//! - **Single-flight uploads**: starting a new upload always cancels the
//!   previous task first; progress and terminal errors land in cells
//! - **Storage agnostic**: any backend behind the [`ObjectStore`] trait; an
//!   in-memory store ships for tests and development
//! - **Server-render handshake**: precomputed values and pending resolutions
//!   flow through an explicit [`HydrationContext`], never a global
//! - **No framework coupling**: the observer primitives are plain typed cells
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_bind::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> BindResult<()> {
//! // 1. A store and a reference to bind against
//! let store = MemoryObjectStore::new();
//! let picture = ObjectRef::new("media", "avatars/ada.png");
//! store.insert(
//!     &picture,
//!     Bytes::from_static(b"png bytes"),
//!     SettableMetadata::new().with_content_type("image/png"),
//! );
//!
//! // 2. Bind: URL and metadata stay live from here on
//! let binder = ObjectBinder::new(store);
//! let object = binder.bind_object(picture);
//! object.refresh().await?;
//!
//! assert_eq!(
//!     object.url().get(),
//!     Some("memory://local/media/avatars/ada.png".to_string())
//! );
//! assert_eq!(
//!     object.metadata().get().unwrap().content_type.as_deref(),
//!     Some("image/png")
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  ObjectBinding   │  ← upload orchestration
//! ├────────┬─────────┤
//! │ UrlBnd │ MetaBnd  │  ← live URL / metadata
//! ├────────┴─────────┤
//! │    RefSource     │  ← fixed or observed reference
//! ├──────────────────┤
//! │   ObjectStore    │  ← storage transport
//! └──────────────────┘
//! ```
//!
//! Bindings are infrastructure you embed, not a service: an [`ObjectBinder`]
//! holds the store, hydration context, and options, and every binding it
//! creates is wired the same way. All constructors and mutating operations
//! must run inside a Tokio runtime context; resolutions are spawned so they
//! make progress whether or not anyone awaits them.

pub mod adapter;
mod config;
mod error;
pub mod hydrate;
mod memory;
mod metadata;
mod object;
pub mod reactive;
mod resolve;
mod source;
pub mod store;
mod types;
mod upload;
mod url;

// Re-export main types for clean API
pub use adapter::ObjectBinder;
pub use config::BindOptions;
pub use error::{BindError, BindResult};
pub use hydrate::{HydratedValue, HydrationContext, PendingGuard};
pub use memory::{MemoryObjectStore, MemoryStoreConfig};
pub use metadata::MetadataBinding;
pub use object::ObjectBinding;
pub use reactive::{Computed, Disposers, Observable, Subscription};
pub use resolve::{resolved, Resolution};
pub use source::RefSource;
pub use store::ObjectStore;
pub use types::{ObjectMetadata, ObjectRef, SettableMetadata, UploadId, UploadProgress};
pub use upload::{UploadController, UploadTask};
pub use url::UrlBinding;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BindError, BindOptions, BindResult, HydrationContext, MemoryObjectStore, MetadataBinding,
        ObjectBinder, ObjectBinding, ObjectMetadata, ObjectRef, ObjectStore, Observable,
        RefSource, Resolution, SettableMetadata, UploadProgress, UploadTask, UrlBinding,
    };
}

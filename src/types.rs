use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque handle to a location in remote blob storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    bucket: String,
    path: String,
}

impl ObjectRef {
    /// Create a reference to `path` inside `bucket`
    pub fn new<B: Into<String>, P: Into<String>>(bucket: B, path: P) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into().trim_matches('/').to_string(),
        }
    }

    /// Bucket the object lives in
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full slash-separated path within the bucket
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Reference to a child location under this one
    pub fn child<S: AsRef<str>>(&self, segment: S) -> Self {
        let segment = segment.as_ref().trim_matches('/');
        let path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", self.path, segment)
        };
        Self {
            bucket: self.bucket.clone(),
            path,
        }
    }

    /// Canonical string form, also used as the hydration key
    pub fn key(&self) -> String {
        format!("{}/{}", self.bucket, self.path)
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

/// Unique identifier for an upload task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new random upload ID
    pub fn new() -> Self {
        Self(format!("upl_{}", Uuid::new_v4().simple()))
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full metadata of a stored object: storage-assigned fields plus the
/// user-settable ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub bucket: String,
    pub path: String,
    pub name: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub etag: Option<String>,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub custom: BTreeMap<String, String>,
}

impl ObjectMetadata {
    /// Fresh metadata for a newly written object
    pub fn new(reference: &ObjectRef, size_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            bucket: reference.bucket().to_string(),
            path: reference.path().to_string(),
            name: reference.name().to_string(),
            size_bytes,
            content_type: None,
            cache_control: None,
            content_disposition: None,
            content_encoding: None,
            content_language: None,
            etag: None,
            generation: 1,
            created_at: now,
            updated_at: now,
            custom: BTreeMap::new(),
        }
    }

    /// Apply settable fields. Fields left unset in `changes` are preserved;
    /// custom entries are merged key by key.
    pub fn apply(&mut self, changes: &SettableMetadata) {
        if let Some(value) = &changes.content_type {
            self.content_type = Some(value.clone());
        }
        if let Some(value) = &changes.cache_control {
            self.cache_control = Some(value.clone());
        }
        if let Some(value) = &changes.content_disposition {
            self.content_disposition = Some(value.clone());
        }
        if let Some(value) = &changes.content_encoding {
            self.content_encoding = Some(value.clone());
        }
        if let Some(value) = &changes.content_language {
            self.content_language = Some(value.clone());
        }
        for (key, value) in &changes.custom {
            self.custom.insert(key.clone(), value.clone());
        }
    }
}

/// User-settable metadata fields, for updates and uploads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettableMetadata {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub custom: BTreeMap<String, String>,
}

impl SettableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_control<S: Into<String>>(mut self, cache_control: S) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    pub fn with_content_disposition<S: Into<String>>(mut self, content_disposition: S) -> Self {
        self.content_disposition = Some(content_disposition.into());
        self
    }

    pub fn with_content_encoding<S: Into<String>>(mut self, content_encoding: S) -> Self {
        self.content_encoding = Some(content_encoding.into());
        self
    }

    pub fn with_content_language<S: Into<String>>(mut self, content_language: S) -> Self {
        self.content_language = Some(content_language.into());
        self
    }

    pub fn with_custom<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Point-in-time progress of an upload task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn new(transferred_bytes: u64, total_bytes: u64) -> Self {
        Self {
            transferred_bytes,
            total_bytes,
        }
    }

    /// Fraction complete, as the exact division `transferred / total`.
    /// A zero-byte total yields NaN, matching the transport semantics.
    pub fn ratio(&self) -> f64 {
        self.transferred_bytes as f64 / self.total_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ref_normalizes_and_derives_children() {
        let root = ObjectRef::new("media", "/avatars/");
        assert_eq!(root.path(), "avatars");
        assert_eq!(root.key(), "media/avatars");

        let child = root.child("ada.png");
        assert_eq!(child.path(), "avatars/ada.png");
        assert_eq!(child.name(), "ada.png");
        assert_eq!(child.to_string(), "media/avatars/ada.png");
    }

    #[test]
    fn settable_fields_merge_into_metadata() {
        let reference = ObjectRef::new("media", "doc.txt");
        let mut metadata = ObjectMetadata::new(&reference, 10);
        metadata.custom.insert("kept".into(), "yes".into());

        metadata.apply(
            &SettableMetadata::new()
                .with_content_type("text/plain")
                .with_custom("owner", "ada"),
        );

        assert_eq!(metadata.content_type.as_deref(), Some("text/plain"));
        assert_eq!(metadata.custom.get("kept").map(String::as_str), Some("yes"));
        assert_eq!(metadata.custom.get("owner").map(String::as_str), Some("ada"));
        assert_eq!(metadata.cache_control, None);
    }

    #[test]
    fn progress_ratio_is_exact_division() {
        let progress = UploadProgress::new(4, 10);
        assert_eq!(progress.ratio(), 0.4);
        assert_eq!(UploadProgress::new(10, 10).ratio(), 1.0);
    }
}

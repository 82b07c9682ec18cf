use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use shoal_proto::StreamDescriptor;
use uuid::Uuid;

const DEFAULT_TITLE: &str = "Live Stream";
const DEFAULT_QUALITY: &str = "720p";

/// Request to publish a stream into the catalog.
#[derive(Debug, Clone)]
pub struct NewStream {
    pub title: String,
    pub description: Option<String>,
    pub quality: Option<String>,
    pub creator: String,
}

/// In-memory stream catalog. Insertion order is the order `streamList`
/// responses present, so entries live in a `Vec` behind one lock rather than
/// a keyed map.
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    inner: Arc<RwLock<Vec<StreamDescriptor>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream and return its descriptor. Blank titles fall back
    /// to a placeholder instead of being rejected.
    pub fn register(&self, new: NewStream) -> StreamDescriptor {
        let title = if new.title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            new.title
        };
        let descriptor = StreamDescriptor {
            stream_id: Uuid::new_v4().to_string(),
            title,
            creator: new.creator,
            quality: new.quality.unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
            viewers: 0,
            created_at: Utc::now(),
            description: new.description,
        };
        self.inner.write().push(descriptor.clone());
        descriptor
    }

    /// Remove a stream by id. Returns whether anything was removed.
    pub fn remove(&self, stream_id: &str) -> bool {
        let mut streams = self.inner.write();
        let before = streams.len();
        streams.retain(|stream| stream.stream_id != stream_id);
        streams.len() != before
    }

    /// Snapshot of the catalog in registration order.
    pub fn list(&self) -> Vec<StreamDescriptor> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

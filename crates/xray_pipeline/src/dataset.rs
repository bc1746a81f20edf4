use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A dataset of raw items held in memory, turned into [`Sample`]s on access.
///
/// The raw items are cheap handles (for an image folder, `(path, class_index)`
/// pairs) and the attached transform does the expensive work (decode, resize,
/// augment, tensorize) each time a sample is requested. Storage is
/// `Arc`-shared, so cloning the dataset for worker threads copies no data.
pub struct InMemoryDataset<Raw> {
    data: Arc<[Raw]>,
    transform: Option<Arc<dyn Transform<Raw, Sample>>>,
    metadata: HashMap<String, String>,
}

impl<Raw> Clone for InMemoryDataset<Raw> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            transform: self.transform.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<Raw> InMemoryDataset<Raw>
where
    Raw: Clone + Send + Sync + 'static,
{
    pub fn new(data: Vec<Raw>) -> Self {
        Self {
            data: data.into(),
            transform: None,
            metadata: HashMap::new(),
        }
    }

    /// Attaches the transform that converts a raw item into a `Sample`.
    pub fn with_transform<T>(mut self, transform: T) -> Self
    where
        T: Transform<Raw, Sample> + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Adds/updates metadata and returns the modified dataset.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the raw item at `index` without transforming it.
    pub fn raw(&self, index: usize) -> Option<&Raw> {
        self.data.get(index)
    }

    /// Loads and transforms the item at `index`.
    pub fn get_sample(&self, index: usize) -> Result<Sample> {
        let raw = self.data.get(index).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of size {}",
                index,
                self.data.len()
            )
        })?;
        let transform = self
            .transform
            .as_ref()
            .ok_or_else(|| anyhow!("Dataset has no transform attached to build samples"))?;
        transform
            .apply(raw.clone())
            .with_context(|| format!("Failed to transform sample {}", index))
    }
}

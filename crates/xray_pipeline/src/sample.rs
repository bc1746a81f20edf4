use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tch::Tensor;

/// Feature name of the image tensor produced for every labeled image.
pub const IMAGE_FEATURE: &str = "image";
/// Feature name of the class index tensor produced for every labeled image.
pub const LABEL_FEATURE: &str = "label";

/// A single example flowing through the pipeline: feature name -> tensor.
///
/// For an image-folder sample: `{"image": Tensor([3, 224, 224]), "label": Tensor(1)}`
#[derive(Debug)]
pub struct Sample {
    pub features: HashMap<String, Tensor>,
}

/// Creates a shallow clone of the `Sample`
impl Clone for Sample {
    fn clone(&self) -> Self {
        let features = self
            .features
            .iter()
            .map(|(k, v)| (k.clone(), v.shallow_clone()))
            .collect();
        Self { features }
    }
}

/// Safety:
/// `tch::Tensor` is `Send` and `Sync`, and `HashMap<String, Tensor>` is composed
/// only of such types. Mutation requires `&mut self`.
unsafe impl Send for Sample {}
unsafe impl Sync for Sample {}

impl Sample {
    pub fn new(features: HashMap<String, Tensor>) -> Self {
        Self { features }
    }

    /// Creates a `Sample` from a single `(feature_name, tensor)` pair.
    /// Chain with [`with_feature`](Self::with_feature) to add more features.
    pub fn from_single(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            features: HashMap::from([(name.into(), tensor)]),
        }
    }

    /// Adds or overwrites a feature in the `Sample`.
    pub fn with_feature(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.features.insert(name.into(), tensor);
        self
    }

    /// Returns a reference to the tensor by feature name.
    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.features
            .get(feature)
            .ok_or_else(|| anyhow!("Feature {} not found", feature))
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

use crate::transforms::vision::{
    CenterCrop, ColorJitter, Normalize, RandomHorizontalFlip, RandomRotation, Resize,
    ResizeTarget, ToTensor,
};
use crate::transforms::Transform;
use anyhow::{bail, ensure, Context, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tch::Tensor;

/// One preprocessing step of a [`Compose`], in its serializable form.
///
/// Serialized with an `"op"` tag, e.g.
/// `{"op": "center_crop", "width": 224, "height": 224}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformStep {
    Resize {
        size: ResizeTarget,
    },
    CenterCrop {
        width: u32,
        height: u32,
    },
    ColorJitter {
        brightness: f32,
        contrast: f32,
        saturation: f32,
        hue: f32,
    },
    RandomHorizontalFlip {
        p: f64,
    },
    RandomRotation {
        degrees: f32,
    },
    ToTensor,
    Normalize {
        mean: Vec<f32>,
        std: Vec<f32>,
    },
}

impl TransformStep {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            TransformStep::Resize { .. } => "resize",
            TransformStep::CenterCrop { .. } => "center_crop",
            TransformStep::ColorJitter { .. } => "color_jitter",
            TransformStep::RandomHorizontalFlip { .. } => "random_horizontal_flip",
            TransformStep::RandomRotation { .. } => "random_rotation",
            TransformStep::ToTensor => "to_tensor",
            TransformStep::Normalize { .. } => "normalize",
        }
    }

    fn image_op(&self) -> Result<Option<Box<dyn Transform<DynamicImage, DynamicImage>>>> {
        Ok(Some(match self {
            TransformStep::Resize { size } => Box::new(Resize::new(*size)?),
            TransformStep::CenterCrop { width, height } => {
                Box::new(CenterCrop::new(*width, *height)?)
            }
            TransformStep::ColorJitter {
                brightness,
                contrast,
                saturation,
                hue,
            } => Box::new(ColorJitter::new(*brightness, *contrast, *saturation, *hue)?),
            TransformStep::RandomHorizontalFlip { p } => Box::new(RandomHorizontalFlip::new(*p)?),
            TransformStep::RandomRotation { degrees } => Box::new(RandomRotation::new(*degrees)?),
            TransformStep::ToTensor | TransformStep::Normalize { .. } => return Ok(None),
        }))
    }

    fn tensor_op(&self) -> Result<Option<Box<dyn Transform<Tensor, Tensor>>>> {
        Ok(match self {
            TransformStep::Normalize { mean, std } => Some(Box::new(Normalize::new(mean, std)?)),
            _ => None,
        })
    }
}

/// An ordered, serializable sequence of preprocessing steps.
///
/// A `Compose` is the persisted definition of a transform. [`Compose::build`]
/// turns it into a runnable [`ImagePipeline`]; [`Compose::save`] and
/// [`Compose::load`] write and read it as JSON.
///
/// Valid sequences contain exactly one `ToTensor`, with image steps before it
/// and tensor steps after it:
/// ```text
/// resize → center_crop → color_jitter → ... → to_tensor → normalize
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compose {
    steps: Vec<TransformStep>,
}

impl Compose {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Validates the step order and instantiates every step.
    pub fn build(&self) -> Result<ImagePipeline> {
        let to_tensor_count = self
            .steps
            .iter()
            .filter(|step| matches!(step, TransformStep::ToTensor))
            .count();
        ensure!(
            to_tensor_count == 1,
            "A transform sequence needs exactly one to_tensor step (found {})",
            to_tensor_count
        );

        let mut image_ops = Vec::new();
        let mut tensor_ops = Vec::new();
        let mut tensorized = false;

        for (position, step) in self.steps.iter().enumerate() {
            if matches!(step, TransformStep::ToTensor) {
                tensorized = true;
                continue;
            }
            let context = || format!("Invalid step {} ({})", position, step.name());

            if tensorized {
                match step.tensor_op().with_context(context)? {
                    Some(op) => tensor_ops.push(op),
                    None => bail!(
                        "Step {} ({}) operates on images and must come before to_tensor",
                        position,
                        step.name()
                    ),
                }
            } else {
                match step.image_op().with_context(context)? {
                    Some(op) => image_ops.push(op),
                    None => bail!(
                        "Step {} ({}) operates on tensors and must come after to_tensor",
                        position,
                        step.name()
                    ),
                }
            }
        }

        Ok(ImagePipeline {
            definition: self.clone(),
            image_ops,
            tensor_ops,
        })
    }

    /// Writes the definition as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize transform definition")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write transform definition: {}", path.display()))
    }

    /// Reads a definition written by [`Compose::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transform definition: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse transform definition: {}", path.display()))
    }
}

/// A runnable `DynamicImage -> Tensor` pipeline built from a [`Compose`].
pub struct ImagePipeline {
    definition: Compose,
    image_ops: Vec<Box<dyn Transform<DynamicImage, DynamicImage>>>,
    tensor_ops: Vec<Box<dyn Transform<Tensor, Tensor>>>,
}

impl ImagePipeline {
    /// The definition this pipeline was built from.
    pub fn definition(&self) -> &Compose {
        &self.definition
    }
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("steps", &self.definition.steps)
            .finish()
    }
}

impl Transform<DynamicImage, Tensor> for ImagePipeline {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let mut img = img;
        for op in &self.image_ops {
            img = op.apply(img)?;
        }
        let mut tensor = ToTensor.apply(img)?;
        for op in &self.tensor_ops {
            tensor = op.apply(tensor)?;
        }
        Ok(tensor)
    }
}

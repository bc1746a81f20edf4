use crate::dataset::InMemoryDataset;
use crate::transforms::vision::LoadImageToSample;
use crate::transforms::Transform;
use anyhow::{bail, Context, Result};
use image::DynamicImage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tch::Tensor;
use walkdir::WalkDir;

/// File extensions (lower-case) recognised as images.
pub const IMG_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

/// A labeled image folder laid out as `root/<class>/<file>`.
///
/// Classes are the sub-directories of `root`, sorted by name and numbered from
/// zero. Every image file below a class directory (recursively, in sorted
/// order) becomes one `(path, class_index)` entry.
///
/// ```text
/// train/
/// ├── NORMAL/      → 0
/// │   ├── IM-0001.jpeg
/// │   └── ...
/// └── PNEUMONIA/   → 1
///     └── ...
/// ```
///
/// # Example
/// ```ignore
/// let folder = ImageFolder::new("artifacts/data_ingestion/data/train")?;
/// assert_eq!(folder.classes(), ["NORMAL", "PNEUMONIA"]);
/// let dataset = folder.into_dataset(pipeline);
/// ```
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    class_to_idx: BTreeMap<String, usize>,
    entries: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let classes = find_classes(&root)?;
        let class_to_idx: BTreeMap<String, usize> = classes
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut entries = Vec::new();
        for (class_idx, class_name) in classes.iter().enumerate() {
            let class_dir = root.join(class_name);
            for entry in WalkDir::new(&class_dir)
                .follow_links(true)
                .sort_by_file_name()
            {
                let entry = entry.with_context(|| {
                    format!("Failed to read directory entry under {}", class_dir.display())
                })?;
                if entry.file_type().is_file() && has_image_extension(entry.path()) {
                    entries.push((entry.into_path(), class_idx));
                }
            }
        }

        if entries.is_empty() {
            bail!(
                "Found no valid image files in {}. Supported extensions are: {}",
                root.display(),
                IMG_EXTENSIONS.join(", ")
            );
        }

        Ok(Self {
            root,
            classes,
            class_to_idx,
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Class names in index order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn class_to_idx(&self) -> &BTreeMap<String, usize> {
        &self.class_to_idx
    }

    /// `(path, class_index)` pairs in sorted order.
    pub fn entries(&self) -> &[(PathBuf, usize)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wraps the entries in an [`InMemoryDataset`] whose samples are produced
    /// by loading each file and running `image_transform` on it.
    ///
    /// The dataset carries `root` and `classes` (comma separated) as metadata.
    pub fn into_dataset<T>(self, image_transform: T) -> InMemoryDataset<(PathBuf, usize)>
    where
        T: Transform<DynamicImage, Tensor> + 'static,
    {
        let root = self.root.display().to_string();
        let classes = self.classes.join(",");
        InMemoryDataset::new(self.entries)
            .with_transform(LoadImageToSample::new(image_transform))
            .with_metadata("root", root)
            .with_metadata("classes", classes)
    }
}

fn find_classes(root: &Path) -> Result<Vec<String>> {
    let read_dir = fs::read_dir(root)
        .with_context(|| format!("Failed to access image folder: {}", root.display()))?;

    let mut classes = Vec::new();
    for entry in read_dir {
        let entry = entry
            .with_context(|| format!("Failed to read directory entry in {}", root.display()))?;
        let path = entry.path();
        if path.is_dir() {
            classes.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    classes.sort();

    if classes.is_empty() {
        bail!("Couldn't find any class folder in {}", root.display());
    }
    Ok(classes)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMG_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

#![allow(dead_code)]

use anyhow::Result;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CLASSES: [&str; 2] = ["NORMAL", "PNEUMONIA"];

/// Writes a `width x height` PNG whose red channel encodes `marker`.
pub fn write_png(path: &Path, width: u32, height: u32, marker: u8) -> Result<()> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([marker, (x * 255 / width) as u8, (y * 255 / height) as u8])
    });
    img.save(path)?;
    Ok(())
}

/// A run directory holding `data/{train,test}/{NORMAL,PNEUMONIA}` with
/// `per_class` images in every class folder.
pub struct XrayFolders {
    pub dir: TempDir,
    pub train: PathBuf,
    pub test: PathBuf,
}

impl XrayFolders {
    pub fn new(per_class: usize) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let train = dir.path().join("data/train");
        let test = dir.path().join("data/test");

        for split in [&train, &test] {
            for (class_idx, class) in CLASSES.iter().enumerate() {
                let class_dir = split.join(class);
                fs::create_dir_all(&class_dir)?;
                for i in 0..per_class {
                    let marker = (class_idx * 100 + i) as u8;
                    // Mixed sizes; every image is resized and cropped anyway.
                    let (width, height) = if i % 2 == 0 { (48, 32) } else { (30, 40) };
                    write_png(
                        &class_dir.join(format!("IM-{:04}.png", i)),
                        width,
                        height,
                        marker,
                    )?;
                }
            }
        }

        Ok(Self { dir, train, test })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Writes an executable stand-in for `aws` that copies `bucket_dir` into the
/// destination of `s3 sync <src> <dst>`.
#[cfg(unix)]
pub fn fake_aws_cli(dir: &Path, bucket_dir: &Path) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-aws");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\n[ \"$1 $2\" = \"s3 sync\" ] || exit 2\ncp -R \"{}/.\" \"$4\"\n",
            bucket_dir.display()
        ),
    )?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
    Ok(script)
}

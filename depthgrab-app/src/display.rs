//! Display sinks a populated container is handed to.

use depthgrab_data::{Component, Container, PlyError, PlyFormat, save_container_ply};
use glam::Vec3;
use image::{GrayImage, Luma, RgbaImage};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Container has no {0} component")]
    MissingComponent(Component),

    #[error("PLY export failed: {0}")]
    Ply(#[from] PlyError),

    #[error("Image export failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{component} plane of {width}x{height} is too large for an image")]
    TooLarge {
        component: Component,
        width: usize,
        height: usize,
    },
}

/// Something that presents a populated container.
pub trait DisplaySink {
    fn name(&self) -> &str;

    fn display(&mut self, container: &Container) -> Result<(), DisplayError>;
}

/// Key numbers of a populated container.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub width: usize,
    pub height: usize,
    pub valid_points: usize,
    pub bounds: Option<(Vec3, Vec3)>,
    pub mean_confidence: Option<f32>,
}

impl Summary {
    pub fn of(container: &Container) -> Result<Self, DisplayError> {
        let range = container
            .range()
            .ok_or(DisplayError::MissingComponent(Component::Range))?;
        Ok(Self {
            width: range.width(),
            height: range.height(),
            valid_points: container.valid_point_count(),
            bounds: container.bounds(),
            mean_confidence: container.mean_confidence(),
        })
    }

    /// Fraction of grid cells holding a valid point.
    pub fn coverage(&self) -> f32 {
        let total = self.width * self.height;
        if total == 0 {
            return 0.0;
        }
        self.valid_points as f32 / total as f32
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} grid, {} valid points ({:.1}%)",
            self.width,
            self.height,
            self.valid_points,
            self.coverage() * 100.0
        )?;
        if let Some((min, max)) = self.bounds {
            write!(
                f,
                ", bounds [{:.1}, {:.1}, {:.1}]..[{:.1}, {:.1}, {:.1}]",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }
        if let Some(mean) = self.mean_confidence {
            write!(f, ", mean confidence {:.2}", mean)?;
        }
        Ok(())
    }
}

/// Logs a [`Summary`] of the container.
#[derive(Debug, Default)]
pub struct SummaryDisplay {
    last: Option<Summary>,
}

impl SummaryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary of the last displayed container.
    pub fn last(&self) -> Option<&Summary> {
        self.last.as_ref()
    }
}

impl DisplaySink for SummaryDisplay {
    fn name(&self) -> &str {
        "summary"
    }

    fn display(&mut self, container: &Container) -> Result<(), DisplayError> {
        let summary = Summary::of(container)?;
        info!("Point cloud: {}", summary);
        self.last = Some(summary);
        Ok(())
    }
}

/// Writes the container as an organized PLY file.
#[derive(Debug)]
pub struct PlyExporter {
    path: PathBuf,
    format: PlyFormat,
}

impl PlyExporter {
    pub fn new(path: impl Into<PathBuf>, format: PlyFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

impl DisplaySink for PlyExporter {
    fn name(&self) -> &str {
        "ply"
    }

    fn display(&mut self, container: &Container) -> Result<(), DisplayError> {
        save_container_ply(&self.path, container, self.format)?;
        Ok(())
    }
}

/// Writes reflectance and confidence planes as PNG images.
#[derive(Debug)]
pub struct PreviewImages {
    dir: PathBuf,
}

impl PreviewImages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn reflectance_path(&self) -> PathBuf {
        self.dir.join("reflectance.png")
    }

    pub fn confidence_path(&self) -> PathBuf {
        self.dir.join("confidence.png")
    }
}

impl DisplaySink for PreviewImages {
    fn name(&self) -> &str {
        "preview"
    }

    fn display(&mut self, container: &Container) -> Result<(), DisplayError> {
        std::fs::create_dir_all(&self.dir)?;
        save_reflectance(container, &self.reflectance_path())?;
        save_confidence(container, &self.confidence_path())?;
        info!("Wrote preview images to {}", self.dir.display());
        Ok(())
    }
}

/// Image dimensions of a plane, which must fit in `u32`.
fn image_size(component: Component, width: usize, height: usize) -> Result<(u32, u32), DisplayError> {
    let too_large = || DisplayError::TooLarge {
        component,
        width,
        height,
    };
    Ok((
        u32::try_from(width).map_err(|_| too_large())?,
        u32::try_from(height).map_err(|_| too_large())?,
    ))
}

fn save_reflectance(container: &Container, path: &Path) -> Result<(), DisplayError> {
    let reflectance = container
        .reflectance()
        .ok_or(DisplayError::MissingComponent(Component::Reflectance))?;
    let order = container.color_order();
    let (width, height) = image_size(Component::Reflectance, reflectance.width(), reflectance.height())?;
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let color = reflectance.row(y as usize)[x as usize];
        image::Rgba(color.to_rgba_array(order))
    });
    image.save(path)?;
    Ok(())
}

/// Confidence is scaled so the largest finite value maps to white.
fn save_confidence(container: &Container, path: &Path) -> Result<(), DisplayError> {
    let confidence = container
        .confidence()
        .ok_or(DisplayError::MissingComponent(Component::Confidence))?;
    let max = confidence
        .rows()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };

    let (width, height) = image_size(Component::Confidence, confidence.width(), confidence.height())?;
    let image = GrayImage::from_fn(width, height, |x, y| {
        let v = confidence.row(y as usize)[x as usize];
        let level = if v.is_finite() { (v * scale).clamp(0.0, 255.0) } else { 0.0 };
        Luma([level as u8])
    });
    image.save(path)?;
    Ok(())
}

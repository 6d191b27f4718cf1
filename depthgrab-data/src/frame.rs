//! Organized frames produced by a single capture.

use crate::types::{ColorOrder, Point3D, Rgba, Sample};
use thiserror::Error;

/// Errors raised while assembling a frame from sensor data.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("Grid data length {len} does not match {width}x{height}")]
    BadLength {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error(
        "Point grid is {points_width}x{points_height} but confidence grid is {snr_width}x{snr_height}"
    )]
    DimensionMismatch {
        points_width: usize,
        points_height: usize,
        snr_width: usize,
        snr_height: usize,
    },
}

/// A dense, row-major grid without padding.
///
/// This is the shape sensors hand out their per-pixel arrays in.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Grid<T> {
    /// Wrap a row-major vector. Fails if the length is not `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self, FrameError> {
        if width.checked_mul(height) != Some(data.len()) {
            return Err(FrameError::BadLength {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(x + y * self.width)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

/// Position and color as delivered together by most sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointColor {
    pub position: Point3D,
    pub color: Rgba,
}

impl PointColor {
    pub fn new(position: Point3D, color: Rgba) -> Self {
        Self { position, color }
    }
}

/// One captured W x H grid of samples.
///
/// Frames are immutable once built: they are produced by a capture and
/// consumed by container population.
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    samples: Vec<Sample>,
    color_order: ColorOrder,
}

impl Frame {
    /// Build a frame from already-merged samples.
    pub fn new(
        width: usize,
        height: usize,
        samples: Vec<Sample>,
        color_order: ColorOrder,
    ) -> Result<Self, FrameError> {
        let grid = Grid::from_vec(width, height, samples)?;
        Ok(Self {
            width,
            height,
            samples: grid.into_vec(),
            color_order,
        })
    }

    /// Merge a position/color grid with its confidence grid.
    ///
    /// Both grids must describe the same pixels, one sample per cell.
    pub fn from_parts(
        points: Grid<PointColor>,
        snr: Grid<f32>,
        color_order: ColorOrder,
    ) -> Result<Self, FrameError> {
        if points.dimensions() != snr.dimensions() {
            return Err(FrameError::DimensionMismatch {
                points_width: points.width(),
                points_height: points.height(),
                snr_width: snr.width(),
                snr_height: snr.height(),
            });
        }

        let (width, height) = points.dimensions();
        let samples = points
            .into_vec()
            .into_iter()
            .zip(snr.into_vec())
            .map(|(pc, confidence)| Sample::new(pc.position, pc.color, confidence))
            .collect();

        Ok(Self {
            width,
            height,
            samples,
            color_order,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn color_order(&self) -> ColorOrder {
        self.color_order
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at column `x`, row `y`.
    pub fn sample(&self, x: usize, y: usize) -> Option<&Sample> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get(x + y * self.width)
    }

    /// Iterate over rows, each a slice of `width` samples.
    pub fn rows(&self) -> impl Iterator<Item = &[Sample]> {
        // chunks_exact panics on 0
        self.samples.chunks_exact(self.width.max(1))
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples with a finite position.
    pub fn valid_count(&self) -> usize {
        self.samples.iter().filter(|s| s.position.is_valid()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_grid(width: usize, height: usize) -> Grid<PointColor> {
        let data = (0..width * height)
            .map(|i| PointColor::new(Point3D::splat(i as f32), Rgba::opaque(i as u8, 0, 0)))
            .collect();
        Grid::from_vec(width, height, data).unwrap()
    }

    #[test]
    fn test_grid_rejects_bad_length() {
        let err = Grid::from_vec(3, 2, vec![0.0f32; 5]).unwrap_err();
        assert_eq!(
            err,
            FrameError::BadLength {
                width: 3,
                height: 2,
                len: 5
            }
        );
    }

    #[test]
    fn test_from_parts_merges_row_major() {
        let snr = Grid::from_vec(3, 2, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
        let frame = Frame::from_parts(point_grid(3, 2), snr, ColorOrder::Rgba).unwrap();

        assert_eq!(frame.len(), 6);
        let s = frame.sample(1, 1).unwrap();
        assert_eq!(s.position, Point3D::splat(4.0));
        assert_eq!(s.confidence, 0.4);
        assert!(frame.sample(3, 0).is_none());
        assert_eq!(frame.rows().count(), 2);
    }

    #[test]
    fn test_from_parts_rejects_mismatch() {
        let snr = Grid::from_vec(2, 3, vec![0.0; 6]).unwrap();
        let err = Frame::from_parts(point_grid(3, 2), snr, ColorOrder::Rgba).unwrap_err();
        assert!(matches!(err, FrameError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_valid_count() {
        let samples = vec![
            Sample::new(Point3D::new(1.0, 2.0, 3.0), Rgba::default(), 1.0),
            Sample::default(),
        ];
        let frame = Frame::new(2, 1, samples, ColorOrder::Bgra).unwrap();
        assert_eq!(frame.valid_count(), 1);
    }
}

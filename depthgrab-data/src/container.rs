//! Multi-component point cloud container.
//!
//! A [`Container`] groups three planar buffers for one acquisition: range
//! (XYZ positions), reflectance (color) and confidence. Each plane has its own
//! row pitch, which may be larger than its width, so every access goes through
//! `x + y * pitch`.

use crate::frame::Frame;
use crate::types::{ColorOrder, Point3D, Rgba};
use bytemuck::Pod;
use glam::Vec3;
use std::collections::TryReserveError;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Semantic role of a planar buffer inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// XYZ positions.
    Range,
    /// Per-point color.
    Reflectance,
    /// Per-point confidence / SNR.
    Confidence,
}

impl Component {
    /// Get all components in population order.
    pub fn all() -> &'static [Component] {
        &[Component::Range, Component::Reflectance, Component::Confidence]
    }

    /// Element layout a buffer of this component is allocated with.
    pub fn format(self) -> ElementFormat {
        match self {
            Component::Range => ElementFormat::new(3, 32, ElementKind::Float),
            Component::Reflectance => ElementFormat::new(4, 8, ElementKind::Unsigned),
            Component::Confidence => ElementFormat::new(1, 32, ElementKind::Float),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Range => write!(f, "range"),
            Component::Reflectance => write!(f, "reflectance"),
            Component::Confidence => write!(f, "confidence"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Float,
    Unsigned,
}

/// Band count and per-band bit depth of a buffer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementFormat {
    pub bands: usize,
    pub bits: u32,
    pub kind: ElementKind,
}

impl fmt::Display for ElementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ElementKind::Float => "float",
            ElementKind::Unsigned => "uint",
        };
        write!(f, "{}x{}-bit {}", self.bands, self.bits, kind)
    }
}

impl ElementFormat {
    pub const fn new(bands: usize, bits: u32, kind: ElementKind) -> Self {
        Self { bands, bits, kind }
    }

    /// Size of one element in bytes.
    pub const fn byte_size(&self) -> usize {
        self.bands * (self.bits as usize / 8)
    }
}

/// Errors raised when a component buffer cannot be created.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Cannot allocate an empty {component} buffer ({width}x{height})")]
    Empty {
        component: Component,
        width: usize,
        height: usize,
    },

    #[error("Pitch {pitch} of {component} buffer is smaller than its width {width}")]
    InvalidPitch {
        component: Component,
        width: usize,
        pitch: usize,
    },

    #[error("Size of {component} buffer overflows ({width}x{height})")]
    Overflow {
        component: Component,
        width: usize,
        height: usize,
    },

    #[error("Failed to allocate {elements} elements for {component} buffer: {source}")]
    OutOfMemory {
        component: Component,
        elements: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Element types that can live in a container, tied to their component slot.
pub trait ComponentElement: Pod {
    const COMPONENT: Component;

    #[doc(hidden)]
    fn slot(container: &Container) -> &Option<PlanarBuffer<Self>>;

    #[doc(hidden)]
    fn slot_mut(container: &mut Container) -> &mut Option<PlanarBuffer<Self>>;
}

impl ComponentElement for Point3D {
    const COMPONENT: Component = Component::Range;

    fn slot(container: &Container) -> &Option<PlanarBuffer<Self>> {
        &container.range
    }

    fn slot_mut(container: &mut Container) -> &mut Option<PlanarBuffer<Self>> {
        &mut container.range
    }
}

impl ComponentElement for Rgba {
    const COMPONENT: Component = Component::Reflectance;

    fn slot(container: &Container) -> &Option<PlanarBuffer<Self>> {
        &container.reflectance
    }

    fn slot_mut(container: &mut Container) -> &mut Option<PlanarBuffer<Self>> {
        &mut container.reflectance
    }
}

impl ComponentElement for f32 {
    const COMPONENT: Component = Component::Confidence;

    fn slot(container: &Container) -> &Option<PlanarBuffer<Self>> {
        &container.confidence
    }

    fn slot_mut(container: &mut Container) -> &mut Option<PlanarBuffer<Self>> {
        &mut container.confidence
    }
}

/// A 2D buffer whose rows start every `pitch` elements.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarBuffer<T> {
    width: usize,
    height: usize,
    pitch: usize,
    data: Vec<T>,
}

impl<T: ComponentElement> PlanarBuffer<T> {
    /// Allocate a zeroed buffer.
    pub fn try_new(width: usize, height: usize, pitch: usize) -> Result<Self, AllocationError> {
        Self::try_filled(width, height, pitch, T::zeroed())
    }

    /// Allocate a buffer with every element, padding included, set to `value`.
    pub fn try_filled(
        width: usize,
        height: usize,
        pitch: usize,
        value: T,
    ) -> Result<Self, AllocationError> {
        let component = T::COMPONENT;
        if width == 0 || height == 0 {
            return Err(AllocationError::Empty {
                component,
                width,
                height,
            });
        }
        if pitch < width {
            return Err(AllocationError::InvalidPitch {
                component,
                width,
                pitch,
            });
        }
        let elements = pitch
            .checked_mul(height)
            .filter(|n| n.checked_mul(std::mem::size_of::<T>()).is_some())
            .ok_or(AllocationError::Overflow {
                component,
                width,
                height,
            })?;

        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|source| AllocationError::OutOfMemory {
                component,
                elements,
                source,
            })?;
        data.resize(elements, value);

        debug!(
            "Allocated {} buffer {}x{} (pitch {}, {})",
            component,
            width,
            height,
            pitch,
            component.format()
        );
        Ok(Self {
            width,
            height,
            pitch,
            data,
        })
    }
}

impl<T: ComponentElement> PlanarBuffer<T> {
    /// Element layout of this buffer.
    pub fn format(&self) -> ElementFormat {
        T::COMPONENT.format()
    }

    /// Size of the backing store in bytes, padding included.
    pub fn byte_len(&self) -> usize {
        self.data.len() * self.format().byte_size()
    }
}

impl<T: Pod> PlanarBuffer<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Distance in elements between the starts of two consecutive rows.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn has_dimensions(&self, width: usize, height: usize) -> bool {
        self.width == width && self.height == height
    }

    /// Linear index of pixel `(x, y)`.
    pub fn index(&self, x: usize, y: usize) -> usize {
        x + y * self.pitch
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(self.index(x, y))
    }

    /// The whole backing store, padding included.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Raw bytes of the backing store.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// The `width` meaningful elements of row `y`.
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.pitch;
        &self.data[start..start + self.width]
    }

    /// Iterate over rows, skipping padding.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        (0..self.height).map(move |y| self.row(y))
    }
}

/// Counts returned by [`Container::populate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopulateStats {
    /// Entries written into each component buffer.
    pub written: usize,
    /// Entries whose position is finite.
    pub valid: usize,
}

/// Caller-owned bundle of range, reflectance and confidence buffers.
#[derive(Debug, Clone)]
pub struct Container {
    color_order: ColorOrder,
    row_alignment: usize,
    invalid_data_flag: bool,
    range: Option<PlanarBuffer<Point3D>>,
    reflectance: Option<PlanarBuffer<Rgba>>,
    confidence: Option<PlanarBuffer<f32>>,
}

impl Container {
    /// Create an empty container storing colors in BGRA order with unpadded rows.
    pub fn new() -> Self {
        Self {
            color_order: ColorOrder::Bgra,
            row_alignment: 1,
            invalid_data_flag: false,
            range: None,
            reflectance: None,
            confidence: None,
        }
    }

    /// Set the color order reflectance buffers are stored in.
    pub fn with_color_order(mut self, order: ColorOrder) -> Self {
        self.color_order = order;
        self
    }

    /// Round the pitch of buffers allocated by the container up to a multiple of `alignment` elements.
    pub fn with_row_alignment(mut self, alignment: usize) -> Self {
        self.row_alignment = alignment.max(1);
        self
    }

    pub fn color_order(&self) -> ColorOrder {
        self.color_order
    }

    pub fn row_alignment(&self) -> usize {
        self.row_alignment
    }

    /// Pitch used for a newly allocated buffer of the given width.
    pub fn pitch_for(&self, width: usize) -> Option<usize> {
        width.checked_next_multiple_of(self.row_alignment)
    }

    /// Whether range data may contain invalid (NaN) points.
    pub fn invalid_data_flag(&self) -> bool {
        self.invalid_data_flag
    }

    pub fn set_invalid_data_flag(&mut self, flag: bool) {
        self.invalid_data_flag = flag;
    }

    pub fn component_mut<T: ComponentElement>(&mut self) -> Option<&mut PlanarBuffer<T>> {
        T::slot_mut(self).as_mut()
    }

    pub fn range(&self) -> Option<&PlanarBuffer<Point3D>> {
        self.range.as_ref()
    }

    pub fn reflectance(&self) -> Option<&PlanarBuffer<Rgba>> {
        self.reflectance.as_ref()
    }

    pub fn confidence(&self) -> Option<&PlanarBuffer<f32>> {
        self.confidence.as_ref()
    }

    pub fn has_component(&self, component: Component) -> bool {
        match component {
            Component::Range => self.range.is_some(),
            Component::Reflectance => self.reflectance.is_some(),
            Component::Confidence => self.confidence.is_some(),
        }
    }

    /// Whether no component has been allocated yet.
    pub fn is_empty(&self) -> bool {
        Component::all().iter().all(|c| !self.has_component(*c))
    }

    /// Put a caller-provided buffer into its slot, returning the previous one.
    pub fn insert<T: ComponentElement>(&mut self, buffer: PlanarBuffer<T>) -> Option<PlanarBuffer<T>> {
        T::slot_mut(self).replace(buffer)
    }

    /// Return the buffer for `T`, allocating it if it is absent or has other dimensions.
    pub fn ensure_buffer<T: ComponentElement>(
        &mut self,
        width: usize,
        height: usize,
    ) -> Result<&mut PlanarBuffer<T>, AllocationError> {
        let staged = self.stage::<T>(width, height)?;
        Ok(commit(T::slot_mut(self), staged))
    }

    /// Allocate a replacement for the `T` slot if needed, without touching the slot.
    fn stage<T: ComponentElement>(
        &self,
        width: usize,
        height: usize,
    ) -> Result<Option<PlanarBuffer<T>>, AllocationError> {
        match T::slot(self) {
            Some(buffer) if buffer.has_dimensions(width, height) => Ok(None),
            _ => {
                let pitch = self.pitch_for(width).ok_or(AllocationError::Overflow {
                    component: T::COMPONENT,
                    width,
                    height,
                })?;
                PlanarBuffer::try_new(width, height, pitch).map(Some)
            }
        }
    }

    /// Copy every sample of `frame` into the three component buffers.
    ///
    /// Missing buffers are allocated first. If any allocation fails the
    /// container is left exactly as it was.
    pub fn populate(&mut self, frame: &Frame) -> Result<PopulateStats, AllocationError> {
        let (width, height) = (frame.width(), frame.height());

        let staged_range = self.stage::<Point3D>(width, height)?;
        let staged_reflectance = self.stage::<Rgba>(width, height)?;
        let staged_confidence = self.stage::<f32>(width, height)?;

        let source_order = frame.color_order();
        let target_order = self.color_order;

        let range = commit(&mut self.range, staged_range);
        let reflectance = commit(&mut self.reflectance, staged_reflectance);
        let confidence = commit(&mut self.confidence, staged_confidence);

        let mut stats = PopulateStats::default();
        for (y, samples) in frame.rows().enumerate() {
            for (x, sample) in samples.iter().enumerate() {
                let idx = range.index(x, y);
                range.data[idx] = sample.position;

                let idx = reflectance.index(x, y);
                reflectance.data[idx] = sample.color.convert(source_order, target_order);

                let idx = confidence.index(x, y);
                confidence.data[idx] = sample.confidence;

                stats.written += 1;
                if sample.position.is_valid() {
                    stats.valid += 1;
                }
            }
        }

        debug!(
            "Populated {}x{} container: {} written, {} valid",
            width, height, stats.written, stats.valid
        );
        Ok(stats)
    }

    /// Iterate over valid points with their color (in RGBA order) and confidence.
    ///
    /// Requires all three components; yields nothing otherwise.
    pub fn valid_points(&self) -> impl Iterator<Item = (Point3D, [u8; 4], f32)> + '_ {
        let order = self.color_order;
        let planes = match (&self.range, &self.reflectance, &self.confidence) {
            (Some(r), Some(c), Some(k))
                if r.has_dimensions(c.width, c.height) && r.has_dimensions(k.width, k.height) =>
            {
                Some((r, c, k))
            }
            _ => None,
        };

        planes.into_iter().flat_map(move |(range, reflectance, confidence)| {
            (0..range.height).flat_map(move |y| {
                range
                    .row(y)
                    .iter()
                    .zip(reflectance.row(y))
                    .zip(confidence.row(y))
                    .filter(|((p, _), _)| p.is_valid())
                    .map(move |((p, c), k)| (*p, c.to_rgba_array(order), *k))
            })
        })
    }

    /// Number of finite points in the range component.
    pub fn valid_point_count(&self) -> usize {
        self.range
            .as_ref()
            .map(|r| r.rows().flatten().filter(|p| p.is_valid()).count())
            .unwrap_or(0)
    }

    /// Axis-aligned bounds of the valid range points.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let range = self.range.as_ref()?;
        range
            .rows()
            .flatten()
            .filter(|p| p.is_valid())
            .map(|p| p.to_vec3())
            .fold(None, |acc, p| match acc {
                None => Some((p, p)),
                Some((min, max)) => Some((min.min(p), max.max(p))),
            })
    }

    /// Mean confidence over valid points.
    pub fn mean_confidence(&self) -> Option<f32> {
        let (sum, count) = self
            .valid_points()
            .fold((0.0f64, 0usize), |(sum, n), (_, _, k)| (sum + k as f64, n + 1));
        (count > 0).then(|| (sum / count as f64) as f32)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

fn commit<T>(slot: &mut Option<PlanarBuffer<T>>, staged: Option<PlanarBuffer<T>>) -> &mut PlanarBuffer<T> {
    match staged {
        Some(buffer) => slot.insert(buffer),
        None => match slot {
            Some(buffer) => buffer,
            None => unreachable!("reuse is only staged for an occupied slot"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    fn two_by_one() -> Frame {
        let samples = vec![
            Sample::new(Point3D::new(1.0, 2.0, 3.0), Rgba::new(10, 20, 30, 255), 0.9),
            Sample::new(Point3D::new(4.0, 5.0, 6.0), Rgba::new(40, 50, 60, 255), 0.5),
        ];
        Frame::new(2, 1, samples, ColorOrder::Rgba).unwrap()
    }

    #[test]
    fn test_populate_unpadded() {
        let mut container = Container::new().with_color_order(ColorOrder::Bgra);
        let stats = container.populate(&two_by_one()).unwrap();

        assert_eq!(stats, PopulateStats { written: 2, valid: 2 });
        assert_eq!(
            container.range().unwrap().as_slice(),
            &[Point3D::new(1.0, 2.0, 3.0), Point3D::new(4.0, 5.0, 6.0)]
        );
        assert_eq!(
            container.reflectance().unwrap().as_slice(),
            &[Rgba::new(30, 20, 10, 255), Rgba::new(60, 50, 40, 255)]
        );
        assert_eq!(container.confidence().unwrap().as_slice(), &[0.9, 0.5]);
    }

    #[test]
    fn test_populate_uses_pitch() {
        let mut container = Container::new().with_row_alignment(4);
        container.populate(&two_by_one()).unwrap();

        let range = container.range().unwrap();
        assert_eq!(range.pitch(), 4);
        assert_eq!(range.index(1, 0), 1);
        assert_eq!(range.as_slice()[1], Point3D::new(4.0, 5.0, 6.0));
        assert_eq!(&range.as_slice()[2..4], &[Point3D::default(); 2]);
        assert_eq!(container.confidence().unwrap().as_slice(), &[0.9, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_populate_never_writes_padding() {
        let sentinel = -7.0f32;
        let mut container = Container::new();
        container.insert(PlanarBuffer::<f32>::try_filled(2, 2, 5, sentinel).unwrap());

        let samples = (0..4)
            .map(|i| Sample::new(Point3D::splat(i as f32), Rgba::default(), i as f32))
            .collect();
        let frame = Frame::new(2, 2, samples, ColorOrder::Rgba).unwrap();
        let stats = container.populate(&frame).unwrap();
        assert_eq!(stats.written, 4);

        let confidence = container.confidence().unwrap();
        assert_eq!(confidence.pitch(), 5);
        let data = confidence.as_slice();
        assert_eq!(data.len(), 10);
        assert_eq!(&data[0..2], &[0.0, 1.0]);
        assert_eq!(&data[5..7], &[2.0, 3.0]);
        let untouched = data
            .iter()
            .enumerate()
            .filter(|(i, _)| !matches!(i, 0 | 1 | 5 | 6))
            .all(|(_, v)| *v == sentinel);
        assert!(untouched);
    }

    #[test]
    fn test_existing_buffer_is_reused() {
        let mut container = Container::new();
        container.insert(PlanarBuffer::<Point3D>::try_new(2, 1, 8).unwrap());
        container.populate(&two_by_one()).unwrap();
        // caller-provided pitch survives
        assert_eq!(container.range().unwrap().pitch(), 8);
        assert_eq!(container.reflectance().unwrap().pitch(), 2);
    }

    #[test]
    fn test_mismatched_buffer_is_reallocated() {
        let mut container = Container::new();
        container.insert(PlanarBuffer::<f32>::try_new(3, 3, 3).unwrap());
        container.populate(&two_by_one()).unwrap();
        assert!(container.confidence().unwrap().has_dimensions(2, 1));
    }

    #[test]
    fn test_failed_allocation_leaves_container_untouched() {
        let mut container = Container::new();
        let empty = Frame::new(0, 3, Vec::new(), ColorOrder::Rgba).unwrap();
        let err = container.populate(&empty).unwrap_err();
        assert!(matches!(err, AllocationError::Empty { .. }));
        assert!(container.is_empty());
    }

    #[test]
    fn test_overflowing_allocation() {
        let err = PlanarBuffer::<Point3D>::try_new(usize::MAX / 2, 4, usize::MAX / 2).unwrap_err();
        assert!(matches!(err, AllocationError::Overflow { .. }));
    }

    #[test]
    fn test_pitch_smaller_than_width() {
        let err = PlanarBuffer::<Rgba>::try_new(4, 1, 3).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InvalidPitch {
                component: Component::Reflectance,
                ..
            }
        ));
    }

    #[test]
    fn test_element_formats() {
        assert_eq!(Component::Range.format().byte_size(), std::mem::size_of::<Point3D>());
        assert_eq!(Component::Reflectance.format().byte_size(), std::mem::size_of::<Rgba>());
        assert_eq!(Component::Confidence.format().byte_size(), std::mem::size_of::<f32>());

        let reflectance = PlanarBuffer::<Rgba>::try_new(3, 2, 4).unwrap();
        assert_eq!(reflectance.format(), ElementFormat::new(4, 8, ElementKind::Unsigned));
        assert_eq!(reflectance.format().to_string(), "4x8-bit uint");
        assert_eq!(reflectance.byte_len(), 4 * 2 * 4);
        assert_eq!(reflectance.byte_len(), reflectance.as_bytes().len());

        let range = PlanarBuffer::<Point3D>::try_new(3, 2, 3).unwrap();
        assert_eq!(range.format().kind, ElementKind::Float);
        assert_eq!(range.byte_len(), range.as_bytes().len());
    }

    #[test]
    fn test_ensure_buffer_allocates_once() {
        let mut container = Container::new().with_row_alignment(8);
        container.ensure_buffer::<f32>(3, 2).unwrap().as_mut_slice()[0] = 42.0;
        let again = container.ensure_buffer::<f32>(3, 2).unwrap();
        assert_eq!(again.pitch(), 8);
        assert_eq!(again.as_slice()[0], 42.0);
        assert!(!container.has_component(Component::Range));
    }

    #[test]
    fn test_summaries_skip_invalid_points() {
        let samples = vec![
            Sample::new(Point3D::new(-1.0, 0.0, 2.0), Rgba::new(1, 2, 3, 255), 1.0),
            Sample::default(),
            Sample::new(Point3D::new(1.0, 4.0, 5.0), Rgba::new(4, 5, 6, 255), 3.0),
        ];
        let frame = Frame::new(3, 1, samples, ColorOrder::Rgba).unwrap();
        let mut container = Container::new().with_row_alignment(4);
        let stats = container.populate(&frame).unwrap();

        assert_eq!(stats.valid, 2);
        assert_eq!(container.valid_point_count(), 2);
        let (min, max) = container.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, 0.0, 2.0));
        assert_eq!(max, Vec3::new(1.0, 4.0, 5.0));
        assert_eq!(container.mean_confidence(), Some(2.0));

        let colors: Vec<[u8; 4]> = container.valid_points().map(|(_, c, _)| c).collect();
        assert_eq!(colors, vec![[1, 2, 3, 255], [4, 5, 6, 255]]);
    }
}

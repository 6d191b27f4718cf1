//! Core sample types for organized point clouds.
//!
//! These are the CPU-side element types stored in frames and in the planar
//! component buffers of a [`Container`](crate::Container). All of them are
//! `Pod` so whole planes can be viewed as raw bytes.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::fmt;

/// A 3D position in device coordinate space (millimeters for most sensors).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    /// Create a new point.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A point with every coordinate set to `value`.
    ///
    /// Used with `f32::NAN` to mark samples the sensor could not measure.
    pub const fn splat(value: f32) -> Self {
        Self {
            x: value,
            y: value,
            z: value,
        }
    }

    /// A point is valid when all of its coordinates are finite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

impl From<Vec3> for Point3D {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Point3D> for Vec3 {
    fn from(p: Point3D) -> Self {
        p.to_vec3()
    }
}

/// Byte order of the three color channels inside an [`Rgba`] value.
///
/// Sensors and display libraries disagree on this, so every producer and
/// consumer of color data states which order it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    /// Red in the first byte.
    #[default]
    Rgba,
    /// Blue in the first byte.
    Bgra,
}

impl fmt::Display for ColorOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorOrder::Rgba => write!(f, "rgba"),
            ColorOrder::Bgra => write!(f, "bgra"),
        }
    }
}

impl std::str::FromStr for ColorOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba" | "rgb" => Ok(ColorOrder::Rgba),
            "bgra" | "bgr" => Ok(ColorOrder::Bgra),
            other => Err(format!("unknown color order '{}' (expected rgba or bgra)", other)),
        }
    }
}

/// Four 8-bit color channels.
///
/// The struct does not know which of `c0`/`c2` is red; that is tracked by
/// the [`ColorOrder`] of whoever owns the value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba {
    pub c0: u8,
    pub c1: u8,
    pub c2: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(c0: u8, c1: u8, c2: u8, a: u8) -> Self {
        Self { c0, c1, c2, a }
    }

    /// Opaque color from three channels.
    pub const fn opaque(c0: u8, c1: u8, c2: u8) -> Self {
        Self::new(c0, c1, c2, u8::MAX)
    }

    /// Swap the first and third channel. Alpha is left untouched.
    pub const fn swap_red_blue(self) -> Self {
        Self {
            c0: self.c2,
            c1: self.c1,
            c2: self.c0,
            a: self.a,
        }
    }

    /// Re-encode a color stored in `from` order into `to` order.
    pub const fn convert(self, from: ColorOrder, to: ColorOrder) -> Self {
        match (from, to) {
            (ColorOrder::Rgba, ColorOrder::Bgra) | (ColorOrder::Bgra, ColorOrder::Rgba) => {
                self.swap_red_blue()
            }
            _ => self,
        }
    }

    /// Return the channels as `[r, g, b, a]` given the order the value is stored in.
    pub fn to_rgba_array(self, order: ColorOrder) -> [u8; 4] {
        let c = self.convert(order, ColorOrder::Rgba);
        [c.c0, c.c1, c.c2, c.a]
    }
}

/// One cell of an organized point cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Measured position, NaN when invalid.
    pub position: Point3D,
    /// Reflectance color in the order of the owning frame.
    pub color: Rgba,
    /// Confidence / signal-to-noise ratio.
    pub confidence: f32,
}

impl Sample {
    pub fn new(position: Point3D, color: Rgba, confidence: f32) -> Self {
        Self {
            position,
            color,
            confidence,
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            position: Point3D::splat(f32::NAN),
            color: Rgba::default(),
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_is_involution() {
        let colors = [
            Rgba::new(10, 20, 30, 255),
            Rgba::new(0, 0, 0, 0),
            Rgba::new(255, 1, 128, 7),
        ];
        for c in colors {
            assert_eq!(c.swap_red_blue().swap_red_blue(), c);
        }
    }

    #[test]
    fn test_swap_keeps_alpha() {
        let c = Rgba::new(10, 20, 30, 77).swap_red_blue();
        assert_eq!(c, Rgba::new(30, 20, 10, 77));
    }

    #[test]
    fn test_convert_same_order_is_identity() {
        let c = Rgba::new(1, 2, 3, 4);
        assert_eq!(c.convert(ColorOrder::Rgba, ColorOrder::Rgba), c);
        assert_eq!(c.convert(ColorOrder::Bgra, ColorOrder::Bgra), c);
        assert_eq!(
            c.convert(ColorOrder::Rgba, ColorOrder::Bgra),
            Rgba::new(3, 2, 1, 4)
        );
    }

    #[test]
    fn test_to_rgba_array() {
        let stored_bgra = Rgba::new(30, 20, 10, 255);
        assert_eq!(stored_bgra.to_rgba_array(ColorOrder::Bgra), [10, 20, 30, 255]);
    }

    #[test]
    fn test_point_validity() {
        assert!(Point3D::new(1.0, 2.0, 3.0).is_valid());
        assert!(!Point3D::splat(f32::NAN).is_valid());
        assert!(!Point3D::new(1.0, f32::INFINITY, 3.0).is_valid());
    }

    #[test]
    fn test_color_order_parse() {
        assert_eq!("BGR".parse::<ColorOrder>(), Ok(ColorOrder::Bgra));
        assert_eq!("rgba".parse::<ColorOrder>(), Ok(ColorOrder::Rgba));
        assert!("argb".parse::<ColorOrder>().is_err());
    }
}

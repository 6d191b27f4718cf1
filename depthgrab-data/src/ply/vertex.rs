//! PLY vertex data structures

use crate::types::{Point3D, Rgba};
use serde::Serialize;

/// Vertex data extracted from a PLY file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlyVertex {
    /// NaN when the file marks the point as missing.
    pub position: Point3D,
    /// Color in RGBA order. Opaque light gray when the file has no color.
    pub color: Rgba,
    pub confidence: Option<f32>,
}

/// One exported vertex. Field order is the property order in the header.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct VertexRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    pub confidence: f32,
}

/// The `vertex` element of an exported file.
#[derive(Debug, Serialize)]
pub(crate) struct VertexTable {
    pub vertex: Vec<VertexRecord>,
}

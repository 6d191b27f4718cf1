//! PLY export of populated containers

use crate::container::{Component, Container};
use crate::ply::PlyError;
use crate::ply::vertex::{VertexRecord, VertexTable};
use serde_ply::SerializeOptions;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Encoding of the vertex section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyFormat {
    #[default]
    Ascii,
    /// binary_little_endian
    Binary,
}

impl PlyFormat {
    fn options(self) -> SerializeOptions {
        match self {
            PlyFormat::Ascii => SerializeOptions::ascii(),
            PlyFormat::Binary => SerializeOptions::binary_le(),
        }
    }
}

/// Write every grid cell of `container` as a PLY vertex, row-major.
///
/// Invalid points are kept (as NaN) so the grid can be rebuilt on load; the
/// grid size goes into `comment width N` / `comment height N` header lines.
/// Returns the number of vertices written.
pub fn write_container_ply<W: Write>(
    mut writer: W,
    container: &Container,
    format: PlyFormat,
) -> Result<usize, PlyError> {
    let range = container
        .range()
        .ok_or(PlyError::MissingComponent(Component::Range))?;
    let reflectance = container
        .reflectance()
        .ok_or(PlyError::MissingComponent(Component::Reflectance))?;
    let confidence = container
        .confidence()
        .ok_or(PlyError::MissingComponent(Component::Confidence))?;

    let (width, height) = (range.width(), range.height());
    if !reflectance.has_dimensions(width, height) || !confidence.has_dimensions(width, height) {
        return Err(PlyError::InconsistentComponents);
    }

    let order = container.color_order();
    let vertex: Vec<VertexRecord> = (0..height)
        .flat_map(move |y| {
            range
                .row(y)
                .iter()
                .zip(reflectance.row(y))
                .zip(confidence.row(y))
        })
        .map(|((p, c), k)| {
            let [red, green, blue, alpha] = c.to_rgba_array(order);
            VertexRecord {
                x: p.x,
                y: p.y,
                z: p.z,
                red,
                green,
                blue,
                alpha,
                confidence: *k,
            }
        })
        .collect();
    let count = vertex.len();

    let options = format.options().with_comments(vec![
        "organized point cloud".to_string(),
        format!("width {}", width),
        format!("height {}", height),
    ]);
    serde_ply::to_writer(&VertexTable { vertex }, options, &mut writer)?;
    writer.flush()?;
    Ok(count)
}

/// Write `container` to a PLY file at `path`.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn save_container_ply(
    path: &Path,
    container: &Container,
    format: PlyFormat,
) -> Result<usize, PlyError> {
    let file = File::create(path)?;
    let count = write_container_ply(BufWriter::new(file), container, format)?;
    info!("Wrote {} vertices to {}", count, path.display());
    Ok(count)
}

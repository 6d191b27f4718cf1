//! Reading PLY vertices back into memory

use crate::ply::{PlyError, PlyVertex};
use crate::types::{Point3D, Rgba};
use serde::Deserialize;
use serde_ply::PlyReader;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

/// Property names tried, in order, for the three color channels.
const COLOR_NAMES: [[&str; 3]; 2] = [["red", "green", "blue"], ["r", "g", "b"]];
/// Color given to vertices of uncolored files.
const DEFAULT_GRAY: u8 = 204;

#[derive(Debug, Deserialize)]
struct VertexTable {
    vertex: Vec<HashMap<String, Value>>,
}

/// Property lookup on one decoded vertex.
struct Properties<'a>(&'a HashMap<String, Value>);

impl Properties<'_> {
    fn float(&self, name: &str) -> Option<f32> {
        self.0.get(name)?.as_f64().map(|v| v as f32)
    }

    /// Like [`Properties::float`], but a null value (serde_json's NaN) reads as NaN.
    fn coordinate(&self, name: &'static str, index: usize) -> Result<f32, PlyError> {
        let value = match self.0.get(name) {
            Some(Value::Null) => Some(f32::NAN),
            Some(value) => value.as_f64().map(|v| v as f32),
            None => None,
        };
        value.ok_or(PlyError::MissingProperty {
            property: name,
            index,
        })
    }

    fn byte(&self, name: &str) -> Option<u8> {
        let value = self.0.get(name)?;
        value
            .as_u64()
            .or_else(|| value.as_i64().map(|v| v as u64))
            .map(|v| v as u8)
    }

    fn color(&self) -> Rgba {
        let alpha = self.byte("alpha").unwrap_or(u8::MAX);
        COLOR_NAMES
            .iter()
            .find_map(|[r, g, b]| Some(Rgba::new(self.byte(r)?, self.byte(g)?, self.byte(b)?, alpha)))
            .unwrap_or(Rgba::opaque(DEFAULT_GRAY, DEFAULT_GRAY, DEFAULT_GRAY))
    }
}

/// Load vertices in file order.
///
/// Handles ASCII and binary files. `x`, `y` and `z` are required; color
/// falls back to light gray and `confidence` is optional.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_vertices_from_ply(path: &Path) -> Result<Vec<PlyVertex>, PlyError> {
    debug!("Reading {}", path.display());
    let reader = BufReader::new(File::open(path)?);

    let table: VertexTable = serde_ply::from_reader(reader).map_err(|e| {
        warn!("Could not decode {}: {}", path.display(), e);
        PlyError::Parse(e.to_string())
    })?;
    info!("Decoded {} vertices", table.vertex.len());

    table
        .vertex
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let props = Properties(raw);
            Ok(PlyVertex {
                position: Point3D::new(
                    props.coordinate("x", index)?,
                    props.coordinate("y", index)?,
                    props.coordinate("z", index)?,
                ),
                color: props.color(),
                confidence: props.float("confidence"),
            })
        })
        .collect()
}

/// Read the `comment width N` / `comment height N` lines written by the exporter.
///
/// Returns `None` when the header does not carry both.
pub fn read_grid_dimensions(path: &Path) -> Result<Option<(usize, usize)>, PlyError> {
    let reader = PlyReader::from_reader(BufReader::new(File::open(path)?))
        .map_err(|e| PlyError::Parse(e.to_string()))?;
    Ok(grid_dimensions(&reader.header().comments))
}

fn grid_dimensions(comments: &[String]) -> Option<(usize, usize)> {
    let mut width = None;
    let mut height = None;
    for comment in comments {
        let mut words = comment.split_whitespace();
        match (words.next(), words.next().and_then(|n| n.parse().ok())) {
            (Some("width"), Some(n)) => width = Some(n),
            (Some("height"), Some(n)) => height = Some(n),
            _ => {}
        }
    }
    width.zip(height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions_from_comments() {
        let comments = vec![
            "organized point cloud".to_string(),
            "width 2".to_string(),
            "height 1".to_string(),
        ];
        assert_eq!(grid_dimensions(&comments), Some((2, 1)));
        assert_eq!(grid_dimensions(&comments[..2]), None);
        assert_eq!(grid_dimensions(&["width two".to_string()]), None);
    }

    #[test]
    fn test_read_grid_dimensions_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dims.ply");
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\ncomment width 3\ncomment height 1\n\
             element vertex 3\nproperty float x\nproperty float y\nproperty float z\n\
             end_header\n0 0 1\n1 0 1\n2 0 1\n",
        )
        .unwrap();
        assert_eq!(read_grid_dimensions(&path).unwrap(), Some((3, 1)));
    }

    #[test]
    fn test_read_grid_dimensions_rejects_non_ply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.ply");
        std::fs::write(&path, "hello\n").unwrap();
        assert!(matches!(read_grid_dimensions(&path), Err(PlyError::Parse(_))));
    }
}

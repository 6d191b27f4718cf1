//! PLY import and export of organized point clouds

mod loader;
mod vertex;
mod writer;

pub use loader::{load_vertices_from_ply, read_grid_dimensions};
pub use vertex::PlyVertex;
pub use writer::{PlyFormat, save_container_ply, write_container_ply};

use thiserror::Error;

/// Errors raised while reading or writing PLY files.
#[derive(Debug, Error)]
pub enum PlyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PLY parsing error: {0}")]
    Parse(String),

    #[error("PLY writing error: {0}")]
    Write(#[from] serde_ply::SerializeError),

    #[error("Missing '{property}' at vertex {index}")]
    MissingProperty { property: &'static str, index: usize },

    #[error("Container has no {0} component")]
    MissingComponent(crate::Component),

    #[error("Container components have different dimensions")]
    InconsistentComponents,
}

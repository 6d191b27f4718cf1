//! Depthgrab Data Crate
//!
//! Sample types, organized frames and the multi-component container that
//! captured point clouds are copied into, plus PLY import/export.
//! This crate knows nothing about devices; see `depthgrab-capture` for that.

pub mod container;
pub mod frame;
pub mod ply;
pub mod types;

pub use container::{
    AllocationError, Component, ComponentElement, Container, ElementFormat, ElementKind,
    PlanarBuffer, PopulateStats,
};
pub use frame::{Frame, FrameError, Grid, PointColor};
pub use ply::{PlyError, PlyFormat, PlyVertex, load_vertices_from_ply, save_container_ply};
pub use types::{ColorOrder, Point3D, Rgba, Sample};

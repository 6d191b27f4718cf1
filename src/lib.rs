//! Single-shot depth camera acquisition into planar component containers.
//!
//! Re-exports the workspace crates under one name.

pub use depthgrab_capture as capture;
pub use depthgrab_data as data;

//! Replays an organized point cloud stored as PLY.

use crate::error::AcquisitionError;
use crate::session::{DeviceDriver, DeviceSession, RawCapture};
use crate::settings::AcquisitionSettings;
use depthgrab_data::ply::{PlyVertex, load_vertices_from_ply, read_grid_dimensions};
use depthgrab_data::{ColorOrder, Grid, PointColor};
use std::path::PathBuf;
use tracing::{debug, info};

/// Driver that "connects" to a PLY file written by the exporter.
pub struct ReplayCamera {
    path: PathBuf,
    width: Option<usize>,
    name: String,
}

impl ReplayCamera {
    /// Replay `path`. Grid dimensions are read from the file header.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("replay {}", path.display());
        Self {
            path,
            width: None,
            name,
        }
    }

    /// Override the grid width, for files without dimension comments.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }
}

impl DeviceDriver for ReplayCamera {
    type Session = ReplaySession;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<ReplaySession, AcquisitionError> {
        let connection_error =
            |e: depthgrab_data::PlyError| AcquisitionError::Connection(format!("{}: {}", self.path.display(), e));

        let header_width = read_grid_dimensions(&self.path)
            .map_err(connection_error)?
            .map(|(w, _)| w);
        let width = self.width.or(header_width).ok_or_else(|| {
            AcquisitionError::Connection(format!(
                "{}: grid width unknown, pass it explicitly",
                self.path.display()
            ))
        })?;

        let vertices = load_vertices_from_ply(&self.path).map_err(connection_error)?;
        info!("Opened {} ({} vertices, width {})", self.name, vertices.len(), width);

        Ok(ReplaySession {
            vertices,
            width,
            configured: false,
        })
    }
}

/// Open replay session holding the loaded vertices.
pub struct ReplaySession {
    vertices: Vec<PlyVertex>,
    width: usize,
    configured: bool,
}

impl DeviceSession for ReplaySession {
    fn configure(&mut self, settings: &AcquisitionSettings) -> Result<(), AcquisitionError> {
        // recorded data is already filtered
        debug!("Ignoring acquisition settings for replay: {:?}", settings);
        self.configured = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<RawCapture, AcquisitionError> {
        if !self.configured {
            return Err(AcquisitionError::Config("session not configured".into()));
        }
        if self.width == 0 || self.vertices.len() % self.width != 0 {
            return Err(AcquisitionError::Capture(format!(
                "{} vertices do not form rows of width {}",
                self.vertices.len(),
                self.width
            )));
        }
        let height = self.vertices.len() / self.width;

        let points = self
            .vertices
            .iter()
            .map(|v| PointColor::new(v.position, v.color))
            .collect();
        let snr = self
            .vertices
            .iter()
            .map(|v| v.confidence.unwrap_or(1.0))
            .collect();

        Ok(RawCapture::new(
            Grid::from_vec(self.width, height, points)?,
            Grid::from_vec(self.width, height, snr)?,
            ColorOrder::Rgba,
        ))
    }

    fn close(&mut self) -> Result<(), AcquisitionError> {
        debug!("Closing replay session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    fn write_ply(dir: &tempfile::TempDir, header_dims: bool) -> PathBuf {
        let path = dir.path().join("replay.ply");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "ply\nformat ascii 1.0").unwrap();
        if header_dims {
            writeln!(f, "comment width 3\ncomment height 2").unwrap();
        }
        writeln!(f, "element vertex 6").unwrap();
        writeln!(f, "property float x\nproperty float y\nproperty float z").unwrap();
        writeln!(f, "property uchar red\nproperty uchar green\nproperty uchar blue").unwrap();
        writeln!(f, "end_header").unwrap();
        for i in 0..6 {
            writeln!(f, "{} 0 500 {} 0 0", i, i * 10).unwrap();
        }
        path
    }

    #[test]
    fn test_replay_uses_header_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = ReplayCamera::new(write_ply(&dir, true));
        let mut session = camera.open().unwrap();
        session.configure(&AcquisitionSettings::default()).unwrap();

        let frame = session.capture().unwrap().into_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        let s = frame.sample(1, 1).unwrap();
        assert_eq!(s.position.x, 4.0);
        assert_eq!(s.color.c0, 40);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn test_replay_requires_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ply(&dir, false);
        let err = ReplayCamera::new(&path).open().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);

        let mut session = ReplayCamera::new(&path).with_width(2).open().unwrap();
        session.configure(&AcquisitionSettings::default()).unwrap();
        assert_eq!(session.capture().unwrap().points.dimensions(), (2, 3));
    }

    #[test]
    fn test_replay_bad_width() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ReplayCamera::new(write_ply(&dir, false))
            .with_width(4)
            .open()
            .unwrap();
        session.configure(&AcquisitionSettings::default()).unwrap();
        assert_eq!(session.capture().unwrap_err().kind(), ErrorKind::Capture);
    }

    #[test]
    fn test_missing_file() {
        let err = ReplayCamera::new("/nonexistent/cloud.ply").open().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}

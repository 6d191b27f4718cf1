//! Device session traits and raw capture data.

use crate::error::AcquisitionError;
use crate::settings::AcquisitionSettings;
use depthgrab_data::{ColorOrder, Frame, Grid, PointColor};
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

/// Entry point to a physical or simulated 3D sensor.
pub trait DeviceDriver {
    type Session: DeviceSession;

    /// Human readable device name, used in logs.
    fn name(&self) -> &str;

    /// Connect to the device.
    fn open(&mut self) -> Result<Self::Session, AcquisitionError>;
}

/// An open connection to a sensor.
///
/// `configure` must succeed before `capture`. `close` releases the device;
/// use [`SessionGuard`] so it happens on every path.
pub trait DeviceSession {
    /// Apply capture parameters.
    fn configure(&mut self, settings: &AcquisitionSettings) -> Result<(), AcquisitionError>;

    /// Trigger one blocking capture.
    fn capture(&mut self) -> Result<RawCapture, AcquisitionError>;

    /// Disconnect from the device.
    fn close(&mut self) -> Result<(), AcquisitionError>;
}

/// Per-pixel arrays as returned by a sensor for one capture.
#[derive(Debug, Clone)]
pub struct RawCapture {
    /// Position and color per pixel.
    pub points: Grid<PointColor>,
    /// Confidence / SNR per pixel, expected on the same grid as `points`.
    pub snr: Grid<f32>,
    /// Channel order of the colors in `points`.
    pub color_order: ColorOrder,
}

impl RawCapture {
    pub fn new(points: Grid<PointColor>, snr: Grid<f32>, color_order: ColorOrder) -> Self {
        Self {
            points,
            snr,
            color_order,
        }
    }

    /// Merge both arrays into a frame. Fails when their dimensions differ.
    pub fn into_frame(self) -> Result<Frame, AcquisitionError> {
        Ok(Frame::from_parts(self.points, self.snr, self.color_order)?)
    }
}

/// Closes the wrapped session exactly once, when dropped at the latest.
pub struct SessionGuard<S: DeviceSession> {
    session: S,
    closed: bool,
}

impl<S: DeviceSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Close the session now and report the result.
    pub fn close(mut self) -> Result<(), AcquisitionError> {
        self.closed = true;
        debug!("Closing device session");
        self.session.close()
    }
}

impl<S: DeviceSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: DeviceSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: DeviceSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.session.close() {
            warn!("Failed to close device session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthgrab_data::{Point3D, Rgba};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSession {
        closes: Rc<Cell<u32>>,
    }

    impl DeviceSession for CountingSession {
        fn configure(&mut self, _: &AcquisitionSettings) -> Result<(), AcquisitionError> {
            Ok(())
        }

        fn capture(&mut self) -> Result<RawCapture, AcquisitionError> {
            Err(AcquisitionError::Capture("no frame".into()))
        }

        fn close(&mut self) -> Result<(), AcquisitionError> {
            self.closes.set(self.closes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let closes = Rc::new(Cell::new(0));
        {
            let mut guard = SessionGuard::new(CountingSession {
                closes: closes.clone(),
            });
            assert!(guard.capture().is_err());
        }
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_guard_closes_once() {
        let closes = Rc::new(Cell::new(0));
        let guard = SessionGuard::new(CountingSession {
            closes: closes.clone(),
        });
        guard.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_raw_capture_mismatch() {
        let points = Grid::from_vec(
            2,
            1,
            vec![PointColor::new(Point3D::splat(1.0), Rgba::default()); 2],
        )
        .unwrap();
        let snr = Grid::from_vec(1, 2, vec![1.0; 2]).unwrap();
        let err = RawCapture::new(points, snr, ColorOrder::Rgba)
            .into_frame()
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Frame(_)));
    }
}

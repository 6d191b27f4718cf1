//! Single-shot acquisition: connect, configure, capture, populate.

use crate::error::AcquisitionError;
use crate::session::{DeviceDriver, DeviceSession, SessionGuard};
use crate::settings::AcquisitionSettings;
use depthgrab_data::{Container, PopulateStats};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Configure,
    Capture,
    Populate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connect => write!(f, "connect"),
            Stage::Configure => write!(f, "configure"),
            Stage::Capture => write!(f, "capture"),
            Stage::Populate => write!(f, "populate"),
        }
    }
}

/// Callbacks invoked by [`acquire`] between stages.
pub trait AcquisitionHooks {
    /// Called once the device is configured, right before triggering.
    fn before_capture(&mut self) {}

    /// Called when a stage starts.
    fn on_stage(&mut self, _stage: Stage) {}
}

impl AcquisitionHooks for () {}

/// Outcome of a successful acquisition.
#[derive(Debug, Clone)]
pub struct AcquisitionReport {
    pub device: String,
    pub width: usize,
    pub height: usize,
    pub stats: PopulateStats,
    /// Time spent in capture and population.
    pub elapsed: Duration,
}

/// Acquire one point cloud from `driver` into `container`.
///
/// Stages run strictly in order and the first failure aborts the rest. The
/// session is closed on every path once it has been opened; a failing close
/// is logged and does not replace the result. On success the container's
/// invalid-data flag is set, since sensors mark missing points with NaN.
#[tracing::instrument(skip_all, fields(device = %driver.name()))]
pub fn acquire<D, H>(
    driver: &mut D,
    settings: &AcquisitionSettings,
    container: &mut Container,
    hooks: &mut H,
) -> Result<AcquisitionReport, AcquisitionError>
where
    D: DeviceDriver,
    H: AcquisitionHooks + ?Sized,
{
    hooks.on_stage(Stage::Connect);
    info!("Connecting the camera...");
    let mut session = SessionGuard::new(driver.open()?);

    let result = run_session(&mut *session, settings, container, hooks);

    if let Err(e) = session.close() {
        warn!("Failed to disconnect the camera: {}", e);
    }

    let (width, height, stats, elapsed) = result?;
    Ok(AcquisitionReport {
        device: driver.name().to_string(),
        width,
        height,
        stats,
        elapsed,
    })
}

fn run_session<S, H>(
    session: &mut S,
    settings: &AcquisitionSettings,
    container: &mut Container,
    hooks: &mut H,
) -> Result<(usize, usize, PopulateStats, Duration), AcquisitionError>
where
    S: DeviceSession,
    H: AcquisitionHooks + ?Sized,
{
    hooks.on_stage(Stage::Configure);
    info!("Applying acquisition settings...");
    session.configure(settings)?;

    hooks.before_capture();

    hooks.on_stage(Stage::Capture);
    info!("Capturing a frame...");
    let started = Instant::now();
    let frame = session.capture()?.into_frame()?;
    debug!(
        "Frame {}x{} with {} valid points",
        frame.width(),
        frame.height(),
        frame.valid_count()
    );

    hooks.on_stage(Stage::Populate);
    info!("Converting point cloud into container...");
    let stats = container.populate(&frame)?;
    container.set_invalid_data_flag(true);

    Ok((frame.width(), frame.height(), stats, started.elapsed()))
}

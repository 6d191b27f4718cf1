//! Deterministic synthetic structured-light camera.
//!
//! Renders a tilted plane with a sphere in front of it. Exposure and
//! aperture drive the per-pixel SNR, a sparse set of flying pixels is
//! injected so outlier removal has something to do, and the image border
//! is left unmeasured (NaN) like a real sensor's shadowed edges.

use crate::error::AcquisitionError;
use crate::session::{DeviceDriver, DeviceSession, RawCapture};
use crate::settings::{AcquisitionSettings, SettingsLimits};
use depthgrab_data::{ColorOrder, Grid, Point3D, PointColor, Rgba};
use glam::Vec3;
use std::time::Duration;
use tracing::{debug, info};

/// Distance from the sensor to the background plane at the image center, in mm.
const PLANE_DISTANCE: f32 = 700.0;
/// Depth change of the plane per mm of lateral offset.
const PLANE_TILT: f32 = 0.15;
const SPHERE_CENTER: Vec3 = Vec3::new(0.0, 0.0, 580.0);
const SPHERE_RADIUS: f32 = 90.0;
/// Depth error of an injected flying pixel, in mm.
const FLYING_PIXEL_OFFSET: f32 = 60.0;
/// Fixed per-capture processing time on top of the projected patterns.
const PROCESSING_TIME: Duration = Duration::from_millis(50);

/// Failure to inject into a simulated camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFault {
    /// `open` fails as if no camera were connected.
    Unplugged,
    /// `capture` fails after configuration succeeded.
    CaptureFailure,
    /// The confidence grid comes back one column short.
    MismatchedConfidence,
    /// `close` fails.
    DisconnectFailure,
}

/// Static description of the simulated sensor.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    pub width: usize,
    pub height: usize,
    pub serial: String,
    /// Order the sensor reports colors in.
    pub color_order: ColorOrder,
    /// Sleep for the simulated acquisition time during `capture`.
    pub realtime: bool,
    pub fault: Option<SimulatedFault>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            serial: "SIM-0001".to_string(),
            color_order: ColorOrder::Rgba,
            realtime: false,
            fault: None,
        }
    }
}

/// Driver for the simulated camera.
pub struct SimulatedCamera {
    config: SimulatedConfig,
    name: String,
}

impl SimulatedCamera {
    pub fn new(config: SimulatedConfig) -> Self {
        let name = format!("simulated {}", config.serial);
        Self { config, name }
    }

    /// Create a camera with the given resolution and default everything else.
    pub fn with_resolution(width: usize, height: usize) -> Self {
        Self::new(SimulatedConfig {
            width,
            height,
            ..SimulatedConfig::default()
        })
    }

    /// Make the camera fail in the given way.
    pub fn with_fault(mut self, fault: SimulatedFault) -> Self {
        self.config.fault = Some(fault);
        self
    }

    /// Settings ranges accepted by the simulated sensor.
    pub fn limits() -> SettingsLimits {
        SettingsLimits {
            exposure_time: Duration::from_micros(900)..=Duration::from_millis(100),
            aperture: 1.4..=32.0,
            outlier_threshold: 0.1..=100.0,
        }
    }
}

impl DeviceDriver for SimulatedCamera {
    type Session = SimulatedSession;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<SimulatedSession, AcquisitionError> {
        if self.config.fault == Some(SimulatedFault::Unplugged) {
            return Err(AcquisitionError::Connection(format!(
                "no camera with serial {} found",
                self.config.serial
            )));
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Err(AcquisitionError::Connection(format!(
                "invalid sensor resolution {}x{}",
                self.config.width, self.config.height
            )));
        }
        info!(
            "Connected to {} ({}x{})",
            self.name, self.config.width, self.config.height
        );
        Ok(SimulatedSession {
            config: self.config.clone(),
            settings: None,
            frames_captured: 0,
        })
    }
}

/// Open session on a simulated camera.
pub struct SimulatedSession {
    config: SimulatedConfig,
    settings: Option<AcquisitionSettings>,
    frames_captured: u64,
}

impl SimulatedSession {
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Time one capture takes with the given settings.
    pub fn acquisition_time(settings: &AcquisitionSettings) -> Duration {
        settings.exposure_time * settings.engine.pattern_count() + PROCESSING_TIME
    }
}

impl DeviceSession for SimulatedSession {
    fn configure(&mut self, settings: &AcquisitionSettings) -> Result<(), AcquisitionError> {
        SimulatedCamera::limits().check(settings)?;
        debug!(
            "Configured exposure {:?}, f/{}, engine {}, outlier removal {} (threshold {})",
            settings.exposure_time,
            settings.aperture,
            settings.engine,
            settings.outlier_removal,
            settings.outlier_threshold
        );
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn capture(&mut self) -> Result<RawCapture, AcquisitionError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| AcquisitionError::Config("session not configured".into()))?;

        let acquisition_time = Self::acquisition_time(settings);
        if acquisition_time > settings.capture_timeout {
            return Err(AcquisitionError::Timeout(settings.capture_timeout));
        }
        if self.config.fault == Some(SimulatedFault::CaptureFailure) {
            return Err(AcquisitionError::Capture("projector did not trigger".into()));
        }
        if self.config.realtime {
            std::thread::sleep(acquisition_time);
        }

        let (points, snr) = render_scene(self.config.width, self.config.height, settings);
        self.frames_captured += 1;

        let snr_width = match self.config.fault {
            Some(SimulatedFault::MismatchedConfidence) => self.config.width - 1,
            _ => self.config.width,
        };
        let snr = snr
            .chunks_exact(self.config.width)
            .flat_map(|row| row[..snr_width].iter().copied())
            .collect();

        debug!("Captured frame {}", self.frames_captured);
        Ok(RawCapture::new(
            Grid::from_vec(self.config.width, self.config.height, points)?,
            Grid::from_vec(snr_width, self.config.height, snr)?,
            self.config.color_order,
        ))
    }

    fn close(&mut self) -> Result<(), AcquisitionError> {
        if self.config.fault == Some(SimulatedFault::DisconnectFailure) {
            return Err(AcquisitionError::Connection("device stopped responding".into()));
        }
        info!(
            "Disconnected {} after {} frames",
            self.config.serial, self.frames_captured
        );
        Ok(())
    }
}

/// Render the scene into row-major position/color and SNR arrays.
fn render_scene(
    width: usize,
    height: usize,
    settings: &AcquisitionSettings,
) -> (Vec<PointColor>, Vec<f32>) {
    let focal = width as f32 * 1.2;
    let (cx, cy) = ((width as f32 - 1.0) * 0.5, (height as f32 - 1.0) * 0.5);
    let border = (width.min(height) / 50).max(1);

    // longer exposure and a wider aperture collect more light
    let exposure_ms = settings.exposure_time.as_secs_f32() * 1000.0;
    let light = (exposure_ms / 5.0).sqrt() * (2.0 / settings.aperture as f32).powi(2);

    let mut points = Vec::with_capacity(width * height);
    let mut snr = Vec::with_capacity(width * height);

    for y in 0..height {
        for x in 0..width {
            let shadowed = x < border || y < border || x >= width - border || y >= height - border;
            if shadowed {
                points.push(PointColor::new(Point3D::splat(f32::NAN), Rgba::default()));
                snr.push(0.0);
                continue;
            }

            let ray = Vec3::new((x as f32 - cx) / focal, (y as f32 - cy) / focal, 1.0);
            let (mut position, color, facing) = match intersect_sphere(ray) {
                Some(p) => (p, sphere_color(p), sphere_normal(p).dot(-Vec3::Z).max(0.0)),
                None => {
                    let p = intersect_plane(ray);
                    (p, plane_color(p), 1.0)
                }
            };

            let mut pixel_snr = (40.0 * light * facing * (PLANE_DISTANCE / position.z)).max(0.0);

            if (x * 7 + y * 13) % 97 == 0 {
                position *= (position.z + FLYING_PIXEL_OFFSET) / position.z;
                pixel_snr *= 0.2;
                if settings.outlier_removal && FLYING_PIXEL_OFFSET as f64 > settings.outlier_threshold {
                    points.push(PointColor::new(Point3D::splat(f32::NAN), color));
                    snr.push(0.0);
                    continue;
                }
            }

            points.push(PointColor::new(position.into(), color));
            snr.push(pixel_snr);
        }
    }

    (points, snr)
}

fn intersect_plane(ray: Vec3) -> Vec3 {
    // z = PLANE_DISTANCE + PLANE_TILT * x, with (x, z) = t * (ray.x, 1)
    let t = PLANE_DISTANCE / (1.0 - PLANE_TILT * ray.x);
    ray * t
}

fn intersect_sphere(ray: Vec3) -> Option<Vec3> {
    let a = ray.length_squared();
    let b = ray.dot(SPHERE_CENTER);
    let c = SPHERE_CENTER.length_squared() - SPHERE_RADIUS * SPHERE_RADIUS;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (b - disc.sqrt()) / a;
    (t > 0.0).then(|| ray * t)
}

fn sphere_normal(p: Vec3) -> Vec3 {
    (p - SPHERE_CENTER).normalize_or_zero()
}

fn sphere_color(p: Vec3) -> Rgba {
    let shade = sphere_normal(p).dot(-Vec3::Z).clamp(0.2, 1.0);
    Rgba::opaque((240.0 * shade) as u8, (140.0 * shade) as u8, (40.0 * shade) as u8)
}

fn plane_color(p: Vec3) -> Rgba {
    let checker = ((p.x / 40.0).floor() as i32 + (p.y / 40.0).floor() as i32).rem_euclid(2);
    if checker == 0 {
        Rgba::opaque(200, 200, 200)
    } else {
        Rgba::opaque(60, 90, 160)
    }
}

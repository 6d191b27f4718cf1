//! Depthgrab Capture - point cloud acquisition from 3D sensors
//!
//! This crate defines the `DeviceDriver` / `DeviceSession` traits every
//! sensor backend implements, and the single-shot [`acquire`] pipeline that
//! drives a session and fills a caller-owned [`Container`].
//!
//! Backends:
//!
//! - Simulated structured-light camera (always available)
//! - PLY replay of previously exported clouds (requires `replay` feature)
//!
//! ## Example
//!
//! ```ignore
//! use depthgrab_capture::{AcquisitionSettings, SimulatedCamera, acquire};
//! use depthgrab_data::Container;
//!
//! let mut camera = SimulatedCamera::with_resolution(640, 480);
//! let mut container = Container::new();
//! let report = acquire(&mut camera, &AcquisitionSettings::default(), &mut container, &mut ())?;
//! ```

pub mod devices;
mod error;
mod pipeline;
mod session;
mod settings;

pub use devices::{Backend, SimulatedCamera, SimulatedConfig, SimulatedFault, SimulatedSession};
#[cfg(feature = "replay")]
pub use devices::{ReplayCamera, ReplaySession};
pub use error::{AcquisitionError, ErrorKind};
pub use pipeline::{AcquisitionHooks, AcquisitionReport, Stage, acquire};
pub use session::{DeviceDriver, DeviceSession, RawCapture, SessionGuard};
pub use settings::{AcquisitionSettings, Engine, SettingsError, SettingsLimits};

// Re-export the container types for convenience
pub use depthgrab_data::{Container, Frame, PopulateStats};

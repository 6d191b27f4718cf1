//! Depthgrab
//!
//! Acquires one 3D point cloud from a depth camera, converts it into a
//! range/reflectance/confidence container and displays it.
//!
//! Features:
//! - Simulated structured-light camera and PLY replay backends
//! - Acquisition settings from a JSON file, overridable per flag
//! - Summary, PLY export and PNG preview display sinks

mod app;
mod console;
mod display;

use app::{ContainerConfig, DeviceConfig, GrabApp, LoggingConfig, Outcome};
use clap::Parser;
use depthgrab_capture::{AcquisitionSettings, Engine, SimulatedConfig};
use depthgrab_data::{ColorOrder, PlyFormat};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Depthgrab - acquire and display a 3D point cloud
#[derive(Parser, Debug)]
#[command(name = "depthgrab")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device backend to acquire from (simulated, replay)
    #[arg(short, long, default_value = "simulated")]
    device: String,

    /// JSON file with acquisition settings
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Exposure time per pattern in microseconds
    #[arg(long)]
    exposure_us: Option<u64>,

    /// Lens aperture (f-number)
    #[arg(long)]
    aperture: Option<f64>,

    /// Outlier removal threshold in mm
    #[arg(long)]
    outlier_threshold: Option<f64>,

    /// Disable outlier removal
    #[arg(long)]
    no_outlier_removal: bool,

    /// Reconstruction engine (phase, stripe)
    #[arg(long)]
    engine: Option<Engine>,

    /// Capture timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Simulated sensor width
    #[arg(long, default_value_t = 320)]
    width: usize,

    /// Simulated sensor height
    #[arg(long, default_value_t = 240)]
    height: usize,

    /// Make the simulated sensor take as long as a real capture
    #[arg(long)]
    realtime: bool,

    /// PLY file to replay
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Grid width of the replayed file, if its header lacks one
    #[arg(long)]
    replay_width: Option<usize>,

    /// Row alignment of container buffers, in elements
    #[arg(long, default_value_t = 1)]
    row_alignment: usize,

    /// Color order of the container's reflectance buffer (rgba, bgra)
    #[arg(long, default_value = "bgra")]
    color_order: ColorOrder,

    /// Export the point cloud to this PLY file
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Write the PLY export in binary
    #[arg(long)]
    binary: bool,

    /// Write reflectance/confidence PNG previews into this directory
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Do not wait for Enter at the prompts
    #[arg(long)]
    no_prompt: bool,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Settings file first, then flag overrides.
    fn acquisition_settings(&self) -> Result<AcquisitionSettings, Box<dyn std::error::Error>> {
        let mut settings = match &self.settings {
            Some(path) => AcquisitionSettings::from_json_file(path)?,
            None => AcquisitionSettings::default(),
        };
        if let Some(us) = self.exposure_us {
            settings.exposure_time = Duration::from_micros(us);
        }
        if let Some(aperture) = self.aperture {
            settings.aperture = aperture;
        }
        if let Some(threshold) = self.outlier_threshold {
            settings.outlier_threshold = threshold;
        }
        if self.no_outlier_removal {
            settings.outlier_removal = false;
        }
        if let Some(engine) = self.engine {
            settings.engine = engine;
        }
        if let Some(ms) = self.timeout_ms {
            settings.capture_timeout = Duration::from_millis(ms);
        }
        Ok(settings)
    }
}

fn main() {
    let args = Args::parse();

    let settings = match args.acquisition_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Application error: {}", e);
            std::process::exit(1);
        }
    };

    let device = DeviceConfig {
        backend: args.device.clone(),
        simulated: SimulatedConfig {
            width: args.width,
            height: args.height,
            realtime: args.realtime,
            ..SimulatedConfig::default()
        },
        replay_path: args.replay.clone(),
        replay_width: args.replay_width,
    };

    let mut app = GrabApp::new()
        .with_logging(LoggingConfig {
            level: args.log_level.clone(),
        })
        .with_device(device)
        .with_settings(settings)
        .with_container(ContainerConfig {
            color_order: args.color_order,
            row_alignment: args.row_alignment,
        })
        .with_interactive(!args.no_prompt);

    if let Some(path) = args.export {
        let format = if args.binary {
            PlyFormat::Binary
        } else {
            PlyFormat::Ascii
        };
        app = app.with_ply_export(path, format);
    }
    if let Some(dir) = args.preview {
        app = app.with_preview(dir);
    }

    // failures are reported by the app and still exit 0
    match app.run() {
        Outcome::Acquired(report) => debug!("Done: {} valid points", report.stats.valid),
        Outcome::Failed(e) => debug!("Done after {} error", e.kind()),
        Outcome::Unavailable => debug!("Done without a device"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "depthgrab",
            "--exposure-us",
            "8000",
            "--no-outlier-removal",
            "--engine",
            "stripe",
        ]);
        let settings = args.acquisition_settings().unwrap();
        assert_eq!(settings.exposure_time, Duration::from_micros(8000));
        assert!(!settings.outlier_removal);
        assert_eq!(settings.engine, Engine::Stripe);
        assert_eq!(settings.aperture, 2.0);
    }

    #[test]
    fn test_missing_settings_file_is_an_error() {
        let args = Args::parse_from(["depthgrab", "--settings", "/nonexistent/settings.json"]);
        assert!(args.acquisition_settings().is_err());
    }

    #[test]
    fn test_color_order_flag() {
        let args = Args::parse_from(["depthgrab", "--color-order", "rgba"]);
        assert_eq!(args.color_order, ColorOrder::Rgba);
    }
}

//! Organized capture example
//!
//! Acquires one frame from the simulated camera into a padded BGRA
//! container and walks the valid points through the pitch-aware layout.
//!
//! Usage:
//!   cargo run --example organized_capture -- [width] [height]

use depthgrab::capture::{AcquisitionSettings, SimulatedCamera, acquire};
use depthgrab::data::{ColorOrder, Container};
use std::error::Error;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let width = args.next().map(|s| s.parse()).transpose()?.unwrap_or(64);
    let height = args.next().map(|s| s.parse()).transpose()?.unwrap_or(48);

    let mut camera = SimulatedCamera::with_resolution(width, height);
    let settings = AcquisitionSettings::default().with_outlier_removal(Some(20.0));
    let mut container = Container::new()
        .with_color_order(ColorOrder::Bgra)
        .with_row_alignment(16);

    let report = acquire(&mut camera, &settings, &mut container, &mut ())?;
    info!(
        "Acquired {}x{} in {:?}, {} valid points",
        report.width, report.height, report.elapsed, report.stats.valid
    );

    let range = container.range().ok_or("no range component")?;
    info!("Row pitch: {} elements for {} columns", range.pitch(), range.width());

    // center pixel through the padded index
    let (cx, cy) = (range.width() / 2, range.height() / 2);
    if let Some(point) = range.get(cx, cy) {
        info!("Center ({}, {}) -> {:?}", cx, cy, point.to_vec3());
    }

    if let Some((min, max)) = container.bounds() {
        info!("Bounds: {:?} .. {:?}", min, max);
    }
    if let Some(mean) = container.mean_confidence() {
        info!("Mean confidence: {:.2}", mean);
    }

    for (position, rgba, confidence) in container.valid_points().take(5) {
        info!(
            "Point {:?} rgba {:?} confidence {:.2}",
            position.to_vec3(),
            rgba,
            confidence
        );
    }

    Ok(())
}

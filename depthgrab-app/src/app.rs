//! Application configuration and the linear acquire-and-display flow.

use crate::console::{self, Console, PromptHooks};
use crate::display::{DisplaySink, PlyExporter, PreviewImages, SummaryDisplay};
use depthgrab_capture::{
    AcquisitionError, AcquisitionReport, AcquisitionSettings, Backend, DeviceDriver,
    SimulatedCamera, SimulatedConfig, acquire,
};
use depthgrab_data::{ColorOrder, Container, PlyFormat};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which device to open and how.
pub struct DeviceConfig {
    /// Backend name as given on the command line.
    pub backend: String,
    pub simulated: SimulatedConfig,
    pub replay_path: Option<PathBuf>,
    pub replay_width: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated.to_string(),
            simulated: SimulatedConfig::default(),
            replay_path: None,
            replay_width: None,
        }
    }
}

/// Layout of the destination container.
pub struct ContainerConfig {
    pub color_order: ColorOrder,
    pub row_alignment: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            color_order: ColorOrder::Bgra,
            row_alignment: 1,
        }
    }
}

/// How a run ended. Both outcomes exit with status 0.
#[derive(Debug)]
pub enum Outcome {
    /// The backend is not part of this build; instructions were printed.
    Unavailable,
    Acquired(AcquisitionReport),
    Failed(AcquisitionError),
}

/// Builder for configuring and running the example.
pub struct GrabApp {
    device: DeviceConfig,
    settings: AcquisitionSettings,
    container: ContainerConfig,
    sinks: Vec<Box<dyn DisplaySink>>,
    logging: LoggingConfig,
    interactive: bool,
}

impl GrabApp {
    /// Create a new GrabApp with default settings.
    pub fn new() -> Self {
        Self {
            device: DeviceConfig::default(),
            settings: AcquisitionSettings::default(),
            container: ContainerConfig::default(),
            sinks: vec![Box::new(SummaryDisplay::new())],
            logging: LoggingConfig::default(),
            interactive: true,
        }
    }

    /// Configure the device.
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set the acquisition settings.
    pub fn with_settings(mut self, settings: AcquisitionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Configure the destination container.
    pub fn with_container(mut self, container: ContainerConfig) -> Self {
        self.container = container;
        self
    }

    /// Export the cloud as PLY after a successful capture.
    pub fn with_ply_export(mut self, path: PathBuf, format: PlyFormat) -> Self {
        self.sinks.push(Box::new(PlyExporter::new(path, format)));
        self
    }

    /// Write preview PNGs after a successful capture.
    pub fn with_preview(mut self, dir: PathBuf) -> Self {
        self.sinks.push(Box::new(PreviewImages::new(dir)));
        self
    }

    /// Wait for Enter at each prompt.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Run the application.
    pub fn run(self) -> Outcome {
        self.init_logging();
        self.run_flow()
    }

    fn run_flow(self) -> Outcome {
        let console = Console::stdout(self.interactive);
        self.run_on(&console)
    }

    fn run_on<W: Write>(mut self, console: &Console<W>) -> Outcome {
        console.print(console::HEADER);

        let backend = match self.device.backend.parse::<Backend>() {
            Ok(backend) if backend.is_available() => backend,
            _ => {
                console.print(&console::setup_instructions(&self.device.backend));
                console.pause("end");
                return Outcome::Unavailable;
            }
        };

        console.pause("start");

        let mut container = Container::new()
            .with_color_order(self.container.color_order)
            .with_row_alignment(self.container.row_alignment);

        let result = match backend {
            Backend::Simulated => {
                let mut camera = SimulatedCamera::new(self.device.simulated.clone());
                self.acquire_from(&mut camera, &mut container, console)
            }
            Backend::Replay => self.acquire_replay(&mut container, console),
        };

        let outcome = match result {
            Ok(report) => {
                info!(
                    "Acquired {}x{} from {} in {:?}",
                    report.width, report.height, report.device, report.elapsed
                );
                self.display(&container);
                console.print("\nThe point cloud is displayed.\n");
                console.pause("continue");
                Outcome::Acquired(report)
            }
            Err(e) => {
                error!("Acquisition failed ({} error): {}", e.kind(), e);
                console.print(&format!("\nAn error occurred using the 3d camera: {}\n", e));
                Outcome::Failed(e)
            }
        };

        console.pause("end");
        outcome
    }

    fn acquire_from<D: DeviceDriver, W: Write>(
        &self,
        driver: &mut D,
        container: &mut Container,
        console: &Console<W>,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        let mut hooks = PromptHooks::new(console);
        acquire(driver, &self.settings, container, &mut hooks)
    }

    #[cfg(feature = "replay")]
    fn acquire_replay<W: Write>(
        &self,
        container: &mut Container,
        console: &Console<W>,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        let path = self.device.replay_path.clone().ok_or_else(|| {
            AcquisitionError::Connection("no PLY file given for replay (use --replay)".into())
        })?;
        let mut camera = depthgrab_capture::ReplayCamera::new(path);
        if let Some(width) = self.device.replay_width {
            camera = camera.with_width(width);
        }
        self.acquire_from(&mut camera, container, console)
    }

    #[cfg(not(feature = "replay"))]
    fn acquire_replay<W: Write>(
        &self,
        _container: &mut Container,
        _console: &Console<W>,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        Err(AcquisitionError::Connection(
            "replay backend not compiled in".into(),
        ))
    }

    fn display(&mut self, container: &Container) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.display(container) {
                warn!("Display '{}' failed: {}", sink.name(), e);
            }
        }
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .try_init();
    }
}

impl Default for GrabApp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthgrab_capture::{ErrorKind, SimulatedFault};

    fn quiet() -> GrabApp {
        GrabApp::new().with_interactive(false)
    }

    fn simulated(fault: Option<SimulatedFault>) -> DeviceConfig {
        DeviceConfig {
            simulated: SimulatedConfig {
                width: 24,
                height: 16,
                fault,
                ..SimulatedConfig::default()
            },
            ..DeviceConfig::default()
        }
    }

    #[test]
    fn test_unknown_backend_prints_instructions() {
        let outcome = quiet()
            .with_device(DeviceConfig {
                backend: "zivid".to_string(),
                ..DeviceConfig::default()
            })
            .run_flow();
        assert!(matches!(outcome, Outcome::Unavailable));
    }

    #[test]
    fn test_simulated_run() {
        let outcome = quiet().with_device(simulated(None)).run_flow();
        match outcome {
            Outcome::Acquired(report) => assert_eq!(report.stats.written, 24 * 16),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn prompts(console: Console<Vec<u8>>) -> Vec<String> {
        String::from_utf8(console.into_output())
            .unwrap()
            .lines()
            .filter(|line| line.starts_with("Press <Enter>"))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_prompts_after_display() {
        let console = Console::new(Vec::new(), false);
        let outcome = quiet().with_device(simulated(None)).run_on(&console);
        assert!(matches!(outcome, Outcome::Acquired(_)));
        assert_eq!(
            prompts(console),
            [
                "Press <Enter> to start.",
                "Press <Enter> to continue.",
                "Press <Enter> to continue.",
                "Press <Enter> to end.",
            ]
        );
    }

    #[test]
    fn test_prompts_after_failure() {
        let console = Console::new(Vec::new(), false);
        let outcome = quiet()
            .with_device(simulated(Some(SimulatedFault::Unplugged)))
            .run_on(&console);
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(
            prompts(console),
            ["Press <Enter> to start.", "Press <Enter> to end."]
        );
    }

    #[test]
    fn test_failure_is_reported_not_propagated() {
        let outcome = quiet()
            .with_device(simulated(Some(SimulatedFault::Unplugged)))
            .run_flow();
        match outcome {
            Outcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Connection),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_export_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ply");

        let outcome = quiet()
            .with_device(simulated(None))
            .with_ply_export(path.clone(), PlyFormat::Binary)
            .run_flow();
        assert!(matches!(outcome, Outcome::Acquired(_)));

        let outcome = quiet()
            .with_device(DeviceConfig {
                backend: "replay".to_string(),
                replay_path: Some(path),
                ..DeviceConfig::default()
            })
            .run_flow();
        match outcome {
            Outcome::Acquired(report) => {
                assert_eq!((report.width, report.height), (24, 16));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}

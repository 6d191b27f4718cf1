//! Concrete device backends.

#[cfg(feature = "replay")]
mod replay;
mod simulated;

#[cfg(feature = "replay")]
pub use replay::{ReplayCamera, ReplaySession};
pub use simulated::{SimulatedCamera, SimulatedConfig, SimulatedFault, SimulatedSession};

use std::fmt;

/// Device backends known to this build or to the documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Synthetic camera, always available.
    Simulated,
    /// PLY replay, available with the `replay` feature.
    Replay,
}

impl Backend {
    /// Get all backends.
    pub fn all() -> &'static [Backend] {
        &[Backend::Simulated, Backend::Replay]
    }

    /// Whether the backend was compiled into this build.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Simulated => true,
            Backend::Replay => cfg!(feature = "replay"),
        }
    }

    /// Backends usable in this build.
    pub fn available() -> Vec<Backend> {
        Self::all().iter().copied().filter(|b| b.is_available()).collect()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Simulated => write!(f, "simulated"),
            Backend::Replay => write!(f, "replay"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(Backend::Simulated),
            "replay" => Ok(Backend::Replay),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_always_available() {
        assert!(Backend::Simulated.is_available());
        assert!(Backend::available().contains(&Backend::Simulated));
    }

    #[test]
    fn test_parse() {
        assert_eq!("SIM".parse::<Backend>(), Ok(Backend::Simulated));
        assert_eq!("zivid".parse::<Backend>(), Err("zivid".to_string()));
    }
}

//! Acquisition error types.

use depthgrab_data::{AllocationError, FrameError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while acquiring a point cloud.
///
/// Every variant is terminal for the current run; nothing is retried.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Failed to connect to device: {0}")]
    Connection(String),

    #[error("Device rejected settings: {0}")]
    Config(String),

    #[error("Failed to capture frame: {0}")]
    Capture(String),

    #[error("Invalid frame data: {0}")]
    Frame(#[from] FrameError),

    #[error("Capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to allocate container buffers: {0}")]
    Allocation(#[from] AllocationError),
}

/// Coarse classification of an [`AcquisitionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Config,
    Capture,
    Timeout,
    Allocation,
}

impl AcquisitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcquisitionError::Connection(_) => ErrorKind::Connection,
            AcquisitionError::Config(_) => ErrorKind::Config,
            AcquisitionError::Capture(_) | AcquisitionError::Frame(_) => ErrorKind::Capture,
            AcquisitionError::Timeout(_) => ErrorKind::Timeout,
            AcquisitionError::Allocation(_) => ErrorKind::Allocation,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Connection => write!(f, "connection"),
            ErrorKind::Config => write!(f, "configuration"),
            ErrorKind::Capture => write!(f, "capture"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Allocation => write!(f, "allocation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_errors_are_capture_errors() {
        let err = AcquisitionError::from(FrameError::DimensionMismatch {
            points_width: 2,
            points_height: 1,
            snr_width: 1,
            snr_height: 1,
        });
        assert_eq!(err.kind(), ErrorKind::Capture);
        assert!(err.to_string().contains("2x1"));
    }

    #[test]
    fn test_timeout_message() {
        let err = AcquisitionError::Timeout(Duration::from_millis(5000));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "Capture timed out after 5s");
    }
}

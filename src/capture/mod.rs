//! Frame acquisition sources.
//!
//! This module provides the camera side of the pipeline:
//! - V4L2 devices (feature: capture-v4l2)
//! - Synthetic `stub://` sources (always available, used by tests)
//!
//! A source is opened exactly once at session start; open failure means the
//! session never enters the loop. `read` is called once per iteration and a
//! read failure is terminal for the session: a live stream that stops
//! producing frames is not retried, the loop proceeds directly to drain.

#[cfg(feature = "capture-v4l2")]
mod normalize;
mod synthetic;
#[cfg(feature = "capture-v4l2")]
mod v4l2;

use crate::frame::Frame;
use crate::PipelineError;

#[cfg(feature = "capture-v4l2")]
pub(crate) use normalize::{normalize_to_rgb, PixelFormat};
use synthetic::SyntheticSource;
#[cfg(feature = "capture-v4l2")]
use v4l2::DeviceSource;

/// Configuration for a capture source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Device path (`/dev/video0`) or synthetic scheme (`stub://cam`,
    /// optionally `stub://cam?frames=N` to end the stream after N frames).
    pub device: String,
    /// Requested frame width. Real devices may negotiate something else.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Requested capture rate (frames per second).
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "stub://cam".to_string(),
            width: 640,
            height: 480,
            fps: 20,
        }
    }
}

/// Frame counters for a source, for shutdown logging.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_read: u64,
    pub device: String,
}

enum Backend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "capture-v4l2")]
    Device(DeviceSource),
}

/// The camera side of a session.
///
/// Dispatches to a synthetic source for `stub://` devices and to the V4L2
/// backend for real device paths.
pub struct FrameSource {
    backend: Backend,
}

impl FrameSource {
    pub fn new(config: CaptureConfig) -> Result<Self, PipelineError> {
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: Backend::Synthetic(SyntheticSource::new(config)?),
            });
        }
        #[cfg(feature = "capture-v4l2")]
        {
            Ok(Self {
                backend: Backend::Device(DeviceSource::new(config)),
            })
        }
        #[cfg(not(feature = "capture-v4l2"))]
        {
            Err(PipelineError::DeviceUnavailable(format!(
                "{}: camera support not compiled in (enable capture-v4l2)",
                config.device
            )))
        }
    }

    /// Open the device. Attempted exactly once per session.
    pub fn open(&mut self) -> Result<(), PipelineError> {
        match &mut self.backend {
            Backend::Synthetic(source) => source.open(),
            #[cfg(feature = "capture-v4l2")]
            Backend::Device(source) => source.open(),
        }
    }

    /// Read the next frame. A failure here ends the session.
    pub fn read(&mut self) -> Result<Frame, PipelineError> {
        match &mut self.backend {
            Backend::Synthetic(source) => source.read(),
            #[cfg(feature = "capture-v4l2")]
            Backend::Device(source) => source.read(),
        }
    }

    /// Release the device handle. Idempotent; called from drain.
    pub fn close(&mut self) {
        match &mut self.backend {
            Backend::Synthetic(source) => source.close(),
            #[cfg(feature = "capture-v4l2")]
            Backend::Device(source) => source.close(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            Backend::Synthetic(source) => source.stats(),
            #[cfg(feature = "capture-v4l2")]
            Backend::Device(source) => source.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(device: &str) -> CaptureConfig {
        CaptureConfig {
            device: device.to_string(),
            width: 320,
            height: 240,
            fps: 20,
        }
    }

    #[test]
    fn synthetic_source_produces_configured_geometry() -> Result<(), PipelineError> {
        let mut source = FrameSource::new(stub_config("stub://test"))?;
        source.open()?;

        let frame = source.read()?;
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.channels(), 3);

        Ok(())
    }

    #[test]
    fn synthetic_source_frames_vary_over_time() -> Result<(), PipelineError> {
        let mut source = FrameSource::new(stub_config("stub://test"))?;
        source.open()?;

        let first = source.read()?;
        let second = source.read()?;
        assert_ne!(
            first.raw_bytes(),
            second.raw_bytes(),
            "consecutive synthetic frames must differ"
        );

        Ok(())
    }

    #[test]
    fn frame_limit_ends_the_stream() -> Result<(), PipelineError> {
        let mut source = FrameSource::new(stub_config("stub://test?frames=2"))?;
        source.open()?;

        assert!(source.read().is_ok());
        assert!(source.read().is_ok());
        match source.read() {
            Err(PipelineError::EndOfStream(_)) => {}
            other => panic!("expected EndOfStream, got {:?}", other.map(|f| f.size())),
        }
        assert_eq!(source.stats().frames_read, 2);

        Ok(())
    }

    #[test]
    fn reading_before_open_is_an_error() {
        let mut source = FrameSource::new(stub_config("stub://test")).unwrap();
        assert!(matches!(
            source.read(),
            Err(PipelineError::EndOfStream(_))
        ));
    }
}

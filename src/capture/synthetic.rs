//! Synthetic capture source for development and tests.
//!
//! Produces a drifting color gradient so consecutive frames differ and
//! motion is visible in the preview. A `?frames=N` suffix on the device
//! string caps the stream: after N frames, `read` reports
//! end-of-stream, which is how the shutdown paths are exercised without
//! hardware.

use image::{Rgb, RgbImage};

use super::{CaptureConfig, SourceStats};
use crate::frame::Frame;
use crate::PipelineError;

pub(super) struct SyntheticSource {
    config: CaptureConfig,
    /// Device string with any `?option` suffix stripped.
    name: String,
    frame_limit: Option<u64>,
    fail_open: bool,
    frames_read: u64,
    opened: bool,
}

impl SyntheticSource {
    pub(super) fn new(config: CaptureConfig) -> Result<Self, PipelineError> {
        let (name, options) = parse_device(&config.device)?;
        Ok(Self {
            config,
            name,
            frame_limit: options.frame_limit,
            fail_open: options.fail_open,
            frames_read: 0,
            opened: false,
        })
    }

    pub(super) fn open(&mut self) -> Result<(), PipelineError> {
        if self.fail_open {
            return Err(PipelineError::DeviceUnavailable(format!(
                "{}: synthetic open failure requested",
                self.name
            )));
        }
        self.opened = true;
        log::info!("capture: opened {} (synthetic)", self.name);
        Ok(())
    }

    pub(super) fn read(&mut self) -> Result<Frame, PipelineError> {
        if !self.opened {
            return Err(PipelineError::EndOfStream(format!(
                "{}: source not opened",
                self.name
            )));
        }
        if let Some(limit) = self.frame_limit {
            if self.frames_read >= limit {
                return Err(PipelineError::EndOfStream(format!(
                    "{}: frame limit of {} reached",
                    self.name, limit
                )));
            }
        }
        let frame = self.generate();
        self.frames_read += 1;
        Ok(frame)
    }

    pub(super) fn close(&mut self) {
        if self.opened {
            self.opened = false;
            log::info!("capture: released {} (synthetic)", self.name);
        }
    }

    pub(super) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            device: self.config.device.clone(),
        }
    }

    /// Diagonal gradient, phase-shifted by the frame counter.
    fn generate(&self) -> Frame {
        let phase = (self.frames_read * 3) as u32;
        let mut img = RgbImage::new(self.config.width, self.config.height);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let r = ((x + phase) % 256) as u8;
            let g = ((y + phase) % 256) as u8;
            let b = ((x + y) % 256) as u8;
            *px = Rgb([r, g, b]);
        }
        Frame::Color(img)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DeviceOptions {
    frame_limit: Option<u64>,
    fail_open: bool,
}

fn parse_device(device: &str) -> Result<(String, DeviceOptions), PipelineError> {
    let Some((name, query)) = device.split_once('?') else {
        return Ok((device.to_string(), DeviceOptions::default()));
    };

    let mut options = DeviceOptions::default();
    if let Some(frames) = query.strip_prefix("frames=") {
        options.frame_limit = Some(frames.parse::<u64>().map_err(|_| {
            PipelineError::DeviceUnavailable(format!(
                "{}: frame count must be an integer",
                device
            ))
        })?);
    } else if query == "fail=open" {
        options.fail_open = true;
    } else {
        return Err(PipelineError::DeviceUnavailable(format!(
            "{}: unrecognized synthetic device option {:?}",
            device, query
        )));
    }
    Ok((name.to_string(), options))
}

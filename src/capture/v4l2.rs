//! V4L2 capture backend.
//!
//! Connects to a local device node (e.g. /dev/video0), negotiates an RGB
//! format where possible, and memory-maps a small buffer ring. The device
//! and its stream are held together in a self-referencing state struct so
//! the handle can be dropped as one unit from drain.

use ouroboros::self_referencing;

use super::{normalize_to_rgb, CaptureConfig, PixelFormat, SourceStats};
use crate::frame::Frame;
use crate::PipelineError;
use image::RgbImage;

fn unavailable(device: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::DeviceUnavailable(format!("{}: {}", device, err))
}

fn end_of_stream(device: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::EndOfStream(format!("{}: {}", device, err))
}

pub(super) struct DeviceSource {
    config: CaptureConfig,
    state: Option<DeviceState>,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
    frames_read: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceSource {
    pub(super) fn new(config: CaptureConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::Rgb24,
            config,
            state: None,
            frames_read: 0,
        }
    }

    pub(super) fn open(&mut self) -> Result<(), PipelineError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .map_err(|e| unavailable(&self.config.device, e))?;

        let mut format = device
            .format()
            .map_err(|e| unavailable(&self.config.device, format!("read format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "capture: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device.format().map_err(|e| {
                    unavailable(
                        &self.config.device,
                        format!("read format after set failure: {}", e),
                    )
                })?
            }
        };

        self.active_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"YUYV" => PixelFormat::Yuyv,
            other => {
                return Err(unavailable(
                    &self.config.device,
                    format!(
                        "unsupported pixel format {:?}",
                        String::from_utf8_lossy(other)
                    ),
                ))
            }
        };

        if self.config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "capture: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| e.to_string())
            },
        }
        .try_build()
        .map_err(|e| {
            unavailable(&self.config.device, format!("create buffer stream: {}", e))
        })?;
        self.state = Some(state);

        log::info!(
            "capture: opened {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    pub(super) fn read(&mut self) -> Result<Frame, PipelineError> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| end_of_stream(&self.config.device, "device not opened"))?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|e| end_of_stream(&self.config.device, format!("capture frame: {}", e)))?;

        let rgb = normalize_to_rgb(buf, self.active_width, self.active_height, self.active_format)
            .map_err(|e| end_of_stream(&self.config.device, e))?;
        let img = RgbImage::from_raw(self.active_width, self.active_height, rgb).ok_or_else(
            || {
                end_of_stream(
                    &self.config.device,
                    "frame buffer shorter than negotiated geometry",
                )
            },
        )?;

        self.frames_read += 1;
        Ok(Frame::Color(img))
    }

    pub(super) fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("capture: released {}", self.config.device);
        }
    }

    pub(super) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            device: self.config.device.clone(),
        }
    }
}

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::capture::CaptureConfig;
use crate::display::{DisplayBackend, DisplayConfig};
use crate::ops::FilterKind;

const DEFAULT_FILTER: FilterKind = FilterKind::Smooth;
const DEFAULT_STUB_DEVICE: &str = "stub://cam";
const DEFAULT_V4L2_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 20;

#[derive(Debug, Deserialize, Default)]
struct CamfxConfigFile {
    filter: Option<String>,
    capture: Option<CaptureConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    backend: Option<String>,
    title: Option<String>,
}

/// Resolved session configuration: config file (named by `CAMFX_CONFIG`)
/// under `CAMFX_*` environment overrides, then validated.
#[derive(Debug, Clone)]
pub struct CamfxConfig {
    pub filter: FilterKind,
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
}

impl CamfxConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAMFX_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CamfxConfigFile) -> Result<Self> {
        let filter = match file.filter {
            Some(name) => name.parse::<FilterKind>().map_err(|e| anyhow!(e))?,
            None => DEFAULT_FILTER,
        };
        let capture = CaptureConfig {
            device: file
                .capture
                .as_ref()
                .and_then(|capture| capture.device.clone())
                .unwrap_or_else(|| default_device().to_string()),
            width: file
                .capture
                .as_ref()
                .and_then(|capture| capture.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .capture
                .as_ref()
                .and_then(|capture| capture.height)
                .unwrap_or(DEFAULT_HEIGHT),
            fps: file
                .capture
                .as_ref()
                .and_then(|capture| capture.fps)
                .unwrap_or(DEFAULT_FPS),
        };
        let display = DisplayConfig {
            backend: match file.display.as_ref().and_then(|d| d.backend.as_deref()) {
                Some(name) => parse_backend(name)?,
                None => DisplayConfig::default().backend,
            },
            title: file
                .display
                .and_then(|d| d.title)
                .unwrap_or_else(|| DisplayConfig::default().title),
        };
        Ok(Self {
            filter,
            capture,
            display,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(filter) = std::env::var("CAMFX_FILTER") {
            if !filter.trim().is_empty() {
                self.filter = filter.trim().parse::<FilterKind>().map_err(|e| anyhow!(e))?;
            }
        }
        if let Ok(device) = std::env::var("CAMFX_DEVICE") {
            if !device.trim().is_empty() {
                self.capture.device = device;
            }
        }
        if let Ok(width) = std::env::var("CAMFX_WIDTH") {
            self.capture.width = width
                .parse()
                .map_err(|_| anyhow!("CAMFX_WIDTH must be an integer pixel count"))?;
        }
        if let Ok(height) = std::env::var("CAMFX_HEIGHT") {
            self.capture.height = height
                .parse()
                .map_err(|_| anyhow!("CAMFX_HEIGHT must be an integer pixel count"))?;
        }
        if let Ok(fps) = std::env::var("CAMFX_FPS") {
            self.capture.fps = fps
                .parse()
                .map_err(|_| anyhow!("CAMFX_FPS must be an integer frame rate"))?;
        }
        if let Ok(backend) = std::env::var("CAMFX_DISPLAY") {
            if !backend.trim().is_empty() {
                self.display.backend = parse_backend(backend.trim())?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture geometry must be non-zero"));
        }
        if self.capture.fps == 0 {
            return Err(anyhow!("capture rate must be greater than zero"));
        }
        Ok(())
    }
}

fn default_device() -> &'static str {
    if cfg!(feature = "capture-v4l2") {
        DEFAULT_V4L2_DEVICE
    } else {
        DEFAULT_STUB_DEVICE
    }
}

fn parse_backend(name: &str) -> Result<DisplayBackend> {
    match name {
        "window" => Ok(DisplayBackend::Window),
        "headless" => Ok(DisplayBackend::Headless),
        other => Err(anyhow!(
            "unknown display backend {:?} (expected window or headless)",
            other
        )),
    }
}

fn read_config_file(path: &Path) -> Result<CamfxConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

//! Presentation surfaces.
//!
//! The display is the session's only interactive device. Once per loop
//! iteration the pipeline pumps it: pending key presses become clamped
//! control adjustments on the panel, and the quit signal is reported back.
//! After processing, both the original and the processed stream are
//! presented side by side.
//!
//! Two backends: a real window (feature: display-window) and a headless
//! surface that counts presents and can script a quit, so the full loop
//! runs in tests and on machines with no display at all.
//!
//! Keys on the windowed backend: Q or Escape quits, Tab selects the next
//! control, Up/Down nudge by one, Right/Left step by ten. The window title
//! mirrors the panel, so corrective write-backs are visible immediately.

use std::time::Duration;

use anyhow::Result;

use crate::controls::ControlPanel;
use crate::frame::Frame;

/// How long the per-iteration input poll waits, at minimum.
const POLL_WAIT: Duration = Duration::from_millis(1);

/// Which presentation backend a session uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayBackend {
    Window,
    Headless,
}

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub title: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: if cfg!(feature = "display-window") {
                DisplayBackend::Window
            } else {
                DisplayBackend::Headless
            },
            title: "camfx".to_string(),
        }
    }
}

/// Input gathered from one pump of the surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanelInput {
    pub quit: bool,
}

pub enum DisplaySurface {
    #[cfg(feature = "display-window")]
    Window(window::WindowSurface),
    Headless(HeadlessSurface),
}

impl DisplaySurface {
    pub fn new(config: &DisplayConfig) -> Result<Self> {
        match config.backend {
            DisplayBackend::Headless => Ok(DisplaySurface::Headless(HeadlessSurface::new(None))),
            #[cfg(feature = "display-window")]
            DisplayBackend::Window => Ok(DisplaySurface::Window(window::WindowSurface::new(
                &config.title,
            )?)),
            #[cfg(not(feature = "display-window"))]
            DisplayBackend::Window => Err(anyhow::anyhow!(
                "window display not compiled in (enable display-window)"
            )),
        }
    }

    /// Headless surface whose quit signal fires on the Nth pump. Tests
    /// drive shutdown paths with this.
    pub fn headless_quit_after(pumps: u64) -> Self {
        DisplaySurface::Headless(HeadlessSurface::new(Some(pumps)))
    }

    /// Poll the interactive device: apply pending control input to the
    /// panel, wait at least the minimum poll interval, and report whether
    /// the quit signal fired.
    pub fn pump(&mut self, panel: &mut ControlPanel) -> PanelInput {
        std::thread::sleep(POLL_WAIT);
        match self {
            #[cfg(feature = "display-window")]
            DisplaySurface::Window(surface) => surface.pump(panel),
            DisplaySurface::Headless(surface) => surface.pump(panel),
        }
    }

    /// Present the original and processed streams.
    pub fn present(&mut self, original: &Frame, processed: &Frame, panel: &ControlPanel) -> Result<()> {
        match self {
            #[cfg(feature = "display-window")]
            DisplaySurface::Window(surface) => surface.present(original, processed, panel),
            DisplaySurface::Headless(surface) => surface.present(original, processed),
        }
    }

    /// Release the presentation surface. Idempotent; called from drain.
    pub fn close(&mut self) {
        match self {
            #[cfg(feature = "display-window")]
            DisplaySurface::Window(surface) => surface.close(),
            DisplaySurface::Headless(surface) => surface.close(),
        }
    }

    /// Number of successful presents, for shutdown reporting and tests.
    pub fn presents(&self) -> u64 {
        match self {
            #[cfg(feature = "display-window")]
            DisplaySurface::Window(surface) => surface.presents(),
            DisplaySurface::Headless(surface) => surface.presents(),
        }
    }
}

// ----------------------------------------------------------------------------
// Headless backend
// ----------------------------------------------------------------------------

pub struct HeadlessSurface {
    pumps: u64,
    presents: u64,
    quit_after: Option<u64>,
    open: bool,
}

impl HeadlessSurface {
    fn new(quit_after: Option<u64>) -> Self {
        Self {
            pumps: 0,
            presents: 0,
            quit_after,
            open: true,
        }
    }

    fn pump(&mut self, _panel: &mut ControlPanel) -> PanelInput {
        self.pumps += 1;
        let quit = self.quit_after.is_some_and(|after| self.pumps >= after);
        PanelInput { quit }
    }

    fn present(&mut self, _original: &Frame, _processed: &Frame) -> Result<()> {
        self.presents += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            log::info!("display: released headless surface ({} presents)", self.presents);
        }
    }

    fn presents(&self) -> u64 {
        self.presents
    }
}

// ----------------------------------------------------------------------------
// Windowed backend
// ----------------------------------------------------------------------------

#[cfg(feature = "display-window")]
mod window {
    use super::*;
    use minifb::{Key, KeyRepeat, Window, WindowOptions};

    pub struct WindowSurface {
        window: Option<Window>,
        title: String,
        presents: u64,
    }

    impl WindowSurface {
        pub(super) fn new(title: &str) -> Result<Self> {
            let window = Window::new(title, 1280, 480, WindowOptions {
                resize: true,
                ..WindowOptions::default()
            })
            .map_err(|e| anyhow::anyhow!("open window: {}", e))?;
            Ok(Self {
                window: Some(window),
                title: title.to_string(),
                presents: 0,
            })
        }

        pub(super) fn pump(&mut self, panel: &mut ControlPanel) -> PanelInput {
            let Some(window) = self.window.as_mut() else {
                return PanelInput { quit: true };
            };
            if !window.is_open() {
                return PanelInput { quit: true };
            }

            let mut quit = false;
            for key in window.get_keys_pressed(KeyRepeat::No) {
                match key {
                    Key::Q | Key::Escape => quit = true,
                    Key::Tab => panel.cycle_active(),
                    _ => {}
                }
            }
            for key in window.get_keys_pressed(KeyRepeat::Yes) {
                match key {
                    Key::Up => panel.adjust_active(1),
                    Key::Down => panel.adjust_active(-1),
                    Key::Right => panel.adjust_active(10),
                    Key::Left => panel.adjust_active(-10),
                    _ => {}
                }
            }

            PanelInput { quit }
        }

        pub(super) fn present(
            &mut self,
            original: &Frame,
            processed: &Frame,
            panel: &ControlPanel,
        ) -> Result<()> {
            let Some(window) = self.window.as_mut() else {
                return Ok(());
            };

            let (buffer, width, height) = compose_side_by_side(original, processed);
            window.set_title(&title_line(&self.title, panel));
            window
                .update_with_buffer(&buffer, width, height)
                .map_err(|e| anyhow::anyhow!("present frame: {}", e))?;
            self.presents += 1;
            Ok(())
        }

        pub(super) fn close(&mut self) {
            if self.window.take().is_some() {
                log::info!("display: released window ({} presents)", self.presents);
            }
        }

        pub(super) fn presents(&self) -> u64 {
            self.presents
        }
    }

    /// Window title doubles as the control readout: the active control is
    /// bracketed, and corrected values show up here on the same frame.
    fn title_line(title: &str, panel: &ControlPanel) -> String {
        let mut line = title.to_string();
        for (name, value, active) in panel.snapshot() {
            if active {
                line.push_str(&format!("  [{}: {}]", name, value));
            } else {
                line.push_str(&format!("  {}: {}", name, value));
            }
        }
        line
    }

    /// Pack both streams into one 0RGB buffer, original left, processed
    /// right, black below the shorter one.
    fn compose_side_by_side(original: &Frame, processed: &Frame) -> (Vec<u32>, usize, usize) {
        let width = (original.width() + processed.width()) as usize;
        let height = original.height().max(processed.height()) as usize;
        let mut buffer = vec![0u32; width * height];

        blit(&mut buffer, width, original, 0);
        blit(&mut buffer, width, processed, original.width() as usize);

        (buffer, width, height)
    }

    fn blit(buffer: &mut [u32], stride: usize, frame: &Frame, x_offset: usize) {
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                let [r, g, b] = frame.rgb_at(x, y);
                buffer[y as usize * stride + x_offset + x as usize] =
                    (r as u32) << 16 | (g as u32) << 8 | b as u32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_surface_counts_presents() -> Result<()> {
        let mut surface = DisplaySurface::new(&DisplayConfig {
            backend: DisplayBackend::Headless,
            title: "test".to_string(),
        })?;
        let frame = Frame::solid(8, 8, [1, 1, 1]);
        surface.present(&frame, &frame, &ControlPanel::new())?;
        surface.present(&frame, &frame, &ControlPanel::new())?;
        assert_eq!(surface.presents(), 2);
        Ok(())
    }

    #[test]
    fn scripted_quit_fires_on_the_requested_pump() {
        let mut surface = DisplaySurface::headless_quit_after(3);
        let mut panel = ControlPanel::new();
        assert!(!surface.pump(&mut panel).quit);
        assert!(!surface.pump(&mut panel).quit);
        assert!(surface.pump(&mut panel).quit);
    }
}

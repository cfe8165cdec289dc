//! The session state machine.
//!
//! One session owns one capture source, one control panel, one operator,
//! one display surface, and at most one recording sink, and runs them in
//! strict sequence on a single thread:
//!
//! ```text
//! Initializing -> Running -> Draining -> Stopped
//! ```
//!
//! Each `Running` iteration reads a frame, normalizes the controls (with
//! write-back), applies the operator, presents both streams, appends to the
//! sink when recording, and polls the quit signal, in that fixed order. No
//! step is skipped silently. Back-pressure is implicit: the acquisition
//! rate bounds the loop.
//!
//! Drain is the universal exit path. Whether the loop ends by user quit,
//! end of stream, or a sink failure, the same sequence releases the capture
//! handle, finalizes the sink if it ever opened, and closes the display.
//! Stopping twice is a no-op.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::capture::FrameSource;
use crate::config::CamfxConfig;
use crate::controls::ControlPanel;
use crate::display::DisplaySurface;
use crate::ops::Operator;
use crate::record::MjpegAviSink;
use crate::PipelineError;

/// Recordings are written at this fixed rate regardless of the capture
/// request.
pub const RECORD_FPS: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

/// Counters reported at shutdown.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub presents: u64,
    pub frames_recorded: u32,
    pub corrections: u64,
}

/// One run from device open to full resource release.
pub struct Session {
    source: FrameSource,
    display: DisplaySurface,
    operator: Operator,
    panel: ControlPanel,
    sink: Option<MjpegAviSink>,
    state: LoopState,
    external_quit: Option<Arc<AtomicBool>>,
    stats: SessionStats,
}

impl Session {
    /// Build a session from configuration. The recording sink is engaged
    /// only when an output path is given; its file is created lazily on the
    /// first acquired frame.
    pub fn new(config: &CamfxConfig, output: Option<&Path>) -> Result<Self> {
        let source = FrameSource::new(config.capture.clone())
            .with_context(|| format!("configure capture source {}", config.capture.device))?;
        let display = DisplaySurface::new(&config.display).context("configure display surface")?;
        let operator = Operator::new(config.filter);
        let sink = output.map(MjpegAviSink::new);
        Ok(Self::assemble(source, display, operator, sink))
    }

    /// Wire a session from parts. Tests assemble stub sources and headless
    /// displays through this.
    pub fn assemble(
        source: FrameSource,
        display: DisplaySurface,
        operator: Operator,
        sink: Option<MjpegAviSink>,
    ) -> Self {
        Self {
            source,
            display,
            operator,
            panel: ControlPanel::new(),
            sink,
            state: LoopState::Initializing,
            external_quit: None,
            stats: SessionStats::default(),
        }
    }

    /// Install an externally set quit flag (the SIGINT handler's flag). It
    /// is polled at the same iteration boundary as the quit key.
    pub fn set_quit_flag(&mut self, flag: Arc<AtomicBool>) {
        self.external_quit = Some(flag);
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Run the session to completion. Every exit path drains.
    ///
    /// User quit and end of stream are normal terminations; device and sink
    /// failures are returned after drain has released everything.
    pub fn run(&mut self) -> Result<SessionStats, PipelineError> {
        assert_eq!(self.state, LoopState::Initializing, "session already ran");

        if let Err(err) = self.initialize() {
            log::error!("session failed to initialize: {}", err);
            self.stop();
            return Err(err);
        }

        let outcome = self.run_loop();
        self.stop();

        match outcome {
            Ok(()) => Ok(self.stats),
            Err(PipelineError::EndOfStream(reason)) => {
                // A live stream that stops producing frames ends the
                // session, but the session itself completed cleanly.
                log::warn!("capture stream ended: {}", reason);
                Ok(self.stats)
            }
            Err(err) => {
                log::error!("session failed: {}", err);
                Err(err)
            }
        }
    }

    fn initialize(&mut self) -> Result<(), PipelineError> {
        self.source.open()?;
        self.operator.declare_controls(&mut self.panel);
        log::info!(
            "session: filter={} recording={}",
            self.operator.kind(),
            self.sink.as_ref().map_or("off".to_string(), |s| s
                .path()
                .display()
                .to_string())
        );
        self.transition(LoopState::Running);
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), PipelineError> {
        loop {
            let raw = self.source.read()?;

            if self.panel.normalize_all() {
                self.stats.corrections += 1;
            }

            let processed = self.operator.apply(&raw, &self.panel);

            // The sink's geometry is fixed by the first frame that reaches
            // it: the raw frame, except when the operator changes
            // dimensions, then the processed frame.
            if let Some(sink) = self.sink.as_mut() {
                if !sink.is_open() {
                    let size = if self.operator.sizes_sink_from_processed() {
                        processed.size()
                    } else {
                        raw.size()
                    };
                    sink.open(size, RECORD_FPS)?;
                }
            }

            if let Err(err) = self.display.present(&raw, &processed, &self.panel) {
                // The window system going away is a quit, not a crash.
                log::warn!("display surface lost: {}", err);
                return Ok(());
            }

            if let Some(sink) = self.sink.as_mut() {
                sink.write(&processed)?;
            }
            self.stats.frames_processed += 1;

            let input = self.display.pump(&mut self.panel);
            if input.quit || self.external_quit_requested() {
                log::info!("quit requested");
                return Ok(());
            }
        }
    }

    /// Drain: release every acquired resource, exactly once. Safe to call
    /// at any time, from any state, any number of times.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.transition(LoopState::Draining);

        self.source.close();
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.close() {
                log::warn!("failed to finalize recording: {}", err);
            }
            self.stats.frames_recorded = sink.frames_written();
        }
        self.display.close();

        self.stats.presents = self.display.presents();
        let source_stats = self.source.stats();
        log::info!(
            "session drained: {} frames read from {}, {} presented, {} recorded",
            source_stats.frames_read,
            source_stats.device,
            self.stats.presents,
            self.stats.frames_recorded
        );

        self.transition(LoopState::Stopped);
    }

    fn external_quit_requested(&self) -> bool {
        self.external_quit
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn transition(&mut self, next: LoopState) {
        log::debug!("session state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureConfig;
    use crate::ops::FilterKind;

    fn stub_source(device: &str) -> FrameSource {
        FrameSource::new(CaptureConfig {
            device: device.to_string(),
            width: 64,
            height: 48,
            fps: 20,
        })
        .expect("stub sources always construct")
    }

    #[test]
    fn quit_signal_stops_a_healthy_session() {
        let mut session = Session::assemble(
            stub_source("stub://cam"),
            DisplaySurface::headless_quit_after(3),
            Operator::new(FilterKind::Tone),
            None,
        );
        let stats = session.run().expect("session runs to quit");
        assert_eq!(session.state(), LoopState::Stopped);
        assert_eq!(stats.frames_processed, 3);
        assert_eq!(stats.presents, 3);
    }

    #[test]
    fn initialization_failure_skips_running_but_still_drains() {
        let mut session = Session::assemble(
            stub_source("stub://cam?fail=open"),
            DisplaySurface::headless_quit_after(u64::MAX),
            Operator::new(FilterKind::Smooth),
            None,
        );
        let err = session.run().expect_err("open failure never enters the loop");
        assert!(matches!(err, crate::PipelineError::DeviceUnavailable(_)));
        assert_eq!(session.state(), LoopState::Stopped);
        assert_eq!(session.stats().frames_processed, 0);
        assert_eq!(session.stats().presents, 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut session = Session::assemble(
            stub_source("stub://cam?frames=1"),
            DisplaySurface::headless_quit_after(u64::MAX),
            Operator::new(FilterKind::Mirror),
            None,
        );
        session.run().expect("end of stream is a clean exit");
        assert_eq!(session.state(), LoopState::Stopped);
        session.stop();
        session.stop();
        assert_eq!(session.state(), LoopState::Stopped);
    }

    #[test]
    fn corrections_are_counted() {
        let mut session = Session::assemble(
            stub_source("stub://cam"),
            DisplaySurface::headless_quit_after(1),
            Operator::new(FilterKind::Smooth),
            None,
        );
        // Smooth declares its kernel at 1 (legal); no corrections expected.
        let stats = session.run().expect("session runs");
        assert_eq!(stats.corrections, 0);
    }
}

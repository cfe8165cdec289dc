//! camfx - interactive real-time camera filtering.
//!
//! One session = one camera, one filter, one optional recording. The session
//! runs a single-threaded acquisition loop:
//!
//! 1. Pump the display surface (key presses become control adjustments).
//! 2. Read a frame from the capture source.
//! 3. Normalize all declared controls (corrections written back to the panel).
//! 4. Apply the selected operator.
//! 5. Present original and processed streams.
//! 6. Append the processed frame to the sink, if recording.
//! 7. Honor the quit signal at the iteration boundary.
//!
//! Every failure in this domain is terminal at session granularity: a camera
//! that stops producing frames or a sink that stops accepting them ends the
//! session through the same drain path that a normal quit takes. Drain runs
//! exactly once on every exit path.
//!
//! # Module Structure
//!
//! - `capture`: frame sources (V4L2 devices, synthetic `stub://` sources)
//! - `controls`: the control panel (declare/read/normalize with write-back)
//! - `ops`: the operator family (smooth, edges, gradient, tone, geometry)
//! - `display`: presentation surfaces (window, headless)
//! - `record`: the motion-JPEG AVI sink
//! - `pipeline`: the session state machine wiring it all together

use thiserror::Error;

pub mod capture;
pub mod config;
pub mod controls;
pub mod display;
pub mod frame;
pub mod ops;
pub mod pipeline;
pub mod record;

pub use capture::{CaptureConfig, FrameSource, SourceStats};
pub use config::CamfxConfig;
pub use controls::{ControlPanel, ControlSpec, Legality};
pub use display::{DisplayBackend, DisplayConfig, DisplaySurface, PanelInput};
pub use frame::{Frame, FrameSize};
pub use ops::{FilterKind, Operator};
pub use pipeline::{LoopState, Session, SessionStats};
pub use record::MjpegAviSink;

/// Failure taxonomy for a filtering session.
///
/// Every variant is fatal at session granularity; there are no retries. The
/// pipeline maps each of these to the drain path, so resources are released
/// regardless of which stage failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The camera device could not be opened. The session never starts.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The camera stopped producing frames mid-session.
    #[error("capture stream ended: {0}")]
    EndOfStream(String),

    /// The output file could not be created.
    #[error("recording sink unopenable: {0}")]
    SinkUnopenable(String),

    /// A frame could not be appended to the output file. The recording is
    /// still considered valid up to the last successful write.
    #[error("recording sink write failed: {0}")]
    SinkWriteFailure(String),
}

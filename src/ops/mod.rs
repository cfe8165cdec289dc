//! The operator family.
//!
//! One operator is selected per session and applied once per loop iteration
//! through a single uniform call shape: `apply(frame, panel) -> frame`. The
//! pipeline never branches on operator identity; each variant declares its
//! own controls at session start and reads them back (already normalized)
//! inside `apply`.

mod edges;
mod geometry;
mod gradient;
mod smooth;
mod tone;

use std::fmt;
use std::str::FromStr;

use crate::controls::ControlPanel;
use crate::frame::Frame;

/// Which image operation a session runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Gaussian smoothing with an adjustable odd kernel extent.
    Smooth,
    /// Two-threshold edge map with optional pre-smoothing.
    Edges,
    /// Directional gradient magnitudes, equal-weight combined.
    Gradient,
    /// Brightness/contrast remap with optional inversion.
    Tone,
    /// Reflection across the vertical axis.
    Mirror,
    /// Fixed uniform downscale to half size.
    Resize,
    /// Fixed 90-degree rotation about the frame center.
    Rotate,
}

impl FilterKind {
    pub const ALL: [FilterKind; 7] = [
        FilterKind::Smooth,
        FilterKind::Edges,
        FilterKind::Gradient,
        FilterKind::Tone,
        FilterKind::Mirror,
        FilterKind::Resize,
        FilterKind::Rotate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Smooth => "smooth",
            FilterKind::Edges => "edges",
            FilterKind::Gradient => "gradient",
            FilterKind::Tone => "tone",
            FilterKind::Mirror => "mirror",
            FilterKind::Resize => "resize",
            FilterKind::Rotate => "rotate",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = FilterKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown filter {:?} (expected one of {})", s, names.join(", "))
            })
    }
}

/// The selected operator for a session.
///
/// Stateless: all per-session state lives in the control panel, all
/// per-frame state in the frames themselves.
#[derive(Clone, Copy, Debug)]
pub struct Operator {
    kind: FilterKind,
}

impl Operator {
    pub fn new(kind: FilterKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Declare this operator's controls. Called once at session start.
    pub fn declare_controls(&self, panel: &mut ControlPanel) {
        match self.kind {
            FilterKind::Smooth => smooth::declare_controls(panel),
            FilterKind::Edges => edges::declare_controls(panel),
            FilterKind::Gradient => gradient::declare_controls(panel),
            FilterKind::Tone => tone::declare_controls(panel),
            // The fixed geometric transforms have no adjustable parameters.
            FilterKind::Mirror | FilterKind::Resize | FilterKind::Rotate => {}
        }
    }

    /// Apply the operator to one frame using the panel's current (already
    /// normalized) control values.
    pub fn apply(&self, frame: &Frame, panel: &ControlPanel) -> Frame {
        match self.kind {
            FilterKind::Smooth => smooth::apply(frame, panel),
            FilterKind::Edges => edges::apply(frame, panel),
            FilterKind::Gradient => gradient::apply(frame, panel),
            FilterKind::Tone => tone::apply(frame, panel),
            FilterKind::Mirror => geometry::mirror(frame),
            FilterKind::Resize => geometry::resize_half(frame),
            FilterKind::Rotate => geometry::rotate_quarter(frame),
        }
    }

    /// Whether the recording sink must take its geometry from the first
    /// processed frame instead of the first raw frame. Only the downscale
    /// changes dimensions between the two.
    pub fn sizes_sink_from_processed(&self) -> bool {
        matches!(self.kind, FilterKind::Resize)
    }
}

//! Live control state for the selected operator.
//!
//! The panel owns every adjustable parameter of a session. All reads and
//! writes go through it: the display surface feeds key presses in as
//! clamped adjustments, the pipeline normalizes values before each operator
//! call, and corrections are written back so the displayed control never
//! disagrees with the value actually applied.
//!
//! Controls are polled, never pushed. A control change therefore takes
//! effect on the next iteration boundary, one frame period at the latest.

/// Parity constraint a control value must satisfy beyond its numeric range.
///
/// Range is enforced by the control's own clamping on writes; legality is
/// enforced at normalization time, by correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Legality {
    /// Any value in range.
    Any,
    /// Must be odd (convolution kernel extents).
    Odd,
    /// Must be odd, or exactly 0 meaning disabled. 0 is a sentinel and is
    /// never corrected.
    OddOrZero,
}

impl Legality {
    fn admits(self, value: i32) -> bool {
        match self {
            Legality::Any => true,
            Legality::Odd => value % 2 != 0,
            Legality::OddOrZero => value == 0 || value % 2 != 0,
        }
    }
}

/// Declaration of one control: name, inclusive range, default, legality.
#[derive(Clone, Copy, Debug)]
pub struct ControlSpec {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub legality: Legality,
}

impl ControlSpec {
    pub fn new(name: &'static str, min: i32, max: i32, default: i32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            legality: Legality::Any,
        }
    }

    pub fn with_legality(mut self, legality: Legality) -> Self {
        self.legality = legality;
        self
    }
}

#[derive(Clone, Debug)]
struct Control {
    spec: ControlSpec,
    value: i32,
}

/// Owner of all control state for a session.
#[derive(Clone, Debug, Default)]
pub struct ControlPanel {
    controls: Vec<Control>,
    active: usize,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one control. Called once per control at session start.
    ///
    /// The range endpoints must themselves be legal so that clamping and
    /// +1 correction can never push a value outside the range.
    pub fn declare(&mut self, spec: ControlSpec) {
        assert!(
            self.controls.iter().all(|c| c.spec.name != spec.name),
            "control {:?} declared twice",
            spec.name
        );
        assert!(spec.min <= spec.max, "control {:?} has empty range", spec.name);
        assert!(
            spec.legality.admits(spec.max),
            "control {:?} range max {} violates its own legality",
            spec.name,
            spec.max
        );
        let value = spec.default.clamp(spec.min, spec.max);
        self.controls.push(Control { spec, value });
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Last normalized value of a named control.
    ///
    /// Panics on an unknown name: operators only read controls they declared.
    pub fn read(&self, name: &str) -> i32 {
        self.control(name).value
    }

    /// Write a raw value, clamped to the control's range. Legality is not
    /// enforced here; that is normalization's job.
    pub fn set(&mut self, name: &str, value: i32) {
        let control = self.control_mut(name);
        control.value = value.clamp(control.spec.min, control.spec.max);
    }

    /// Normalize one control: if the current value violates legality, correct
    /// it by incrementing by one and write the correction back. Returns the
    /// value in force and whether a correction occurred.
    ///
    /// The `OddOrZero` disabled sentinel (0) is never incremented.
    pub fn normalize(&mut self, name: &str) -> (i32, bool) {
        let control = self.control_mut(name);
        if control.spec.legality.admits(control.value) {
            return (control.value, false);
        }
        let corrected = (control.value + 1).clamp(control.spec.min, control.spec.max);
        control.value = corrected;
        log::debug!("control {:?} corrected to {}", name, corrected);
        (corrected, true)
    }

    /// Normalize every declared control, in declaration order. Returns true
    /// if any value was corrected.
    pub fn normalize_all(&mut self) -> bool {
        let names: Vec<&'static str> = self.controls.iter().map(|c| c.spec.name).collect();
        let mut corrected = false;
        for name in names {
            let (_, c) = self.normalize(name);
            corrected |= c;
        }
        corrected
    }

    // ------------------------------------------------------------------
    // Active-control selection, used by the windowed display surface
    // ------------------------------------------------------------------

    /// Name of the control currently selected for keyboard adjustment.
    pub fn active_name(&self) -> Option<&'static str> {
        self.controls.get(self.active).map(|c| c.spec.name)
    }

    /// Select the next control, wrapping around.
    pub fn cycle_active(&mut self) {
        if !self.controls.is_empty() {
            self.active = (self.active + 1) % self.controls.len();
        }
    }

    /// Adjust the selected control by `delta`, clamped to its range.
    pub fn adjust_active(&mut self, delta: i32) {
        if let Some(control) = self.controls.get_mut(self.active) {
            control.value = (control.value + delta).clamp(control.spec.min, control.spec.max);
        }
    }

    /// (name, value, is-active) for every control, in declaration order.
    pub fn snapshot(&self) -> Vec<(&'static str, i32, bool)> {
        self.controls
            .iter()
            .enumerate()
            .map(|(i, c)| (c.spec.name, c.value, i == self.active))
            .collect()
    }

    fn control(&self, name: &str) -> &Control {
        self.controls
            .iter()
            .find(|c| c.spec.name == name)
            .unwrap_or_else(|| panic!("control {:?} was never declared", name))
    }

    fn control_mut(&mut self, name: &str) -> &mut Control {
        self.controls
            .iter_mut()
            .find(|c| c.spec.name == name)
            .unwrap_or_else(|| panic!("control {:?} was never declared", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odd_panel() -> ControlPanel {
        let mut panel = ControlPanel::new();
        panel.declare(ControlSpec::new("kernel", 1, 21, 1).with_legality(Legality::Odd));
        panel
    }

    #[test]
    fn odd_only_even_values_correct_upward() {
        let mut panel = odd_panel();
        for raw in 1..=21 {
            panel.set("kernel", raw);
            let (value, corrected) = panel.normalize("kernel");
            assert_eq!(value % 2, 1, "normalized value must be odd");
            if raw % 2 == 0 {
                assert!(corrected);
                assert_eq!(value, raw + 1);
            } else {
                assert!(!corrected);
                assert_eq!(value, raw);
            }
            // Correction is observable on the next read.
            assert_eq!(panel.read("kernel"), value);
        }
    }

    #[test]
    fn odd_or_zero_never_corrects_the_disabled_sentinel() {
        let mut panel = ControlPanel::new();
        panel.declare(ControlSpec::new("presmooth", 0, 7, 0).with_legality(Legality::OddOrZero));

        let (value, corrected) = panel.normalize("presmooth");
        assert_eq!((value, corrected), (0, false));

        panel.set("presmooth", 4);
        let (value, corrected) = panel.normalize("presmooth");
        assert_eq!((value, corrected), (5, true));
    }

    #[test]
    fn set_clamps_to_range() {
        let mut panel = odd_panel();
        panel.set("kernel", 99);
        assert_eq!(panel.read("kernel"), 21);
        panel.set("kernel", -3);
        assert_eq!(panel.read("kernel"), 1);
    }

    #[test]
    fn active_control_cycles_and_adjusts() {
        let mut panel = ControlPanel::new();
        panel.declare(ControlSpec::new("low", 0, 500, 100));
        panel.declare(ControlSpec::new("high", 0, 500, 100));

        assert_eq!(panel.active_name(), Some("low"));
        panel.cycle_active();
        assert_eq!(panel.active_name(), Some("high"));
        panel.adjust_active(25);
        assert_eq!(panel.read("high"), 125);
        panel.cycle_active();
        assert_eq!(panel.active_name(), Some("low"));
        panel.adjust_active(-500);
        assert_eq!(panel.read("low"), 0);
    }

    #[test]
    fn normalize_all_reports_any_correction() {
        let mut panel = ControlPanel::new();
        panel.declare(ControlSpec::new("kernel", 1, 21, 1).with_legality(Legality::Odd));
        panel.declare(ControlSpec::new("low", 0, 500, 100));
        assert!(!panel.normalize_all());
        panel.set("kernel", 8);
        assert!(panel.normalize_all());
        assert_eq!(panel.read("kernel"), 9);
    }
}

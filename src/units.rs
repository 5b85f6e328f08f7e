/// Unit/Conversion model for the Impressio monorail rig
///
/// Pure transformations from a raw encoder height reading (inches) into
/// the display strings shown on the panel and the impact energy in joules.
/// The only state here is the two-value unit toggle.

/// Acceleration due to gravity, m/s^2
pub const GRAVITY: f64 = 9.8;
/// Mass of the drop weight, kg
pub const MASS: f64 = 4.99;
/// Divide a raw reading by this to get meters
pub const CONVERSION: f64 = 39.370;

/// Display preference toggled by the operator's unit button.
///
/// NOTE: the branch labelled Metric formats feet/inches and the U.S. branch
/// formats meters. These labels are what ships on the panel today; do not
/// swap them without product sign-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitMode {
    #[default]
    Metric,
    Imperial,
}

impl UnitMode {
    pub fn toggled(self) -> Self {
        match self {
            UnitMode::Metric => UnitMode::Imperial,
            UnitMode::Imperial => UnitMode::Metric,
        }
    }

    /// Button label for the mode currently selected.
    pub fn label(self) -> &'static str {
        match self {
            UnitMode::Metric => "Metric",
            UnitMode::Imperial => "U.S.",
        }
    }
}

/// Display strings derived from one height reading. Computed whole, handed
/// to the panel whole - the panel never does arithmetic of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedDisplay {
    pub height_text: String,
    pub energy_text: String,
}

/// Split a raw reading into whole feet and remainder inches.
///
/// Negative readings split symmetrically around zero: both components carry
/// the sign, there is no borrow into the feet component (-6.0 is 0' -6.0",
/// not -1' 6.0").
pub fn split_feet_inches(height: f64) -> (i64, f64) {
    if height >= 0.0 {
        ((height / 12.0).floor() as i64, height % 12.0)
    } else {
        let magnitude = -height;
        (
            -((magnitude / 12.0).floor() as i64),
            -(magnitude % 12.0),
        )
    }
}

/// Impact energy in joules for a raw reading.
///
/// Always converts the raw value to meters via CONVERSION regardless of the
/// display mode; energy is mode-independent.
pub fn energy_joules(height: f64) -> f64 {
    (height / CONVERSION) * GRAVITY * MASS
}

pub fn height_text(height: f64, mode: UnitMode) -> String {
    match mode {
        UnitMode::Metric => {
            let (feet, inches) = split_feet_inches(height);
            format!("Height: {}' {:.1}\"", feet, inches)
        }
        UnitMode::Imperial => {
            format!("Height: {:.3} m", height / CONVERSION)
        }
    }
}

pub fn energy_text(height: f64) -> String {
    format!("Energy: {:.2} j", energy_joules(height))
}

/// Derive both display strings for one reading.
pub fn derive_display(height: f64, mode: UnitMode) -> DerivedDisplay {
    DerivedDisplay {
        height_text: height_text(height, mode),
        energy_text: energy_text(height),
    }
}

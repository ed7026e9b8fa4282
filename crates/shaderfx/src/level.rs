use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::EmitError;

pub const MIN_LEVEL: f64 = 0.0;
pub const MAX_LEVEL: f64 = 2.0;

/// Interpolation factor between grayscale (0.0) and the source color (1.0).
///
/// Values above 1.0 extrapolate away from gray and boost saturation. The
/// stored value is always finite and within [`MIN_LEVEL`, `MAX_LEVEL`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SaturationLevel(f64);

impl SaturationLevel {
    pub const IDENTITY: Self = Self(1.0);
    pub const GRAYSCALE: Self = Self(0.0);

    /// Validates and clamps a raw level. Out-of-range values are clamped
    /// rather than rejected; only NaN and infinities fail.
    pub fn new(value: f64) -> Result<Self, EmitError> {
        if !value.is_finite() {
            return Err(EmitError::NotFinite(value));
        }
        let clamped = value.clamp(MIN_LEVEL, MAX_LEVEL);
        if clamped != value {
            debug!(requested = value, clamped, "saturation level clamped to display range");
        }
        // Normalise -0.0 so the rendered literal never carries a sign.
        Ok(Self(if clamped == 0.0 { 0.0 } else { clamped }))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_identity(self) -> bool {
        self.0 == 1.0
    }
}

impl Default for SaturationLevel {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Shortest decimal that round-trips, always with a fractional part or an
/// exponent so the text is a valid GLSL float literal.
impl fmt::Display for SaturationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `Display` for f64 is the shortest round-tripping decimal and never
        // uses an exponent; GLSL additionally needs the decimal point.
        let digits = self.0.to_string();
        if digits.contains('.') {
            f.write_str(&digits)
        } else {
            write!(f, "{digits}.0")
        }
    }
}

impl FromStr for SaturationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("saturation level must not be empty".to_string());
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| format!("invalid saturation level '{trimmed}'; expected a number such as 1.25"))?;
        Self::new(value).map_err(|err| err.to_string())
    }
}

impl TryFrom<f64> for SaturationLevel {
    type Error = EmitError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SaturationLevel> for f64 {
    fn from(level: SaturationLevel) -> Self {
        level.0
    }
}

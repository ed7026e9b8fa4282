mod level;
mod reference;
mod template;

pub use level::{SaturationLevel, MAX_LEVEL, MIN_LEVEL};
pub use reference::{luma, saturate_pixel, LUMA_COEFFICIENTS};
pub use template::{emit, ShaderArtifact, ShaderTemplate, SATURATION_MARKER};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("shader template is malformed: expected exactly one @SATURATION@ marker, found {found}")]
    TemplateMalformed { found: usize },

    #[error("saturation level must be a finite number, got {0}")]
    NotFinite(f64),
}

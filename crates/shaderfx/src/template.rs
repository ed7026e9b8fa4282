//! Parameterised screen-shader source and the emitter that bakes a
//! [`SaturationLevel`] into it.
//!
//! The template is never rewritten on disk: each apply renders a fresh
//! [`ShaderArtifact`] from the shared, read-only template text.
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::{EmitError, SaturationLevel};

/// Token replaced by the decimal rendering of the saturation level.
pub const SATURATION_MARKER: &str = "@SATURATION@";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderTemplate {
    source: String,
}

impl ShaderTemplate {
    /// The bundled compositor screen shader.
    pub fn builtin() -> Self {
        Self {
            source: BUILTIN_TEMPLATE.to_string(),
        }
    }

    /// Wraps arbitrary template text. The marker is checked at emit time so a
    /// malformed override surfaces as [`EmitError::TemplateMalformed`].
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = source.len(), "loaded shader template override");
        Ok(Self::from_source(source))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn marker_count(&self) -> usize {
        self.source.matches(SATURATION_MARKER).count()
    }
}

impl Default for ShaderTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Rendered shader text ready for the session tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderArtifact {
    level: SaturationLevel,
    source: String,
}

impl ShaderArtifact {
    pub fn level(&self) -> SaturationLevel {
        self.level
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }

    /// Writes the artifact where the session tool can read it, replacing any
    /// artifact left by a previous apply.
    pub fn persist(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.source)?;
        debug!(path = %path.display(), level = %self.level, "wrote shader artifact");
        Ok(())
    }
}

/// Substitutes `level` into `template`.
///
/// Pure text transform: no I/O. Fails only when the template does not carry
/// exactly one [`SATURATION_MARKER`].
pub fn emit(template: &ShaderTemplate, level: SaturationLevel) -> Result<ShaderArtifact, EmitError> {
    let found = template.marker_count();
    if found != 1 {
        return Err(EmitError::TemplateMalformed { found });
    }

    let source = template
        .source
        .replacen(SATURATION_MARKER, &level.to_string(), 1);

    Ok(ShaderArtifact { level, source })
}

/// GLSL ES fragment shader for the compositor's screen-shader hook.
///
/// Order matters: mix before clamp, clamp before the opacity multiply.
const BUILTIN_TEMPLATE: &str = r"// satshade: saturation screen shader
precision highp float;
varying vec2 v_texcoord;
uniform sampler2D tex;
uniform float alpha;

const float SATURATION = @SATURATION@;
const vec3 LUMA = vec3(0.2126, 0.7152, 0.0722);

void main() {
    vec4 pixColor = texture2D(tex, v_texcoord);
    float luma = dot(pixColor.rgb, LUMA);
    vec3 color = mix(vec3(luma), pixColor.rgb, SATURATION);
    color = clamp(color, 0.0, 1.0);
    gl_FragColor = vec4(color, pixColor.a) * alpha;
}
";

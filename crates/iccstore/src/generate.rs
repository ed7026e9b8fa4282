//! Turns a saturation level into an ICC profile by driving the Argyll
//! profiler. The generator owns only the invocation: it writes the synthetic
//! measurement set, runs `colprof`, and validates what comes back.
use std::fs;
use std::io;
use std::time::Duration;

use shaderfx::SaturationLevel;
use thiserror::Error;
use tracing::{debug, info};

use crate::profile::{profile_description, profile_timestamp, verify_icc, ColorProfile};
use crate::target::{measurement_patches, render_ti3, DEFAULT_GRID_STEPS};
use crate::tool::{ToolCommand, ToolError};

pub const DEFAULT_GENERATOR: &str = "colprof";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("profiling tool '{program}' is not installed")]
    ToolMissing { program: String },

    #[error("profiling tool '{program}' failed: {diagnostics}")]
    ProfileGenerationFailed {
        program: String,
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("generated profile is corrupt: {reason}")]
    ProfileCorrupt { reason: String },

    #[error("failed to prepare profile generation: {0}")]
    Io(#[from] io::Error),
}

impl From<ToolError> for GenerateError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Missing { program } => Self::ToolMissing { program },
            ToolError::Failed {
                program,
                status,
                stdout,
                stderr,
            } => Self::ProfileGenerationFailed {
                program,
                status,
                diagnostics: if stderr.trim().is_empty() { stdout } else { stderr },
            },
            ToolError::TimedOut { program, after } => Self::ProfileGenerationFailed {
                diagnostics: format!("'{program}' did not finish within {after:?} and was terminated"),
                program,
                status: None,
            },
            ToolError::Io { source, .. } => Self::Io(source),
        }
    }
}

/// Anything that can produce a [`ColorProfile`] for a level.
pub trait ProfileSource {
    fn generate(&self, level: SaturationLevel) -> Result<ColorProfile, GenerateError>;
}

#[derive(Debug, Clone)]
pub struct ArgyllGenerator {
    program: String,
    timeout: Option<Duration>,
    grid_steps: usize,
}

impl ArgyllGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            grid_steps: DEFAULT_GRID_STEPS,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grid_steps(mut self, steps: usize) -> Self {
        self.grid_steps = steps.max(2);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ArgyllGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATOR)
    }
}

impl ProfileSource for ArgyllGenerator {
    fn generate(&self, level: SaturationLevel) -> Result<ColorProfile, GenerateError> {
        let created = profile_timestamp();
        let workdir = tempfile::Builder::new()
            .prefix("satshade-profile-")
            .tempdir()?;
        let base = workdir.path().join("profile");
        let ti3_path = base.with_extension("ti3");
        let icc_path = base.with_extension("icc");

        let patches = measurement_patches(level, self.grid_steps);
        fs::write(&ti3_path, render_ti3(level, &patches, created))?;
        debug!(path = %ti3_path.display(), patches = patches.len(), "wrote synthetic measurement set");

        ToolCommand::new(&self.program)
            .args(["-v", "-q", "m", "-a", "s", "-D"])
            .arg(profile_description(level))
            .arg("-O")
            .arg(&icc_path)
            .arg(&base)
            .timeout(self.timeout)
            .run()?;

        let bytes = match fs::read(&icc_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(GenerateError::ProfileCorrupt {
                    reason: format!("'{}' exited successfully but wrote no profile", self.program),
                });
            }
            Err(err) => return Err(GenerateError::Io(err)),
        };
        verify_icc(&bytes).map_err(|reason| GenerateError::ProfileCorrupt { reason })?;

        info!(level = %level, bytes = bytes.len(), "generated ICC profile");
        Ok(ColorProfile::new(bytes, created, level))
    }
}

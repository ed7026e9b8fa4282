//! Makes a stored profile the default for the display through colord.
use std::path::Path;
use std::time::Duration;

use iccstore::{StoredProfile, ToolCommand, ToolError, ToolOutput};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("could not find a profile id in '{program}' output: {output}")]
    UnrecognisedOutput { program: String, output: String },
}

pub trait ProfileActivator {
    fn activate(&self, profile: &StoredProfile) -> Result<(), ActivationError>;
}

impl<T: ProfileActivator + ?Sized> ProfileActivator for Box<T> {
    fn activate(&self, profile: &StoredProfile) -> Result<(), ActivationError> {
        (**self).activate(profile)
    }
}

/// Leaves profile activation to the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActivation;

impl ProfileActivator for NoActivation {
    fn activate(&self, profile: &StoredProfile) -> Result<(), ActivationError> {
        debug!(key = %profile.key, "profile activation disabled");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ColordActivator {
    program: String,
    device: String,
    timeout: Option<Duration>,
}

impl ColordActivator {
    pub fn new(program: impl Into<String>, device: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            device: device.into(),
            timeout,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.program).timeout(self.timeout)
    }

    /// Registers the file with colord, reusing the existing registration when
    /// the daemon already knows it.
    fn import(&self, path: &Path) -> Result<String, ActivationError> {
        let output = match self.command().arg("import-profile").arg(path).run() {
            Ok(output) => output,
            Err(err) if already_imported(&err) => {
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string_lossy().into_owned());
                debug!(file = %filename, "profile already imported; looking it up");
                self.command()
                    .arg("find-profile-by-filename")
                    .arg(filename)
                    .run()?
            }
            Err(err) => return Err(err.into()),
        };
        self.profile_id(&output)
    }

    fn profile_id(&self, output: &ToolOutput) -> Result<String, ActivationError> {
        parse_profile_id(&output.stdout).ok_or_else(|| ActivationError::UnrecognisedOutput {
            program: self.program.clone(),
            output: output.stdout.clone(),
        })
    }
}

impl ProfileActivator for ColordActivator {
    fn activate(&self, profile: &StoredProfile) -> Result<(), ActivationError> {
        let profile_id = self.import(&profile.path)?;

        self.command()
            .args(["device-add-profile", self.device.as_str(), profile_id.as_str()])
            .run()?;
        self.command()
            .args(["device-make-profile-default", self.device.as_str(), profile_id.as_str()])
            .run()?;

        info!(device = %self.device, profile = %profile_id, key = %profile.key, "activated ICC profile");
        Ok(())
    }
}

fn already_imported(err: &ToolError) -> bool {
    err.diagnostics()
        .map(|text| text.to_ascii_lowercase().contains("already exists"))
        .unwrap_or(false)
}

/// Pulls `Profile ID:` (or failing that `Object Path:`) out of colormgr's
/// key/value listing.
fn parse_profile_id(stdout: &str) -> Option<String> {
    let field = |name: &str| {
        stdout.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == name && !value.trim().is_empty()).then(|| value.trim().to_string())
        })
    };
    field("Profile ID").or_else(|| field("Object Path"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_id_line() {
        let stdout = "Object Path:   /org/freedesktop/ColorManager/profiles/icc_abc\n\
                      Owner:         alice\n\
                      Profile ID:    icc-0f1e2d\n";
        assert_eq!(parse_profile_id(stdout).as_deref(), Some("icc-0f1e2d"));
    }

    #[test]
    fn falls_back_to_object_path() {
        let stdout = "Object Path:   /org/freedesktop/ColorManager/profiles/icc_abc\n";
        assert_eq!(
            parse_profile_id(stdout).as_deref(),
            Some("/org/freedesktop/ColorManager/profiles/icc_abc")
        );
        assert_eq!(parse_profile_id("nothing useful\n"), None);
    }

    #[test]
    fn detects_already_imported_failure() {
        let err = ToolError::Failed {
            program: "colormgr".into(),
            status: Some(1),
            stdout: String::new(),
            stderr: "Failed to import: profile id 'icc-1' already exists\n".into(),
        };
        assert!(already_imported(&err));
        assert!(!already_imported(&ToolError::Missing {
            program: "colormgr".into()
        }));
    }
}

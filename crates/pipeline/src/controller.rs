//! Drives one apply cycle: shader first for an immediate visual response,
//! then the slower profile channel. The channels are independent; a failure
//! in one never rolls back the other, and nothing is retried.
use std::io;
use std::path::{Path, PathBuf};

use iccstore::{GenerateError, ProfileSource, ProfileStore, StoreError, StoredProfile, ToolError};
use shaderfx::{emit, EmitError, SaturationLevel, ShaderArtifact, ShaderTemplate};
use thiserror::Error;
use tracing::{info, warn};

use crate::activate::{ActivationError, ProfileActivator};
use crate::session::SessionTool;

/// Fatal conditions that abort an apply before any channel runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot render the screen shader: {0}")]
    TemplateMalformed(#[from] EmitError),
}

/// Why one effect channel did not complete.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("required tool '{program}' is not installed")]
    ToolMissing { program: String },

    #[error("shader could not be loaded into the session: {0}")]
    SessionApplyFailed(#[source] ToolError),

    #[error("profile generation failed: {diagnostics}")]
    ProfileGenerationFailed {
        program: String,
        status: Option<i32>,
        diagnostics: String,
    },

    #[error("generated profile is corrupt: {reason}")]
    ProfileCorrupt { reason: String },

    #[error("profile {key} was stored but could not be activated: {source}")]
    ActivationFailed {
        key: String,
        #[source]
        source: ActivationError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write shader artifact: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    /// Program the caller could install to recover, if that is the cause.
    pub fn missing_tool(&self) -> Option<&str> {
        match self {
            Self::ToolMissing { program } => Some(program.as_str()),
            Self::ActivationFailed {
                source: ActivationError::Tool(ToolError::Missing { program }),
                ..
            } => Some(program.as_str()),
            _ => None,
        }
    }

    fn from_session(err: ToolError) -> Self {
        match err {
            ToolError::Missing { program } => Self::ToolMissing { program },
            other => Self::SessionApplyFailed(other),
        }
    }
}

impl From<GenerateError> for ChannelError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::ToolMissing { program } => Self::ToolMissing { program },
            GenerateError::ProfileGenerationFailed {
                program,
                status,
                diagnostics,
            } => Self::ProfileGenerationFailed {
                program,
                status,
                diagnostics,
            },
            GenerateError::ProfileCorrupt { reason } => Self::ProfileCorrupt { reason },
            GenerateError::Io(err) => Self::Io(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderApplied {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileApplied {
    pub stored: StoredProfile,
    /// Old profiles removed by the retention policy during this apply.
    pub pruned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Applied,
    Degraded,
    Failed,
}

#[derive(Debug)]
pub struct ApplyResult {
    pub level: SaturationLevel,
    pub shader: Result<ShaderApplied, ChannelError>,
    pub profile: Result<ProfileApplied, ChannelError>,
}

impl ApplyResult {
    pub fn status(&self) -> ApplyStatus {
        match (self.shader.is_ok(), self.profile.is_ok()) {
            (true, true) => ApplyStatus::Applied,
            (false, false) => ApplyStatus::Failed,
            _ => ApplyStatus::Degraded,
        }
    }
}

pub struct Pipeline<S, G, A> {
    template: ShaderTemplate,
    shader_path: PathBuf,
    session: S,
    generator: G,
    store: ProfileStore,
    activator: A,
    keep: Option<usize>,
}

impl<S, G, A> Pipeline<S, G, A>
where
    S: SessionTool,
    G: ProfileSource,
    A: ProfileActivator,
{
    pub fn new(
        template: ShaderTemplate,
        shader_path: impl Into<PathBuf>,
        session: S,
        generator: G,
        store: ProfileStore,
        activator: A,
    ) -> Self {
        Self {
            template,
            shader_path: shader_path.into(),
            session,
            generator,
            store,
            activator,
            keep: None,
        }
    }

    /// Keep only the newest `keep` profiles after each successful store.
    pub fn with_retention(mut self, keep: Option<usize>) -> Self {
        self.keep = keep;
        self
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn shader_path(&self) -> &Path {
        &self.shader_path
    }

    /// Renders the shader artifact without applying anything.
    pub fn render(&self, level: SaturationLevel) -> Result<ShaderArtifact, PipelineError> {
        Ok(emit(&self.template, level)?)
    }

    pub fn apply(&self, level: SaturationLevel) -> Result<ApplyResult, PipelineError> {
        info!(level = %level, "applying saturation");
        let artifact = self.render(level)?;

        let shader = self.apply_shader(&artifact);
        if let Err(err) = &shader {
            warn!(error = %err, "shader channel failed; continuing with profile");
        }

        let profile = self.apply_profile(level);
        if let Err(err) = &profile {
            warn!(error = %err, "profile channel failed");
        }

        let result = ApplyResult {
            level,
            shader,
            profile,
        };
        match result.status() {
            ApplyStatus::Applied => info!(level = %level, "saturation applied"),
            ApplyStatus::Degraded => warn!(level = %level, "saturation partially applied"),
            ApplyStatus::Failed => warn!(level = %level, "saturation could not be applied"),
        }
        Ok(result)
    }

    fn apply_shader(&self, artifact: &ShaderArtifact) -> Result<ShaderApplied, ChannelError> {
        artifact.persist(&self.shader_path)?;
        self.session
            .load_shader(&self.shader_path)
            .map_err(ChannelError::from_session)?;
        Ok(ShaderApplied {
            path: self.shader_path.clone(),
        })
    }

    fn apply_profile(&self, level: SaturationLevel) -> Result<ProfileApplied, ChannelError> {
        let profile = self.generator.generate(level)?;
        let stored = self.store.put(&profile)?;

        self.activator
            .activate(&stored)
            .map_err(|source| ChannelError::ActivationFailed {
                key: stored.key.clone(),
                source,
            })?;

        // Older profiles go only once the new one is the display default.
        let pruned = match self.keep {
            Some(keep) => match self.store.prune(keep) {
                Ok(removed) => removed.len(),
                Err(err) => {
                    warn!(error = %err, "failed to prune old profiles");
                    0
                }
            },
            None => 0,
        };

        Ok(ProfileApplied { stored, pruned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::fs;

    use iccstore::{profile_timestamp, ArgyllGenerator, ColorProfile, ICC_HEADER_LEN, ICC_SIGNATURE};

    use crate::activate::NoActivation;

    #[derive(Default)]
    struct RecordingSession {
        loaded: RefCell<Vec<String>>,
    }

    impl SessionTool for RecordingSession {
        fn load_shader(&self, shader: &Path) -> Result<(), ToolError> {
            self.loaded
                .borrow_mut()
                .push(fs::read_to_string(shader).unwrap());
            Ok(())
        }
    }

    struct BrokenSession;

    impl SessionTool for BrokenSession {
        fn load_shader(&self, _shader: &Path) -> Result<(), ToolError> {
            Err(ToolError::Failed {
                program: "hyprctl".into(),
                status: Some(1),
                stdout: "error: no such keyword\n".into(),
                stderr: String::new(),
            })
        }
    }

    struct FakeGenerator;

    impl ProfileSource for FakeGenerator {
        fn generate(&self, level: SaturationLevel) -> Result<ColorProfile, GenerateError> {
            let mut bytes = vec![0u8; ICC_HEADER_LEN];
            bytes[36..40].copy_from_slice(ICC_SIGNATURE);
            Ok(ColorProfile::new(bytes, profile_timestamp(), level))
        }
    }

    struct RefusingActivator;

    impl ProfileActivator for RefusingActivator {
        fn activate(&self, _profile: &StoredProfile) -> Result<(), ActivationError> {
            Err(ActivationError::Tool(ToolError::Missing {
                program: "colormgr".into(),
            }))
        }
    }

    /// Accepts the first profile it is offered and refuses every later one.
    #[derive(Default)]
    struct OneShotActivator {
        calls: Cell<usize>,
    }

    impl ProfileActivator for OneShotActivator {
        fn activate(&self, _profile: &StoredProfile) -> Result<(), ActivationError> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if call == 0 {
                Ok(())
            } else {
                Err(ActivationError::Tool(ToolError::Failed {
                    program: "colormgr".into(),
                    status: Some(1),
                    stdout: String::new(),
                    stderr: "device not found\n".into(),
                }))
            }
        }
    }

    fn level(value: f64) -> SaturationLevel {
        SaturationLevel::new(value).unwrap()
    }

    fn pipeline<S, G, A>(
        root: &Path,
        session: S,
        generator: G,
        activator: A,
    ) -> Pipeline<S, G, A>
    where
        S: SessionTool,
        G: ProfileSource,
        A: ProfileActivator,
    {
        Pipeline::new(
            ShaderTemplate::builtin(),
            root.join("cache/shaders/saturation.frag"),
            session,
            generator,
            ProfileStore::new(root.join("icc")),
            activator,
        )
    }

    #[test]
    fn missing_profiler_degrades_but_keeps_shader() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            temp.path(),
            RecordingSession::default(),
            ArgyllGenerator::new("satshade-missing-colprof"),
            NoActivation,
        );

        let result = pipeline.apply(level(0.5)).unwrap();

        assert_eq!(result.status(), ApplyStatus::Degraded);
        assert!(result.shader.is_ok());
        assert!(matches!(
            &result.profile,
            Err(ChannelError::ToolMissing { program }) if program == "satshade-missing-colprof"
        ));
        let loaded = pipeline.session.loaded.borrow();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].contains("SATURATION = 0.5;"));
        assert!(pipeline.store().list().unwrap().is_empty());
    }

    #[test]
    fn sequential_applies_accumulate_profiles() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            temp.path(),
            RecordingSession::default(),
            FakeGenerator,
            NoActivation,
        );

        let first = pipeline.apply(level(0.3)).unwrap();
        let second = pipeline.apply(level(1.5)).unwrap();
        assert_eq!(first.status(), ApplyStatus::Applied);
        assert_eq!(second.status(), ApplyStatus::Applied);

        let listing = pipeline.store().list().unwrap();
        assert_eq!(listing.len(), 2);
        let latest = pipeline.store().latest().unwrap();
        assert_eq!(latest.level, Some(level(1.5)));
        assert_eq!(latest, second.profile.unwrap().stored);

        let shader = fs::read_to_string(pipeline.shader_path()).unwrap();
        assert!(shader.contains("SATURATION = 1.5;"));
    }

    #[test]
    fn session_failure_is_symmetric_degradation() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(temp.path(), BrokenSession, FakeGenerator, NoActivation);

        let result = pipeline.apply(level(1.2)).unwrap();

        assert_eq!(result.status(), ApplyStatus::Degraded);
        assert!(matches!(result.shader, Err(ChannelError::SessionApplyFailed(_))));
        assert!(result.profile.is_ok());
        assert_eq!(pipeline.store().list().unwrap().len(), 1);
    }

    #[test]
    fn both_channels_failing_is_total_failure() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            temp.path(),
            BrokenSession,
            ArgyllGenerator::new("satshade-missing-colprof"),
            NoActivation,
        );

        let result = pipeline.apply(level(0.8)).unwrap();
        assert_eq!(result.status(), ApplyStatus::Failed);
    }

    #[test]
    fn malformed_template_aborts_before_any_channel() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            ShaderTemplate::from_source("void main() {}"),
            temp.path().join("saturation.frag"),
            RecordingSession::default(),
            FakeGenerator,
            ProfileStore::new(temp.path().join("icc")),
            NoActivation,
        );

        let err = pipeline.apply(level(1.0)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TemplateMalformed(EmitError::TemplateMalformed { found: 0 })
        ));
        assert!(pipeline.session.loaded.borrow().is_empty());
        assert!(pipeline.store().list().unwrap().is_empty());
    }

    #[test]
    fn activation_failure_keeps_stored_profile() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            temp.path(),
            RecordingSession::default(),
            FakeGenerator,
            RefusingActivator,
        );

        let result = pipeline.apply(level(1.1)).unwrap();

        assert_eq!(result.status(), ApplyStatus::Degraded);
        let err = result.profile.unwrap_err();
        assert_eq!(err.missing_tool(), Some("colormgr"));
        assert!(matches!(err, ChannelError::ActivationFailed { .. }));
        assert_eq!(pipeline.store().latest().unwrap().level, Some(level(1.1)));
    }

    #[test]
    fn retention_prunes_after_store() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            temp.path(),
            RecordingSession::default(),
            FakeGenerator,
            NoActivation,
        )
        .with_retention(Some(1));

        pipeline.apply(level(0.5)).unwrap();
        pipeline.apply(level(0.7)).unwrap();
        let last = pipeline.apply(level(0.9)).unwrap();

        assert_eq!(last.profile.as_ref().unwrap().pruned, 1);
        let listing = pipeline.store().list().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.last().unwrap().level, Some(level(0.9)));
    }

    #[test]
    fn failed_activation_does_not_prune_active_profile() {
        let temp = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            temp.path(),
            RecordingSession::default(),
            FakeGenerator,
            OneShotActivator::default(),
        )
        .with_retention(Some(1));

        let first = pipeline.apply(level(0.4)).unwrap();
        let active = first.profile.unwrap().stored;

        let second = pipeline.apply(level(1.6)).unwrap();

        assert_eq!(second.status(), ApplyStatus::Degraded);
        assert!(matches!(
            second.profile,
            Err(ChannelError::ActivationFailed { .. })
        ));
        assert!(active.path.exists());
        assert_eq!(pipeline.store().list().unwrap().len(), 2);
    }
}

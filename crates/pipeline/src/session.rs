use std::path::Path;
use std::time::Duration;

use iccstore::{ToolCommand, ToolError};
use satconfig::SessionConfig;
use tracing::info;

/// Loads a rendered shader into the running compositor session.
pub trait SessionTool {
    fn load_shader(&self, shader: &Path) -> Result<(), ToolError>;
}

impl<T: SessionTool + ?Sized> SessionTool for Box<T> {
    fn load_shader(&self, shader: &Path) -> Result<(), ToolError> {
        (**self).load_shader(shader)
    }
}

/// Runs a configured argv such as
/// `hyprctl keyword decoration:screen_shader {shader}`.
#[derive(Debug, Clone)]
pub struct CommandSession {
    config: SessionConfig,
    timeout: Option<Duration>,
}

impl CommandSession {
    pub fn new(config: SessionConfig, timeout: Option<Duration>) -> Self {
        Self { config, timeout }
    }

    pub fn program(&self) -> Option<&str> {
        self.config.command.first().map(String::as_str)
    }
}

impl SessionTool for CommandSession {
    fn load_shader(&self, shader: &Path) -> Result<(), ToolError> {
        let argv = self.config.render(&shader.to_string_lossy());
        let Some((program, args)) = argv.split_first() else {
            return Err(ToolError::Missing {
                program: String::new(),
            });
        };

        let output = ToolCommand::new(program)
            .args(args)
            .timeout(self.timeout)
            .run()?;
        info!(
            program = %program,
            shader = %shader.display(),
            response = %output.stdout.trim(),
            "screen shader loaded"
        );
        Ok(())
    }
}

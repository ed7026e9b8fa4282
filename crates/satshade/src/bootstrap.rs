use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use iccstore::{ArgyllGenerator, ProfileStore};
use pipeline::{ColordActivator, CommandSession, NoActivation, Pipeline, ProfileActivator};
use satconfig::Config;
use shaderfx::ShaderTemplate;
use tracing::debug;

use crate::paths::AppPaths;

pub type AppPipeline = Pipeline<CommandSession, ArgyllGenerator, Box<dyn ProfileActivator>>;

pub fn bootstrap_filesystem(paths: &AppPaths) -> Result<()> {
    for dir in [paths.config_dir(), paths.data_dir(), paths.cache_dir()] {
        ensure_directory(dir)?;
    }
    Ok(())
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if path.is_dir() {
            debug!(path = %path.display(), "reusing existing directory");
            Ok(())
        } else {
            bail!("filesystem entry at {} is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create satshade directory at {}", path.display()))?;
        debug!(path = %path.display(), "created satshade directory");
        Ok(())
    }
}

/// Reads `config.toml`, falling back to defaults when it does not exist.
pub fn load_config(paths: &AppPaths) -> Result<Config> {
    let path = paths.config_file();
    if !path.exists() {
        debug!(path = %path.display(), "no configuration file; using defaults");
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration at {}", path.display()))?;
    let config = Config::from_toml_str(&contents)
        .with_context(|| format!("invalid configuration at {}", path.display()))?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

pub fn load_template(config: &Config) -> Result<ShaderTemplate> {
    match &config.shader.template {
        Some(path) => {
            let template = ShaderTemplate::load(path).with_context(|| {
                format!("failed to read shader template at {}", path.display())
            })?;
            debug!(path = %path.display(), "using shader template override");
            Ok(template)
        }
        None => Ok(ShaderTemplate::builtin()),
    }
}

pub fn profile_store(paths: &AppPaths, config: &Config) -> ProfileStore {
    ProfileStore::new(paths.profile_dir(config))
}

pub fn build_pipeline(paths: &AppPaths, config: &Config) -> Result<AppPipeline> {
    let timeout = config.timeout();
    let template = load_template(config)?;
    let session = CommandSession::new(config.session.clone(), timeout);
    let generator = ArgyllGenerator::new(config.profile.generator.as_str()).with_timeout(timeout);

    let activator: Box<dyn ProfileActivator> = if config.profile.activate {
        Box::new(ColordActivator::new(
            config.profile.activator.as_str(),
            config.display.colord_device(),
            timeout,
        ))
    } else {
        Box::new(NoActivation)
    };

    Ok(Pipeline::new(
        template,
        paths.shader_artifact(),
        session,
        generator,
        profile_store(paths, config),
        activator,
    )
    .with_retention(config.profile.keep))
}

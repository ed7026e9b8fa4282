use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::{BaseDirs, ProjectDirs};
use satconfig::Config;

pub const ENV_CONFIG_DIR: &str = "SATSHADE_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "SATSHADE_DATA_DIR";
pub const ENV_CACHE_DIR: &str = "SATSHADE_CACHE_DIR";
pub const ENV_PROFILE_DIR: &str = "SATSHADE_PROFILE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "satshade";
const APPLICATION: &str = "satshade";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    profile_override: Option<PathBuf>,
    default_profile_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("failed to determine home directory"))?;

        Ok(Self {
            config_dir: env_override(ENV_CONFIG_DIR)
                .unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: env_override(ENV_DATA_DIR)
                .unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
            cache_dir: env_override(ENV_CACHE_DIR)
                .unwrap_or_else(|| project_dirs.cache_dir().to_path_buf()),
            profile_override: env_override(ENV_PROFILE_DIR),
            // colord and most colour-managed applications scan ~/.local/share/icc.
            default_profile_dir: base_dirs.data_dir().join("icc"),
        })
    }

    #[cfg(test)]
    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf, cache_dir: PathBuf, profile_dir: Option<PathBuf>) -> Self {
        let default_profile_dir = data_dir.join("icc");
        Self {
            config_dir,
            data_dir,
            cache_dir,
            profile_override: profile_dir,
            default_profile_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn state_file(&self) -> PathBuf {
        self.config_dir.join("state.toml")
    }

    /// Where each apply writes the rendered screen shader.
    pub fn shader_artifact(&self) -> PathBuf {
        self.cache_dir.join("shaders").join("saturation.frag")
    }

    /// Environment override, then `profile.directory`, then the XDG ICC dir.
    pub fn profile_dir(&self, config: &Config) -> PathBuf {
        self.profile_override
            .clone()
            .or_else(|| config.profile.directory.clone())
            .unwrap_or_else(|| self.default_profile_dir.clone())
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

//! Configuration schema for satshade, loaded from `config.toml`.
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Placeholder in `session.command` replaced by the shader artifact path.
pub const SHADER_PLACEHOLDER: &str = "{shader}";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub shader: ShaderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_output")]
    pub output: String,
    /// colord device id; derived from `output` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colord_device: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShaderConfig {
    /// Replacement for the built-in template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_command")]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default = "default_dump")]
    pub dump: String,
    #[serde(default = "default_activator")]
    pub activator: String,
    #[serde(default = "default_true")]
    pub activate: bool,
    /// Number of profiles retained after each store; `None` keeps all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

fn default_version() -> u32 {
    1
}

fn default_output() -> String {
    "eDP-1".to_string()
}

fn default_session_command() -> Vec<String> {
    ["hyprctl", "keyword", "decoration:screen_shader", SHADER_PLACEHOLDER]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_generator() -> String {
    "colprof".to_string()
}

fn default_dump() -> String {
    "iccdump".to_string()
}

fn default_activator() -> String {
    "colormgr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            display: DisplayConfig::default(),
            shader: ShaderConfig::default(),
            session: SessionConfig::default(),
            profile: ProfileConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            colord_device: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: default_session_command(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            directory: None,
            generator: default_generator(),
            dump: default_dump(),
            activator: default_activator(),
            activate: true,
            keep: None,
        }
    }
}

impl DisplayConfig {
    /// colord names xrandr-backed displays `xrandr-<output>`.
    pub fn colord_device(&self) -> String {
        self.colord_device
            .clone()
            .unwrap_or_else(|| format!("xrandr-{}", self.output))
    }
}

impl SessionConfig {
    /// The configured argv with the placeholder substituted.
    pub fn render(&self, shader: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace(SHADER_PLACEHOLDER, shader))
            .collect()
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a finite non-negative number"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(duration) => serializer.serialize_str(&humantime::format_duration(*duration).to_string()),
        None => serializer.serialize_none(),
    }
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Config = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.tools.timeout
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.display.output.trim().is_empty() {
            return Err(ConfigError::Invalid("display.output must not be empty".into()));
        }

        if let Some(device) = &self.display.colord_device {
            if device.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "display.colord_device must not be empty when set".into(),
                ));
            }
        }

        match self.session.command.first() {
            None => {
                return Err(ConfigError::Invalid(
                    "session.command must name a program".into(),
                ))
            }
            Some(program) if program.trim().is_empty() => {
                return Err(ConfigError::Invalid(
                    "session.command program must not be empty".into(),
                ))
            }
            Some(_) => {}
        }

        if !self
            .session
            .command
            .iter()
            .skip(1)
            .any(|arg| arg.contains(SHADER_PLACEHOLDER))
        {
            return Err(ConfigError::Invalid(format!(
                "session.command must pass the shader path via the {SHADER_PLACEHOLDER} placeholder"
            )));
        }

        for (name, program) in [
            ("profile.generator", &self.profile.generator),
            ("profile.dump", &self.profile.dump),
            ("profile.activator", &self.profile.activator),
        ] {
            if program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }

        if self.profile.keep == Some(0) {
            return Err(ConfigError::Invalid(
                "profile.keep must be at least 1; omit it to keep every profile".into(),
            ));
        }

        if let Some(timeout) = self.tools.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "tools.timeout must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

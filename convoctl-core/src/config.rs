use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConvoError, Result};
use crate::theme::DEFAULT_SKIN;
use crate::validation::Limits;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "CONVOCTL_CONFIG";

/// Settings read from `~/.convoctl/config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvoConfig {
    pub render: RenderConfig,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub skin: String,
    pub user_label: String,
    /// Falls back to the platform's own name when unset.
    pub ai_label: Option<String>,
    pub include_footer: bool,
    pub reasoning: bool,
    pub preview: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            skin: DEFAULT_SKIN.to_string(),
            user_label: "You".to_string(),
            ai_label: None,
            include_footer: true,
            reasoning: true,
            preview: false,
        }
    }
}

impl ConvoConfig {
    /// Config file path: `$CONVOCTL_CONFIG`, else `~/.convoctl/config.toml`.
    pub fn config_path() -> PathBuf {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".convoctl/config.toml")
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicit config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            ConvoError::config(format!("failed to read {}: {err}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|err| ConvoError::config(format!("{}: {err}", path.display())))?;
        debug!(path = %path.display(), skin = %config.render.skin, "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|err| ConvoError::config(format!("invalid TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.render.skin.trim().is_empty() {
            return Err(ConvoError::config("render.skin must not be empty"));
        }
        if self.limits.max_file_bytes == 0 || self.limits.max_batch_bytes == 0 {
            return Err(ConvoError::config("limits must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = ConvoConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConvoConfig::default());
        assert_eq!(config.render.skin, "classic");
        assert_eq!(config.limits.max_artifacts, 100);
    }

    #[test]
    fn test_partial_sections() {
        let config = ConvoConfig::from_toml_str(
            "[render]\nskin = \"terminal\"\nai_label = \"Bot\"\n\n[limits]\nmax_artifacts = 5\n",
        )
        .unwrap();
        assert_eq!(config.render.skin, "terminal");
        assert_eq!(config.render.ai_label.as_deref(), Some("Bot"));
        assert!(config.render.include_footer);
        assert_eq!(config.limits.max_artifacts, 5);
        assert_eq!(config.limits.max_file_bytes, Limits::default().max_file_bytes);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = ConvoConfig::from_toml_str("[render\n").unwrap_err();
        assert!(matches!(err, ConvoError::Config { .. }));
        let err = ConvoConfig::from_toml_str("[limits]\nmax_file_bytes = 0\n").unwrap_err();
        assert!(matches!(err, ConvoError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[render]\npreview = true").unwrap();
        let config = ConvoConfig::load_from(file.path()).unwrap();
        assert!(config.render.preview);

        let missing = file.path().with_extension("missing");
        assert!(ConvoConfig::load_from(&missing).is_err());
    }
}

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use schemashift_common::{Error, Result};

use crate::model::AppConfig;

/// Environment variable that overrides `database.path`.
pub const DATABASE_PATH_ENV: &str = "SCHEMASHIFT_DATABASE_PATH";

/// Loads `AppConfig` from a YAML or TOML file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.schemashift`, or `.schemashift` when no home directory is known.
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".schemashift"))
            .unwrap_or_else(|| PathBuf::from(".schemashift"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yml")
    }

    /// The config file to read, if any.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present and `None` means "use defaults".
    pub fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        Self::locate_with_default(explicit, &Self::default_config_path())
    }

    fn locate_with_default(explicit: Option<&Path>, default_path: &Path) -> Result<Option<PathBuf>> {
        match explicit {
            Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
            Some(path) => Err(Error::NotFound(format!("config file {}", path.display()))),
            None if default_path.exists() => Ok(Some(default_path.to_path_buf())),
            None => Ok(None),
        }
    }

    /// Build the effective configuration from `source` (or defaults), apply
    /// the `SCHEMASHIFT_DATABASE_PATH` override and validate the result.
    pub fn load_from(source: Option<&Path>) -> Result<AppConfig> {
        let mut config = match source {
            Some(path) => Self::load_file(path)?,
            None => AppConfig::default(),
        };
        apply_env_override(&mut config, std::env::var_os(DATABASE_PATH_ENV));
        config.validate()?;
        Ok(config)
    }

    /// Parse a single config file, picking the format from its extension.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<AppConfig> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}

/// Replace `database.path` with the value of `SCHEMASHIFT_DATABASE_PATH`.
/// Unset and empty values leave the config untouched.
pub fn apply_env_override(config: &mut AppConfig, value: Option<OsString>) -> bool {
    match value.filter(|v| !v.is_empty()) {
        Some(path) => {
            config.database.path = PathBuf::from(path);
            true
        }
        None => false,
    }
}

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::config::AppConfig;
use crate::error::ConfigError;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging built-in defaults, the TOML file, and
    /// `THETA_`-prefixed environment variables (nested keys split on `__`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the merged result
    /// violates a configuration invariant.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
        Self::extract(Self::figment(path.as_ref(), None))
    }

    /// Same as [`ConfigLoader::load`] with a `<stem>.<profile>.toml` overlay
    /// read from the same directory.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the merged
    /// result is invalid.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig, ConfigError> {
        Self::extract(Self::figment(path.as_ref(), Some(profile)))
    }

    fn figment(path: &Path, profile: Option<&str>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path));

        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(profile_path(path, profile)));
        }

        figment.merge(Env::prefixed("THETA_").split("__"))
    }

    fn extract(figment: Figment) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        tracing::debug!(
            strategy = %config.strategy.name,
            underlying = %config.strategy.underlying,
            "Configuration loaded"
        );
        Ok(config)
    }
}

/// `<dir>/<stem>.<profile>.toml` for a config at `<dir>/<stem>.toml`.
pub fn profile_path(path: &Path, profile: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Theta");
    path.with_file_name(format!("{stem}.{profile}.toml"))
}

//! Environment loader with optional `.env` seeding.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Loads [`AppConfig`] from the process environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    env_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that looks for `.env` in the working directory and its parents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit env file instead of discovering `.env`.
    #[must_use]
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Seed the environment from the env file (if any) and build the configuration.
    ///
    /// Variables already present in the environment win over the file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvFile` when an existing env file cannot be parsed,
    /// and validation errors from [`AppConfig::from_lookup`].
    pub fn load(&self) -> ConfigResult<AppConfig> {
        let loaded = self.seed_environment()?;
        debug!(env_file_loaded = loaded, "configuration environment prepared");
        AppConfig::from_lookup(|key| std::env::var(key).ok())
    }

    fn seed_environment(&self) -> ConfigResult<bool> {
        let outcome = match &self.env_file {
            Some(path) => dotenvy::from_path(path).map(|()| true),
            None => dotenvy::dotenv().map(|_| true),
        };
        match outcome {
            Ok(loaded) => Ok(loaded),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(source) => Err(ConfigError::EnvFile {
                path: self.env_file.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_env_file_is_not_an_error() {
        let loader = ConfigLoader::new().with_env_file("/nonexistent/tunequeue.env");
        assert!(matches!(loader.seed_environment(), Ok(false)));
    }

    #[test]
    fn malformed_env_file_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "TUNEQUEUE_TEST_BROKEN='unterminated")?;
        let loader = ConfigLoader::new().with_env_file(file.path());
        let err = loader.seed_environment().expect_err("parse failure");
        assert!(matches!(err, ConfigError::EnvFile { path: Some(_), .. }));
        Ok(())
    }
}

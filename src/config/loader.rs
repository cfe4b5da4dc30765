//! Configuration Loader
//!
//! Environment-aware configuration loading. Discovers a base YAML file and an
//! optional per-environment overlay, merges them over the compiled-in
//! defaults, applies environment-variable overrides, and validates the
//! result before handing it out.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

use super::MesConfig;
use crate::error::{MesError, Result};

const BASE_FILE: &str = "mes-config.yaml";

/// Loaded configuration plus the context it was resolved from
pub struct ConfigManager {
    config: MesConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load with an explicit environment, useful for tests that must not
    /// mutate process-global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let mut config = Self::load_and_merge(&config_directory, environment)?;
        Self::apply_env_overrides(&mut config);

        config
            .validate()
            .map_err(MesError::Configuration)?;

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &MesConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn detect_environment() -> String {
        env::var("MES_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("MES_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Base file merged with the per-environment overlay. Missing files are
    /// not an error: the compiled-in defaults cover every section.
    fn load_and_merge(directory: &Path, environment: &str) -> Result<MesConfig> {
        let base_path = directory.join(BASE_FILE);
        let overlay_path = directory.join(format!("mes-config.{environment}.yaml"));

        let mut merged = serde_yaml::to_value(MesConfig::default())
            .map_err(|e| MesError::Configuration(format!("Default serialization failed: {e}")))?;

        for path in [&base_path, &overlay_path] {
            if !path.exists() {
                debug!(path = %path.display(), "Config file not present, skipping");
                continue;
            }
            let content = std::fs::read_to_string(path).map_err(|e| {
                MesError::Configuration(format!("Cannot read {}: {e}", path.display()))
            })?;
            let overlay: YamlValue = serde_yaml::from_str(&content).map_err(|e| {
                MesError::Configuration(format!("Invalid YAML in {}: {e}", path.display()))
            })?;
            merge_yaml(&mut merged, overlay);
        }

        serde_yaml::from_value(merged)
            .map_err(|e| MesError::Configuration(format!("Configuration shape invalid: {e}")))
    }

    /// `DATABASE_URL` wins over anything in the files; this is how deployed
    /// environments inject credentials.
    fn apply_env_overrides(config: &mut MesConfig) {
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }
        if let Ok(secret) = env::var("MES_AUTH_SECRET") {
            config.auth.secret = secret;
        } else if config.auth.enabled && config.auth.secret.is_empty() {
            warn!("auth enabled but no secret configured; set MES_AUTH_SECRET or auth.secret");
        }
    }
}

/// Recursive mapping merge; overlay scalars and sequences replace base values
fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_defaults_when_no_files_present() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .map_err(|e| format!("{e}"));
        // Default config has auth enabled with no secret, so validation fails
        // unless the harness supplies MES_AUTH_SECRET.
        if std::env::var("MES_AUTH_SECRET").is_err() {
            assert!(manager.is_err());
        }
    }

    #[test]
    fn test_overlay_wins_over_base() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "mes-config.yaml",
            "auth:\n  enabled: false\ndatabase:\n  pool: 5\n",
        );
        write_file(
            dir.path(),
            "mes-config.test.yaml",
            "database:\n  pool: 2\n",
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config().database.pool, 2);
        assert!(!manager.config().auth.enabled);
        // Untouched sections keep compiled defaults
        assert_eq!(manager.config().database.port, 5432);
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_transition_table_from_yaml() {
        use crate::state_machine::OrderState;

        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "mes-config.yaml",
            concat!(
                "auth:\n  enabled: false\n",
                "transitions:\n  version: 2\n  orders:\n    allowed:\n",
                "      pending: [cancelled]\n",
                "      in_progress: []\n      paused: []\n      stopped: []\n",
                "      completed: []\n      cancelled: []\n",
            ),
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let table = &manager.config().transitions.orders;
        assert_eq!(manager.config().transitions.version, 2);
        assert!(table.allows(OrderState::Pending, OrderState::Cancelled));
        assert!(!table.allows(OrderState::Pending, OrderState::InProgress));
    }

    #[test]
    fn test_merge_yaml_nested() {
        let mut base: YamlValue =
            serde_yaml::from_str("a:\n  b: 1\n  c: 2\n").unwrap();
        let overlay: YamlValue = serde_yaml::from_str("a:\n  c: 3\nd: 4\n").unwrap();
        merge_yaml(&mut base, overlay);

        assert_eq!(base["a"]["b"], YamlValue::from(1));
        assert_eq!(base["a"]["c"], YamlValue::from(3));
        assert_eq!(base["d"], YamlValue::from(4));
    }
}

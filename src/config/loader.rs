//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery,
//! environment section merging and `DASHFLOW__` environment variable overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::EngineConfig;
use config::{Config, Environment, File, FileFormat};
use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAMES: [&str; 2] = ["dashflow-config.yaml", "dashflow-config.yml"];
const ENVIRONMENT_SECTIONS: [&str; 3] = ["development", "test", "production"];
const ENV_PREFIX: &str = "DASHFLOW";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = crate::logging::get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config_file = Self::find_config_file(&config_directory)?;
        let yaml_content = Self::read_config_file_safely(&config_file)?;
        let config = Self::parse(
            &yaml_content,
            &config_file.display().to_string(),
            environment,
        )?;

        info!(
            environment = %environment,
            config_file = %config_file.display(),
            default_pool_size = config.scheduler.default_pool_size,
            domains = config.scheduler.domains.len(),
            "⚙️ CONFIG: Loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Build a manager from an in-memory YAML document
    pub fn from_yaml_str(yaml: &str, environment: &str) -> ConfigResult<ConfigManager> {
        let config = Self::parse(yaml, "<inline>", environment)?;
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration rendered as JSON for diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    /// Safely read a configuration file with resource management and size limits
    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024; // 1MB limit

        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!(
                    "Configuration file too large ({} bytes > {} bytes limit)",
                    metadata.len(),
                    MAX_CONFIG_FILE_SIZE
                ),
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file",
                "Configuration path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in CONFIG_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.is_file() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    /// Merge the environment section, layer environment variables and validate
    fn parse(yaml_content: &str, source: &str, environment: &str) -> ConfigResult<EngineConfig> {
        let mut yaml_data: YamlValue = if yaml_content.trim().is_empty() {
            YamlValue::Mapping(Default::default())
        } else {
            serde_yaml::from_str(yaml_content)
                .map_err(|e| ConfigurationError::invalid_yaml(source, e))?
        };

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!("Applying environment-specific overrides for: {}", environment);
            Self::merge_yaml_values(&mut yaml_data, env_overrides);
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for section in ENVIRONMENT_SECTIONS {
                map.remove(YamlValue::String(section.to_string()));
            }
        }

        let merged = serde_yaml::to_string(&yaml_data)
            .map_err(|e| ConfigurationError::invalid_yaml(source, e))?;

        let config: EngineConfig = Config::builder()
            .add_source(File::from_str(&merged, FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::environment_override_error(ENV_PREFIX, e))?
            .try_deserialize()
            .map_err(|e| {
                ConfigurationError::invalid_yaml(
                    source,
                    format!("Failed to deserialize configuration: {e}"),
                )
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value);
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("environment", &self.environment)
            .field("config_directory", &self.config_directory)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_config_yaml() -> &'static str {
        r#"
scheduler:
  default_pool_size: 4
  default_queue_size: 16
  executor_tick_ms: 2
  domains:
    - key: session-sweep
      pool_size: 2
      queue_size: 8

state_machine:
  task_threads: 3

timer:
  worker_threads: 1

test:
  scheduler:
    default_pool_size: 1
  state_machine:
    task_threads: 1

production:
  scheduler:
    default_pool_size: 16
"#
    }

    fn setup_test_config_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("dashflow-config.yaml"), test_config_yaml()).unwrap();
        (temp_dir, config_dir)
    }

    #[test]
    fn test_basic_config_loading() {
        let (_temp_dir, config_dir) = setup_test_config_dir();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(config_dir.clone()), "development")
                .unwrap();

        let config = manager.config();
        assert_eq!(manager.environment(), "development");
        assert_eq!(manager.config_directory(), config_dir.as_path());
        assert_eq!(config.scheduler.default_pool_size, 4);
        assert_eq!(config.scheduler.default_queue_size, 16);
        assert_eq!(config.scheduler.executor_tick_ms, 2);
        assert_eq!(config.scheduler.domains.len(), 1);
        assert_eq!(config.scheduler.domains[0].key, "session-sweep");
        assert_eq!(config.state_machine.task_threads, 3);
    }

    #[test]
    fn test_environment_specific_overrides() {
        let (_temp_dir, config_dir) = setup_test_config_dir();

        let test_manager =
            ConfigManager::load_from_directory_with_env(Some(config_dir.clone()), "test").unwrap();
        assert_eq!(test_manager.config().scheduler.default_pool_size, 1);
        assert_eq!(test_manager.config().scheduler.default_queue_size, 16);
        assert_eq!(test_manager.config().state_machine.task_threads, 1);

        let prod_manager =
            ConfigManager::load_from_directory_with_env(Some(config_dir), "production").unwrap();
        assert_eq!(prod_manager.config().scheduler.default_pool_size, 16);
        assert_eq!(prod_manager.config().state_machine.task_threads, 3);
    }

    #[test]
    fn test_yml_extension_is_found() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("dashflow-config.yml"),
            "scheduler:\n  default_pool_size: 7\n",
        )
        .unwrap();

        let manager = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "development",
        )
        .unwrap();
        assert_eq!(manager.config().scheduler.default_pool_size, 7);
        assert_eq!(manager.config().scheduler.default_queue_size, 10);
    }

    #[test]
    fn test_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "development",
        );

        match result {
            Err(ConfigurationError::ConfigFileNotFound { searched_paths }) => {
                assert_eq!(searched_paths.len(), 2);
            }
            other => panic!("expected ConfigFileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let result = ConfigManager::from_yaml_str("scheduler: [unterminated", "development");
        assert!(matches!(result, Err(ConfigurationError::InvalidYaml { .. })));
    }

    #[test]
    fn test_validation_runs_after_merge() {
        let yaml = "scheduler:\n  default_pool_size: 2\ntest:\n  scheduler:\n    default_pool_size: 0\n";
        assert!(ConfigManager::from_yaml_str(yaml, "development").is_ok());
        assert!(matches!(
            ConfigManager::from_yaml_str(yaml, "test"),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let manager = ConfigManager::from_yaml_str("", "development").unwrap();
        assert_eq!(manager.config(), &EngineConfig::default());
        assert_eq!(manager.debug_config()["state_machine"]["task_threads"], 2);
    }
}

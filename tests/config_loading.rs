use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashflow_core::config::{ConfigManager, ConfigurationError};
use dashflow_core::scheduler::Job;
use dashflow_core::Engine;
use tempfile::TempDir;

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("dashflow-config.yaml"), contents).unwrap();
    (temp_dir, config_dir)
}

#[test]
fn test_repository_config_loads_for_every_environment() {
    let config_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config");
    for environment in ["development", "test", "production"] {
        let manager =
            ConfigManager::load_from_directory_with_env(Some(config_dir.clone()), environment)
                .unwrap_or_else(|e| panic!("{environment}: {e}"));
        assert_eq!(manager.environment(), environment);
    }

    let production =
        ConfigManager::load_from_directory_with_env(Some(config_dir), "production").unwrap();
    assert_eq!(production.config().scheduler.default_pool_size, 8);
    assert_eq!(production.config().state_machine.task_threads, 4);
}

#[test]
fn test_engine_from_config_precreates_domains() {
    let (_temp_dir, config_dir) = write_config(
        r#"
scheduler:
  default_pool_size: 2
  default_queue_size: 4
  domains:
    - key: session-sweep
      pool_size: 1
      queue_size: 2
    - key: segment-cleanup
"#,
    );
    let manager =
        ConfigManager::load_from_directory_with_env(Some(config_dir), "development").unwrap();
    let engine = Engine::from_config_manager(&manager).unwrap();

    let scheduler = engine.schedule_manager();
    assert_eq!(
        scheduler.domain_keys(),
        vec!["segment-cleanup".to_string(), "session-sweep".to_string()]
    );
    // Zero sizes fall back to the configured defaults
    let cleanup = scheduler.schedule_unit("segment-cleanup").unwrap();
    assert_eq!(cleanup.pool_size(), 2);
    assert_eq!(cleanup.queue_size(), 4);

    let job = Job::builder("sweep")
        .interval(Duration::from_millis(20))
        .lasted(true)
        .task(|| Ok(()))
        .build()
        .unwrap();
    scheduler.schedule("session-sweep", Arc::clone(&job)).unwrap();

    let status = engine.status();
    assert!(status.running);
    assert_eq!(status.domains.len(), 2);

    engine.shutdown();
    assert!(job.is_cancelled());
    assert!(!engine.status().running);
}

#[test]
fn test_conflicting_domain_sizing_is_rejected_at_load() {
    let (_temp_dir, config_dir) = write_config(
        r#"
scheduler:
  domains:
    - key: sweep
    - key: sweep
"#,
    );
    let result = ConfigManager::load_from_directory_with_env(Some(config_dir), "development");
    assert!(matches!(result, Err(ConfigurationError::ValidationError { .. })));
}

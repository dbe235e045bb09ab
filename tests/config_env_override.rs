//! Environment variable overrides live in their own test binary so the
//! process environment they touch is not shared with other config tests.

use dashflow_core::config::ConfigManager;

#[test]
fn test_environment_variables_override_yaml() {
    std::env::set_var("DASHFLOW__SCHEDULER__DEFAULT_QUEUE_SIZE", "32");
    std::env::set_var("DASHFLOW__STATE_MACHINE__TASK_THREADS", "6");

    let yaml = "scheduler:\n  default_pool_size: 3\n  default_queue_size: 10\n";
    let manager = ConfigManager::from_yaml_str(yaml, "development").unwrap();

    std::env::remove_var("DASHFLOW__SCHEDULER__DEFAULT_QUEUE_SIZE");
    std::env::remove_var("DASHFLOW__STATE_MACHINE__TASK_THREADS");

    let config = manager.config();
    assert_eq!(config.scheduler.default_pool_size, 3);
    assert_eq!(config.scheduler.default_queue_size, 32);
    assert_eq!(config.state_machine.task_threads, 6);
}

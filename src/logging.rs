//! # Structured Logging Module
//!
//! Environment-aware structured logging that writes human-readable lines to
//! the console and JSON records to a per-process file, so scheduler and state
//! machine activity can be grepped by domain, unit or result code.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::ResultCode;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call repeatedly; an already-installed global subscriber is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");
        let log_dir = PathBuf::from("log");

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(env_filter(&log_level));

        // Console-only logging when the log directory cannot be created
        let file_layer = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(&log_dir, &log_filename);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // The writer must outlive every log call in the process.
                std::mem::forget(guard);
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_names(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(env_filter(&log_level)),
                )
            }
            Err(e) => {
                eprintln!("dashflow: log directory {} unavailable: {e}", log_dir.display());
                None
            }
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_dir.join(&log_filename).display(),
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Current environment name, shared with the configuration loader
pub fn get_environment() -> String {
    std::env::var("DASHFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for job scheduling operations
pub fn log_job_operation(
    operation: &str,
    domain: &str,
    job: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        domain = %domain,
        job = %job,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📅 JOB_OPERATION"
    );
}

/// Log structured data for a state transition outcome
pub fn log_state_transition(
    handler: &str,
    unit: &str,
    event: &str,
    from_state: &str,
    to_state: &str,
    code: ResultCode,
) {
    if code.is_success() {
        tracing::info!(
            code = %code,
            handler = %handler,
            unit = %unit,
            event = %event,
            from_state = %from_state,
            to_state = %to_state,
            timestamp = %Utc::now().to_rfc3339(),
            "🔀 STATE_TRANSITION"
        );
    } else {
        tracing::warn!(
            code = %code,
            handler = %handler,
            unit = %unit,
            event = %event,
            from_state = %from_state,
            to_state = %to_state,
            timestamp = %Utc::now().to_rfc3339(),
            "🔀 STATE_TRANSITION"
        );
    }
}

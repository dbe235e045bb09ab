#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dashflow Core
//!
//! Scheduling and state machine engine for segmented media streaming services.
//!
//! ## Overview
//!
//! A streaming server tracks every client session as a small state machine
//! (manifest requested, init segment delivered, media segment delivered, idle)
//! and runs periodic housekeeping next to it. This crate provides both pieces:
//!
//! - **Job scheduling**: named domains of single-threaded executors, each
//!   draining a bounded priority queue. Jobs run once, `N` times, or forever
//!   at a fixed interval.
//! - **Timeout-driven state machines**: handlers declare events as
//!   `{from states} -> to state`. An event may arm an escalation that fires a
//!   follow-up event after a delay unless something else moves the unit
//!   first, with a bounded number of retries before the fallback transition.
//!
//! Both are driven by one shared [`TimerService`](scheduler::TimerService).
//!
//! ## Module Organization
//!
//! - [`scheduler`] - Jobs, executors, schedule domains and the shared timer
//! - [`state_machine`] - Events, units, handlers, escalations and retries
//! - [`streaming`] - DASH client state machine preset
//! - [`engine`] - Composition root wiring the above together
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - Structured logging setup and helpers
//! - [`error`] - Error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dashflow_core::config::EngineConfig;
//! use dashflow_core::state_machine::StateEvent;
//! use dashflow_core::Engine;
//!
//! # fn main() -> dashflow_core::Result<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//! let handler = engine.state_manager().add_state_handler("Session");
//!
//! handler.add_state(
//!     StateEvent::builder("GET_MPD")
//!         .from_state("IDLE")
//!         .to_state("MPD_DONE")
//!         .escalate_to("MPD_TIMEOUT", Duration::from_secs(5), 2)
//!         .build()?,
//! )?;
//! handler.add_state(
//!     StateEvent::builder("MPD_TIMEOUT")
//!         .from_state("MPD_DONE")
//!         .to_state("IDLE")
//!         .build()?,
//! )?;
//!
//! let unit = engine
//!     .state_manager()
//!     .add_state_unit("client-1", "Session", "IDLE", None)?;
//! engine.state_manager().fire("GET_MPD", &unit);
//! # engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod state_machine;
pub mod streaming;

pub use config::{ConfigManager, EngineConfig};
pub use constants::ResultCode;
pub use engine::{Engine, EngineStatus};
pub use error::{EngineError, Result};
pub use scheduler::{Job, JobBuilder, ScheduleManager, TimerService};
pub use state_machine::{StateEvent, StateHandler, StateManager, StateUnit};

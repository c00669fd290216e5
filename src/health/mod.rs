//! Health check system for validating a configured input stack
//!
//! This module provides a framework for checking that the configuration
//! loads and that a live [`InputStack`](crate::input::InputStack) is
//! internally consistent, useful for:
//! - Validating handler profiles in CI
//! - Debugging bindings that never fire
//! - Spotting listeners that collided with another key at load time
//!
//! # Example
//!
//! ```no_run
//! use keystack::config::AppConfig;
//! use keystack::health::{HealthCheckRunner, checks::*};
//! use keystack::input::InputStack;
//!
//! let config = AppConfig::load("debug").unwrap();
//! let stack = InputStack::from_config(&config, config.open_store());
//!
//! let report = HealthCheckRunner::new()
//!     .add_check(ConfigCheck::new())
//!     .add_check(StackCheck::new(&stack))
//!     .add_check(BuildInfoCheck::new())
//!     .run();
//!
//! if report.is_healthy() {
//!     println!("All bindings consistent!");
//! }
//! ```

pub mod check;
pub mod checks;
pub mod reporter;
pub mod runner;

use crate::input::InputStack;

pub use check::{CheckResult, CheckStatus, SystemCheck};
pub use reporter::{format_report, print_report};
pub use runner::{HealthCheckReport, HealthCheckRunner};

/// Runs all default health checks against `stack` and returns a report
pub fn run_all_checks(stack: &InputStack) -> HealthCheckReport {
    HealthCheckRunner::new()
        .add_check(checks::ConfigCheck::new())
        .add_check(checks::BuildInfoCheck::new())
        .add_check(checks::StackCheck::new(stack))
        .add_check(checks::ListenerTableCheck::new(stack))
        .add_check(checks::KeyCacheCheck::new(stack))
        .run()
}

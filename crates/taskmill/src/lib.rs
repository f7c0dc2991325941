/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! # Taskmill
//!
//! A periodic-batch task scheduler backed by a relational store. For each
//! registered task definition it materialises a stream of time-bucketed
//! batches, dispatches ready batches across a worker pool, enforces
//! start-time and run-time deadlines, retries transient failures, and
//! serialises dependencies between batches of different tasks.
//!
//! # Architecture
//!
//! One tick flows through three components, each with its own transaction
//! scope:
//!
//! 1. **Generator** ([`generator::BatchGenerator`]) - projects every enabled
//!    definition forward into pending batch rows up to the generation
//!    horizon.
//! 2. **Dispatcher** ([`dispatcher::Dispatcher`]) - atomically claims due
//!    batches whose frozen dependency tags all resolve to terminal-success
//!    batches, demoting start-expired recurring batches as it walks.
//! 3. **Executor** ([`executor::BatchExecutor`]) - runs each claimed batch's
//!    script under a retry loop and a hard run-time deadline, then writes
//!    the terminal state.
//!
//! The [`runner::Runner`] ties the three together; a cron-like caller
//! invokes [`runner::Runner::run`] once per minute.
//!
//! # Example
//!
//! ```rust,ignore
//! use taskmill::{Database, Runner, RunnerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     taskmill::init_logging(None);
//!
//!     let database = Database::new("postgres://localhost/taskmill", 10);
//!     database.run_migrations().await?;
//!
//!     let runner = Runner::new(database, RunnerConfig::default());
//!     let report = runner.run().await?;
//!     println!("generated {}, dispatched {}", report.generated, report.dispatched);
//!     Ok(())
//! }
//! ```
//!
//! Task scripts implement [`executor::TaskScript`] and register through
//! [`executor::register_script_constructor`]; a definition's `script`
//! column names the registry entry to run.

pub mod alert;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod executor;
pub mod generator;
pub mod models;
pub mod runner;
pub mod scripts;
pub mod time;

pub use alert::{AlertSink, LogAlertSink};
pub use dal::{ClaimOutcome, ReadyBatch, DAL};
pub use database::{BackendType, Database};
pub use environment::EnvMode;
pub use error::{ExecutorError, ScriptError, ValidationError};
pub use executor::{register_script, register_script_constructor, BatchExecutor, TaskScript};
pub use models::{ExecStatus, TaskDefinition, TaskType};
pub use runner::{Runner, RunnerConfig, TickReport};
pub use time::{ExecUnit, Interval};

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `filter` (or `"info"`) is the fallback
/// directive. Safe to call more than once; later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or("info")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

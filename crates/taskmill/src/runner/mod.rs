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

//! Coordinator.
//!
//! One tick runs generation, dispatch, and execution in order. Generation
//! and dispatch each run as their own transaction; no lock spans both.
//! Cadence is externally driven: a cron-like caller invokes [`Runner::run`]
//! each minute, and there is no internal sleep loop.

mod config;

pub use config::{RunnerConfig, RunnerConfigBuilder};

use std::sync::Arc;
use tracing::info;

use crate::alert::{AlertSink, LogAlertSink};
use crate::dal::DAL;
use crate::database::Database;
use crate::dispatcher::Dispatcher;
use crate::environment::EnvMode;
use crate::error::ValidationError;
use crate::executor::BatchExecutor;
use crate::generator::BatchGenerator;
use crate::time;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// Batches materialised by the generator.
    pub generated: u32,
    /// Batches claimed and handed to the executor.
    pub dispatched: usize,
}

/// Top-level tick coordinator: generate, dispatch, execute.
pub struct Runner {
    dal: DAL,
    env: EnvMode,
    generator: BatchGenerator,
    dispatcher: Dispatcher,
    executor: BatchExecutor,
    config: RunnerConfig,
}

impl Runner {
    /// Creates a runner with the default [`LogAlertSink`].
    pub fn new(database: Database, config: RunnerConfig) -> Self {
        Self::with_alert_sink(database, config, Arc::new(LogAlertSink))
    }

    /// Creates a runner with a custom alert sink.
    pub fn with_alert_sink(
        database: Database,
        config: RunnerConfig,
        alerter: Arc<dyn AlertSink>,
    ) -> Self {
        let env = config.environment().unwrap_or_else(EnvMode::from_env);
        let dal = DAL::new(database);

        let generator = BatchGenerator::new(dal.clone(), env, config.generation_horizon());
        let dispatcher = Dispatcher::new(dal.clone(), env, alerter.clone());
        let executor = BatchExecutor::new(
            dal.clone(),
            alerter,
            config.task_num(),
            config.retry_pause(),
        );

        Self {
            dal,
            env,
            generator,
            dispatcher,
            executor,
            config,
        }
    }

    /// The environment this runner dispatches for.
    pub fn environment(&self) -> EnvMode {
        self.env
    }

    /// The DAL backing this runner.
    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    /// Runs one tick: generate, dispatch, execute.
    ///
    /// A database failure during generation or dispatch aborts the tick
    /// with nothing half-committed; the next tick retries (generation is
    /// idempotent and dispatch simply re-reads). Execution runs the claimed
    /// batches to their terminal states before returning.
    pub async fn run(&self) -> Result<TickReport, ValidationError> {
        let tick_start = time::now_local();
        info!(
            env = self.env.as_str(),
            task_num = self.config.task_num(),
            "Tick started"
        );

        let generated = self.generator.generate(tick_start).await?;
        let ready = self
            .dispatcher
            .dispatch(self.config.task_num(), tick_start)
            .await?;
        let dispatched = ready.len();

        self.executor.execute_all(ready, tick_start).await;

        info!(generated, dispatched, "Tick complete");
        Ok(TickReport {
            generated,
            dispatched,
        })
    }
}

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

//! Configuration types for the Runner.

use std::time::Duration;

use crate::environment::EnvMode;
use crate::time;

/// Configuration for the tick runner.
///
/// # Construction
///
/// Use [`RunnerConfig::builder()`] to create a configuration:
///
/// ```rust,ignore
/// let config = RunnerConfig::builder()
///     .task_num(8)
///     .retry_pause(Duration::from_secs(5))
///     .build();
/// ```
///
/// Or use the default configuration:
///
/// ```rust,ignore
/// let config = RunnerConfig::default();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RunnerConfig {
    task_num: usize,
    generation_horizon: chrono::Duration,
    retry_pause: Duration,
    db_pool_size: u32,
    environment: Option<EnvMode>,
}

impl RunnerConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    /// Maximum batches dispatched and executed per tick. Defaults to the
    /// host CPU count.
    pub fn task_num(&self) -> usize {
        self.task_num
    }

    /// How far past the tick the generator materialises batches.
    pub fn generation_horizon(&self) -> chrono::Duration {
        self.generation_horizon
    }

    /// Pause between retry attempts of a failing batch.
    pub fn retry_pause(&self) -> Duration {
        self.retry_pause
    }

    /// Number of database connections in the pool.
    pub fn db_pool_size(&self) -> u32 {
        self.db_pool_size
    }

    /// Environment override. `None` resolves from `TASKMILL_ENV`.
    pub fn environment(&self) -> Option<EnvMode> {
        self.environment
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfigBuilder::default().build()
    }
}

/// Builder for [`RunnerConfig`].
#[derive(Debug, Clone)]
pub struct RunnerConfigBuilder {
    task_num: usize,
    generation_horizon: chrono::Duration,
    retry_pause: Duration,
    db_pool_size: u32,
    environment: Option<EnvMode>,
}

impl Default for RunnerConfigBuilder {
    fn default() -> Self {
        Self {
            task_num: num_cpus::get(),
            generation_horizon: chrono::Duration::minutes(time::GENERATION_HORIZON_MINUTES),
            retry_pause: Duration::from_secs(5),
            db_pool_size: 10,
            environment: None,
        }
    }
}

impl RunnerConfigBuilder {
    /// Sets the per-tick batch cap. Values below one are clamped to one.
    pub fn task_num(mut self, task_num: usize) -> Self {
        self.task_num = task_num.max(1);
        self
    }

    /// Sets the generation horizon.
    pub fn generation_horizon(mut self, horizon: chrono::Duration) -> Self {
        self.generation_horizon = horizon;
        self
    }

    /// Sets the pause between retry attempts.
    pub fn retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Sets the database pool size.
    pub fn db_pool_size(mut self, size: u32) -> Self {
        self.db_pool_size = size;
        self
    }

    /// Overrides the environment instead of resolving `TASKMILL_ENV`.
    pub fn environment(mut self, env: EnvMode) -> Self {
        self.environment = Some(env);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RunnerConfig {
        RunnerConfig {
            task_num: self.task_num,
            generation_horizon: self.generation_horizon,
            retry_pause: self.retry_pause,
            db_pool_size: self.db_pool_size,
            environment: self.environment,
        }
    }
}

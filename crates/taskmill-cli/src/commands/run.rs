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

//! Implementation of the `run` command: one scheduler tick.
//!
//! Cadence is the caller's concern; a crontab entry invoking this command
//! each minute is the expected deployment. A non-zero exit means the tick
//! could not start or aborted on a database failure; retry and expiry
//! outcomes are data, not process exits.

use anyhow::{Context, Result};
use tracing::info;

use taskmill::{Database, EnvMode, Runner, RunnerConfig};

pub async fn run(database_url: &str, task_num: Option<usize>) -> Result<()> {
    let env = EnvMode::from_env();
    info!(env = env.as_str(), "Starting scheduler tick");

    let mut builder = RunnerConfig::builder().environment(env);
    if let Some(task_num) = task_num {
        builder = builder.task_num(task_num);
    }
    let config = builder.build();

    let database = Database::new(database_url, config.db_pool_size());
    let runner = Runner::new(database, config);

    // Scripts shipped with the scheduler itself; embedding applications
    // register theirs before building the runner.
    taskmill::scripts::register_builtins(runner.dal().clone(), env);

    let report = runner
        .run()
        .await
        .context("Scheduler tick aborted")?;

    info!(
        generated = report.generated,
        dispatched = report.dispatched,
        "Tick finished"
    );
    Ok(())
}

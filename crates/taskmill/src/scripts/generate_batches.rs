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

//! The frontier-extension script and the first-run bootstrap.

use async_trait::async_trait;
use chrono::Duration;
use tracing::info;

use crate::dal::DAL;
use crate::environment::EnvMode;
use crate::error::{ScriptError, ValidationError};
use crate::executor::TaskScript;
use crate::time::{self, Interval};

/// Name the script registers under.
pub const GENERATE_BATCHES_SCRIPT: &str = "generate_batches";

/// Extends every enabled definition's batch frontier up to the generation
/// horizon, using the end of its own window as "now".
#[derive(Clone)]
pub struct GenerateBatchesScript {
    dal: DAL,
    env: EnvMode,
    horizon: Duration,
}

impl GenerateBatchesScript {
    pub fn new(dal: DAL, env: EnvMode) -> Self {
        Self {
            dal,
            env,
            horizon: Duration::minutes(time::GENERATION_HORIZON_MINUTES),
        }
    }
}

#[async_trait]
impl TaskScript for GenerateBatchesScript {
    async fn run_task(
        &self,
        interval: &Interval,
        _script_args: &str,
        _task_tag_name: &str,
    ) -> Result<(), ScriptError> {
        let now = time::local_from_epoch(interval.ts_end);
        let created = self
            .dal
            .task_batch()
            .generate_missing(self.env.gate(), now, self.horizon)
            .await?;
        info!(created, env = self.env.as_str(), "Batch frontier extended");
        Ok(())
    }
}

/// Bootstraps an empty batch table.
///
/// When the store has no batches at all, nothing can ever be dispatched
/// (including a scheduled `generate_batches` task), so the first generation
/// run has to be invoked by hand. Does nothing if any batch row exists.
/// Returns the number of batches created.
pub async fn seed_first_run(dal: &DAL, env: EnvMode) -> Result<u32, ValidationError> {
    if dal.task_batch().count().await? > 0 {
        return Ok(0);
    }

    let now = time::now_local();
    let created = dal
        .task_batch()
        .generate_missing(
            env.gate(),
            now,
            Duration::minutes(time::GENERATION_HORIZON_MINUTES),
        )
        .await?;
    info!(created, "Seeded empty batch store");
    Ok(created)
}

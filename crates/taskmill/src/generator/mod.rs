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

//! Batch generator.
//!
//! Projects every enabled task definition forward into concrete batch rows,
//! once per tick, before dispatch. The storage transaction lives in the DAL
//! ([`crate::dal::TaskBatchDAL::generate_missing`]); this component wires it
//! to the environment and horizon and reports what a tick produced.

use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::dal::DAL;
use crate::environment::EnvMode;
use crate::error::ValidationError;

/// Materialises missing batches for enabled definitions.
pub struct BatchGenerator {
    dal: DAL,
    env: EnvMode,
    horizon: Duration,
}

impl BatchGenerator {
    /// Creates a generator for an environment with the given horizon.
    pub fn new(dal: DAL, env: EnvMode, horizon: Duration) -> Self {
        Self { dal, env, horizon }
    }

    /// Runs one generation pass at wall-clock `now`. All inserts commit in
    /// one transaction; on error the store is unchanged and the tick aborts.
    pub async fn generate(&self, now: NaiveDateTime) -> Result<u32, ValidationError> {
        let created = self
            .dal
            .task_batch()
            .generate_missing(self.env.gate(), now, self.horizon)
            .await?;

        if created > 0 {
            info!(created, env = self.env.as_str(), "Generated batches");
        }
        Ok(created)
    }
}

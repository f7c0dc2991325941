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

//! Dispatcher.
//!
//! Claims a bounded set of due batches whose dependencies are satisfied and
//! whose plan time has arrived, demoting start-expired recurring batches
//! along the way. The claim itself is a single transaction in the DAL
//! ([`crate::dal::TaskBatchDAL::claim_due`]); start-expiry alerts fire here,
//! after that transaction commits.

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

use crate::alert::AlertSink;
use crate::dal::{ReadyBatch, DAL};
use crate::environment::EnvMode;
use crate::error::ValidationError;

/// Claims ready batches for execution.
pub struct Dispatcher {
    dal: DAL,
    env: EnvMode,
    alerter: Arc<dyn AlertSink>,
}

impl Dispatcher {
    /// Creates a dispatcher for an environment.
    pub fn new(dal: DAL, env: EnvMode, alerter: Arc<dyn AlertSink>) -> Self {
        Self { dal, env, alerter }
    }

    /// Runs one dispatch pass at wall-clock `now`, claiming at most
    /// `task_num` batches. Returns the claimed descriptors in plan-time
    /// order.
    pub async fn dispatch(
        &self,
        task_num: usize,
        now: NaiveDateTime,
    ) -> Result<Vec<ReadyBatch>, ValidationError> {
        let outcome = self
            .dal
            .task_batch()
            .claim_due(self.env.gate(), task_num, now)
            .await?;

        for batch_name in &outcome.expired {
            warn!(batch = %batch_name, "Recurring batch expired before starting");
            self.alerter.notify(batch_name).await;
        }

        info!(
            ready = outcome.ready.len(),
            expired = outcome.expired.len(),
            env = self.env.as_str(),
            "Dispatch pass complete"
        );

        Ok(outcome.ready)
    }
}

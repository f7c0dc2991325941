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

//! Batch rows and their execution status codes.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::task_batch;
use crate::error::ValidationError;
use crate::time;

/// Execution status of a batch, stored as an integer.
///
/// `SucceededExternal` (4) is accepted as terminal success by the dependency
/// predicate but is never written by the scheduler itself; it is reserved
/// for external writers marking a window complete out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStatus {
    /// Never dispatched. Initial state of every generated batch.
    Pending,
    /// A recurring batch whose last run failed, waiting to be re-dispatched.
    AwaitingRetry,
    /// Claimed by exactly one worker.
    Running,
    /// Terminal success.
    Succeeded,
    /// Terminal success written by an external system.
    SucceededExternal,
    /// Terminal failure.
    Failed,
    /// Terminal failure: the run-time deadline elapsed.
    TimedOut,
}

impl ExecStatus {
    /// The stored integer code.
    pub fn as_i32(&self) -> i32 {
        match self {
            ExecStatus::Pending => 0,
            ExecStatus::AwaitingRetry => 1,
            ExecStatus::Running => 2,
            ExecStatus::Succeeded => 3,
            ExecStatus::SucceededExternal => 4,
            ExecStatus::Failed => -1,
            ExecStatus::TimedOut => -2,
        }
    }

    /// Decodes a stored integer code.
    pub fn from_i32(value: i32) -> Result<Self, ValidationError> {
        match value {
            0 => Ok(ExecStatus::Pending),
            1 => Ok(ExecStatus::AwaitingRetry),
            2 => Ok(ExecStatus::Running),
            3 => Ok(ExecStatus::Succeeded),
            4 => Ok(ExecStatus::SucceededExternal),
            -1 => Ok(ExecStatus::Failed),
            -2 => Ok(ExecStatus::TimedOut),
            other => Err(ValidationError::UnknownExecStatus(other)),
        }
    }

    /// Whether this status satisfies a downstream dependency.
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, ExecStatus::Succeeded | ExecStatus::SucceededExternal)
    }

    /// Whether a batch in this status may be claimed by the dispatcher.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, ExecStatus::Pending | ExecStatus::AwaitingRetry)
    }
}

/// A persisted batch row.
#[derive(Debug, Clone, Queryable)]
pub struct TaskBatchRow {
    pub id: i32,
    pub task_name: String,
    pub task_tag_name: String,
    pub task_batch_name: String,
    pub exec_status: i32,
    /// JSON array of upstream tag strings frozen at generation time.
    pub dependence: String,
    pub start_time: String,
    pub end_time: String,
    pub plan_time: String,
    pub plan_expire_time: String,
    pub exec_time: String,
    pub exit_time: String,
    pub duration: i32,
    pub retry: i32,
}

impl TaskBatchRow {
    /// The decoded execution status.
    pub fn status(&self) -> Result<ExecStatus, ValidationError> {
        ExecStatus::from_i32(self.exec_status)
    }

    /// The frozen dependency tag list.
    pub fn dependence_tags(&self) -> Result<Vec<String>, ValidationError> {
        serde_json::from_str(&self.dependence).map_err(|source| {
            ValidationError::MalformedDependence {
                task: self.task_name.clone(),
                source,
            }
        })
    }
}

/// Structure for inserting new batch rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_batch)]
pub struct NewTaskBatch {
    pub task_name: String,
    pub task_tag_name: String,
    pub task_batch_name: String,
    pub exec_status: i32,
    pub dependence: String,
    pub start_time: String,
    pub end_time: String,
    pub plan_time: String,
    pub plan_expire_time: String,
    pub exec_time: String,
    pub exit_time: String,
    pub duration: i32,
    pub retry: i32,
}

impl NewTaskBatch {
    /// Whether the exec/exit times still carry the unset sentinel.
    pub fn is_unstarted(&self) -> bool {
        self.exec_time == time::UNSET_TIMESTAMP
    }
}

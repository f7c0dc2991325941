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

//! Task definitions and the projection from a definition to batch rows.
//!
//! A [`TaskDefinition`] is the typed form of a `task_info` row. It owns all
//! window arithmetic for its task: next window start, window end, dependency
//! tag resolution, and the construction of new pending batches.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::task_info;
use crate::error::ValidationError;
use crate::models::task_batch::{ExecStatus, NewTaskBatch};
use crate::time::{self, ExecUnit};

/// Whether a task's batches recycle on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Failure is terminal once retries are exhausted.
    OneShot,
    /// A failed batch returns to the queue until its start deadline passes.
    Recurring,
}

impl TaskType {
    pub fn as_i32(&self) -> i32 {
        match self {
            TaskType::OneShot => 0,
            TaskType::Recurring => 1,
        }
    }

    /// Decodes the stored integer; any non-zero value is recurring.
    pub fn from_i32(value: i32) -> Self {
        if value == 0 {
            TaskType::OneShot
        } else {
            TaskType::Recurring
        }
    }
}

/// One dependency entry of a task definition: which upstream task must have
/// completed, in which unit its windows are expressed, and the
/// `[days, hours, minutes]` offset from this task's window start to the
/// upstream window start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenceSpec {
    pub task_name: String,
    pub exec_unit: ExecUnit,
    pub offset: [i64; 3],
}

/// A persisted task definition row.
#[derive(Debug, Clone, Queryable)]
pub struct TaskInfoRow {
    pub id: i32,
    pub task_name: String,
    pub task_type: i32,
    pub online: i32,
    pub dependence: String,
    pub script: String,
    pub script_args: String,
    pub exec_unit: String,
    pub exec_unit_param: i32,
    pub delay: i32,
    pub start_expire: i32,
    pub run_expire: i32,
    pub retry_max_times: i32,
    pub create_time: String,
    pub update_time: String,
}

/// Structure for inserting new task definition rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_info)]
pub struct NewTaskInfo {
    pub task_name: String,
    pub task_type: i32,
    pub online: i32,
    pub dependence: String,
    pub script: String,
    pub script_args: String,
    pub exec_unit: String,
    pub exec_unit_param: i32,
    pub delay: i32,
    pub start_expire: i32,
    pub run_expire: i32,
    pub retry_max_times: i32,
    pub create_time: String,
    pub update_time: String,
}

/// The typed form of a task definition, with its window arithmetic.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub id: i32,
    pub task_name: String,
    pub task_type: TaskType,
    pub online: i32,
    pub dependence: Vec<DependenceSpec>,
    pub script: String,
    pub script_args: String,
    pub exec_unit: ExecUnit,
    pub exec_unit_param: i32,
    /// Minutes from window end to the earliest dispatch time.
    pub delay: i32,
    /// Grace minutes past plan time before a never-started recurring batch
    /// is declared failed.
    pub start_expire: i32,
    /// Wall-clock deadline in minutes once a batch starts executing.
    pub run_expire: i32,
    /// Retries permitted after the first attempt.
    pub retry_max_times: i32,
}

impl TryFrom<TaskInfoRow> for TaskDefinition {
    type Error = ValidationError;

    fn try_from(row: TaskInfoRow) -> Result<Self, Self::Error> {
        let exec_unit = ExecUnit::parse(&row.exec_unit)?;
        let dependence: Vec<DependenceSpec> = serde_json::from_str(&row.dependence)
            .map_err(|source| ValidationError::MalformedDependence {
                task: row.task_name.clone(),
                source,
            })?;

        Ok(TaskDefinition {
            id: row.id,
            task_name: row.task_name,
            task_type: TaskType::from_i32(row.task_type),
            online: row.online,
            dependence,
            script: row.script,
            script_args: row.script_args,
            exec_unit,
            exec_unit_param: row.exec_unit_param.max(1),
            delay: row.delay,
            start_expire: row.start_expire,
            run_expire: row.run_expire,
            retry_max_times: row.retry_max_times,
        })
    }
}

impl TaskDefinition {
    /// The start of the window following one that starts at `start`.
    pub fn next_start(&self, start: NaiveDateTime) -> NaiveDateTime {
        time::next_start(start, self.exec_unit, self.exec_unit_param)
    }

    /// The exclusive end of the window starting at `start` (always one unit
    /// wide; see [`time::window_end`]).
    pub fn window_end(&self, start: NaiveDateTime) -> NaiveDateTime {
        time::window_end(start, self.exec_unit)
    }

    /// The seed window start for a task with no generated batches yet.
    pub fn init_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        time::init_start(now, self.exec_unit)
    }

    /// The tag for this task's window starting at `start`.
    pub fn tag(&self, start: NaiveDateTime) -> String {
        time::tag_name(&self.task_name, start, self.exec_unit)
    }

    /// Resolves the dependency tag list for a window starting at `start`:
    /// each entry's offset is applied to `start`, then encoded with the
    /// upstream task's unit.
    pub fn dependence_tags(&self, start: NaiveDateTime) -> Vec<String> {
        self.dependence
            .iter()
            .map(|dep| {
                let upstream_start = time::apply_offset(start, dep.offset);
                time::tag_name(&dep.task_name, upstream_start, dep.exec_unit)
            })
            .collect()
    }

    /// Builds a pending batch row for the window starting at `start`.
    pub fn new_batch(&self, start: NaiveDateTime, batch_num: u32) -> NewTaskBatch {
        let end = self.window_end(start);
        let plan_time = end + chrono::Duration::minutes(self.delay as i64);
        let plan_expire_time = plan_time + chrono::Duration::minutes(self.start_expire as i64);
        let tag = self.tag(start);

        NewTaskBatch {
            task_name: self.task_name.clone(),
            task_batch_name: format!("{}_{}", tag, batch_num),
            task_tag_name: tag,
            exec_status: ExecStatus::Pending.as_i32(),
            dependence: serde_json::Value::from(self.dependence_tags(start)).to_string(),
            start_time: time::format_ts(start),
            end_time: time::format_ts(end),
            plan_time: time::format_ts(plan_time),
            plan_expire_time: time::format_ts(plan_expire_time),
            exec_time: time::UNSET_TIMESTAMP.to_string(),
            exit_time: time::UNSET_TIMESTAMP.to_string(),
            duration: 0,
            retry: 0,
        }
    }
}

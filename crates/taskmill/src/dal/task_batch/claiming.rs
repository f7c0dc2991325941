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

//! Atomic batch claiming.
//!
//! A single transaction selects every due batch for the environment, walks
//! the candidates in plan-time order, and transitions the eligible ones to
//! Running. Candidates are scanned ahead of the cap in case some are
//! filtered, but the walk halts as soon as the cap is met. Within the same
//! transaction:
//!
//! - a recurring batch whose start deadline has passed is demoted to Failed
//!   and reported for alerting, without consuming a slot;
//! - a batch whose frozen dependency tags do not all resolve to a
//!   terminal-success batch is skipped untouched;
//! - claimed batches are enriched with their definition's retry, deadline
//!   and script fields so the executor needs no further reads.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use tracing::warn;

use super::TaskBatchDAL;
use crate::database::schema::{task_batch, task_info};
use crate::error::ValidationError;
use crate::models::task_batch::ExecStatus;
use crate::models::task_info::TaskType;
use crate::models::{TaskBatchRow, TaskInfoRow};
use crate::time;

/// A claimed batch, enriched with the definition fields the executor needs.
#[derive(Debug, Clone)]
pub struct ReadyBatch {
    /// Batch row id.
    pub id: i32,
    pub task_name: String,
    pub task_tag_name: String,
    pub task_batch_name: String,
    /// Window boundaries, half-open.
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Attempts already completed in earlier dispatches of this batch.
    pub retry: i32,
    pub task_type: TaskType,
    pub script: String,
    pub script_args: String,
    /// Wall-clock run deadline in minutes.
    pub run_expire: i32,
    /// Retries permitted after the first attempt.
    pub retry_max_times: i32,
}

impl ReadyBatch {
    fn from_rows(batch: &TaskBatchRow, info: &TaskInfoRow) -> Result<Self, ValidationError> {
        Ok(ReadyBatch {
            id: batch.id,
            task_name: batch.task_name.clone(),
            task_tag_name: batch.task_tag_name.clone(),
            task_batch_name: batch.task_batch_name.clone(),
            start_time: time::parse_ts(&batch.start_time)?,
            end_time: time::parse_ts(&batch.end_time)?,
            retry: batch.retry,
            task_type: TaskType::from_i32(info.task_type),
            script: info.script.clone(),
            script_args: info.script_args.clone(),
            run_expire: info.run_expire,
            retry_max_times: info.retry_max_times,
        })
    }
}

/// Result of one claim transaction.
#[derive(Debug, Default)]
pub struct ClaimOutcome {
    /// Batches transitioned to Running, in plan-time order.
    pub ready: Vec<ReadyBatch>,
    /// Batch names demoted to Failed because their start deadline passed.
    /// Alerts for these fire after the transaction commits.
    pub expired: Vec<String>,
}

impl<'a> TaskBatchDAL<'a> {
    /// Atomically claims up to `limit` due batches for the environment gate
    /// at wall-clock `now`.
    pub async fn claim_due(
        &self,
        gate: i32,
        limit: usize,
        now: NaiveDateTime,
    ) -> Result<ClaimOutcome, ValidationError> {
        crate::backend_dispatch!(
            self.dal().backend(),
            self.claim_due_postgres(gate, limit, now).await,
            self.claim_due_sqlite(gate, limit, now).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn claim_due_postgres(
        &self,
        gate: i32,
        limit: usize,
        now: NaiveDateTime,
    ) -> Result<ClaimOutcome, ValidationError> {
        use diesel::connection::Connection;

        let conn = self
            .dal()
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now_str = time::format_ts(now);
        let outcome: ClaimOutcome = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    let enabled: Vec<String> = task_info::table
                        .filter(task_info::online.eq(gate))
                        .select(task_info::task_name)
                        .load(conn)?;

                    // Row-level exclusive locks hold for the duration of the
                    // claim; concurrent coordinators serialise here.
                    let candidates: Vec<TaskBatchRow> = task_batch::table
                        .filter(task_batch::exec_status.eq_any(vec![
                            ExecStatus::Pending.as_i32(),
                            ExecStatus::AwaitingRetry.as_i32(),
                        ]))
                        .filter(task_batch::plan_time.le(&now_str))
                        .filter(task_batch::task_name.eq_any(&enabled))
                        .order(task_batch::plan_time.asc())
                        .for_update()
                        .load(conn)?;

                    let mut outcome = ClaimOutcome::default();
                    for row in &candidates {
                        if outcome.ready.len() == limit {
                            break;
                        }

                        // A recurring batch that never started before its
                        // deadline is failed in place.
                        if row.exec_status == ExecStatus::AwaitingRetry.as_i32()
                            && row.plan_expire_time.as_str() < now_str.as_str()
                        {
                            diesel::update(task_batch::table.find(row.id))
                                .set(task_batch::exec_status.eq(ExecStatus::Failed.as_i32()))
                                .execute(conn)?;
                            outcome.expired.push(row.task_batch_name.clone());
                            continue;
                        }

                        let tags = match row.dependence_tags() {
                            Ok(tags) => tags,
                            Err(e) => {
                                warn!(
                                    batch = %row.task_batch_name,
                                    error = %e,
                                    "Skipping batch with malformed dependence list"
                                );
                                continue;
                            }
                        };

                        let mut blocked = false;
                        for tag in &tags {
                            let latest: Option<TaskBatchRow> = task_batch::table
                                .filter(task_batch::task_tag_name.eq(tag))
                                .order(task_batch::task_batch_name.desc())
                                .first(conn)
                                .optional()?;
                            let satisfied = match latest {
                                Some(upstream) => upstream.status()?.is_terminal_success(),
                                None => false,
                            };
                            if !satisfied {
                                blocked = true;
                                break;
                            }
                        }
                        if blocked {
                            continue;
                        }

                        let info: TaskInfoRow = task_info::table
                            .filter(task_info::task_name.eq(&row.task_name))
                            .first(conn)?;

                        diesel::update(task_batch::table.find(row.id))
                            .set((
                                task_batch::exec_status.eq(ExecStatus::Running.as_i32()),
                                task_batch::exec_time.eq(&now_str),
                            ))
                            .execute(conn)?;

                        outcome.ready.push(ReadyBatch::from_rows(row, &info)?);
                    }

                    Ok(outcome)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(outcome)
    }

    #[cfg(feature = "sqlite")]
    async fn claim_due_sqlite(
        &self,
        gate: i32,
        limit: usize,
        now: NaiveDateTime,
    ) -> Result<ClaimOutcome, ValidationError> {
        use diesel::connection::Connection;

        let conn = self
            .dal()
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now_str = time::format_ts(now);
        let outcome: ClaimOutcome = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    let enabled: Vec<String> = task_info::table
                        .filter(task_info::online.eq(gate))
                        .select(task_info::task_name)
                        .load(conn)?;

                    // SQLite doesn't support FOR UPDATE; transaction
                    // isolation plus the single-connection pool is
                    // sufficient for single-node usage.
                    let candidates: Vec<TaskBatchRow> = task_batch::table
                        .filter(task_batch::exec_status.eq_any(vec![
                            ExecStatus::Pending.as_i32(),
                            ExecStatus::AwaitingRetry.as_i32(),
                        ]))
                        .filter(task_batch::plan_time.le(&now_str))
                        .filter(task_batch::task_name.eq_any(&enabled))
                        .order(task_batch::plan_time.asc())
                        .load(conn)?;

                    let mut outcome = ClaimOutcome::default();
                    for row in &candidates {
                        if outcome.ready.len() == limit {
                            break;
                        }

                        // A recurring batch that never started before its
                        // deadline is failed in place.
                        if row.exec_status == ExecStatus::AwaitingRetry.as_i32()
                            && row.plan_expire_time.as_str() < now_str.as_str()
                        {
                            diesel::update(task_batch::table.find(row.id))
                                .set(task_batch::exec_status.eq(ExecStatus::Failed.as_i32()))
                                .execute(conn)?;
                            outcome.expired.push(row.task_batch_name.clone());
                            continue;
                        }

                        let tags = match row.dependence_tags() {
                            Ok(tags) => tags,
                            Err(e) => {
                                warn!(
                                    batch = %row.task_batch_name,
                                    error = %e,
                                    "Skipping batch with malformed dependence list"
                                );
                                continue;
                            }
                        };

                        let mut blocked = false;
                        for tag in &tags {
                            let latest: Option<TaskBatchRow> = task_batch::table
                                .filter(task_batch::task_tag_name.eq(tag))
                                .order(task_batch::task_batch_name.desc())
                                .first(conn)
                                .optional()?;
                            let satisfied = match latest {
                                Some(upstream) => upstream.status()?.is_terminal_success(),
                                None => false,
                            };
                            if !satisfied {
                                blocked = true;
                                break;
                            }
                        }
                        if blocked {
                            continue;
                        }

                        let info: TaskInfoRow = task_info::table
                            .filter(task_info::task_name.eq(&row.task_name))
                            .first(conn)?;

                        diesel::update(task_batch::table.find(row.id))
                            .set((
                                task_batch::exec_status.eq(ExecStatus::Running.as_i32()),
                                task_batch::exec_time.eq(&now_str),
                            ))
                            .execute(conn)?;

                        outcome.ready.push(ReadyBatch::from_rows(row, &info)?);
                    }

                    Ok(outcome)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(outcome)
    }
}

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

//! Per-tick batch generation.
//!
//! One transaction envelopes all inserts for a tick: for each enabled
//! definition, the frontier (newest batch by tag) is extended with pending
//! batches until it reaches the generation horizon. Rollback on any failure
//! leaves the store unchanged; re-running is idempotent because the next run
//! re-reads the frontier, and the unique tag index backstops it.

use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;

use super::TaskBatchDAL;
use crate::database::schema::{task_batch, task_info};
use crate::error::ValidationError;
use crate::models::{TaskDefinition, TaskInfoRow};
use crate::time;

impl<'a> TaskBatchDAL<'a> {
    /// Extends every enabled definition's batch frontier up to
    /// `now + horizon`. Returns the number of batches inserted.
    pub async fn generate_missing(
        &self,
        gate: i32,
        now: NaiveDateTime,
        horizon: Duration,
    ) -> Result<u32, ValidationError> {
        crate::backend_dispatch!(
            self.dal().backend(),
            self.generate_missing_postgres(gate, now, horizon).await,
            self.generate_missing_sqlite(gate, now, horizon).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn generate_missing_postgres(
        &self,
        gate: i32,
        now: NaiveDateTime,
        horizon: Duration,
    ) -> Result<u32, ValidationError> {
        use diesel::connection::Connection;

        let conn = self
            .dal()
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let created: u32 = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    // Lock the definitions so a concurrent generator cannot
                    // extend the same frontiers.
                    let rows: Vec<TaskInfoRow> = task_info::table
                        .filter(task_info::online.eq(gate))
                        .for_update()
                        .load(conn)?;

                    let limit = now + horizon;
                    let mut created = 0u32;
                    for row in rows {
                        let def = TaskDefinition::try_from(row)?;

                        let last_start: Option<String> = task_batch::table
                            .filter(task_batch::task_name.eq(&def.task_name))
                            .order(task_batch::task_tag_name.desc())
                            .select(task_batch::start_time)
                            .first(conn)
                            .optional()?;

                        let mut next = match last_start {
                            Some(start) => def.next_start(time::parse_ts(&start)?),
                            None => def.init_start(now),
                        };

                        while next <= limit {
                            let new_batch = def.new_batch(next, 1);
                            diesel::insert_into(task_batch::table)
                                .values(&new_batch)
                                .execute(conn)?;
                            created += 1;
                            next = def.next_start(next);
                        }
                    }

                    Ok(created)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(created)
    }

    #[cfg(feature = "sqlite")]
    async fn generate_missing_sqlite(
        &self,
        gate: i32,
        now: NaiveDateTime,
        horizon: Duration,
    ) -> Result<u32, ValidationError> {
        use diesel::connection::Connection;

        let conn = self
            .dal()
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let created: u32 = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    // SQLite doesn't support FOR UPDATE; the write
                    // transaction itself excludes a concurrent generator.
                    let rows: Vec<TaskInfoRow> = task_info::table
                        .filter(task_info::online.eq(gate))
                        .load(conn)?;

                    let limit = now + horizon;
                    let mut created = 0u32;
                    for row in rows {
                        let def = TaskDefinition::try_from(row)?;

                        let last_start: Option<String> = task_batch::table
                            .filter(task_batch::task_name.eq(&def.task_name))
                            .order(task_batch::task_tag_name.desc())
                            .select(task_batch::start_time)
                            .first(conn)
                            .optional()?;

                        let mut next = match last_start {
                            Some(start) => def.next_start(time::parse_ts(&start)?),
                            None => def.init_start(now),
                        };

                        while next <= limit {
                            let new_batch = def.new_batch(next, 1);
                            diesel::insert_into(task_batch::table)
                                .values(&new_batch)
                                .execute(conn)?;
                            created += 1;
                            next = def.next_start(next);
                        }
                    }

                    Ok(created)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(created)
    }
}

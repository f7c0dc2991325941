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

//! Terminal state and retry counter updates.
//!
//! Each update is its own short transaction, issued by the worker that owns
//! the batch's single claim. If one of these writes fails the batch stays
//! Running until start-expiry rescues it; the executor surfaces and logs the
//! error.

use diesel::prelude::*;
use tracing::debug;

use super::TaskBatchDAL;
use crate::database::schema::task_batch;
use crate::error::ValidationError;
use crate::models::task_batch::ExecStatus;
use crate::time;

impl<'a> TaskBatchDAL<'a> {
    /// Persists the retry counter between attempts.
    pub async fn update_retry(&self, id: i32, retry: i32) -> Result<(), ValidationError> {
        crate::backend_dispatch!(
            self.dal().backend(),
            self.update_retry_postgres(id, retry).await,
            self.update_retry_sqlite(id, retry).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn update_retry_postgres(&self, id: i32, retry: i32) -> Result<(), ValidationError> {
        let conn = self
            .dal()
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::update(task_batch::table.find(id))
                .set(task_batch::retry.eq(retry))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn update_retry_sqlite(&self, id: i32, retry: i32) -> Result<(), ValidationError> {
        let conn = self
            .dal()
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::update(task_batch::table.find(id))
                .set(task_batch::retry.eq(retry))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Marks a batch as succeeded, recording its duration and exit time.
    pub async fn mark_succeeded(
        &self,
        id: i32,
        duration: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        self.write_terminal(id, ExecStatus::Succeeded, duration, exit_time)
            .await
    }

    /// Marks a batch as terminally failed.
    pub async fn mark_failed(
        &self,
        id: i32,
        duration: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        self.write_terminal(id, ExecStatus::Failed, duration, exit_time)
            .await
    }

    /// Marks a batch as timed out past its run deadline.
    pub async fn mark_timed_out(
        &self,
        id: i32,
        duration: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        self.write_terminal(id, ExecStatus::TimedOut, duration, exit_time)
            .await
    }

    async fn write_terminal(
        &self,
        id: i32,
        status: ExecStatus,
        duration: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        crate::backend_dispatch!(
            self.dal().backend(),
            self.write_terminal_postgres(id, status, duration, exit_time)
                .await,
            self.write_terminal_sqlite(id, status, duration, exit_time)
                .await
        )
    }

    #[cfg(feature = "postgres")]
    async fn write_terminal_postgres(
        &self,
        id: i32,
        status: ExecStatus,
        duration: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal()
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let exit_time = exit_time.to_string();
        conn.interact(move |conn| {
            diesel::update(task_batch::table.find(id))
                .set((
                    task_batch::exec_status.eq(status.as_i32()),
                    task_batch::duration.eq(duration),
                    task_batch::exit_time.eq(&exit_time),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        debug!(batch_id = id, status = ?status, "Terminal state written");
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn write_terminal_sqlite(
        &self,
        id: i32,
        status: ExecStatus,
        duration: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal()
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let exit_time = exit_time.to_string();
        conn.interact(move |conn| {
            diesel::update(task_batch::table.find(id))
                .set((
                    task_batch::exec_status.eq(status.as_i32()),
                    task_batch::duration.eq(duration),
                    task_batch::exit_time.eq(&exit_time),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        debug!(batch_id = id, status = ?status, "Terminal state written");
        Ok(())
    }

    /// Returns a failed recurring batch to the queue: status back to
    /// AwaitingRetry with the retry counter and exec time reset, so a later
    /// tick may attempt it again until its start deadline passes.
    pub async fn recycle_recurring(&self, id: i32, exit_time: &str) -> Result<(), ValidationError> {
        crate::backend_dispatch!(
            self.dal().backend(),
            self.recycle_recurring_postgres(id, exit_time).await,
            self.recycle_recurring_sqlite(id, exit_time).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn recycle_recurring_postgres(
        &self,
        id: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal()
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let exit_time = exit_time.to_string();
        conn.interact(move |conn| {
            diesel::update(task_batch::table.find(id))
                .set((
                    task_batch::exec_status.eq(ExecStatus::AwaitingRetry.as_i32()),
                    task_batch::retry.eq(0),
                    task_batch::duration.eq(0),
                    task_batch::exec_time.eq(time::UNSET_TIMESTAMP),
                    task_batch::exit_time.eq(&exit_time),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        debug!(batch_id = id, "Recurring batch recycled");
        Ok(())
    }

    #[cfg(feature = "sqlite")]
    async fn recycle_recurring_sqlite(
        &self,
        id: i32,
        exit_time: &str,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal()
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let exit_time = exit_time.to_string();
        conn.interact(move |conn| {
            diesel::update(task_batch::table.find(id))
                .set((
                    task_batch::exec_status.eq(ExecStatus::AwaitingRetry.as_i32()),
                    task_batch::retry.eq(0),
                    task_batch::duration.eq(0),
                    task_batch::exec_time.eq(time::UNSET_TIMESTAMP),
                    task_batch::exit_time.eq(&exit_time),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        debug!(batch_id = id, "Recurring batch recycled");
        Ok(())
    }
}

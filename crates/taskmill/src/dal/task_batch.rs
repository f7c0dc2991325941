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

//! Batch Data Access Layer.
//!
//! CRUD and locking primitives over `task_batch` rows:
//! - insert and lookup primitives (this module)
//! - the atomic claim protocol ([`claiming`])
//! - per-tick batch generation ([`generation`])
//! - terminal state and retry counter updates ([`state`])
//!
//! Key invariants enforced here:
//! - at most one claim per batch (row locks on PostgreSQL, transaction
//!   isolation on SQLite)
//! - a batch only reaches Running when its plan time has arrived and every
//!   frozen dependency tag resolves to a terminal-success batch
//! - one batch per `(task, window)`, backed by the unique tag index

mod claiming;
mod generation;
mod state;

pub use claiming::{ClaimOutcome, ReadyBatch};

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::task_batch;
use crate::error::ValidationError;
use crate::models::{NewTaskBatch, TaskBatchRow};

/// Data access layer for batch operations.
#[derive(Clone)]
pub struct TaskBatchDAL<'a> {
    dal: &'a DAL,
}

impl<'a> TaskBatchDAL<'a> {
    /// Creates a new TaskBatchDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub(super) fn dal(&self) -> &'a DAL {
        self.dal
    }

    /// Inserts a new batch row. Fails on a duplicate `task_tag_name`.
    pub async fn insert(&self, new_batch: NewTaskBatch) -> Result<TaskBatchRow, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.insert_postgres(new_batch).await,
            self.insert_sqlite(new_batch).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn insert_postgres(
        &self,
        new_batch: NewTaskBatch,
    ) -> Result<TaskBatchRow, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: TaskBatchRow = conn
            .interact(move |conn| {
                diesel::insert_into(task_batch::table)
                    .values(&new_batch)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    #[cfg(feature = "sqlite")]
    async fn insert_sqlite(
        &self,
        new_batch: NewTaskBatch,
    ) -> Result<TaskBatchRow, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: TaskBatchRow = conn
            .interact(move |conn| {
                diesel::insert_into(task_batch::table)
                    .values(&new_batch)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    /// Retrieves a batch by id.
    pub async fn get_by_id(&self, id: i32) -> Result<TaskBatchRow, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.get_by_id_postgres(id).await,
            self.get_by_id_sqlite(id).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_by_id_postgres(&self, id: i32) -> Result<TaskBatchRow, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: TaskBatchRow = conn
            .interact(move |conn| task_batch::table.find(id).first(conn))
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_id_sqlite(&self, id: i32) -> Result<TaskBatchRow, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: TaskBatchRow = conn
            .interact(move |conn| task_batch::table.find(id).first(conn))
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    /// Retrieves the most recent batch with the given tag (by
    /// `task_batch_name` descending), or `None`. This is the lookup the
    /// dependency predicate uses.
    pub async fn latest_by_tag(&self, tag: &str) -> Result<Option<TaskBatchRow>, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.latest_by_tag_postgres(tag).await,
            self.latest_by_tag_sqlite(tag).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn latest_by_tag_postgres(
        &self,
        tag: &str,
    ) -> Result<Option<TaskBatchRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let tag = tag.to_string();
        let row: Option<TaskBatchRow> = conn
            .interact(move |conn| {
                task_batch::table
                    .filter(task_batch::task_tag_name.eq(&tag))
                    .order(task_batch::task_batch_name.desc())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    #[cfg(feature = "sqlite")]
    async fn latest_by_tag_sqlite(
        &self,
        tag: &str,
    ) -> Result<Option<TaskBatchRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let tag = tag.to_string();
        let row: Option<TaskBatchRow> = conn
            .interact(move |conn| {
                task_batch::table
                    .filter(task_batch::task_tag_name.eq(&tag))
                    .order(task_batch::task_batch_name.desc())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    /// Retrieves all batches of a task, ordered by window start.
    pub async fn list_for_task(&self, name: &str) -> Result<Vec<TaskBatchRow>, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.list_for_task_postgres(name).await,
            self.list_for_task_sqlite(name).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_for_task_postgres(
        &self,
        name: &str,
    ) -> Result<Vec<TaskBatchRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let rows: Vec<TaskBatchRow> = conn
            .interact(move |conn| {
                task_batch::table
                    .filter(task_batch::task_name.eq(&name))
                    .order(task_batch::start_time.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    #[cfg(feature = "sqlite")]
    async fn list_for_task_sqlite(&self, name: &str) -> Result<Vec<TaskBatchRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let rows: Vec<TaskBatchRow> = conn
            .interact(move |conn| {
                task_batch::table
                    .filter(task_batch::task_name.eq(&name))
                    .order(task_batch::start_time.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Counts batch rows. Zero means the store has never been seeded.
    pub async fn count(&self) -> Result<i64, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.count_postgres().await,
            self.count_sqlite().await
        )
    }

    #[cfg(feature = "postgres")]
    async fn count_postgres(&self) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| task_batch::table.count().get_result(conn))
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn count_sqlite(&self) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| task_batch::table.count().get_result(conn))
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}

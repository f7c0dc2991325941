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

//! Task definition Data Access Layer.
//!
//! Read-mostly access to `task_info`, always filtered by the environment
//! gate: only definitions whose `online` value matches the running
//! environment are visible to the generator and dispatcher.

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::task_info;
use crate::error::ValidationError;
use crate::models::{NewTaskInfo, TaskInfoRow};

/// Data access layer for task definition operations.
#[derive(Clone)]
pub struct TaskInfoDAL<'a> {
    dal: &'a DAL,
}

impl<'a> TaskInfoDAL<'a> {
    /// Creates a new TaskInfoDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new task definition record.
    pub async fn create(&self, new_info: NewTaskInfo) -> Result<TaskInfoRow, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.create_postgres(new_info).await,
            self.create_sqlite(new_info).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn create_postgres(&self, new_info: NewTaskInfo) -> Result<TaskInfoRow, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: TaskInfoRow = conn
            .interact(move |conn| {
                diesel::insert_into(task_info::table)
                    .values(&new_info)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite(&self, new_info: NewTaskInfo) -> Result<TaskInfoRow, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: TaskInfoRow = conn
            .interact(move |conn| {
                diesel::insert_into(task_info::table)
                    .values(&new_info)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    /// Retrieves the definitions enabled for an environment gate value.
    pub async fn list_enabled(&self, gate: i32) -> Result<Vec<TaskInfoRow>, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.list_enabled_postgres(gate).await,
            self.list_enabled_sqlite(gate).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_enabled_postgres(&self, gate: i32) -> Result<Vec<TaskInfoRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let rows: Vec<TaskInfoRow> = conn
            .interact(move |conn| {
                task_info::table
                    .filter(task_info::online.eq(gate))
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    #[cfg(feature = "sqlite")]
    async fn list_enabled_sqlite(&self, gate: i32) -> Result<Vec<TaskInfoRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let rows: Vec<TaskInfoRow> = conn
            .interact(move |conn| {
                task_info::table
                    .filter(task_info::online.eq(gate))
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Retrieves a definition by task name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<TaskInfoRow>, ValidationError> {
        crate::backend_dispatch!(
            self.dal.backend(),
            self.get_by_name_postgres(name).await,
            self.get_by_name_sqlite(name).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn get_by_name_postgres(
        &self,
        name: &str,
    ) -> Result<Option<TaskInfoRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let row: Option<TaskInfoRow> = conn
            .interact(move |conn| {
                task_info::table
                    .filter(task_info::task_name.eq(&name))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }

    #[cfg(feature = "sqlite")]
    async fn get_by_name_sqlite(&self, name: &str) -> Result<Option<TaskInfoRow>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let row: Option<TaskInfoRow> = conn
            .interact(move |conn| {
                task_info::table
                    .filter(task_info::task_name.eq(&name))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(row)
    }
}

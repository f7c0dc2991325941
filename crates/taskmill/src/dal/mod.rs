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

//! Data Access Layer with runtime backend selection.
//!
//! Each DAL operation dispatches to a backend-specific implementation based
//! on the connection type detected at startup. PostgreSQL operations take
//! row-level locks (`SELECT ... FOR UPDATE`) where the claim protocol needs
//! them; the SQLite implementations rely on transaction isolation and the
//! single-connection pool instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use taskmill::dal::DAL;
//! use taskmill::database::Database;
//!
//! let db = Database::new("postgres://localhost/taskmill", 10);
//! let dal = DAL::new(db);
//!
//! let batch = dal.task_batch().latest_by_tag("t_202401010006").await?;
//! ```

use crate::database::{BackendType, Database};

pub mod task_batch;
pub mod task_info;

pub use task_batch::{ClaimOutcome, ReadyBatch, TaskBatchDAL};
pub use task_info::TaskInfoDAL;

/// Helper macro for dispatching operations based on backend type.
#[macro_export]
macro_rules! backend_dispatch {
    ($backend:expr, $pg:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite,
        }
    };
}

/// The Data Access Layer struct.
///
/// `Clone` and safe to share between workers; each clone references the same
/// underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Task definition operations.
    pub fn task_info(&self) -> TaskInfoDAL<'_> {
        TaskInfoDAL::new(self)
    }

    /// Batch operations.
    pub fn task_batch(&self) -> TaskBatchDAL<'_> {
        TaskBatchDAL::new(self)
    }
}

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

//! Error types for the taskmill scheduling engine.
//!
//! Each layer carries its own error enum:
//! - [`ValidationError`] - database access and data shape failures (DAL layer)
//! - [`ScriptError`] - failures raised by user task scripts
//! - [`ExecutorError`] - batch execution failures outside the script itself
//!
//! Transaction closures in the DAL use `ValidationError` as their error type,
//! so `diesel::result::Error` converts into it transparently.

use thiserror::Error;

/// Errors from the data access layer: connection pool failures, Diesel
/// errors, and malformed rows encountered while converting stored task
/// definitions and batches into domain types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Failure acquiring a pooled connection or running an interact closure.
    #[error("Database connection pool error: {0}")]
    ConnectionPool(String),

    /// An underlying Diesel error.
    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    /// A task definition references an execution unit other than
    /// minute/hour/day.
    #[error("Unknown execution unit: '{0}'")]
    UnknownExecUnit(String),

    /// The `dependence` column of a task definition is not valid JSON of the
    /// expected shape.
    #[error("Malformed dependence list for task '{task}': {source}")]
    MalformedDependence {
        task: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored timestamp column does not parse as `%Y-%m-%d %H:%M:%S`.
    #[error("Malformed timestamp: '{0}'")]
    MalformedTimestamp(String),

    /// A stored execution status integer is outside the known set.
    #[error("Unknown execution status: {0}")]
    UnknownExecStatus(i32),
}

/// Errors raised by user task scripts.
///
/// Scripts signal failure by returning this type from `run_task`; a failed
/// attempt feeds the retry loop and the failure callback.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script's work failed. The message is surfaced to the failure
    /// callback and the log.
    #[error("Script execution failed: {message}")]
    ExecutionFailed { message: String },

    /// A script that touches the batch store hit a database error.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ScriptError {
    /// Shorthand for an [`ScriptError::ExecutionFailed`] with a message.
    pub fn msg(message: impl Into<String>) -> Self {
        ScriptError::ExecutionFailed {
            message: message.into(),
        }
    }
}

/// Errors from the batch executor, outside the script retry loop.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The batch references a script name with no registered constructor.
    /// This is terminal: the batch fails without retries.
    #[error("Script not registered: '{0}'")]
    ScriptNotFound(String),

    /// A terminal state or retry counter could not be written.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

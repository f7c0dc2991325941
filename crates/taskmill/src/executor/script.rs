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

//! The task script contract.
//!
//! A script is the unit of user work a batch executes. It receives the batch
//! window as an [`Interval`], the definition's opaque argument string, and
//! the batch tag. Failure is signalled by returning an error, which feeds
//! the executor's retry loop.
//!
//! The two callbacks have default implementations that log. A success
//! callback error counts as a failed attempt; a failure callback error is
//! logged and discarded, never re-entering retry accounting.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ScriptError;
use crate::time::Interval;

/// User work invoked by the executor, addressable by name through the
/// script registry.
#[async_trait]
pub trait TaskScript: Send + Sync {
    /// Performs the batch's work for the given window.
    async fn run_task(
        &self,
        interval: &Interval,
        script_args: &str,
        task_tag_name: &str,
    ) -> Result<(), ScriptError>;

    /// Invoked once after `run_task` succeeds.
    async fn run_success_callback(
        &self,
        interval: &Interval,
        task_batch_name: &str,
    ) -> Result<(), ScriptError> {
        let (start, end) = interval.as_epochs(false);
        debug!(batch = %task_batch_name, start, end, "Batch script succeeded");
        Ok(())
    }

    /// Invoked on every failed attempt with the error that caused it.
    async fn run_failure_callback(
        &self,
        interval: &Interval,
        task_batch_name: &str,
        error: &ScriptError,
    ) -> Result<(), ScriptError> {
        let (start, end) = interval.as_epochs(false);
        warn!(batch = %task_batch_name, start, end, %error, "Batch script failed");
        Ok(())
    }
}

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

//! Batch Executor Module
//!
//! Runs the batches a dispatch tick claimed. The executor is responsible
//! for:
//! - Resolving each batch's script from the registry
//! - Driving the retry loop with the configured pause between attempts
//! - Enforcing the run-time deadline with a bounded join
//! - Writing the batch's terminal state
//!
//! Batches execute concurrently up to the worker cap, each on its own tokio
//! task with its own database session. The retry loop itself runs on a
//! nested task so that the deadline can abandon it: past the deadline the
//! loop is not cancelled, it is simply no longer awaited, and whatever it
//! does afterwards is ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::registry;
use super::script::TaskScript;
use crate::alert::AlertSink;
use crate::dal::{ReadyBatch, DAL};
use crate::error::ExecutorError;
use crate::models::task_info::TaskType;
use crate::time::{self, Interval};

/// Executes claimed batches against their registered scripts.
#[derive(Clone)]
pub struct BatchExecutor {
    /// Data Access Layer for terminal state and retry counter writes
    dal: DAL,
    /// Alert sink for exhausted one-shot batches and registry misses
    alerter: Arc<dyn AlertSink>,
    /// Maximum batches executing concurrently
    task_num: usize,
    /// Pause between retry attempts
    retry_pause: Duration,
    /// Unique identifier for this executor instance
    instance_id: Uuid,
}

impl BatchExecutor {
    /// Creates a new BatchExecutor instance.
    ///
    /// # Arguments
    /// * `dal` - Data access layer for batch state persistence
    /// * `alerter` - Alert sink for failure notifications
    /// * `task_num` - Maximum concurrent batch executions
    /// * `retry_pause` - Pause between retry attempts
    pub fn new(
        dal: DAL,
        alerter: Arc<dyn AlertSink>,
        task_num: usize,
        retry_pause: Duration,
    ) -> Self {
        Self {
            dal,
            alerter,
            task_num,
            retry_pause,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Executes a set of claimed batches concurrently, up to the worker cap,
    /// and waits for all of them to reach a terminal state (or be abandoned
    /// past their deadline).
    ///
    /// `tick_start` is the dispatch wall-clock instant; recorded durations
    /// are measured from it.
    pub async fn execute_all(&self, ready: Vec<ReadyBatch>, tick_start: chrono::NaiveDateTime) {
        if ready.is_empty() {
            return;
        }

        info!(
            instance = %self.instance_id,
            count = ready.len(),
            workers = self.task_num,
            "Executing claimed batches"
        );

        let semaphore = Arc::new(Semaphore::new(self.task_num.max(1)));
        let mut handles = Vec::new();

        for batch in ready {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed; bail defensively anyway.
                Err(_) => break,
            };
            let executor = self.clone();
            let batch_name = batch.task_batch_name.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit; // Hold until the batch reaches a terminal state
                if let Err(e) = executor.execute_one(batch, tick_start).await {
                    error!(batch = %batch_name, error = %e, "Batch execution failed");
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Batch worker join failure");
            }
        }
    }

    /// Executes one claimed batch: resolve the script, drive the retry loop
    /// under the run deadline, write the terminal state.
    pub async fn execute_one(
        &self,
        batch: ReadyBatch,
        tick_start: chrono::NaiveDateTime,
    ) -> Result<(), ExecutorError> {
        let interval = Interval::from_window(batch.start_time, batch.end_time);

        // Registry miss is terminal: alert, fail, no retries.
        let script = match registry::get_script(&batch.script) {
            Some(script) => script,
            None => {
                self.alerter.notify(&batch.task_batch_name).await;
                let exit_time = time::now_local();
                let duration = time::duration_minutes_ceil(tick_start, exit_time);
                self.dal
                    .task_batch()
                    .mark_failed(batch.id, duration, &time::format_ts(exit_time))
                    .await?;
                return Err(ExecutorError::ScriptNotFound(batch.script.clone()));
            }
        };

        let attempt_handle = tokio::spawn(run_attempts(
            self.dal.clone(),
            self.alerter.clone(),
            script,
            batch.clone(),
            interval,
            self.retry_pause,
        ));

        let deadline = Duration::from_secs(batch.run_expire.max(0) as u64 * 60);
        let outcome = tokio::time::timeout(deadline, attempt_handle).await;

        let exit_time = time::now_local();
        let exit_str = time::format_ts(exit_time);
        let duration = time::duration_minutes_ceil(tick_start, exit_time);

        let timed_out = outcome.is_err();
        if let Ok(Err(join_error)) = &outcome {
            error!(
                batch = %batch.task_batch_name,
                error = %join_error,
                "Batch attempt task failed"
            );
        }

        // Terminal state, in priority order. The recurring check comes
        // before the deadline check, so a recurring batch that overran its
        // deadline recycles rather than timing out; TimedOut is only
        // reachable for one-shot tasks. Past the deadline the attempt task
        // is abandoned, not cancelled: a completion landing between this
        // decision and the state write is ignored.
        let success = matches!(outcome, Ok(Ok(true)));
        if success {
            self.dal
                .task_batch()
                .mark_succeeded(batch.id, duration, &exit_str)
                .await?;
            info!(batch = %batch.task_batch_name, duration, "Batch succeeded");
        } else if batch.task_type == TaskType::Recurring {
            self.dal
                .task_batch()
                .recycle_recurring(batch.id, &exit_str)
                .await?;
            info!(batch = %batch.task_batch_name, "Recurring batch returned to queue");
        } else if timed_out {
            self.dal
                .task_batch()
                .mark_timed_out(batch.id, duration, &exit_str)
                .await?;
            warn!(
                batch = %batch.task_batch_name,
                run_expire = batch.run_expire,
                "Batch abandoned past run deadline"
            );
        } else {
            self.dal
                .task_batch()
                .mark_failed(batch.id, duration, &exit_str)
                .await?;
            error!(batch = %batch.task_batch_name, "Batch failed terminally");
        }

        Ok(())
    }
}

/// The attempt loop for one batch. Returns whether an attempt succeeded.
///
/// Runs on its own task so the deadline in [`BatchExecutor::execute_one`]
/// can abandon it. The loop persists the retry counter before each pause so
/// a restarted coordinator sees accurate accounting.
async fn run_attempts(
    dal: DAL,
    alerter: Arc<dyn AlertSink>,
    script: Arc<dyn TaskScript>,
    batch: ReadyBatch,
    interval: Interval,
    pause: Duration,
) -> bool {
    let mut retry = batch.retry;
    info!(batch = %batch.task_batch_name, "Batch execution started");

    loop {
        if retry > 0 {
            info!(batch = %batch.task_batch_name, retry, "Retrying batch");
        }

        // A success-callback error counts as a failed attempt.
        let attempt = async {
            script
                .run_task(&interval, &batch.script_args, &batch.task_tag_name)
                .await?;
            script
                .run_success_callback(&interval, &batch.task_batch_name)
                .await
        }
        .await;

        match attempt {
            Ok(()) => {
                info!(batch = %batch.task_batch_name, "Batch execution succeeded");
                return true;
            }
            Err(error) => {
                // Failure-callback errors are logged and discarded; they
                // never re-enter retry accounting.
                if let Err(callback_error) = script
                    .run_failure_callback(&interval, &batch.task_batch_name, &error)
                    .await
                {
                    error!(
                        batch = %batch.task_batch_name,
                        error = %callback_error,
                        "Failure callback raised"
                    );
                }
                error!(batch = %batch.task_batch_name, %error, "Batch execution failed");
            }
        }

        // The retry about to start; the first attempt is not counted.
        retry += 1;
        if retry > batch.retry_max_times {
            if batch.task_type == TaskType::OneShot {
                alerter.notify(&batch.task_batch_name).await;
            }
            return false;
        }

        if let Err(error) = dal.task_batch().update_retry(batch.id, retry).await {
            error!(
                batch = %batch.task_batch_name,
                %error,
                "Failed to persist retry counter"
            );
            return false;
        }

        tokio::time::sleep(pause).await;
    }
}

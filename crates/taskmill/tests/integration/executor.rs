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

//! Executor: retry accounting, terminal states, deadlines, and the script
//! registry contract.
//!
//! Each test registers its scripts under a unique name; the registry is
//! process-global.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serial_test::serial;

use taskmill::dal::{DAL, ReadyBatch};
use taskmill::models::ExecStatus;
use taskmill::time::Interval;
use taskmill::{register_script, BatchExecutor, ScriptError, TaskScript};

use crate::fixtures::{self, RecordingAlertSink};

/// Script whose attempts fail until `succeed_after` attempts have happened.
/// `usize::MAX` means it always fails.
#[derive(Clone)]
struct CountingScript {
    attempts: Arc<AtomicUsize>,
    successes: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    succeed_after: usize,
}

impl CountingScript {
    fn new(succeed_after: usize) -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            successes: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
            succeed_after,
        }
    }
}

#[async_trait]
impl TaskScript for CountingScript {
    async fn run_task(
        &self,
        _interval: &Interval,
        _script_args: &str,
        _task_tag_name: &str,
    ) -> Result<(), ScriptError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.succeed_after {
            Err(ScriptError::msg("induced failure"))
        } else {
            Ok(())
        }
    }

    async fn run_success_callback(
        &self,
        _interval: &Interval,
        _task_batch_name: &str,
    ) -> Result<(), ScriptError> {
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_failure_callback(
        &self,
        _interval: &Interval,
        _task_batch_name: &str,
        _error: &ScriptError,
    ) -> Result<(), ScriptError> {
        self.failures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Script that sleeps past any test deadline.
#[derive(Clone)]
struct SleepingScript;

#[async_trait]
impl TaskScript for SleepingScript {
    async fn run_task(
        &self,
        _interval: &Interval,
        _script_args: &str,
        _task_tag_name: &str,
    ) -> Result<(), ScriptError> {
        tokio::time::sleep(Duration::from_secs(120)).await;
        Ok(())
    }
}

/// Creates a definition and a due batch for it, then claims the batch.
async fn claim_one(
    dal: &DAL,
    name: &str,
    script: &str,
    task_type: i32,
    retry_max_times: i32,
) -> ReadyBatch {
    let mut info = fixtures::task_info(name, "minute", 1);
    info.script = script.to_string();
    info.task_type = task_type;
    info.retry_max_times = retry_max_times;
    let row = dal.task_info().create(info).await.unwrap();
    let def = fixtures::definition(row);

    dal.task_batch()
        .insert(def.new_batch(fixtures::dt("2024-01-01 00:06:00"), 1))
        .await
        .unwrap();

    let outcome = dal
        .task_batch()
        .claim_due(1, 1, fixtures::dt("2024-01-01 00:30:00"))
        .await
        .unwrap();
    outcome.ready.into_iter().next().expect("Batch should claim")
}

fn executor(dal: &DAL, alerter: &RecordingAlertSink) -> BatchExecutor {
    BatchExecutor::new(
        dal.clone(),
        Arc::new(alerter.clone()),
        2,
        Duration::from_millis(1),
    )
}

#[tokio::test]
#[serial]
async fn test_successful_batch_reaches_terminal_success() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    let script = CountingScript::new(0);
    register_script("exec_test_ok", script.clone());

    let batch = claim_one(&dal, "t_ok", "exec_test_ok", 0, 2).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::Succeeded.as_i32());
    assert_ne!(row.exit_time, "0000-00-00 00:00:00");
    assert!(row.duration <= 1);

    assert_eq!(script.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(script.successes.load(Ordering::SeqCst), 1);
    assert_eq!(script.failures.load(Ordering::SeqCst), 0);
    assert!(alerter.names().is_empty());
}

#[tokio::test]
#[serial]
async fn test_one_shot_exhausts_retries_then_fails_and_alerts() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    let script = CountingScript::new(usize::MAX);
    register_script("exec_test_exhaust", script.clone());

    let batch = claim_one(&dal, "t_exhaust", "exec_test_exhaust", 0, 2).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    // First attempt plus retry_max_times retries.
    assert_eq!(script.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(script.failures.load(Ordering::SeqCst), 3);

    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::Failed.as_i32());
    // The counter persists the retries that ran, not the exhausting bump.
    assert_eq!(row.retry, 2);
    assert_eq!(alerter.names(), vec!["t_exhaust_202401010006_1".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_recurring_failure_recycles_into_queue() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    let script = CountingScript::new(usize::MAX);
    register_script("exec_test_recycle", script.clone());

    let batch = claim_one(&dal, "t_recycle", "exec_test_recycle", 1, 1).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::AwaitingRetry.as_i32());
    assert_eq!(row.retry, 0);
    assert_eq!(row.duration, 0);
    assert_eq!(row.exec_time, "0000-00-00 00:00:00");
    assert_ne!(row.exit_time, "0000-00-00 00:00:00");
    // Recurring exhaustion does not alert; start expiry will.
    assert!(alerter.names().is_empty());
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_one_shot_deadline_abandons_and_times_out() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    register_script("exec_test_sleep", SleepingScript);

    // run_expire is one minute; the script sleeps for two.
    let batch = claim_one(&dal, "t_sleep", "exec_test_sleep", 0, 0).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::TimedOut.as_i32());
    assert_ne!(row.exit_time, "0000-00-00 00:00:00");
    assert!(alerter.names().is_empty());
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_recurring_deadline_recycles_instead_of_timing_out() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    register_script("exec_test_sleep_recur", SleepingScript);

    let batch = claim_one(&dal, "t_sleep_recur", "exec_test_sleep_recur", 1, 0).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    // The recurring branch outranks the deadline branch: the batch recycles.
    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::AwaitingRetry.as_i32());
    assert_eq!(row.exec_time, "0000-00-00 00:00:00");
}

#[tokio::test]
#[serial]
async fn test_unregistered_script_fails_terminally_with_alert() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();

    let batch = claim_one(&dal, "t_missing", "exec_test_not_registered", 0, 5).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::Failed.as_i32());
    // No retries for a registry miss.
    assert_eq!(row.retry, 0);
    assert_eq!(alerter.names(), vec!["t_missing_202401010006_1".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_success_callback_error_counts_as_failed_attempt() {
    #[derive(Clone)]
    struct BrokenCallbackScript {
        failures: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TaskScript for BrokenCallbackScript {
        async fn run_task(
            &self,
            _interval: &Interval,
            _script_args: &str,
            _task_tag_name: &str,
        ) -> Result<(), ScriptError> {
            Ok(())
        }

        async fn run_success_callback(
            &self,
            _interval: &Interval,
            _task_batch_name: &str,
        ) -> Result<(), ScriptError> {
            Err(ScriptError::msg("callback exploded"))
        }

        async fn run_failure_callback(
            &self,
            _interval: &Interval,
            _task_batch_name: &str,
            _error: &ScriptError,
        ) -> Result<(), ScriptError> {
            self.failures.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    let script = BrokenCallbackScript {
        failures: Arc::new(AtomicUsize::new(0)),
    };
    register_script("exec_test_broken_cb", script.clone());

    let batch = claim_one(&dal, "t_broken_cb", "exec_test_broken_cb", 0, 0).await;
    let id = batch.id;
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;

    // run_task succeeded but the success callback failed: the attempt
    // counts as failed and flows through the failure callback.
    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::Failed.as_i32());
    assert_eq!(script.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[serial]
async fn test_retry_counter_survives_between_dispatches() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    let script = CountingScript::new(usize::MAX);
    register_script("exec_test_carry", script.clone());

    // Recurring batch with two permitted retries: the first dispatch burns
    // all three attempts, recycles, and the next claim starts from zero.
    let batch = claim_one(&dal, "t_carry", "exec_test_carry", 1, 2).await;
    let id = batch.id;
    assert_eq!(batch.retry, 0);
    executor(&dal, &alerter)
        .execute_all(vec![batch], taskmill::time::now_local())
        .await;
    assert_eq!(script.attempts.load(Ordering::SeqCst), 3);

    // Reclaim before the start deadline (plan expire is 00:17).
    let outcome = dal
        .task_batch()
        .claim_due(1, 1, fixtures::dt("2024-01-01 00:16:00"))
        .await
        .unwrap();
    let reclaimed = outcome.ready.into_iter().next().expect("Recycled batch");
    assert_eq!(reclaimed.id, id);
    assert_eq!(reclaimed.retry, 0);
}

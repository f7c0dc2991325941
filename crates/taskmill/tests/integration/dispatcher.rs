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

//! Dispatch: dependency gating, start expiry, the claim cap, and claim
//! exclusivity.

use std::collections::HashSet;
use std::sync::Arc;

use taskmill::dal::DAL;
use taskmill::dispatcher::Dispatcher;
use taskmill::models::ExecStatus;
use taskmill::EnvMode;

use crate::fixtures::{self, RecordingAlertSink};

/// Inserts a batch for the named definition's window, with an optional
/// status override, and returns its row id.
async fn insert_batch(dal: &DAL, name: &str, start: &str, status: Option<ExecStatus>) -> i32 {
    let row = dal
        .task_info()
        .get_by_name(name)
        .await
        .unwrap()
        .expect("Definition should exist");
    let def = fixtures::definition(row);

    let mut new_batch = def.new_batch(fixtures::dt(start), 1);
    if let Some(status) = status {
        new_batch.exec_status = status.as_i32();
    }
    dal.task_batch().insert(new_batch).await.unwrap().id
}

#[tokio::test]
async fn test_dependency_gates_until_upstream_succeeds() {
    let dal = fixtures::sqlite_dal().await;

    dal.task_info()
        .create(fixtures::task_info("b", "hour", 1))
        .await
        .unwrap();
    let mut a = fixtures::task_info("a", "hour", 1);
    a.dependence = r#"[{"task_name": "b", "exec_unit": "hour", "offset": [0, -1, 0]}]"#.to_string();
    dal.task_info().create(a).await.unwrap();

    // A's 05:00 window depends on B's 04:00 window.
    let b_id = insert_batch(&dal, "b", "2024-01-01 04:00:00", None).await;
    let a_id = insert_batch(&dal, "a", "2024-01-01 05:00:00", None).await;

    let now = fixtures::dt("2024-01-01 06:30:00");

    // First pass: B is claimable, A is gated on B's pending batch.
    let outcome = dal.task_batch().claim_due(1, 10, now).await.unwrap();
    let claimed: Vec<_> = outcome.ready.iter().map(|b| b.task_name.clone()).collect();
    assert_eq!(claimed, vec!["b".to_string()]);
    let a_row = dal.task_batch().get_by_id(a_id).await.unwrap();
    assert_eq!(a_row.exec_status, ExecStatus::Pending.as_i32());

    // B succeeds; the next pass claims A.
    dal.task_batch()
        .mark_succeeded(b_id, 1, "2024-01-01 06:31:00")
        .await
        .unwrap();
    let upstream = dal
        .task_batch()
        .latest_by_tag("b_2024010104")
        .await
        .unwrap()
        .expect("Upstream window should resolve");
    assert_eq!(upstream.exec_status, ExecStatus::Succeeded.as_i32());

    let outcome = dal.task_batch().claim_due(1, 10, now).await.unwrap();
    assert_eq!(outcome.ready.len(), 1);
    assert_eq!(outcome.ready[0].task_name, "a");

    // The claim transitioned A through Running and stamped its exec time.
    let a_row = dal.task_batch().get_by_id(a_id).await.unwrap();
    assert_eq!(a_row.exec_status, ExecStatus::Running.as_i32());
    assert_eq!(a_row.exec_time, "2024-01-01 06:30:00");
}

#[tokio::test]
async fn test_external_success_status_satisfies_dependency() {
    let dal = fixtures::sqlite_dal().await;

    dal.task_info()
        .create(fixtures::task_info("b", "hour", 1))
        .await
        .unwrap();
    let mut a = fixtures::task_info("a", "hour", 1);
    a.dependence = r#"[{"task_name": "b", "exec_unit": "hour", "offset": [0, -1, 0]}]"#.to_string();
    dal.task_info().create(a).await.unwrap();

    // The upstream window was completed by an external writer (status 4).
    insert_batch(
        &dal,
        "b",
        "2024-01-01 04:00:00",
        Some(ExecStatus::SucceededExternal),
    )
    .await;
    insert_batch(&dal, "a", "2024-01-01 05:00:00", None).await;

    let outcome = dal
        .task_batch()
        .claim_due(1, 10, fixtures::dt("2024-01-01 06:30:00"))
        .await
        .unwrap();
    assert_eq!(outcome.ready.len(), 1);
    assert_eq!(outcome.ready[0].task_name, "a");
}

#[tokio::test]
async fn test_missing_upstream_window_blocks_dependent() {
    let dal = fixtures::sqlite_dal().await;

    let mut a = fixtures::task_info("a", "hour", 1);
    a.dependence =
        r#"[{"task_name": "ghost", "exec_unit": "hour", "offset": [0, 0, 0]}]"#.to_string();
    dal.task_info().create(a).await.unwrap();

    let a_id = insert_batch(&dal, "a", "2024-01-01 05:00:00", None).await;

    let outcome = dal
        .task_batch()
        .claim_due(1, 10, fixtures::dt("2024-01-01 06:30:00"))
        .await
        .unwrap();
    assert!(outcome.ready.is_empty());
    let a_row = dal.task_batch().get_by_id(a_id).await.unwrap();
    assert_eq!(a_row.exec_status, ExecStatus::Pending.as_i32());
}

#[tokio::test]
async fn test_start_expired_recurring_batch_fails_and_alerts() {
    let dal = fixtures::sqlite_dal().await;
    let alerter = RecordingAlertSink::new();
    let dispatcher = Dispatcher::new(dal.clone(), EnvMode::Test, Arc::new(alerter.clone()));

    dal.task_info()
        .create(fixtures::task_info("t", "minute", 1))
        .await
        .unwrap();

    // Window 00:06-00:07, plan 00:07, plan expire 00:17. Observed at 00:30
    // in AwaitingRetry: the start deadline has passed.
    let id = insert_batch(
        &dal,
        "t",
        "2024-01-01 00:06:00",
        Some(ExecStatus::AwaitingRetry),
    )
    .await;

    let ready = dispatcher
        .dispatch(10, fixtures::dt("2024-01-01 00:30:00"))
        .await
        .unwrap();
    assert!(ready.is_empty());

    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::Failed.as_i32());
    assert_eq!(alerter.names(), vec!["t_202401010006_1".to_string()]);
}

#[tokio::test]
async fn test_start_expiry_only_applies_to_awaiting_retry() {
    let dal = fixtures::sqlite_dal().await;

    dal.task_info()
        .create(fixtures::task_info("t", "minute", 1))
        .await
        .unwrap();

    // A Pending batch past its plan-expire time still dispatches; only
    // recycled (AwaitingRetry) batches are subject to start expiry.
    let id = insert_batch(&dal, "t", "2024-01-01 00:06:00", None).await;

    let outcome = dal
        .task_batch()
        .claim_due(1, 10, fixtures::dt("2024-01-01 00:30:00"))
        .await
        .unwrap();
    assert_eq!(outcome.ready.len(), 1);
    assert!(outcome.expired.is_empty());
    let row = dal.task_batch().get_by_id(id).await.unwrap();
    assert_eq!(row.exec_status, ExecStatus::Running.as_i32());
}

#[tokio::test]
async fn test_claim_cap_takes_earliest_plan_times() {
    let dal = fixtures::sqlite_dal().await;

    dal.task_info()
        .create(fixtures::task_info("t", "minute", 1))
        .await
        .unwrap();
    insert_batch(&dal, "t", "2024-01-01 00:06:00", None).await;
    insert_batch(&dal, "t", "2024-01-01 00:07:00", None).await;
    insert_batch(&dal, "t", "2024-01-01 00:08:00", None).await;

    let outcome = dal
        .task_batch()
        .claim_due(1, 2, fixtures::dt("2024-01-01 00:30:00"))
        .await
        .unwrap();

    let claimed: Vec<_> = outcome
        .ready
        .iter()
        .map(|b| b.task_tag_name.clone())
        .collect();
    assert_eq!(
        claimed,
        vec!["t_202401010006".to_string(), "t_202401010007".to_string()]
    );

    // The third batch was scanned but left untouched.
    let rows = dal.task_batch().list_for_task("t").await.unwrap();
    assert_eq!(rows[2].exec_status, ExecStatus::Pending.as_i32());
}

#[tokio::test]
async fn test_future_plan_time_is_not_claimed() {
    let dal = fixtures::sqlite_dal().await;

    dal.task_info()
        .create(fixtures::task_info("t", "minute", 1))
        .await
        .unwrap();
    insert_batch(&dal, "t", "2024-01-01 00:06:00", None).await;

    // Observed before the window's plan time.
    let outcome = dal
        .task_batch()
        .claim_due(1, 10, fixtures::dt("2024-01-01 00:06:30"))
        .await
        .unwrap();
    assert!(outcome.ready.is_empty());
}

#[tokio::test]
async fn test_concurrent_claims_never_share_a_batch() {
    let dal = fixtures::sqlite_dal().await;

    dal.task_info()
        .create(fixtures::task_info("t", "minute", 1))
        .await
        .unwrap();
    for minute in 6..12 {
        insert_batch(&dal, "t", &format!("2024-01-01 00:{:02}:00", minute), None).await;
    }

    let now = fixtures::dt("2024-01-01 00:30:00");
    let dal_a = dal.clone();
    let dal_b = dal.clone();
    let (a, b) = tokio::join!(
        async move { dal_a.task_batch().claim_due(1, 3, now).await.unwrap() },
        async move { dal_b.task_batch().claim_due(1, 3, now).await.unwrap() },
    );

    let mut seen = HashSet::new();
    for batch in a.ready.iter().chain(b.ready.iter()) {
        assert!(seen.insert(batch.id), "Batch {} claimed twice", batch.id);
    }
    assert_eq!(seen.len(), 6);
}

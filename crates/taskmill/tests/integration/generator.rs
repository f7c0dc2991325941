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

//! Batch generation: frontier seeding, stride spacing, plan-time
//! derivation, idempotence, and rollback on malformed definitions.

use chrono::Duration;

use crate::fixtures;

#[tokio::test]
async fn test_first_run_seeds_from_latest_elapsed_window() {
    let dal = fixtures::sqlite_dal().await;
    dal.task_info()
        .create(fixtures::task_info("t", "minute", 5))
        .await
        .unwrap();

    let now = fixtures::dt("2024-01-01 00:07:00");
    let created = dal
        .task_batch()
        .generate_missing(1, now, Duration::hours(3))
        .await
        .unwrap();

    let batches = dal.task_batch().list_for_task("t").await.unwrap();
    assert_eq!(batches.len() as u32, created);

    // Seeded from the most recent fully-elapsed minute window.
    assert_eq!(batches[0].task_tag_name, "t_202401010006");
    assert_eq!(batches[0].start_time, "2024-01-01 00:06:00");
    // One-unit window, five-minute stride.
    assert_eq!(batches[0].end_time, "2024-01-01 00:07:00");

    // Start times run to the horizon: 00:06, 00:11, ..., 03:06.
    assert_eq!(batches.last().unwrap().start_time, "2024-01-01 03:06:00");
    assert_eq!(batches.len(), 37);
}

#[tokio::test]
async fn test_consecutive_starts_differ_by_stride() {
    let dal = fixtures::sqlite_dal().await;
    dal.task_info()
        .create(fixtures::task_info("t", "minute", 5))
        .await
        .unwrap();

    let now = fixtures::dt("2024-01-01 00:07:00");
    dal.task_batch()
        .generate_missing(1, now, Duration::hours(3))
        .await
        .unwrap();

    let batches = dal.task_batch().list_for_task("t").await.unwrap();
    for pair in batches.windows(2) {
        let prev = fixtures::dt(&pair[0].start_time);
        let next = fixtures::dt(&pair[1].start_time);
        assert_eq!(next - prev, Duration::minutes(5));
    }
}

#[tokio::test]
async fn test_plan_times_derive_from_window_end() {
    let dal = fixtures::sqlite_dal().await;
    let mut info = fixtures::task_info("t", "hour", 1);
    info.delay = 15;
    info.start_expire = 30;
    dal.task_info().create(info).await.unwrap();

    let now = fixtures::dt("2024-01-01 05:30:00");
    dal.task_batch()
        .generate_missing(1, now, Duration::hours(3))
        .await
        .unwrap();

    for batch in dal.task_batch().list_for_task("t").await.unwrap() {
        let end = fixtures::dt(&batch.end_time);
        assert_eq!(fixtures::dt(&batch.plan_time), end + Duration::minutes(15));
        assert_eq!(
            fixtures::dt(&batch.plan_expire_time),
            end + Duration::minutes(45)
        );
        assert_eq!(batch.exec_time, "0000-00-00 00:00:00");
        assert_eq!(batch.exec_status, 0);
        assert_eq!(batch.retry, 0);
    }
}

#[tokio::test]
async fn test_generation_is_idempotent() {
    let dal = fixtures::sqlite_dal().await;
    dal.task_info()
        .create(fixtures::task_info("t", "minute", 5))
        .await
        .unwrap();

    let now = fixtures::dt("2024-01-01 00:07:00");
    let first = dal
        .task_batch()
        .generate_missing(1, now, Duration::hours(3))
        .await
        .unwrap();
    let batches_before = dal.task_batch().list_for_task("t").await.unwrap();

    // Unchanged inputs: the second run finds the frontier complete.
    let second = dal
        .task_batch()
        .generate_missing(1, now, Duration::hours(3))
        .await
        .unwrap();
    let batches_after = dal.task_batch().list_for_task("t").await.unwrap();

    assert!(first > 0);
    assert_eq!(second, 0);
    assert_eq!(batches_before.len(), batches_after.len());
    for (before, after) in batches_before.iter().zip(&batches_after) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.task_tag_name, after.task_tag_name);
        assert_eq!(before.plan_time, after.plan_time);
    }
}

#[tokio::test]
async fn test_later_tick_extends_frontier_without_gaps() {
    let dal = fixtures::sqlite_dal().await;
    dal.task_info()
        .create(fixtures::task_info("t", "minute", 5))
        .await
        .unwrap();

    dal.task_batch()
        .generate_missing(1, fixtures::dt("2024-01-01 00:07:00"), Duration::hours(3))
        .await
        .unwrap();
    let extended = dal
        .task_batch()
        .generate_missing(1, fixtures::dt("2024-01-01 00:37:00"), Duration::hours(3))
        .await
        .unwrap();
    assert!(extended > 0);

    let batches = dal.task_batch().list_for_task("t").await.unwrap();
    for pair in batches.windows(2) {
        let prev = fixtures::dt(&pair[0].start_time);
        let next = fixtures::dt(&pair[1].start_time);
        assert_eq!(next - prev, Duration::minutes(5));
    }

    // No two batches share a window.
    let mut tags: Vec<_> = batches.iter().map(|b| b.task_tag_name.clone()).collect();
    tags.sort();
    tags.dedup();
    assert_eq!(tags.len(), batches.len());
}

#[tokio::test]
async fn test_day_windows_break_at_local_midnight() {
    let dal = fixtures::sqlite_dal().await;
    dal.task_info()
        .create(fixtures::task_info("daily", "day", 1))
        .await
        .unwrap();

    let now = fixtures::dt("2024-01-02 10:00:00");
    dal.task_batch()
        .generate_missing(1, now, Duration::hours(3))
        .await
        .unwrap();

    let batches = dal.task_batch().list_for_task("daily").await.unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].task_tag_name, "daily_20240101");
    assert_eq!(batches[0].start_time, "2024-01-01 00:00:00");
    assert_eq!(batches[0].end_time, "2024-01-02 00:00:00");
    assert_eq!(batches[1].task_tag_name, "daily_20240102");
}

#[tokio::test]
async fn test_generation_respects_environment_gate() {
    let dal = fixtures::sqlite_dal().await;
    let mut info = fixtures::task_info("prod_only", "minute", 1);
    info.online = 2;
    dal.task_info().create(info).await.unwrap();

    // The definition store only surfaces matching gates.
    assert!(dal.task_info().list_enabled(1).await.unwrap().is_empty());
    let enabled = dal.task_info().list_enabled(2).await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].task_name, "prod_only");
    assert!(dal
        .task_info()
        .get_by_name("prod_only")
        .await
        .unwrap()
        .is_some());
    assert!(dal.task_info().get_by_name("absent").await.unwrap().is_none());

    let created = dal
        .task_batch()
        .generate_missing(1, fixtures::dt("2024-01-01 00:07:00"), Duration::hours(3))
        .await
        .unwrap();

    assert_eq!(created, 0);
    assert_eq!(dal.task_batch().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_definition_rolls_back_the_tick() {
    let dal = fixtures::sqlite_dal().await;
    dal.task_info()
        .create(fixtures::task_info("good", "minute", 1))
        .await
        .unwrap();
    let mut bad = fixtures::task_info("bad", "minute", 1);
    bad.dependence = "{not json".to_string();
    dal.task_info().create(bad).await.unwrap();

    let result = dal
        .task_batch()
        .generate_missing(1, fixtures::dt("2024-01-01 00:07:00"), Duration::hours(3))
        .await;

    assert!(result.is_err());
    // The transaction envelopes the whole tick: nothing was inserted for
    // the good definition either.
    assert_eq!(dal.task_batch().count().await.unwrap(), 0);
}

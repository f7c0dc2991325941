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

//! End-to-end tick: generate, dispatch, execute against the real clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serial_test::serial;

use taskmill::models::ExecStatus;
use taskmill::time::Interval;
use taskmill::{
    register_script, EnvMode, Runner, RunnerConfig, ScriptError, TaskScript,
};

use crate::fixtures;

#[derive(Clone)]
struct TickScript {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TaskScript for TickScript {
    async fn run_task(
        &self,
        _interval: &Interval,
        _script_args: &str,
        _task_tag_name: &str,
    ) -> Result<(), ScriptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
#[serial]
async fn test_tick_runs_due_batch_end_to_end() {
    let database = fixtures::sqlite_database().await;

    let script = TickScript {
        calls: Arc::new(AtomicUsize::new(0)),
    };
    register_script("runner_test_tick", script.clone());

    let config = RunnerConfig::builder()
        .task_num(2)
        .retry_pause(Duration::from_millis(1))
        .environment(EnvMode::Test)
        .build();
    let runner = Runner::new(database, config);

    let mut info = fixtures::task_info("tick_task", "minute", 1);
    info.script = "runner_test_tick".to_string();
    runner.dal().task_info().create(info).await.unwrap();

    let report = runner.run().await.unwrap();

    // The generator materialised the frontier, and the most recent elapsed
    // window was already past its plan time, so the tick executed it.
    assert!(report.generated > 0);
    assert!(report.dispatched >= 1);
    assert!(script.calls.load(Ordering::SeqCst) >= 1);

    let batches = runner
        .dal()
        .task_batch()
        .list_for_task("tick_task")
        .await
        .unwrap();
    let succeeded = batches
        .iter()
        .filter(|b| b.exec_status == ExecStatus::Succeeded.as_i32())
        .count();
    assert!(succeeded >= 1);

    // Pending batches remain for future windows.
    assert!(batches
        .iter()
        .any(|b| b.exec_status == ExecStatus::Pending.as_i32()));

    // A second tick finds the frontier already extended (at most one new
    // window if the clock just crossed a minute boundary).
    let report = runner.run().await.unwrap();
    assert!(report.generated <= 1);
}

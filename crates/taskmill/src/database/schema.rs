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

//! Diesel schema for the two scheduler tables.
//!
//! Every timestamp column is stored as text in `%Y-%m-%d %H:%M:%S` form
//! (with the `0000-00-00 00:00:00` sentinel for unset values), which keeps
//! the column types identical across PostgreSQL and SQLite and makes
//! lexicographic ordering chronological.

diesel::table! {
    /// Operator-maintained task definitions.
    task_info (id) {
        id -> Integer,
        task_name -> Text,
        task_type -> Integer,
        online -> Integer,
        dependence -> Text,
        script -> Text,
        script_args -> Text,
        exec_unit -> Text,
        exec_unit_param -> Integer,
        delay -> Integer,
        start_expire -> Integer,
        run_expire -> Integer,
        retry_max_times -> Integer,
        create_time -> Text,
        update_time -> Text,
    }
}

diesel::table! {
    /// Materialised batches, one row per `(task, window)`. Rows are never
    /// deleted; they are the audit log.
    task_batch (id) {
        id -> Integer,
        task_name -> Text,
        task_tag_name -> Text,
        task_batch_name -> Text,
        exec_status -> Integer,
        dependence -> Text,
        start_time -> Text,
        end_time -> Text,
        plan_time -> Text,
        plan_expire_time -> Text,
        exec_time -> Text,
        exit_time -> Text,
        duration -> Integer,
        retry -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(task_info, task_batch);

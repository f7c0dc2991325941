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

//! Operator alerting.
//!
//! A single one-way notification per failed batch, fired when a recurring
//! batch misses its start deadline, when a one-shot batch exhausts its
//! retries, or when a batch references an unregistered script. Delivery is
//! best effort: implementations log their own failures and never propagate
//! them into the scheduling path.

use async_trait::async_trait;
use tracing::error;

/// One-way "notify operator" sink.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Notifies the operator that a batch has failed. Best effort, no
    /// retries; implementations swallow and log their own errors.
    async fn notify(&self, task_batch_name: &str);
}

/// Alert sink that writes to the structured log.
///
/// The default sink for deployments without an external alert channel.
#[derive(Debug, Default, Clone)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, task_batch_name: &str) {
        error!(batch = %task_batch_name, "Batch failure alert");
    }
}

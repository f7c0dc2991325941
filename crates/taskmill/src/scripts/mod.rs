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

//! Built-in task scripts.
//!
//! The scheduler ships one script of its own: `generate_batches`, which
//! extends every enabled definition's batch frontier. Registering it lets a
//! deployment schedule frontier extension as a regular task; the coordinator
//! also runs the same generator directly at the start of every tick.

mod generate_batches;

pub use generate_batches::{seed_first_run, GenerateBatchesScript, GENERATE_BATCHES_SCRIPT};

use crate::dal::DAL;
use crate::environment::EnvMode;

/// Registers the built-in scripts against a DAL and environment.
pub fn register_builtins(dal: DAL, env: EnvMode) {
    crate::executor::register_script_constructor(GENERATE_BATCHES_SCRIPT, move || {
        std::sync::Arc::new(GenerateBatchesScript::new(dal.clone(), env))
    });
}

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

//! Batch execution: the script contract, the script registry, and the
//! executor that drives claimed batches to a terminal state.

mod batch_executor;
pub mod registry;
pub mod script;

pub use batch_executor::BatchExecutor;
pub use registry::{
    get_script, is_script_registered, list_scripts, register_script, register_script_constructor,
};
pub use script::TaskScript;

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

//! Environment gating for task definitions.
//!
//! Every task definition carries an `online` column; only definitions whose
//! gate value matches the process environment are generated and dispatched.
//! The environment is resolved once at process start from the `TASKMILL_ENV`
//! variable: `"online"` selects production, `"pre"` selects pre-production,
//! anything else (including an unset variable) falls back to test.

/// The environment a taskmill process runs in.
///
/// Pre-production shares the test gate value: pre points at different
/// backing services but dispatches the same (non-production) definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    /// Local or CI testing. Gate value 1.
    Test,
    /// Pre-production staging. Gate value 1.
    Pre,
    /// Production. Gate value 2.
    Production,
}

/// Environment variable consulted by [`EnvMode::from_env`].
pub const ENV_VAR: &str = "TASKMILL_ENV";

impl EnvMode {
    /// Resolves the environment from `TASKMILL_ENV`.
    pub fn from_env() -> Self {
        match std::env::var(ENV_VAR) {
            Ok(value) => Self::from_value(&value),
            Err(_) => EnvMode::Test,
        }
    }

    /// Maps a raw environment string to a mode. Unknown values fall back to
    /// test so that a misconfigured host can never dispatch production
    /// definitions.
    pub fn from_value(value: &str) -> Self {
        match value {
            "online" => EnvMode::Production,
            "pre" => EnvMode::Pre,
            _ => EnvMode::Test,
        }
    }

    /// The value matched against the `online` column of `task_info`.
    pub fn gate(&self) -> i32 {
        match self {
            EnvMode::Production => 2,
            EnvMode::Test | EnvMode::Pre => 1,
        }
    }

    /// Human-readable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvMode::Test => "test",
            EnvMode::Pre => "pre",
            EnvMode::Production => "production",
        }
    }
}
